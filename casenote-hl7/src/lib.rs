//! Positional HL7v2 message model.
//!
//! Segments, fields, components and subcomponents are addressed 1-based, the way
//! HL7 documentation numbers them (`OBX-5.2` is `segment.field(5).component(2)`).
//! Lookups never fail: a position that is not present in the message yields an
//! empty value, so mapping code can read optional fields without branching on
//! their existence.

mod format;
mod message;

pub use format::MessageFormat;
pub use message::{Component, Delimiters, Field, Message, Segment};

/// Errors raised while tokenizing a pipe/caret encoded message.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum Hl7Error {
    #[error("message contains no segments")]
    Empty,
    #[error("invalid segment: {0}")]
    InvalidSegment(String),
}
