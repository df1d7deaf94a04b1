//! Data model shared by the case notification converters.
//!
//! This crate holds the output resources, the injectable configuration tables and
//! identifier source, and the error/warning taxonomy. It carries no mapping logic.

use std::fmt;

use serde::Serialize;

mod config;
mod id;
mod resources;

pub use config::{ConversionConfig, SNOMED_CT_URI};
pub use id::{IdSource, SequentialIdSource, UuidIdSource};
pub use resources::{
    Address, AdministrativeGender, Attachment, Bundle, BundleEntry, BundleType, CaseReport,
    CodeableConcept, Coding, Composition, CompositionSection, CompositionStatus, Condition,
    ContactPoint, Extension, ExtensionValue, FhirDate, FhirDateTime, HumanName, Identifier,
    IdentifierUse, Observation, ObservationStatus, ObservationValue, Organization, Patient,
    PatientContact, Period, Practitioner, Quantity, Reference, ReferenceRange, Resource, Specimen,
    SpecimenCollection,
};

/// Fatal conversion failures. Any of these aborts the whole message.
#[derive(Debug, thiserror::Error)]
pub enum ConversionError {
    #[error("required segment {segment} is missing")]
    MissingSegment { segment: String },
    #[error("segment {segment} carries {found} fields, at least {required} are required")]
    ShortSegment {
        segment: String,
        required: usize,
        found: usize,
    },
    #[error("group key {key:?} for {code} is not an integer")]
    InvalidGroupKey { code: String, key: String },
    #[error("unsupported message format: {0}")]
    UnsupportedFormat(String),
    #[error("could not read message: {0}")]
    Parse(String),
}

impl ConversionError {
    pub fn missing_segment(segment: &str) -> Self {
        Self::MissingSegment {
            segment: segment.to_string(),
        }
    }
}

/// Non-fatal conditions raised while mapping. The affected value is either
/// downgraded or left unset; the rest of the message is still converted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ConversionWarning {
    /// A numeric observation could not be parsed and was kept as text.
    LossyNumeric { code: String, raw: String },
    /// A structured numeric value had a shape other than `^<number>`.
    UnhandledStructuredNumeric { code: String, raw: String },
    /// The observation datatype tag has no mapping; the value was not set.
    UnmappedDataType { code: String, tag: String },
    /// A timestamp normalized to something that is not a calendar date.
    InvalidDate { field: String, raw: String },
}

impl fmt::Display for ConversionWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::LossyNumeric { code, raw } => {
                write!(f, "observation {code}: numeric value {raw:?} kept as text")
            }
            Self::UnhandledStructuredNumeric { code, raw } => {
                write!(f, "observation {code}: structured numeric {raw:?} not mapped")
            }
            Self::UnmappedDataType { code, tag } => {
                write!(f, "observation {code}: datatype {tag:?} has no mapping")
            }
            Self::InvalidDate { field, raw } => {
                write!(f, "{field}: {raw:?} is not a valid calendar date")
            }
        }
    }
}

/// A converted resource together with the warnings raised while building it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Converted<T> {
    pub resource: T,
    pub warnings: Vec<ConversionWarning>,
}

impl<T> Converted<T> {
    pub fn new(resource: T, warnings: Vec<ConversionWarning>) -> Self {
        Self { resource, warnings }
    }

    /// True when nothing was downgraded or dropped.
    pub fn is_lossless(&self) -> bool {
        self.warnings.is_empty()
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Converted<U> {
        Converted {
            resource: f(self.resource),
            warnings: self.warnings,
        }
    }

    pub fn into_parts(self) -> (T, Vec<ConversionWarning>) {
        (self.resource, self.warnings)
    }
}
