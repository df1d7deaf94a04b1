//! Small helpers shared by the assemblers for turning raw field text into
//! optional resource elements.

use std::str::FromStr;

use casenote_core::{CodeableConcept, Coding, ConversionConfig};
use casenote_hl7::Field;
use rust_decimal::Decimal;

use crate::CodedTriplet;

/// Component carrying the original text of a coded element (CWE-9).
const ORIGINAL_TEXT_COMPONENT: usize = 9;

/// `Some(value)` unless the value is blank.
pub(crate) fn non_blank(value: &str) -> Option<String> {
    if value.trim().is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

/// Lenient decimal parse: surrounding whitespace and exponent notation are accepted.
pub(crate) fn parse_decimal(raw: &str) -> Option<Decimal> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    Decimal::from_str(trimmed)
        .or_else(|_| Decimal::from_scientific(trimmed))
        .ok()
}

/// Build a concept from loose parts, canonicalizing the system. `None` when every part is blank.
pub(crate) fn concept(
    config: &ConversionConfig,
    code: &str,
    display: &str,
    system: &str,
    text: &str,
) -> Option<CodeableConcept> {
    let coding = Coding {
        extension: Vec::new(),
        system: non_blank(config.canonical_system(system)),
        code: non_blank(code),
        display: non_blank(display),
    };
    let concept = CodeableConcept::from_coding(coding, non_blank(text));
    (!concept.is_empty()).then_some(concept)
}

/// Concept from a CE/CWE field: identifier, text, coding system, and original text.
pub(crate) fn concept_from_field(
    config: &ConversionConfig,
    field: &Field,
) -> Option<CodeableConcept> {
    if field.is_blank() {
        return None;
    }
    concept(
        config,
        field.component(1).value(),
        field.component(2).value(),
        field.component(3).value(),
        field.component(ORIGINAL_TEXT_COMPONENT).value(),
    )
}

/// Concept from a looked-up observation value; the display doubles as the text.
pub(crate) fn concept_from_triplet(
    config: &ConversionConfig,
    triplet: &CodedTriplet,
) -> Option<CodeableConcept> {
    concept(
        config,
        &triplet.code,
        &triplet.display,
        &triplet.system,
        &triplet.display,
    )
}
