use serde::{Deserialize, Serialize};

/// Payload format guessed from the first characters of an inbound message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageFormat {
    /// A single pipe/caret message starting with an `MSH` header.
    Hl7v2,
    /// A batch or file wrapped in `FHS`/`BHS` envelopes.
    Hl7v2Batch,
    /// A JSON document, presumably already FHIR.
    FhirJson,
    Unknown,
}

impl MessageFormat {
    pub fn detect(payload: &str) -> Self {
        let trimmed = payload.trim_start();
        if trimmed.starts_with('{') {
            Self::FhirJson
        } else if trimmed.starts_with("MSH") {
            Self::Hl7v2
        } else if trimmed.starts_with("FHS") || trimmed.starts_with("BHS") {
            Self::Hl7v2Batch
        } else {
            Self::Unknown
        }
    }
}
