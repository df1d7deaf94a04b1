//! HL7v2 ORU_R01 case notification to FHIR resource converter.
//!
//! A [`Converter`] owns the lookup tables and the identifier source; each
//! `convert_*` call reads one parsed [`Message`] (or one segment) and returns the
//! assembled resource wrapped in [`Converted`], which also carries every
//! non-fatal downgrade raised along the way.

use casenote_core::{
    Bundle, CaseReport, Condition, ConversionConfig, ConversionError, ConversionWarning, Converted,
    FhirDate, FhirDateTime, IdSource, Patient, Reference, Specimen, UuidIdSource,
};
use casenote_hl7::{Message, MessageFormat, Segment};

mod case;
mod condition;
mod datatype;
mod datetime;
mod document;
mod extract;
mod fields;
mod observation;
mod patient;
mod performer;
mod specimen;

pub use datatype::DataType;
pub use datetime::{normalize_date, normalize_date_time};
pub use extract::{coded_value, repeating_group, CodedTriplet, TripletGroup};
pub use observation::{ObservationGroup, CODING_SYSTEM_EXTENSION, ORIGINAL_TEXT_EXTENSION};
pub use patient::{administrative_gender, redact_patient};

const HEADER_SEGMENT: &str = "MSH";

/// State shared by the assemblers during one conversion.
pub(crate) struct Mapping<'a> {
    config: &'a ConversionConfig,
    ids: &'a dyn IdSource,
    warnings: Vec<ConversionWarning>,
}

impl<'a> Mapping<'a> {
    fn new(config: &'a ConversionConfig, ids: &'a dyn IdSource) -> Self {
        Self {
            config,
            ids,
            warnings: Vec::new(),
        }
    }

    pub(crate) fn config(&self) -> &'a ConversionConfig {
        self.config
    }

    pub(crate) fn next_id(&self) -> String {
        self.ids.next_id()
    }

    pub(crate) fn warn(&mut self, warning: ConversionWarning) {
        tracing::warn!(warning = %warning, "lossy conversion");
        self.warnings.push(warning);
    }

    /// Normalized date; a value that is not a calendar date is kept and flagged.
    pub(crate) fn date(&mut self, field: &str, raw: &str) -> Option<FhirDate> {
        let date = normalize_date(raw)?;
        if date.to_naive().is_none() {
            self.warn(ConversionWarning::InvalidDate {
                field: field.to_string(),
                raw: raw.to_string(),
            });
        }
        Some(date)
    }

    pub(crate) fn date_time(&mut self, field: &str, raw: &str) -> Option<FhirDateTime> {
        let value = normalize_date_time(raw)?;
        if value.to_naive().is_none() {
            self.warn(ConversionWarning::InvalidDate {
                field: field.to_string(),
                raw: raw.to_string(),
            });
        }
        Some(value)
    }

    fn finish<T>(self, resource: T) -> Converted<T> {
        Converted::new(resource, self.warnings)
    }
}

/// First segment named `name`, or a structural error.
pub(crate) fn required_segment<'m>(
    message: &'m Message,
    name: &str,
) -> Result<&'m Segment, ConversionError> {
    message
        .segment(name)
        .ok_or_else(|| ConversionError::missing_segment(name))
}

/// Entry point for all conversions.
pub struct Converter {
    config: ConversionConfig,
    ids: Box<dyn IdSource>,
}

impl Default for Converter {
    fn default() -> Self {
        Self::new(ConversionConfig::default())
    }
}

impl Converter {
    /// A converter assigning random UUIDs to new resources.
    pub fn new(config: ConversionConfig) -> Self {
        Self::with_id_source(config, UuidIdSource)
    }

    pub fn with_id_source(config: ConversionConfig, ids: impl IdSource + 'static) -> Self {
        Self {
            config,
            ids: Box::new(ids),
        }
    }

    pub fn config(&self) -> &ConversionConfig {
        &self.config
    }

    fn mapping(&self) -> Mapping<'_> {
        Mapping::new(&self.config, self.ids.as_ref())
    }

    /// Case notification with its redacted patient embedded.
    pub fn convert_case(
        &self,
        message: &Message,
    ) -> Result<Converted<CaseReport>, ConversionError> {
        let mut mapping = self.mapping();
        let case = case::assemble(&mut mapping, message)?;
        tracing::info!(
            identifiers = case.identifier.len(),
            exposure_addresses = case.exposure_address.len(),
            "converted case report"
        );
        Ok(mapping.finish(case))
    }

    /// Redacted patient demographics from the first PID segment.
    pub fn convert_patient(
        &self,
        message: &Message,
    ) -> Result<Converted<Patient>, ConversionError> {
        let mut mapping = self.mapping();
        let patient = patient::assemble(&mut mapping, message)?;
        tracing::debug!(patient_id = %patient.id, "converted patient");
        Ok(mapping.finish(patient))
    }

    pub fn convert_condition(
        &self,
        message: &Message,
        patient_id: &str,
    ) -> Result<Converted<Condition>, ConversionError> {
        let mut mapping = self.mapping();
        let condition = condition::assemble(&mut mapping, message, patient_id)?;
        tracing::debug!(condition_id = %condition.id, "converted condition");
        Ok(mapping.finish(condition))
    }

    /// One OBX segment together with the performers it names.
    pub fn convert_observation(
        &self,
        segment: &Segment,
        subject: Option<&Reference>,
    ) -> Converted<ObservationGroup> {
        let mut mapping = self.mapping();
        let group = observation::assemble(&mut mapping, segment, subject);
        mapping.finish(group)
    }

    pub fn convert_specimen(&self, segment: &Segment) -> Converted<Specimen> {
        let mut mapping = self.mapping();
        let specimen = specimen::assemble(&mut mapping, segment);
        mapping.finish(specimen)
    }

    /// Electronic initial case report document bundle identified by `process_id`.
    pub fn convert_document(
        &self,
        message: &Message,
        process_id: &str,
    ) -> Result<Converted<Bundle>, ConversionError> {
        let mut mapping = self.mapping();
        let bundle = document::assemble(&mut mapping, message, process_id)?;
        tracing::info!(
            bundle_id = %bundle.id,
            entries = bundle.entry.len(),
            warnings = mapping.warnings.len(),
            "converted case report document"
        );
        Ok(mapping.finish(bundle))
    }
}

/// Parse a raw payload after checking that it is a single HL7v2 message.
///
/// Payloads whose format cannot be recognised are still handed to the tokenizer.
/// Several concatenated messages are rejected like an enveloped batch.
pub fn parse_message(text: &str) -> Result<Message, ConversionError> {
    let format = MessageFormat::detect(text);
    match format {
        MessageFormat::FhirJson | MessageFormat::Hl7v2Batch => {
            return Err(ConversionError::UnsupportedFormat(format!("{format:?}")));
        }
        MessageFormat::Hl7v2 | MessageFormat::Unknown => {}
    }

    let message = Message::parse(text).map_err(|err| ConversionError::Parse(err.to_string()))?;
    let headers = message.segments_named(HEADER_SEGMENT).count();
    if headers > 1 {
        tracing::warn!(headers, "payload carries more than one message");
        return Err(ConversionError::UnsupportedFormat(format!(
            "{:?}",
            MessageFormat::Hl7v2Batch
        )));
    }
    Ok(message)
}

/// Parse and convert a raw message into a case report.
pub fn convert_case_str(
    text: &str,
    converter: &Converter,
) -> Result<Converted<CaseReport>, ConversionError> {
    let message = parse_message(text)?;
    converter.convert_case(&message)
}
