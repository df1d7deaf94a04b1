use casenote_core::{Condition, ConversionError, FhirDateTime, Period, Reference};
use casenote_hl7::Message;

use crate::extract::{CODE_FIELD, DATATYPE_FIELD, OBSERVATION_SEGMENT, VALUE_FIELD};
use crate::fields::concept;
use crate::{required_segment, DataType, Mapping};

const ORDER_SEGMENT: &str = "OBR";
const REQUIRED_ORDER_FIELDS: usize = 31;
const REASON_FIELD: usize = 31;

const ONSET_CODE: &str = "11368-8";
const ABATEMENT_CODE: &str = "77976-9";

const CATEGORY_SYSTEM: &str = "http://hl7.org/fhir/us/core/CodeSystem/condition-category";

pub(crate) fn assemble(
    mapping: &mut Mapping<'_>,
    message: &Message,
    patient_id: &str,
) -> Result<Condition, ConversionError> {
    let obr = required_segment(message, ORDER_SEGMENT)?;
    if obr.field_count() < REQUIRED_ORDER_FIELDS {
        return Err(ConversionError::ShortSegment {
            segment: ORDER_SEGMENT.to_string(),
            required: REQUIRED_ORDER_FIELDS,
            found: obr.field_count(),
        });
    }

    let config = mapping.config();
    let reason = obr.field(REASON_FIELD);
    let display = reason.component(2).value();

    let period = Period {
        start: timestamp(mapping, message, ONSET_CODE),
        end: timestamp(mapping, message, ABATEMENT_CODE),
    };

    Ok(Condition {
        id: mapping.next_id(),
        category: concept(
            config,
            "health-concern",
            "Health Concern",
            CATEGORY_SYSTEM,
            "Health Concern",
        )
        .into_iter()
        .collect(),
        code: concept(
            config,
            reason.component(1).value(),
            display,
            reason.component(3).value(),
            display,
        )
        .unwrap_or_default(),
        subject: Reference::to("Patient", patient_id),
        onset_period: (!period.is_empty()).then_some(period),
    })
}

/// First `TS` observation carrying `code`, normalized.
fn timestamp(mapping: &mut Mapping<'_>, message: &Message, code: &str) -> Option<FhirDateTime> {
    let segment = message.segments_named(OBSERVATION_SEGMENT).find(|segment| {
        segment.field(CODE_FIELD).component(1).value() == code
            && DataType::from_tag(segment.field(DATATYPE_FIELD).value()) == DataType::Timestamp
            && !segment.field(VALUE_FIELD).is_blank()
    })?;
    mapping.date_time(code, segment.field(VALUE_FIELD).value())
}
