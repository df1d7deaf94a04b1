use casenote_core::{
    CodeableConcept, Coding, ConversionWarning, Extension, ExtensionValue, Identifier, Observation,
    ObservationValue, Organization, Practitioner, Quantity, Reference, ReferenceRange, Resource,
};
use casenote_hl7::{Field, Segment};
use rust_decimal::Decimal;
use serde::Serialize;

use crate::extract::{CODE_FIELD, DATATYPE_FIELD, VALUE_FIELD};
use crate::fields::{concept, non_blank, parse_decimal};
use crate::{performer, DataType, Mapping};

const UNITS_FIELD: usize = 6;
const REFERENCE_RANGE_FIELD: usize = 7;
const INTERPRETATION_FIELD: usize = 8;
const STATUS_FIELD: usize = 11;
const EFFECTIVE_FIELD: usize = 14;
const METHOD_FIELD: usize = 17;
const BODY_SITE_FIELD: usize = 20;

/// Carries the raw HL7 coding-system identifier of a coded observation value.
pub const CODING_SYSTEM_EXTENSION: &str = "urn:casenote:extension:v2-coding-system";
pub const ORIGINAL_TEXT_EXTENSION: &str =
    "http://hl7.org/fhir/StructureDefinition/originalText";

/// An observation and the performer resources its references point at.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ObservationGroup {
    pub observation: Observation,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub practitioner: Option<Practitioner>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub organization: Option<Organization>,
}

impl ObservationGroup {
    /// The observation first, then its performers.
    pub fn into_resources(self) -> Vec<Resource> {
        let mut resources = vec![Resource::Observation(self.observation)];
        resources.extend(self.practitioner.map(Resource::Practitioner));
        resources.extend(self.organization.map(Resource::Organization));
        resources
    }
}

pub(crate) fn assemble(
    mapping: &mut Mapping<'_>,
    segment: &Segment,
    subject: Option<&Reference>,
) -> ObservationGroup {
    let config = mapping.config();
    let code_field = segment.field(CODE_FIELD);
    let code = code_field.component(1).value();

    let mut observation = Observation {
        id: mapping.next_id(),
        identifier: non_blank(code).map(Identifier::with_value).into_iter().collect(),
        status: None,
        code: concept(
            config,
            code,
            code_field.component(2).value(),
            code_field.component(3).value(),
            "",
        )
        .unwrap_or_default(),
        subject: subject.cloned(),
        effective_date_time: None,
        performer: Vec::new(),
        value: None,
        interpretation: Vec::new(),
        body_site: None,
        method: None,
        reference_range: Vec::new(),
    };

    observation.body_site = coded_attribute(mapping, segment.field(BODY_SITE_FIELD));
    observation.method = coded_attribute(mapping, segment.field(METHOD_FIELD));

    let status = segment.field(STATUS_FIELD);
    if !status.is_blank() {
        observation.status = Some(config.observation_status(status.value()));
    }

    let interpretation = segment.field(INTERPRETATION_FIELD);
    if !interpretation.is_blank() {
        let parsed = if interpretation.component_count() >= 3 {
            concept(
                config,
                interpretation.component(1).value(),
                interpretation.component(2).value(),
                interpretation.component(3).value(),
                interpretation.component(9).value(),
            )
        } else {
            Some(CodeableConcept::from_text(interpretation.value()))
        };
        observation.interpretation.extend(parsed);
    }

    let reference_range = segment.field(REFERENCE_RANGE_FIELD);
    if !reference_range.is_blank() {
        observation.reference_range.push(ReferenceRange {
            text: reference_range.value().to_string(),
        });
    }

    let effective = segment.field(EFFECTIVE_FIELD);
    if !effective.is_blank() {
        observation.effective_date_time =
            mapping.date_time("OBX-14", effective.component(1).value());
    }

    observation.value = dispatch_value(mapping, segment);

    let practitioner = performer::practitioner(mapping, segment);
    let organization = performer::organization(mapping, segment);
    if let Some(practitioner) = &practitioner {
        observation.performer.push(Reference::to("Practitioner", &practitioner.id));
    }
    if let Some(organization) = &organization {
        observation.performer.push(Reference::to("Organization", &organization.id));
    }

    tracing::debug!(
        code,
        has_value = observation.value.is_some(),
        performers = observation.performer.len(),
        "converted observation"
    );

    ObservationGroup {
        observation,
        practitioner,
        organization,
    }
}

/// Body site and method are only read when they carry a full code triple.
fn coded_attribute(mapping: &Mapping<'_>, field: &Field) -> Option<CodeableConcept> {
    if field.is_blank() || field.component_count() < 3 {
        return None;
    }
    concept(
        mapping.config(),
        field.component(1).value(),
        field.component(2).value(),
        field.component(3).value(),
        "",
    )
}

/// Populate `value[x]` according to the OBX-2 datatype.
fn dispatch_value(mapping: &mut Mapping<'_>, segment: &Segment) -> Option<ObservationValue> {
    let code = segment.field(CODE_FIELD).component(1).value();
    let value = segment.field(VALUE_FIELD);
    let raw = value.value();

    match DataType::from_tag(segment.field(DATATYPE_FIELD).value()) {
        DataType::Numeric => {
            if value.is_blank() {
                return None;
            }
            match parse_decimal(raw) {
                Some(number) => Some(numeric_value(mapping, segment, number)),
                None => {
                    mapping.warn(ConversionWarning::LossyNumeric {
                        code: code.to_string(),
                        raw: raw.to_string(),
                    });
                    Some(ObservationValue::Text(raw.to_string()))
                }
            }
        }
        DataType::StructuredNumeric => {
            if value.is_blank() {
                return None;
            }
            // Only `^<number>`: comparator absent, value present.
            let number = (value.component_count() == 2
                && value.component(1).value().is_empty()
                && !value.component(2).is_blank())
            .then(|| parse_decimal(value.component(2).value()))
            .flatten();

            match number {
                Some(number) => Some(numeric_value(mapping, segment, number)),
                None => {
                    mapping.warn(ConversionWarning::UnhandledStructuredNumeric {
                        code: code.to_string(),
                        raw: raw.to_string(),
                    });
                    None
                }
            }
        }
        DataType::Date | DataType::Timestamp => {
            non_blank(raw).map(ObservationValue::DateTime)
        }
        DataType::CodedElement | DataType::CodedWithExceptions => coded_value(value),
        DataType::EntityIdentifier
        | DataType::StringData
        | DataType::Text
        | DataType::FormattedText => non_blank(raw).map(ObservationValue::Text),
        DataType::Unhandled(tag) => {
            mapping.warn(ConversionWarning::UnmappedDataType {
                code: code.to_string(),
                tag,
            });
            None
        }
    }
}

/// Quantity when OBX-6 is a well-formed unit, otherwise a bare decimal.
fn numeric_value(mapping: &Mapping<'_>, segment: &Segment, number: Decimal) -> ObservationValue {
    let units = segment.field(UNITS_FIELD);
    if units.component_count() < 3 || units.component(1).is_blank() {
        return ObservationValue::Decimal(number);
    }

    ObservationValue::Quantity(Quantity {
        value: Some(number),
        code: non_blank(units.component(1).value().trim()),
        unit: non_blank(units.component(2).value().trim()),
        system: non_blank(
            mapping
                .config()
                .canonical_system(units.component(3).value().trim()),
        ),
    })
}

/// Coded value kept close to the wire form: the coding system is not translated
/// but attached as an extension, next to the original text (component 9).
fn coded_value(value: &Field) -> Option<ObservationValue> {
    let mut coding = Coding {
        extension: Vec::new(),
        system: None,
        code: non_blank(value.component(1).value()),
        display: non_blank(value.component(2).value()),
    };

    for (url, component) in [(CODING_SYSTEM_EXTENSION, 3), (ORIGINAL_TEXT_EXTENSION, 9)] {
        if let Some(text) = non_blank(value.component(component).value()) {
            coding
                .extension
                .push(Extension::with_value(url, ExtensionValue::String(text)));
        }
    }

    (!coding.is_empty()).then(|| {
        ObservationValue::CodedConcept(CodeableConcept::from_coding(coding, None))
    })
}
