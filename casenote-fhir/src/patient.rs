//! Patient demographics from the PID segment.
//!
//! The patient is always redacted before it is returned: names, telecom, contacts
//! and photos never leave this module, whatever the message carried.

use casenote_core::{
    Address, AdministrativeGender, Coding, ConversionError, Extension, ExtensionValue, Identifier,
    Patient,
};
use casenote_hl7::{Field, Message, Segment};

use crate::fields::non_blank;
use crate::{coded_value, required_segment, Mapping};

const PATIENT_SEGMENT: &str = "PID";
const BIRTH_DATE_FIELD: usize = 7;
const SEX_FIELD: usize = 8;
const RACE_FIELD: usize = 10;
const ADDRESS_FIELD: usize = 11;
const ETHNICITY_FIELD: usize = 22;
const DEATH_FIELD: usize = 29;

const RACE_URL: &str = "http://hl7.org/fhir/us/core/StructureDefinition/us-core-race";
const ETHNICITY_URL: &str = "http://hl7.org/fhir/us/core/StructureDefinition/us-core-ethnicity";
const BIRTH_PLACE_URL: &str = "http://hl7.org/fhir/StructureDefinition/patient-birthPlace";
/// OMB race and ethnicity categories (CDC Race & Ethnicity code set).
const OMB_SYSTEM: &str = "urn:oid:2.16.840.1.113883.6.238";

const BIRTH_COUNTRY_CODE: &str = "78746-5";
const BIRTH_COUNTRY_OTHER_CODE: &str = "21842-0";

pub(crate) fn assemble(
    mapping: &mut Mapping<'_>,
    message: &Message,
) -> Result<Patient, ConversionError> {
    let pid = required_segment(message, PATIENT_SEGMENT)?;
    let id = mapping.next_id();

    let mut patient = Patient {
        identifier: vec![Identifier::with_value(id.clone())],
        id,
        active: true,
        gender: administrative_gender(pid.field(SEX_FIELD).value()),
        ..Patient::default()
    };

    let address = address(pid);
    if !address.is_empty() {
        patient.address.push(address);
    }

    patient
        .extension
        .extend(category_extension(RACE_URL, pid.field(RACE_FIELD)));
    patient
        .extension
        .extend(category_extension(ETHNICITY_URL, pid.field(ETHNICITY_FIELD)));

    patient.birth_date = mapping.date("PID-7", pid.field(BIRTH_DATE_FIELD).value());
    patient.deceased_date_time = mapping.date_time("PID-29", pid.field(DEATH_FIELD).value());

    redact_patient(&mut patient);
    Ok(patient)
}

/// Map an HL7 administrative sex code; unknown codes leave the gender unset.
pub fn administrative_gender(code: &str) -> Option<AdministrativeGender> {
    match code.trim() {
        "M" => Some(AdministrativeGender::Male),
        "F" => Some(AdministrativeGender::Female),
        "U" => Some(AdministrativeGender::Unknown),
        "O" => Some(AdministrativeGender::Other),
        _ => None,
    }
}

/// Remove direct identifiers. Applying it twice changes nothing.
pub fn redact_patient(patient: &mut Patient) {
    patient.name.clear();
    patient.telecom.clear();
    patient.contact.clear();
    patient.photo.clear();
}

fn address(pid: &Segment) -> Address {
    let field = pid.field(ADDRESS_FIELD);
    Address {
        city: non_blank(field.component(3).value()),
        state: non_blank(field.component(4).value()),
        postal_code: non_blank(field.component(5).value()),
        country: non_blank(field.component(6).value()),
        district: non_blank(field.component(9).value()),
        ..Address::default()
    }
}

/// US Core race/ethnicity style extension: one `ombCategory` per repetition.
fn category_extension(url: &str, field: &Field) -> Option<Extension> {
    let categories: Vec<Extension> = field
        .occurrences()
        .iter()
        .filter(|occurrence| !occurrence.is_blank())
        .map(|occurrence| {
            Extension::with_value(
                "ombCategory",
                ExtensionValue::Coding(Coding {
                    extension: Vec::new(),
                    system: Some(OMB_SYSTEM.to_string()),
                    code: non_blank(occurrence.component(1).value()),
                    display: non_blank(occurrence.component(2).value()),
                }),
            )
        })
        .collect();

    (!categories.is_empty()).then(|| Extension::nested(url, categories))
}

/// Birth place reported as coded observations rather than in PID.
pub(crate) fn birth_place(message: &Message) -> Option<Extension> {
    let address = Address {
        country: non_blank(&coded_value(message, BIRTH_COUNTRY_CODE).display),
        text: non_blank(&coded_value(message, BIRTH_COUNTRY_OTHER_CODE).display),
        ..Address::default()
    };

    (!address.is_empty())
        .then(|| Extension::with_value(BIRTH_PLACE_URL, ExtensionValue::Address(address)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use casenote_core::{
        ContactPoint, ConversionConfig, FhirDate, HumanName, SequentialIdSource,
    };
    use serde_json::json;

    const PID: &str = "MSH|^~\\&|LAB\r\
PID|1||PAT1^^^HOSP||Doe^Jane||19900101|F||2106-3^White^CDCREC~2054-5^Black or African American^CDCREC|123 Main St^^Atlanta^GA^30303^USA^^^13121|||||||||||2186-5^Not Hispanic or Latino^CDCREC|||||||20230615143000";

    fn assemble_with(text: &str, prefix: &str) -> Patient {
        let message = Message::parse(text).unwrap();
        let config = ConversionConfig::default();
        let ids = SequentialIdSource::new(prefix);
        let mut mapping = Mapping::new(&config, &ids);
        assemble(&mut mapping, &message).unwrap()
    }

    #[test]
    fn maps_demographics() {
        let patient = assemble_with(PID, "pat");

        assert_eq!(patient.id, "pat-1");
        assert_eq!(patient.identifier, vec![Identifier::with_value("pat-1")]);
        assert_eq!(patient.gender, Some(AdministrativeGender::Female));
        assert_eq!(patient.birth_date, Some(FhirDate::new(1990, 1, 1)));
        assert_eq!(
            patient.deceased_date_time.map(|value| value.to_string()),
            Some("2023-06-15T14:30:00".to_string())
        );

        let address = &patient.address[0];
        assert_eq!(address.city.as_deref(), Some("Atlanta"));
        assert_eq!(address.state.as_deref(), Some("GA"));
        assert_eq!(address.postal_code.as_deref(), Some("30303"));
        assert_eq!(address.country.as_deref(), Some("USA"));
        assert_eq!(address.district.as_deref(), Some("13121"));
        assert!(address.line.is_empty());
    }

    #[test]
    fn race_and_ethnicity_repetitions() {
        let patient = assemble_with(PID, "pat");
        let extensions = serde_json::to_value(&patient.extension).unwrap();

        assert_eq!(
            extensions,
            json!([
                {
                    "url": RACE_URL,
                    "extension": [
                        {
                            "url": "ombCategory",
                            "valueCoding": {
                                "system": OMB_SYSTEM,
                                "code": "2106-3",
                                "display": "White"
                            }
                        },
                        {
                            "url": "ombCategory",
                            "valueCoding": {
                                "system": OMB_SYSTEM,
                                "code": "2054-5",
                                "display": "Black or African American"
                            }
                        }
                    ]
                },
                {
                    "url": ETHNICITY_URL,
                    "extension": [
                        {
                            "url": "ombCategory",
                            "valueCoding": {
                                "system": OMB_SYSTEM,
                                "code": "2186-5",
                                "display": "Not Hispanic or Latino"
                            }
                        }
                    ]
                }
            ])
        );
    }

    #[test]
    fn sex_codes() {
        assert_eq!(administrative_gender("M"), Some(AdministrativeGender::Male));
        assert_eq!(administrative_gender("F"), Some(AdministrativeGender::Female));
        assert_eq!(administrative_gender("U"), Some(AdministrativeGender::Unknown));
        assert_eq!(administrative_gender("O"), Some(AdministrativeGender::Other));
        assert_eq!(administrative_gender("X"), None);
        assert_eq!(administrative_gender(""), None);
    }

    #[test]
    fn sparse_pid_leaves_slots_empty() {
        let patient = assemble_with("PID|1", "pat");
        assert!(patient.address.is_empty());
        assert!(patient.extension.is_empty());
        assert_eq!(patient.gender, None);
        assert_eq!(patient.birth_date, None);
        assert_eq!(patient.deceased_date_time, None);
    }

    #[test]
    fn missing_pid_is_fatal() {
        let message = Message::parse("MSH|^~\\&|LAB").unwrap();
        let config = ConversionConfig::default();
        let ids = SequentialIdSource::new("pat");
        let mut mapping = Mapping::new(&config, &ids);

        let err = assemble(&mut mapping, &message).unwrap_err();
        assert!(matches!(err, ConversionError::MissingSegment { ref segment } if segment == "PID"));
    }

    #[test]
    fn redaction_clears_direct_identifiers() {
        let mut patient = Patient {
            id: "p".to_string(),
            name: vec![HumanName {
                family: Some("Doe".to_string()),
                ..HumanName::default()
            }],
            telecom: vec![ContactPoint {
                system: Some("phone".to_string()),
                value: Some("555-0100".to_string()),
            }],
            ..Patient::default()
        };

        redact_patient(&mut patient);
        let once = patient.clone();
        redact_patient(&mut patient);

        assert_eq!(once, patient);
        assert!(patient.name.is_empty());
        assert!(patient.telecom.is_empty());
        assert!(patient.contact.is_empty());
        assert!(patient.photo.is_empty());
    }

    #[test]
    fn birth_place_from_observations() {
        let message = Message::parse(
            "OBX|1|CWE|78746-5^Country of birth^LN||MEX^Mexico^ISO3166_1\r\
             OBX|2|ST|21842-0^Birthplace other^LN||Oaxaca",
        )
        .unwrap();

        let extension = birth_place(&message).unwrap();
        assert_eq!(
            serde_json::to_value(extension).unwrap(),
            json!({
                "url": BIRTH_PLACE_URL,
                "valueAddress": { "text": "Oaxaca", "country": "Mexico" }
            })
        );

        assert!(birth_place(&Message::parse("PID|1").unwrap()).is_none());
    }
}
