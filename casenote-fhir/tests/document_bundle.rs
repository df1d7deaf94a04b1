use std::fs;

use casenote_core::{
    BundleType, ConversionConfig, ConversionError, ConversionWarning, Resource, SequentialIdSource,
};
use casenote_fhir::{convert_case_str, parse_message, Converter};
use serde_json::json;

fn fixture_path(name: &str) -> String {
    format!("{}/tests/data/{name}", env!("CARGO_MANIFEST_DIR"))
}

fn converter() -> Converter {
    Converter::with_id_source(ConversionConfig::default(), SequentialIdSource::new("doc"))
}

fn document() -> casenote_core::Converted<casenote_core::Bundle> {
    let raw = fs::read_to_string(fixture_path("case_notification.hl7"))
        .expect("fixture message should be readable");
    let message = parse_message(&raw).expect("fixture should parse");
    converter()
        .convert_document(&message, "process-7")
        .expect("document conversion should succeed")
}

#[test]
fn bundle_layout() {
    let bundle = document().resource;

    assert_eq!(bundle.id, "process-7");
    assert_eq!(bundle.bundle_type, BundleType::Document);

    let types: Vec<&str> = bundle.resources().map(Resource::resource_type).collect();
    assert_eq!(types.len(), 22);
    assert_eq!(&types[..3], &["Composition", "Patient", "Condition"]);
    assert_eq!(
        &types[18..],
        &["Observation", "Practitioner", "Organization", "Specimen"]
    );
    assert_eq!(
        types.iter().filter(|kind| **kind == "Observation").count(),
        16
    );
}

#[test]
fn lossy_values_are_reported() {
    let warnings = document().warnings;

    assert_eq!(
        warnings,
        vec![
            ConversionWarning::LossyNumeric {
                code: "94500-6".to_string(),
                raw: ">1000".to_string(),
            },
            ConversionWarning::UnmappedDataType {
                code: "11502-2".to_string(),
                tag: "ED".to_string(),
            },
        ]
    );
}

#[test]
fn performed_observation_serializes_with_references() {
    let bundle = document().resource;
    let observation = bundle
        .resources()
        .find(|resource| resource.id() == Some("doc-18"))
        .expect("lab observation should be present");

    assert_eq!(
        serde_json::to_value(observation).unwrap(),
        json!({
            "resourceType": "Observation",
            "id": "doc-18",
            "identifier": [{ "value": "94309-2" }],
            "status": "final",
            "code": {
                "coding": [{ "system": "LN", "code": "94309-2", "display": "SARS-CoV-2 RNA NAA" }]
            },
            "subject": { "reference": "Patient/doc-1" },
            "effectiveDateTime": "2023-06-12T00:00:00",
            "performer": [
                { "reference": "Practitioner/doc-19" },
                { "reference": "Organization/doc-20" }
            ],
            "valueCodeableConcept": {
                "coding": [{
                    "extension": [
                        { "url": "urn:casenote:extension:v2-coding-system", "valueString": "SCT" }
                    ],
                    "code": "260373001",
                    "display": "Detected"
                }]
            },
            "interpretation": [
                { "coding": [{ "system": "HL70078", "code": "A", "display": "Abnormal" }] }
            ]
        })
    );
}

#[test]
fn condition_and_specimen_are_linked_to_the_patient() {
    let bundle = document().resource;
    let resources: Vec<&Resource> = bundle.resources().collect();

    let Resource::Condition(condition) = resources[2] else {
        panic!("third entry should be the condition");
    };
    assert_eq!(condition.subject.reference, "Patient/doc-1");
    assert_eq!(condition.code.text.as_deref(), Some("COVID-19"));
    assert_eq!(
        condition
            .onset_period
            .and_then(|period| period.start)
            .map(|start| start.to_string()),
        Some("2023-06-01T00:00:00".to_string())
    );

    let Resource::Specimen(specimen) = resources[21] else {
        panic!("last entry should be the specimen");
    };
    let collection = specimen.collection.as_ref().unwrap();
    assert_eq!(collection.quantity.as_ref().unwrap().unit.as_deref(), Some("milliliter"));
    assert_eq!(
        specimen.received_time.map(|value| value.to_string()),
        Some("2023-06-13T09:15:00".to_string())
    );
}

#[test]
fn patient_carries_birth_place_but_no_direct_identifiers() {
    let bundle = document().resource;
    let Some(Resource::Patient(patient)) = bundle.resources().nth(1) else {
        panic!("second entry should be the patient");
    };

    let birth_place = patient
        .extension
        .iter()
        .find(|extension| extension.url.ends_with("patient-birthPlace"))
        .expect("birth place extension");
    assert_eq!(
        serde_json::to_value(birth_place).unwrap()["valueAddress"],
        json!({ "country": "United States" })
    );
    assert!(patient.name.is_empty());
    assert!(patient.telecom.is_empty());
}

#[test]
fn batches_are_rejected() {
    let err = parse_message("BHS|^~\\&|LAB\rMSH|^~\\&|LAB\rBTS|1").unwrap_err();
    assert!(matches!(err, ConversionError::UnsupportedFormat(_)));
}

#[test]
fn file_envelopes_are_rejected() {
    let raw = "FHS|^~\\&|LAB\r\
               BHS|^~\\&|LAB\r\
               MSH|^~\\&|LAB|||20230101||ORU^R01|1|P|2.5.1\r\
               PID|1||||||19900101|M\r\
               OBR|1||CASE-A\r\
               BTS|1\r\
               FTS|1";
    let err = parse_message(raw).unwrap_err();
    assert!(matches!(err, ConversionError::UnsupportedFormat(_)));
}

#[test]
fn concatenated_messages_are_not_merged_into_one_case() {
    let raw = "MSH|^~\\&|LAB|||20230101||ORU^R01|1|P|2.5.1\r\
               PID|1||||||19900101|M\r\
               OBR|1||CASE-A\r\
               MSH|^~\\&|LAB|||20230102||ORU^R01|2|P|2.5.1\r\
               PID|1||||||19850505|F\r\
               OBR|1||CASE-B\r\
               OBX|1|ST|77981-9^Outbreak^LN||Harbor picnic";

    let err = convert_case_str(raw, &converter()).unwrap_err();
    assert!(matches!(err, ConversionError::UnsupportedFormat(_)));
}
