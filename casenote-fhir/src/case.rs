use casenote_core::{Address, CaseReport, ConversionError, Identifier, IdentifierUse};
use casenote_hl7::Message;

use crate::fields::{concept_from_triplet, non_blank};
use crate::{coded_value, patient, repeating_group, required_segment, Mapping};

const ORDER_SEGMENT: &str = "OBR";
const FILLER_ORDER_FIELD: usize = 3;
const RESULT_STATUS_FIELD: usize = 25;

const LEGACY_CASE_ID: &str = "77997-5";
const EXPOSURE_STATE: &str = "77985-0";
const EXPOSURE_COUNTRY: &str = "77984-3";
const EXPOSURE_CITY: &str = "77986-8";
const EXPOSURE_DISTRICT: &str = "77987-6";
const TRANSMISSION_MODE: &str = "77989-2";
const OUTBREAK: &str = "77981-9";
const IMPORTED_INDICATOR: &str = "77982-7";
const IMPORTED_COUNTRY: &str = "INV153";
const IMPORTED_STATE: &str = "INV154";
const IMPORTED_CITY: &str = "INV155";
const IMPORTED_DISTRICT: &str = "INV156";
const MULTINATIONAL_CRITERIA: &str = "77988-4";

pub(crate) fn assemble(
    mapping: &mut Mapping<'_>,
    message: &Message,
) -> Result<CaseReport, ConversionError> {
    let obr = required_segment(message, ORDER_SEGMENT)?;
    let patient = patient::assemble(mapping, message)?;
    let config = mapping.config();

    let mut case = CaseReport {
        active: true,
        patient,
        ..CaseReport::default()
    };

    if let Some(case_id) = non_blank(obr.field(FILLER_ORDER_FIELD).component(1).value()) {
        case.identifier
            .push(Identifier::with_use(IdentifierUse::Official, case_id));
    }
    if let Some(legacy_id) = non_blank(&coded_value(message, LEGACY_CASE_ID).code) {
        case.identifier
            .push(Identifier::with_use(IdentifierUse::Old, legacy_id));
    }

    let exposure = repeating_group(
        message,
        &[EXPOSURE_STATE, EXPOSURE_COUNTRY, EXPOSURE_CITY, EXPOSURE_DISTRICT],
    )?;
    case.exposure_address = exposure
        .values()
        .map(|group| {
            tracing::debug!(group = group.key(), "exposure address group");
            Address {
                state: non_blank(group.code(EXPOSURE_STATE)),
                country: non_blank(group.code(EXPOSURE_COUNTRY)),
                city: non_blank(group.code(EXPOSURE_CITY)),
                district: non_blank(group.code(EXPOSURE_DISTRICT)),
                ..Address::default()
            }
        })
        .filter(|address| !address.is_empty())
        .collect();

    case.transmission_mode =
        concept_from_triplet(config, &coded_value(message, TRANSMISSION_MODE));
    case.outbreak = non_blank(&coded_value(message, OUTBREAK).code);
    case.result_status = non_blank(obr.field(RESULT_STATUS_FIELD).value());
    case.imported_indicator =
        concept_from_triplet(config, &coded_value(message, IMPORTED_INDICATOR));

    let imported = Address {
        country: non_blank(&coded_value(message, IMPORTED_COUNTRY).code),
        state: non_blank(&coded_value(message, IMPORTED_STATE).code),
        city: non_blank(&coded_value(message, IMPORTED_CITY).code),
        district: non_blank(&coded_value(message, IMPORTED_DISTRICT).code),
        ..Address::default()
    };
    if !imported.is_empty() {
        case.imported_address.push(imported);
    }

    case.multinational_reporting_criteria.extend(concept_from_triplet(
        config,
        &coded_value(message, MULTINATIONAL_CRITERIA),
    ));

    Ok(case)
}
