//! Electronic initial case report: a FHIR document bundle.
//!
//! Entry order is fixed: the Composition, the Patient, the Condition, then each
//! Observation directly followed by its performers, and finally the Specimens.

use casenote_core::{
    Bundle, BundleEntry, BundleType, Composition, CompositionSection, CompositionStatus,
    ConversionError, Identifier, IdentifierUse, Reference, Resource,
};
use casenote_hl7::Message;

use crate::extract::{CODE_FIELD, OBSERVATION_SEGMENT};
use crate::{condition, observation, patient, specimen, Mapping};

const SPECIMEN_SEGMENT: &str = "SPM";
const DOCUMENT_TITLE: &str = "Public Health Case Report";
const OBSERVATION_SECTION_TITLE: &str = "Observations";

pub(crate) fn assemble(
    mapping: &mut Mapping<'_>,
    message: &Message,
    process_id: &str,
) -> Result<Bundle, ConversionError> {
    let mut patient = patient::assemble(mapping, message)?;
    patient.extension.extend(patient::birth_place(message));
    let subject = Reference::to("Patient", &patient.id);

    let condition = condition::assemble(mapping, message, &patient.id)?;

    let mut section = CompositionSection {
        title: Some(OBSERVATION_SECTION_TITLE.to_string()),
        entry: Vec::new(),
    };
    let mut observations = Vec::new();
    for segment in message.segments_named(OBSERVATION_SEGMENT) {
        let code = segment.field(CODE_FIELD).component(1).value();
        if mapping.config().is_excluded_observation(code) {
            tracing::debug!(code, "observation folded into another resource");
            continue;
        }
        let group = observation::assemble(mapping, segment, Some(&subject));
        section
            .entry
            .push(Reference::to("Observation", &group.observation.id));
        observations.extend(group.into_resources());
    }

    let specimens: Vec<Resource> = message
        .segments_named(SPECIMEN_SEGMENT)
        .map(|segment| Resource::Specimen(specimen::assemble(mapping, segment)))
        .collect();

    let composition = Composition {
        id: mapping.next_id(),
        identifier: Identifier::with_use(IdentifierUse::Official, process_id),
        status: CompositionStatus::Final,
        title: DOCUMENT_TITLE.to_string(),
        subject,
        section: if section.entry.is_empty() {
            Vec::new()
        } else {
            vec![section]
        },
    };

    let entry = [
        Resource::Composition(composition),
        Resource::Patient(patient),
        Resource::Condition(condition),
    ]
    .into_iter()
    .chain(observations)
    .chain(specimens)
    .map(|resource| BundleEntry { resource })
    .collect();

    Ok(Bundle {
        id: process_id.to_string(),
        bundle_type: BundleType::Document,
        entry,
    })
}
