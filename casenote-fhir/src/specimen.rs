use casenote_core::{Identifier, Quantity, Specimen, SpecimenCollection};
use casenote_hl7::{Field, Segment};

use crate::fields::{concept_from_field, non_blank, parse_decimal};
use crate::Mapping;

const IDENTIFIER_FIELD: usize = 2;
const TYPE_FIELD: usize = 4;
const METHOD_FIELD: usize = 7;
const BODY_SITE_FIELD: usize = 8;
const QUANTITY_FIELD: usize = 12;
const COLLECTED_FIELD: usize = 17;
const RECEIVED_FIELD: usize = 18;

pub(crate) fn assemble(mapping: &mut Mapping<'_>, segment: &Segment) -> Specimen {
    let config = mapping.config();

    let collection = SpecimenCollection {
        collected_date_time: mapping.date_time(
            "SPM-17",
            segment.field(COLLECTED_FIELD).component(1).value(),
        ),
        quantity: quantity(mapping, segment.field(QUANTITY_FIELD)),
        method: concept_from_field(config, segment.field(METHOD_FIELD)),
        body_site: concept_from_field(config, segment.field(BODY_SITE_FIELD)),
    };

    Specimen {
        id: mapping.next_id(),
        identifier: non_blank(segment.field(IDENTIFIER_FIELD).value())
            .map(Identifier::with_value)
            .into_iter()
            .collect(),
        specimen_type: concept_from_field(config, segment.field(TYPE_FIELD)),
        received_time: mapping.date_time(
            "SPM-18",
            segment.field(RECEIVED_FIELD).component(1).value(),
        ),
        collection: (!collection.is_empty()).then_some(collection),
    }
}

/// `value^code&unit&system`; anything else is dropped.
fn quantity(mapping: &Mapping<'_>, field: &Field) -> Option<Quantity> {
    if field.component_count() < 2 {
        return None;
    }
    let value = parse_decimal(field.component(1).value())?;
    let units = field.component(2);
    if units.sub_components().len() < 3 {
        return None;
    }

    Some(Quantity {
        value: Some(value),
        code: non_blank(units.sub_component(1)),
        unit: non_blank(units.sub_component(2)),
        system: non_blank(mapping.config().canonical_system(units.sub_component(3))),
    })
}
