//! Performing practitioner (OBX-25) and organization (OBX-23/24) of an observation.

use casenote_core::{Address, HumanName, Identifier, Organization, Practitioner};
use casenote_hl7::Segment;

use crate::fields::non_blank;
use crate::Mapping;

const ORGANIZATION_FIELD: usize = 23;
const ORGANIZATION_ADDRESS_FIELD: usize = 24;
const PRACTITIONER_FIELD: usize = 25;

pub(crate) fn practitioner(mapping: &Mapping<'_>, segment: &Segment) -> Option<Practitioner> {
    let field = segment.field(PRACTITIONER_FIELD);
    if field.is_blank() {
        return None;
    }

    let identifier = Identifier {
        use_type: None,
        // Assigning authority universal id (XCN-9.2).
        system: non_blank(field.component(9).sub_component(2)),
        value: non_blank(field.component(1).value()),
    };

    let family = non_blank(field.component(2).value());
    let given = non_blank(field.component(3).value());
    let suffix = non_blank(field.component(5).value());
    let prefix = non_blank(field.component(6).value());

    let text = [&prefix, &given, &family, &suffix]
        .into_iter()
        .flatten()
        .map(|part| part.trim())
        .collect::<Vec<_>>()
        .join(" ");

    let name = HumanName {
        text: non_blank(&text),
        family,
        given: given.into_iter().collect(),
        prefix: prefix.into_iter().collect(),
        suffix: suffix.into_iter().collect(),
    };

    Some(Practitioner {
        id: mapping.next_id(),
        identifier: if identifier.value.is_some() || identifier.system.is_some() {
            vec![identifier]
        } else {
            Vec::new()
        },
        name: if name == HumanName::default() {
            Vec::new()
        } else {
            vec![name]
        },
    })
}

pub(crate) fn organization(mapping: &Mapping<'_>, segment: &Segment) -> Option<Organization> {
    let field = segment.field(ORGANIZATION_FIELD);
    if field.is_blank() {
        return None;
    }

    let address_field = segment.field(ORGANIZATION_ADDRESS_FIELD);
    let address = Address {
        line: address_field
            .component(1)
            .sub_components()
            .iter()
            .filter_map(|line| non_blank(line))
            .collect(),
        city: non_blank(address_field.component(3).value()),
        district: non_blank(address_field.component(4).value()),
        postal_code: non_blank(address_field.component(5).value()),
        ..Address::default()
    };

    Some(Organization {
        id: mapping.next_id(),
        name: non_blank(field.component(1).value()),
        address: if address.is_empty() {
            Vec::new()
        } else {
            vec![address]
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use casenote_core::{ConversionConfig, IdSource, SequentialIdSource};
    use casenote_hl7::Message;

    fn segment(line: &str) -> Segment {
        Message::parse(line).unwrap().segments()[0].clone()
    }

    fn pad(fields: usize) -> String {
        "|".repeat(fields)
    }

    #[test]
    fn practitioner_name_and_identifier() {
        let line = format!(
            "OBX|1|ST|11111-1^R^LN||x{}1234^Smith^John^^Jr^Dr^^^NPI&2.16.840.1.113883.4.6&ISO",
            pad(20)
        );
        let config = ConversionConfig::default();
        let ids = SequentialIdSource::new("pr");
        let mapping = Mapping::new(&config, &ids);

        let practitioner = practitioner(&mapping, &segment(&line)).unwrap();
        assert_eq!(practitioner.id, "pr-1");
        assert_eq!(
            practitioner.identifier,
            vec![Identifier {
                use_type: None,
                system: Some("2.16.840.1.113883.4.6".to_string()),
                value: Some("1234".to_string()),
            }]
        );

        let name = &practitioner.name[0];
        assert_eq!(name.text.as_deref(), Some("Dr John Smith Jr"));
        assert_eq!(name.family.as_deref(), Some("Smith"));
        assert_eq!(name.given, vec!["John".to_string()]);
        assert_eq!(name.prefix, vec!["Dr".to_string()]);
        assert_eq!(name.suffix, vec!["Jr".to_string()]);
    }

    #[test]
    fn partial_names_collapse_blanks() {
        let line = format!("OBX|1|ST|11111-1^R^LN||x{}^Smith^^^^Dr", pad(20));
        let config = ConversionConfig::default();
        let ids = SequentialIdSource::new("pr");
        let mapping = Mapping::new(&config, &ids);

        let practitioner = practitioner(&mapping, &segment(&line)).unwrap();
        assert!(practitioner.identifier.is_empty());
        assert_eq!(practitioner.name[0].text.as_deref(), Some("Dr Smith"));
        assert!(practitioner.name[0].given.is_empty());
    }

    #[test]
    fn organization_with_address() {
        let line = format!(
            "OBX|1|ST|11111-1^R^LN||x{}State Lab^L^123|1 Lab Way&Suite 2^^Atlanta^13121^30303",
            pad(18)
        );
        let config = ConversionConfig::default();
        let ids = SequentialIdSource::new("org");
        let mapping = Mapping::new(&config, &ids);

        let organization = organization(&mapping, &segment(&line)).unwrap();
        assert_eq!(organization.id, "org-1");
        assert_eq!(organization.name.as_deref(), Some("State Lab"));

        let address = &organization.address[0];
        assert_eq!(address.line, vec!["1 Lab Way".to_string(), "Suite 2".to_string()]);
        assert_eq!(address.city.as_deref(), Some("Atlanta"));
        assert_eq!(address.district.as_deref(), Some("13121"));
        assert_eq!(address.postal_code.as_deref(), Some("30303"));
    }

    #[test]
    fn blank_fields_produce_no_performers() {
        let config = ConversionConfig::default();
        let ids = SequentialIdSource::new("p");
        let mapping = Mapping::new(&config, &ids);
        let segment = segment("OBX|1|ST|11111-1^R^LN||x");

        assert!(practitioner(&mapping, &segment).is_none());
        assert!(organization(&mapping, &segment).is_none());
        // No id was consumed.
        assert_eq!(ids.next_id(), "p-1");
    }
}
