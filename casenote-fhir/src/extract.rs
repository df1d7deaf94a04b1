//! Lookups of coded observation values by their observation code.
//!
//! Case-level facts travel as OBX segments keyed by OBX-3.1. A segment matches a
//! sought code when OBX-3.1 equals it and OBX-5 is not blank; the value is then
//! decoded according to the OBX-2 datatype into a [`CodedTriplet`].

use std::collections::BTreeMap;

use casenote_core::ConversionError;
use casenote_hl7::{Message, Segment};
use serde::Serialize;

use crate::DataType;

pub(crate) const OBSERVATION_SEGMENT: &str = "OBX";
pub(crate) const DATATYPE_FIELD: usize = 2;
pub(crate) const CODE_FIELD: usize = 3;
pub(crate) const GROUP_FIELD: usize = 4;
pub(crate) const VALUE_FIELD: usize = 5;

/// A resolved coded value. All parts are empty when the code was not found.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CodedTriplet {
    /// The observation code that was looked up.
    pub source_key: String,
    pub code: String,
    pub display: String,
    pub system: String,
}

impl CodedTriplet {
    pub fn absent(source_key: &str) -> Self {
        Self {
            source_key: source_key.to_string(),
            ..Self::default()
        }
    }

    pub fn is_absent(&self) -> bool {
        self.code.trim().is_empty()
            && self.display.trim().is_empty()
            && self.system.trim().is_empty()
    }

    fn decode(segment: &Segment, source_key: &str) -> Self {
        let value = segment.field(VALUE_FIELD);
        let data_type = DataType::from_tag(segment.field(DATATYPE_FIELD).value());
        let (code, display, system) = match data_type {
            DataType::CodedElement | DataType::CodedWithExceptions => (
                value.component(1).value(),
                value.component(2).value(),
                value.component(3).value(),
            ),
            // The numeric token fills every slot.
            DataType::StructuredNumeric => {
                let number = value.component(2).value();
                (number, number, number)
            }
            _ => (value.value(), value.value(), value.value()),
        };

        Self {
            source_key: source_key.to_string(),
            code: code.to_string(),
            display: display.to_string(),
            system: system.to_string(),
        }
    }
}

fn matching_segments<'a>(
    message: &'a Message,
    code: &'a str,
) -> impl Iterator<Item = &'a Segment> + 'a {
    message
        .segments_named(OBSERVATION_SEGMENT)
        .filter(move |segment| {
            segment.field(CODE_FIELD).component(1).value() == code
                && !segment.field(VALUE_FIELD).is_blank()
        })
}

/// Resolve the first observation carrying `code`.
pub fn coded_value(message: &Message, code: &str) -> CodedTriplet {
    matching_segments(message, code).next().map_or_else(
        || CodedTriplet::absent(code),
        |segment| CodedTriplet::decode(segment, code),
    )
}

/// Triplets sharing one group key (OBX-4), aligned with the sought codes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TripletGroup {
    key: i64,
    triplets: Vec<CodedTriplet>,
    #[serde(skip)]
    matched: Vec<bool>,
}

impl TripletGroup {
    fn new(key: i64, codes: &[&str]) -> Self {
        Self {
            key,
            triplets: codes.iter().map(|code| CodedTriplet::absent(code)).collect(),
            matched: vec![false; codes.len()],
        }
    }

    pub fn key(&self) -> i64 {
        self.key
    }

    /// One triplet per sought code, in the order the codes were given.
    pub fn triplets(&self) -> &[CodedTriplet] {
        &self.triplets
    }

    /// The triplet for `code`; absent codes yield the empty triplet.
    pub fn get(&self, code: &str) -> Option<&CodedTriplet> {
        self.triplets.iter().find(|triplet| triplet.source_key == code)
    }

    /// Shorthand for the `code` part of [`TripletGroup::get`], empty when unknown.
    pub fn code(&self, code: &str) -> &str {
        self.get(code).map_or("", |triplet| triplet.code.as_str())
    }
}

/// Resolve several related codes, grouped by the integer set id in OBX-4.
///
/// Every group holds a triplet for every sought code; for each `(group, code)`
/// pair the first matching segment wins.
pub fn repeating_group(
    message: &Message,
    codes: &[&str],
) -> Result<BTreeMap<i64, TripletGroup>, ConversionError> {
    let mut groups: BTreeMap<i64, TripletGroup> = BTreeMap::new();

    for (index, code) in codes.iter().enumerate() {
        for segment in matching_segments(message, code) {
            let raw_key = segment.field(GROUP_FIELD).value();
            let key = raw_key
                .trim()
                .parse::<i64>()
                .map_err(|_| ConversionError::InvalidGroupKey {
                    code: code.to_string(),
                    key: raw_key.to_string(),
                })?;

            let group = groups
                .entry(key)
                .or_insert_with(|| TripletGroup::new(key, codes));
            if !group.matched[index] {
                group.triplets[index] = CodedTriplet::decode(segment, code);
                group.matched[index] = true;
            }
        }
    }

    Ok(groups)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message(text: &str) -> Message {
        Message::parse(text).unwrap()
    }

    #[test]
    fn coded_types_take_the_first_three_components() {
        let msg = message(
            "OBX|1|CWE|77989-2^Transmission mode^LN||409498004^Anthrax^SCT\n\
             OBX|2|CE|77982-7^Imported^LN||PHC244^Indigenous^2.16.840.1.114222.4.5.274",
        );

        let transmission = coded_value(&msg, "77989-2");
        assert_eq!(transmission.code, "409498004");
        assert_eq!(transmission.display, "Anthrax");
        assert_eq!(transmission.system, "SCT");
        assert_eq!(transmission.source_key, "77989-2");

        let imported = coded_value(&msg, "77982-7");
        assert_eq!(imported.display, "Indigenous");
        assert_eq!(imported.system, "2.16.840.1.114222.4.5.274");
    }

    #[test]
    fn structured_numeric_promotes_the_number() {
        let msg = message("OBX|1|SN|77998-3^Age^LN||^42");
        let triplet = coded_value(&msg, "77998-3");
        assert_eq!(triplet.code, "42");
        assert_eq!(triplet.display, "42");
        assert_eq!(triplet.system, "42");
    }

    #[test]
    fn other_types_repeat_the_raw_value() {
        let msg = message("OBX|1|ST|77997-5^Legacy case id^LN||CASE-0042^X");
        let triplet = coded_value(&msg, "77997-5");
        assert_eq!(triplet.code, "CASE-0042^X");
        assert_eq!(triplet.system, "CASE-0042^X");
    }

    #[test]
    fn blank_values_are_skipped_in_favour_of_later_segments() {
        let msg = message(
            "OBX|1|ST|77981-9^Outbreak^LN||\n\
             OBX|2|ST|77981-9^Outbreak^LN||Harbor picnic\n\
             OBX|3|ST|77981-9^Outbreak^LN||Second",
        );
        assert_eq!(coded_value(&msg, "77981-9").code, "Harbor picnic");
    }

    #[test]
    fn missing_code_yields_the_absent_triplet() {
        let msg = message("OBX|1|ST|77981-9^Outbreak^LN||Harbor picnic");
        let triplet = coded_value(&msg, "00000-0");
        assert_eq!(triplet, CodedTriplet::absent("00000-0"));
        assert!(triplet.is_absent());
    }

    #[test]
    fn groups_pair_triplets_by_set_id() {
        let msg = message(
            "OBX|1|CWE|77984-3^Country^LN|1|USA^United States^ISO3166\n\
             OBX|2|CWE|77985-0^State^LN|1|13^Georgia^FIPS5_2\n\
             OBX|3|CWE|77984-3^Country^LN|2|MEX^Mexico^ISO3166\n\
             OBX|4|CWE|77985-0^State^LN|2|JAL^Jalisco^ISO3166-2\n\
             OBX|5|ST|77986-8^City^LN|2|Guadalajara",
        );

        let groups = repeating_group(&msg, &["77984-3", "77985-0", "77986-8"]).unwrap();
        assert_eq!(groups.len(), 2);

        let first = &groups[&1];
        assert_eq!(first.key(), 1);
        assert_eq!(first.code("77984-3"), "USA");
        assert_eq!(first.code("77985-0"), "13");
        assert!(first.get("77986-8").unwrap().is_absent());

        let second = &groups[&2];
        assert_eq!(second.code("77984-3"), "MEX");
        assert_eq!(second.get("77985-0").unwrap().display, "Jalisco");
        assert_eq!(second.code("77986-8"), "Guadalajara");
        assert_eq!(second.triplets().len(), 3);
    }

    #[test]
    fn first_match_per_group_and_code_wins() {
        let msg = message(
            "OBX|1|ST|77986-8^City^LN|1|Atlanta\n\
             OBX|2|ST|77986-8^City^LN|1|Decatur",
        );
        let groups = repeating_group(&msg, &["77986-8"]).unwrap();
        assert_eq!(groups[&1].code("77986-8"), "Atlanta");
    }

    #[test]
    fn non_numeric_group_key_is_fatal() {
        let msg = message("OBX|1|ST|77986-8^City^LN|A|Atlanta");
        let err = repeating_group(&msg, &["77986-8"]).unwrap_err();
        assert!(matches!(
            err,
            ConversionError::InvalidGroupKey { ref code, ref key }
                if code == "77986-8" && key == "A"
        ));
    }

    #[test]
    fn signed_group_keys_are_accepted() {
        let msg = message(
            "OBX|1|ST|77986-8^City^LN|-1|Atlanta\n\
             OBX|2|ST|77986-8^City^LN| 3 |Decatur",
        );
        let groups = repeating_group(&msg, &["77986-8"]).unwrap();

        assert_eq!(groups.keys().copied().collect::<Vec<_>>(), vec![-1, 3]);
        assert_eq!(groups[&-1].key(), -1);
        assert_eq!(groups[&-1].code("77986-8"), "Atlanta");
    }

    #[test]
    fn no_matches_yield_no_groups() {
        let msg = message("OBX|1|ST|11111-1^Other^LN|1|x");
        assert!(repeating_group(&msg, &["77986-8"]).unwrap().is_empty());
    }
}
