use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::ObservationStatus;

pub const SNOMED_CT_URI: &str = "http://snomed.info/sct";

/// Static lookup tables consulted while mapping.
///
/// Every table is plain data so a deployment (or a test) can override it; missing
/// keys in a serialized configuration fall back to the defaults below.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ConversionConfig {
    /// Abbreviated coding-system identifiers rewritten to canonical URIs.
    pub code_systems: BTreeMap<String, String>,
    /// Single-letter result status codes (OBX-11).
    pub observation_status: BTreeMap<String, ObservationStatus>,
    /// Observation codes that feed other resources and are not emitted as
    /// standalone observations in a document bundle.
    pub excluded_observation_codes: Vec<String>,
}

impl Default for ConversionConfig {
    fn default() -> Self {
        let code_systems = BTreeMap::from([("SCT".to_string(), SNOMED_CT_URI.to_string())]);

        let observation_status = BTreeMap::from([
            ("A".to_string(), ObservationStatus::Amended),
            ("C".to_string(), ObservationStatus::Corrected),
            ("F".to_string(), ObservationStatus::Final),
            ("P".to_string(), ObservationStatus::Preliminary),
            ("W".to_string(), ObservationStatus::EnteredInError),
        ]);

        Self {
            code_systems,
            observation_status,
            excluded_observation_codes: vec!["78746-5".to_string(), "21842-0".to_string()],
        }
    }
}

impl ConversionConfig {
    /// Canonical URI for a coding-system abbreviation; unknown systems pass through.
    pub fn canonical_system<'a>(&'a self, system: &'a str) -> &'a str {
        self.code_systems
            .get(system)
            .map_or(system, String::as_str)
    }

    /// Status for a result status code; anything unrecognised is `Unknown`.
    pub fn observation_status(&self, code: &str) -> ObservationStatus {
        self.observation_status
            .get(code.trim())
            .copied()
            .unwrap_or(ObservationStatus::Unknown)
    }

    pub fn is_excluded_observation(&self, code: &str) -> bool {
        self.excluded_observation_codes
            .iter()
            .any(|excluded| excluded == code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonicalizes_known_systems_only() {
        let config = ConversionConfig::default();
        assert_eq!(config.canonical_system("SCT"), SNOMED_CT_URI);
        assert_eq!(config.canonical_system("LN"), "LN");
        assert_eq!(config.canonical_system(""), "");
    }

    #[test]
    fn unknown_status_codes_map_to_unknown() {
        let config = ConversionConfig::default();
        assert_eq!(config.observation_status("F"), ObservationStatus::Final);
        assert_eq!(config.observation_status("W"), ObservationStatus::EnteredInError);
        assert_eq!(config.observation_status("Z"), ObservationStatus::Unknown);
        assert_eq!(config.observation_status(""), ObservationStatus::Unknown);
    }

    #[test]
    fn partial_config_keeps_defaults() {
        let config: ConversionConfig =
            serde_json::from_str(r#"{ "code_systems": { "LN": "http://loinc.org" } }"#).unwrap();

        assert_eq!(config.canonical_system("LN"), "http://loinc.org");
        assert_eq!(config.canonical_system("SCT"), "SCT");
        assert_eq!(config.observation_status("C"), ObservationStatus::Corrected);
        assert!(config.is_excluded_observation("78746-5"));
    }

    #[test]
    fn tables_can_be_overridden() {
        let mut config = ConversionConfig::default();
        config
            .observation_status
            .insert("R".to_string(), ObservationStatus::Preliminary);
        config.excluded_observation_codes.clear();

        assert_eq!(config.observation_status("R"), ObservationStatus::Preliminary);
        assert!(!config.is_excluded_observation("78746-5"));
    }
}
