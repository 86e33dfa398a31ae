//! JSON serde for the v1.0 codebook table format.
//!
//! The table format uses camelCase field names. Entry rows keep the
//! `Gamma` / `Phase` keys of the precomputed tables shipped with the
//! boards; `Magnitude` is optional and recomputed when absent.

use serde::{Deserialize, Serialize};

use crate::codebook::{Codebook, PhaseStateSet, SincWeighting};
use crate::error::CoreError;

pub const CURRENT_VERSION: &str = "1.0";

// --- Wire format types ---

#[derive(Serialize, Deserialize, Debug)]
pub struct WireTable {
    #[serde(default = "default_version")]
    pub version: String,
    #[serde(rename = "elementCount")]
    pub element_count: usize,
    #[serde(rename = "phaseStates")]
    pub phase_states: Vec<f64>,
    #[serde(default)]
    pub threshold: f64,
    #[serde(default)]
    pub weighting: SincWeighting,
    pub entries: Vec<WireEntry>,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct WireEntry {
    /// Per-element phase states; accepts both "Gamma" and "states".
    #[serde(rename = "Gamma", alias = "states")]
    pub gamma: Vec<f64>,
    #[serde(rename = "Phase", alias = "phase")]
    pub phase: f64,
    #[serde(
        rename = "Magnitude",
        alias = "magnitude",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub magnitude: Option<f64>,
}

fn default_version() -> String {
    CURRENT_VERSION.to_string()
}

// --- Conversion: Wire → Domain ---

impl WireTable {
    /// Validate and convert to a codebook sourced from a table.
    pub fn into_codebook(self) -> Result<Codebook, CoreError> {
        let phase_states = PhaseStateSet::new(self.phase_states)?;
        let rows = self
            .entries
            .into_iter()
            .map(|e| (e.gamma, e.phase, e.magnitude))
            .collect();
        Codebook::from_table(
            phase_states,
            self.element_count,
            self.threshold,
            self.weighting,
            rows,
        )
    }

    /// Snapshot a codebook (generated or imported) as a table.
    pub fn from_codebook(codebook: &Codebook) -> Self {
        WireTable {
            version: CURRENT_VERSION.to_string(),
            element_count: codebook.element_count(),
            phase_states: codebook.phase_states().as_slice().to_vec(),
            threshold: codebook.threshold(),
            weighting: codebook.weighting(),
            entries: codebook
                .entries()
                .iter()
                .map(|e| WireEntry {
                    gamma: e.states.clone(),
                    phase: e.phase,
                    magnitude: Some(e.magnitude),
                })
                .collect(),
        }
    }
}

/// Serialize a codebook to the v1.0 table JSON.
pub fn export_table(codebook: &Codebook) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(&WireTable::from_codebook(codebook))
}

/// Parse and validate a v1.0 table JSON string.
pub fn import_table(json: &str) -> Result<Codebook, CoreError> {
    let wire: WireTable = serde_json::from_str(json)
        .map_err(|e| CoreError::InvalidConfiguration(format!("invalid codebook table: {e}")))?;
    wire.into_codebook()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codebook::{CodebookSource, build_codebook};

    const LEGACY_TABLE: &str = r#"{
        "elementCount": 4,
        "phaseStates": [0, 180],
        "threshold": 0.6,
        "entries": [
            {"Gamma": [180, 180, 0, 0], "Phase": 90.0},
            {"Gamma": [0, 180, 180, 0], "Phase": 0.0},
            {"Gamma": [0, 0, 0, 0], "Phase": 0.0}
        ]
    }"#;

    #[test]
    fn test_import_legacy_keys() {
        let cb = import_table(LEGACY_TABLE).unwrap();
        assert_eq!(cb.source(), CodebookSource::Table);
        // zero-gain row is filtered after recomputing its magnitude
        assert_eq!(cb.len(), 2);
        assert_eq!(cb.entries()[0].states, vec![180.0, 180.0, 0.0, 0.0]);
        assert!(cb.entries().iter().all(|e| e.magnitude > 0.6));
    }

    #[test]
    fn test_export_then_import_preserves_entries() {
        let states = PhaseStateSet::new(vec![0.0, 180.0]).unwrap();
        let built = build_codebook(&states, 4, 0.6).unwrap();
        let json = export_table(&built).unwrap();
        assert!(json.contains("\"Gamma\""));
        assert!(json.contains("\"elementCount\": 4"));

        let imported = import_table(&json).unwrap();
        assert_eq!(imported.len(), built.len());
        for (a, b) in imported.entries().iter().zip(built.entries()) {
            assert_eq!(a.states, b.states);
            assert_eq!(a.phase, b.phase);
        }
    }

    #[test]
    fn test_invalid_json_is_configuration_error() {
        assert!(matches!(
            import_table("{not json"),
            Err(CoreError::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn test_row_length_mismatch_rejected() {
        let json = r#"{"elementCount": 4, "phaseStates": [0, 180],
            "entries": [{"Gamma": [0, 180], "Phase": 10.0}]}"#;
        assert!(import_table(json).is_err());
    }

    #[test]
    fn test_empty_phase_states_rejected() {
        let json = r#"{"elementCount": 4, "phaseStates": [], "entries": []}"#;
        assert!(import_table(json).is_err());
    }
}
