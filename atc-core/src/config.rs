//! Configuration for the world model.
//!
//! A single JSON file describes the airport (runways, taxiway nodes and
//! edges) and, optionally, the conflict-detection rules. Both are plain
//! values built once and passed into the topology and detector.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::topology::NodeType;
use crate::types::{AtcError, Result};

// ---------------------------------------------------------------------------
// Conflict rules
// ---------------------------------------------------------------------------

/// Separation standards and prediction settings for the conflict detector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConflictRule {
    /// Standard radar separation (nm).
    pub horizontal_separation_nm: f64,
    /// Below this, a separation violation is critical (nm).
    pub critical_separation_nm: f64,
    pub vertical_separation_ft: f64,
    /// When set, a pair with known altitudes at least
    /// `vertical_separation_ft` apart is not a horizontal violation.
    pub enforce_vertical_separation: bool,

    /// How long a runway must stay clear after a landing (seconds).
    pub runway_clear_time_seconds: f64,

    // Wake turbulence spacing behind a HEAVY leader (nm)
    pub wake_separation_heavy_heavy: f64,
    pub wake_separation_heavy_medium: f64,
    pub wake_separation_heavy_light: f64,

    pub prediction_horizon_seconds: f64,
    pub prediction_steps: u32,
}

impl Default for ConflictRule {
    fn default() -> Self {
        ConflictRule {
            horizontal_separation_nm: 3.0,
            critical_separation_nm: 2.0,
            vertical_separation_ft: 1000.0,
            enforce_vertical_separation: false,
            runway_clear_time_seconds: 60.0,
            wake_separation_heavy_heavy: 4.0,
            wake_separation_heavy_medium: 5.0,
            wake_separation_heavy_light: 6.0,
            prediction_horizon_seconds: 120.0,
            prediction_steps: 12,
        }
    }
}

impl ConflictRule {
    /// Seconds between prediction steps.
    pub fn prediction_interval(&self) -> f64 {
        if self.prediction_steps == 0 {
            return 0.0;
        }
        self.prediction_horizon_seconds / self.prediction_steps as f64
    }
}

// ---------------------------------------------------------------------------
// Airport layout
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AirportConfig {
    pub airport_code: String,
    #[serde(default)]
    pub runways: Vec<RunwayConfig>,
    #[serde(default)]
    pub nodes: Vec<NodeConfig>,
    #[serde(default)]
    pub edges: Vec<EdgeConfig>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunwayConfig {
    pub name: String,
    pub magnetic_heading: f64,
    #[serde(default)]
    pub length_feet: f64,
    #[serde(default = "default_runway_width")]
    pub width_feet: f64,
    /// `[lat, lon]` of the landing threshold.
    pub threshold: [f64; 2],
    #[serde(default)]
    pub threshold_elevation: f64,
    #[serde(default)]
    pub ils_available: bool,
}

fn default_runway_width() -> f64 {
    150.0
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeConfig {
    pub id: String,
    /// `[lat, lon]`
    pub position: [f64; 2],
    #[serde(rename = "type")]
    pub node_type: NodeType,
    #[serde(default)]
    pub runways_accessible: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EdgeConfig {
    pub from: String,
    pub to: String,
    /// Metres.
    pub distance: f64,
    pub taxiway: String,
    #[serde(default = "default_bidirectional")]
    pub bidirectional: bool,
}

fn default_bidirectional() -> bool {
    true
}

// ---------------------------------------------------------------------------
// Full model configuration
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelConfig {
    pub airport: AirportConfig,
    #[serde(default)]
    pub rules: ConflictRule,
}

/// Parse configuration from JSON text.
pub fn parse_config(text: &str) -> Result<ModelConfig> {
    let config: ModelConfig = serde_json::from_str(text)?;
    check_rules(&config.rules)?;
    Ok(config)
}

/// Load configuration from a JSON file.
pub fn load_config(path: impl AsRef<Path>) -> Result<ModelConfig> {
    let text = std::fs::read_to_string(path.as_ref())?;
    parse_config(&text)
}

fn check_rules(rules: &ConflictRule) -> Result<()> {
    let fields = [
        ("horizontal_separation_nm", rules.horizontal_separation_nm),
        ("critical_separation_nm", rules.critical_separation_nm),
        ("vertical_separation_ft", rules.vertical_separation_ft),
        ("runway_clear_time_seconds", rules.runway_clear_time_seconds),
        ("wake_separation_heavy_heavy", rules.wake_separation_heavy_heavy),
        ("wake_separation_heavy_medium", rules.wake_separation_heavy_medium),
        ("wake_separation_heavy_light", rules.wake_separation_heavy_light),
        ("prediction_horizon_seconds", rules.prediction_horizon_seconds),
    ];
    for (name, value) in fields {
        if !value.is_finite() {
            return Err(AtcError::Config(format!("{name} must be a finite number")));
        }
    }
    if rules.horizontal_separation_nm <= 0.0 {
        return Err(AtcError::Config(
            "horizontal_separation_nm must be positive".into(),
        ));
    }
    if rules.critical_separation_nm > rules.horizontal_separation_nm {
        return Err(AtcError::Config(format!(
            "critical_separation_nm ({}) exceeds horizontal_separation_nm ({})",
            rules.critical_separation_nm, rules.horizontal_separation_nm
        )));
    }
    if rules.prediction_horizon_seconds < 0.0 {
        return Err(AtcError::Config(
            "prediction_horizon_seconds must not be negative".into(),
        ));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const SAMPLE: &str = r#"{
        "airport": {
            "airport_code": "KJFK",
            "runways": [
                {"name": "04L", "magnetic_heading": 44, "length_feet": 12079,
                 "threshold": [40.6222, -73.7856]}
            ],
            "nodes": [
                {"id": "A1", "position": [40.6250, -73.7840], "type": "intersection"},
                {"id": "HS04", "position": [40.6230, -73.7850], "type": "runway_exit",
                 "runways_accessible": ["04L"]}
            ],
            "edges": [
                {"from": "04L_threshold", "to": "HS04", "distance": 120, "taxiway": "A"},
                {"from": "HS04", "to": "A1", "distance": 300, "taxiway": "A",
                 "bidirectional": false}
            ]
        },
        "rules": {"horizontal_separation_nm": 5.0}
    }"#;

    #[test]
    fn test_default_rules() {
        let rules = ConflictRule::default();
        assert_eq!(rules.horizontal_separation_nm, 3.0);
        assert_eq!(rules.vertical_separation_ft, 1000.0);
        assert_eq!(rules.prediction_steps, 12);
        assert_eq!(rules.prediction_interval(), 10.0);
        assert!(!rules.enforce_vertical_separation);
    }

    #[test]
    fn test_parse_config() {
        let config = parse_config(SAMPLE).unwrap();
        assert_eq!(config.airport.airport_code, "KJFK");
        assert_eq!(config.airport.runways[0].width_feet, 150.0);
        assert_eq!(config.airport.nodes[1].node_type, NodeType::RunwayExit);
        assert!(config.airport.edges[0].bidirectional);
        assert!(!config.airport.edges[1].bidirectional);
        // Partial rules fall back to defaults
        assert_eq!(config.rules.horizontal_separation_nm, 5.0);
        assert_eq!(config.rules.wake_separation_heavy_light, 6.0);
    }

    #[test]
    fn test_parse_config_rejects_bad_rules() {
        let text = r#"{"airport": {"airport_code": "X"}, "rules": {"horizontal_separation_nm": 0}}"#;
        assert!(matches!(parse_config(text), Err(AtcError::Config(_))));
    }

    #[test]
    fn test_parse_config_rejects_inverted_thresholds() {
        let text = r#"{"airport": {"airport_code": "X"},
                       "rules": {"horizontal_separation_nm": 3, "critical_separation_nm": 5}}"#;
        assert!(matches!(parse_config(text), Err(AtcError::Config(_))));
    }

    #[test]
    fn test_check_rules_rejects_non_finite() {
        let rules = ConflictRule {
            horizontal_separation_nm: f64::NAN,
            ..Default::default()
        };
        assert!(matches!(check_rules(&rules), Err(AtcError::Config(_))));

        let rules = ConflictRule {
            prediction_horizon_seconds: f64::INFINITY,
            ..Default::default()
        };
        assert!(matches!(check_rules(&rules), Err(AtcError::Config(_))));
        assert!(check_rules(&ConflictRule::default()).is_ok());
    }

    #[test]
    fn test_parse_config_missing_rules() {
        let config = parse_config(r#"{"airport": {"airport_code": "EGLL"}}"#).unwrap();
        assert_eq!(config.rules, ConflictRule::default());
        assert!(config.airport.runways.is_empty());
    }

    #[test]
    fn test_load_config_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SAMPLE.as_bytes()).unwrap();
        let config = load_config(file.path()).unwrap();
        assert_eq!(config.airport.edges.len(), 2);
    }

    #[test]
    fn test_load_config_missing_file() {
        assert!(matches!(
            load_config("/nonexistent/airport.json"),
            Err(AtcError::Io(_))
        ));
    }

    #[test]
    fn test_zero_prediction_steps() {
        let rules = ConflictRule {
            prediction_steps: 0,
            ..Default::default()
        };
        assert_eq!(rules.prediction_interval(), 0.0);
    }
}
