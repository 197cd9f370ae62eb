//! Shared types, error enum, and status/classification enums for atc-core.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// All errors produced by atc-core.
///
/// Only construction and configuration paths return these. Steady-state
/// queries express absence with `Option`, empty collections, or `bool`.
#[derive(Debug, Error)]
pub enum AtcError {
    #[error("unknown topology node: {0}")]
    UnknownNode(String),
    #[error("unknown runway: {0}")]
    UnknownRunway(String),
    #[error("duplicate runway: {0}")]
    DuplicateRunway(String),
    #[error("unrecognized {kind} keyword: {value}")]
    InvalidKeyword { kind: &'static str, value: String },
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("config error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, AtcError>;

/// Normalize a perception keyword: trim, upper-case, spaces/dashes to `_`.
fn keyword(s: &str) -> String {
    s.trim()
        .chars()
        .map(|c| match c {
            ' ' | '-' => '_',
            c => c.to_ascii_uppercase(),
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Aircraft status
// ---------------------------------------------------------------------------

/// Operational state of a tracked aircraft.
///
/// Arrivals move `EnRoute → Approaching → OnFinal → Landing → OnRunway →
/// Taxiing → AtGate`; departures mirror it with `AtGate → Taxiing →
/// OnRunway → TakingOff → Departing → Departed`. Transitions are driven by
/// perception or clearances and are not validated here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AircraftStatus {
    EnRoute,
    Approaching,
    OnFinal,
    Landing,
    Landed,
    OnRunway,
    Taxiing,
    AtGate,
    TakingOff,
    Departing,
    Departed,
    Unknown,
}

impl AircraftStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AircraftStatus::EnRoute => "EN_ROUTE",
            AircraftStatus::Approaching => "APPROACHING",
            AircraftStatus::OnFinal => "ON_FINAL",
            AircraftStatus::Landing => "LANDING",
            AircraftStatus::Landed => "LANDED",
            AircraftStatus::OnRunway => "ON_RUNWAY",
            AircraftStatus::Taxiing => "TAXIING",
            AircraftStatus::AtGate => "AT_GATE",
            AircraftStatus::TakingOff => "TAKING_OFF",
            AircraftStatus::Departing => "DEPARTING",
            AircraftStatus::Departed => "DEPARTED",
            AircraftStatus::Unknown => "UNKNOWN",
        }
    }

    /// Ground and runway states. Everything else, including `Unknown`,
    /// is checked for airborne separation.
    pub fn is_ground(&self) -> bool {
        matches!(
            self,
            AircraftStatus::Landing
                | AircraftStatus::Landed
                | AircraftStatus::OnRunway
                | AircraftStatus::Taxiing
                | AircraftStatus::AtGate
                | AircraftStatus::TakingOff
        )
    }

    pub fn is_airborne(&self) -> bool {
        !self.is_ground()
    }

    /// States in which an aircraft physically occupies its assigned runway.
    pub fn is_runway_occupying(&self) -> bool {
        matches!(
            self,
            AircraftStatus::TakingOff | AircraftStatus::Landing | AircraftStatus::OnRunway
        )
    }

    /// Statuses seen on first sighting that mark an arrival.
    pub fn is_approach(&self) -> bool {
        matches!(
            self,
            AircraftStatus::Approaching | AircraftStatus::OnFinal | AircraftStatus::Landing
        )
    }

    /// Terminal states that count as a completed operation on exit.
    pub fn is_completed(&self) -> bool {
        matches!(self, AircraftStatus::Landed | AircraftStatus::Departed)
    }
}

impl fmt::Display for AircraftStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AircraftStatus {
    type Err = AtcError;

    fn from_str(s: &str) -> Result<Self> {
        let status = match keyword(s).as_str() {
            "EN_ROUTE" | "ENROUTE" | "IN_FLIGHT" => AircraftStatus::EnRoute,
            "APPROACHING" | "ON_APPROACH" | "APPROACH" => AircraftStatus::Approaching,
            "ON_FINAL" | "FINAL" => AircraftStatus::OnFinal,
            "LANDING" => AircraftStatus::Landing,
            "LANDED" => AircraftStatus::Landed,
            "ON_RUNWAY" => AircraftStatus::OnRunway,
            "TAXIING" | "TAXI" => AircraftStatus::Taxiing,
            "AT_GATE" | "GATE" => AircraftStatus::AtGate,
            "TAKING_OFF" | "TAKEOFF" => AircraftStatus::TakingOff,
            "DEPARTING" => AircraftStatus::Departing,
            "DEPARTED" => AircraftStatus::Departed,
            "UNKNOWN" => AircraftStatus::Unknown,
            _ => {
                return Err(AtcError::InvalidKeyword {
                    kind: "status",
                    value: s.to_string(),
                })
            }
        };
        Ok(status)
    }
}

// ---------------------------------------------------------------------------
// Weight class
// ---------------------------------------------------------------------------

/// Wake-turbulence weight category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WeightClass {
    Light,
    #[default]
    Medium,
    Heavy,
    Super,
}

impl WeightClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            WeightClass::Light => "LIGHT",
            WeightClass::Medium => "MEDIUM",
            WeightClass::Heavy => "HEAVY",
            WeightClass::Super => "SUPER",
        }
    }
}

impl fmt::Display for WeightClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WeightClass {
    type Err = AtcError;

    fn from_str(s: &str) -> Result<Self> {
        match keyword(s).as_str() {
            "LIGHT" | "L" => Ok(WeightClass::Light),
            "MEDIUM" | "M" => Ok(WeightClass::Medium),
            "HEAVY" | "H" => Ok(WeightClass::Heavy),
            "SUPER" | "J" => Ok(WeightClass::Super),
            _ => Err(AtcError::InvalidKeyword {
                kind: "weight class",
                value: s.to_string(),
            }),
        }
    }
}

// ---------------------------------------------------------------------------
// Conflict classification
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictType {
    SeparationViolation,
    RunwayIncursion,
    WakeTurbulence,
    PredictedConflict,
}

impl ConflictType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConflictType::SeparationViolation => "separation_violation",
            ConflictType::RunwayIncursion => "runway_incursion",
            ConflictType::WakeTurbulence => "wake_turbulence",
            ConflictType::PredictedConflict => "predicted_conflict",
        }
    }
}

impl fmt::Display for ConflictType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Conflict severity. Ordered so that `Critical` is the greatest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Advisory,
    Warning,
    Critical,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Advisory => "advisory",
            Severity::Warning => "warning",
            Severity::Critical => "critical",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Operation type
// ---------------------------------------------------------------------------

/// Kind of operation inferred when an aircraft first appears.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationType {
    Arrival,
    Departure,
}

impl OperationType {
    pub fn from_initial_status(status: AircraftStatus) -> Self {
        if status.is_approach() {
            OperationType::Arrival
        } else {
            OperationType::Departure
        }
    }
}

impl fmt::Display for OperationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OperationType::Arrival => write!(f, "arrival"),
            OperationType::Departure => write!(f, "departure"),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_parse_aliases() {
        assert_eq!("IN_FLIGHT".parse::<AircraftStatus>().unwrap(), AircraftStatus::EnRoute);
        assert_eq!("on approach".parse::<AircraftStatus>().unwrap(), AircraftStatus::Approaching);
        assert_eq!("on_final".parse::<AircraftStatus>().unwrap(), AircraftStatus::OnFinal);
        assert_eq!("Taking-Off".parse::<AircraftStatus>().unwrap(), AircraftStatus::TakingOff);
        assert!("HOVERING".parse::<AircraftStatus>().is_err());
    }

    #[test]
    fn test_status_roundtrip_display() {
        for status in [
            AircraftStatus::EnRoute,
            AircraftStatus::OnRunway,
            AircraftStatus::AtGate,
            AircraftStatus::Departed,
        ] {
            assert_eq!(status.as_str().parse::<AircraftStatus>().unwrap(), status);
        }
    }

    #[test]
    fn test_ground_classification() {
        assert!(AircraftStatus::Taxiing.is_ground());
        assert!(AircraftStatus::OnRunway.is_ground());
        assert!(AircraftStatus::OnFinal.is_airborne());
        assert!(AircraftStatus::Unknown.is_airborne());
    }

    #[test]
    fn test_weight_class_parse() {
        assert_eq!("heavy".parse::<WeightClass>().unwrap(), WeightClass::Heavy);
        assert_eq!("J".parse::<WeightClass>().unwrap(), WeightClass::Super);
        assert!("jumbo".parse::<WeightClass>().is_err());
        assert_eq!(WeightClass::default(), WeightClass::Medium);
    }

    #[test]
    fn test_severity_order() {
        assert!(Severity::Critical > Severity::Warning);
        assert!(Severity::Warning > Severity::Advisory);
    }

    #[test]
    fn test_operation_type_inference() {
        assert_eq!(
            OperationType::from_initial_status(AircraftStatus::Approaching),
            OperationType::Arrival
        );
        assert_eq!(
            OperationType::from_initial_status(AircraftStatus::AtGate),
            OperationType::Departure
        );
    }

    #[test]
    fn test_conflict_type_serde_name() {
        let json = serde_json::to_string(&ConflictType::RunwayIncursion).unwrap();
        assert_eq!(json, "\"runway_incursion\"");
    }
}
