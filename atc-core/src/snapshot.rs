//! Perception snapshot: the typed input record for one update cycle.
//!
//! Every field is optional because the perception layer reads numbers off a
//! screen and misses some of them most cycles. Values are validated once
//! here, in [`PerceptionSnapshot::observations`], so the world model never
//! does ad hoc key lookups or range checks.

use std::collections::HashMap;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::geo;
use crate::types::{AircraftStatus, WeightClass};

/// Surface wind: direction it blows from (degrees) and speed (knots).
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Wind {
    pub direction: f64,
    pub speed: f64,
}

/// Raw aircraft entry as reported by perception.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AircraftReport {
    pub callsign: String,
    /// `[lat, lon]`
    #[serde(default)]
    pub position: Option<[f64; 2]>,
    #[serde(default)]
    pub altitude: Option<f64>,
    #[serde(default)]
    pub heading: Option<f64>,
    #[serde(default)]
    pub speed: Option<f64>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default, rename = "type")]
    pub aircraft_type: Option<String>,
    #[serde(default)]
    pub weight_class: Option<String>,
    #[serde(default)]
    pub confidence: Option<f64>,
}

/// One perception cycle's worth of input.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PerceptionSnapshot {
    #[serde(default)]
    pub timestamp: Option<f64>,
    #[serde(default)]
    pub aircraft: Vec<AircraftReport>,
    #[serde(default)]
    pub wind: Option<Wind>,
    #[serde(default)]
    pub active_runways: Option<Vec<String>>,
}

/// A validated aircraft report. `None` means "keep the prior value".
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Observation {
    pub callsign: String,
    /// `(lat, lon)` in degrees.
    pub position: Option<(f64, f64)>,
    pub altitude_ft: Option<f64>,
    pub heading: Option<f64>,
    pub speed_knots: Option<f64>,
    pub status: Option<AircraftStatus>,
    pub aircraft_type: Option<String>,
    pub weight_class: Option<WeightClass>,
    pub confidence: Option<f64>,
}

impl PerceptionSnapshot {
    /// Snapshot timestamp, or the wall clock when perception omitted it.
    pub fn timestamp_or_now(&self) -> f64 {
        self.timestamp.filter(|t| t.is_finite()).unwrap_or_else(now)
    }

    /// Wind with a finite direction and non-negative speed, if reported.
    pub fn valid_wind(&self) -> Option<Wind> {
        let wind = self.wind?;
        if !wind.direction.is_finite() || !wind.speed.is_finite() || wind.speed < 0.0 {
            warn!("ignoring invalid wind {:?}", wind);
            return None;
        }
        Some(Wind {
            direction: geo::normalize_heading(wind.direction),
            speed: wind.speed,
        })
    }

    /// Validated aircraft entries, in first-seen order. A callsign that
    /// appears twice keeps its last entry.
    pub fn observations(&self) -> Vec<Observation> {
        let mut order: Vec<String> = Vec::new();
        let mut latest: HashMap<String, Observation> = HashMap::new();

        for report in &self.aircraft {
            let Some(obs) = validate(report) else {
                continue;
            };
            if !latest.contains_key(&obs.callsign) {
                order.push(obs.callsign.clone());
            }
            latest.insert(obs.callsign.clone(), obs);
        }

        order
            .into_iter()
            .filter_map(|cs| latest.remove(&cs))
            .collect()
    }
}

fn validate(report: &AircraftReport) -> Option<Observation> {
    let callsign = report.callsign.trim().to_uppercase();
    if callsign.is_empty() {
        warn!("dropping aircraft report with empty callsign");
        return None;
    }

    let position = report.position.and_then(|[lat, lon]| {
        if lat.is_finite() && lon.is_finite() && (-90.0..=90.0).contains(&lat) {
            Some((lat, lon))
        } else {
            warn!(%callsign, "ignoring invalid position [{lat}, {lon}]");
            None
        }
    });

    let status = report.status.as_deref().and_then(|s| match s.parse() {
        Ok(status) => Some(status),
        Err(e) => {
            warn!(%callsign, "{e}");
            None
        }
    });

    let weight_class = report.weight_class.as_deref().and_then(|s| match s.parse() {
        Ok(class) => Some(class),
        Err(e) => {
            warn!(%callsign, "{e}");
            None
        }
    });

    let aircraft_type = report
        .aircraft_type
        .as_deref()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_uppercase);

    Some(Observation {
        callsign,
        position,
        altitude_ft: finite(report.altitude),
        heading: finite(report.heading).map(geo::normalize_heading),
        speed_knots: finite(report.speed).filter(|s| *s >= 0.0),
        status,
        aircraft_type,
        weight_class,
        confidence: finite(report.confidence).map(|c| c.clamp(0.0, 1.0)),
    })
}

fn finite(v: Option<f64>) -> Option<f64> {
    v.filter(|x| x.is_finite())
}

/// Seconds since the Unix epoch.
pub fn now() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
