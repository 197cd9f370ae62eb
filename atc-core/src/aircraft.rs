//! Per-callsign aircraft track.
//!
//! Pure data holder with no I/O and no transition guards. The world model owns
//! every `Aircraft`; perception and clearances drive its status.
//!
//! Tracks per-aircraft: identity, weight class, reported heading/speed,
//! a bounded position history used to derive velocity, runway/gate
//! assignment, and the last clearance.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::geo::{self, Position};
use crate::types::{AircraftStatus, WeightClass};

/// Maximum position history entries per aircraft.
pub const MAX_HISTORY: usize = 20;

/// Mutable state for a single tracked aircraft.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Aircraft {
    pub callsign: String,
    pub aircraft_type: Option<String>,
    pub weight_class: WeightClass,
    pub status: AircraftStatus,

    // Latest reported kinematics (may be overwritten by perception)
    pub heading: Option<f64>,
    pub speed_knots: Option<f64>,

    // Oldest first; back() is the current position
    position_history: VecDeque<Position>,

    // Assignment
    pub assigned_runway: Option<String>,
    pub assigned_gate: Option<String>,
    pub last_clearance: Option<String>,
    pub last_clearance_time: Option<f64>,

    // Metadata
    pub first_seen: f64,
    pub last_seen: f64,
    pub confidence: f64,
}

impl Aircraft {
    pub fn new(callsign: impl Into<String>, timestamp: f64) -> Self {
        Aircraft {
            callsign: callsign.into(),
            aircraft_type: None,
            weight_class: WeightClass::default(),
            status: AircraftStatus::Unknown,
            heading: None,
            speed_knots: None,
            position_history: VecDeque::with_capacity(MAX_HISTORY),
            assigned_runway: None,
            assigned_gate: None,
            last_clearance: None,
            last_clearance_time: None,
            first_seen: timestamp,
            last_seen: timestamp,
            confidence: 1.0,
        }
    }

    /// Append a position sample, evicting the oldest beyond `MAX_HISTORY`.
    ///
    /// A sample older than the current one is clamped to the current
    /// timestamp so the history stays non-decreasing.
    pub fn update_position(&mut self, mut position: Position) {
        if let Some(last) = self.position_history.back() {
            if position.timestamp < last.timestamp {
                tracing::debug!(
                    callsign = %self.callsign,
                    "out-of-order position sample ({} < {}), clamping",
                    position.timestamp,
                    last.timestamp
                );
                position.timestamp = last.timestamp;
            }
        }

        if self.position_history.len() == MAX_HISTORY {
            self.position_history.pop_front();
        }
        self.position_history.push_back(position);

        if position.timestamp > self.last_seen {
            self.last_seen = position.timestamp;
        }
    }

    pub fn current_position(&self) -> Option<&Position> {
        self.position_history.back()
    }

    pub fn has_position(&self) -> bool {
        !self.position_history.is_empty()
    }

    pub fn position_history(&self) -> impl ExactSizeIterator<Item = &Position> + '_ {
        self.position_history.iter()
    }

    pub fn history_len(&self) -> usize {
        self.position_history.len()
    }

    pub fn altitude_ft(&self) -> Option<f64> {
        self.current_position().map(|p| p.altitude_ft)
    }

    pub fn age(&self, now: f64) -> f64 {
        now - self.last_seen
    }

    pub fn is_airborne(&self) -> bool {
        self.status.is_airborne()
    }

    /// Ground speed (knots) and track (degrees) from the last two samples.
    ///
    /// `None` with fewer than two samples or zero elapsed time.
    pub fn velocity_vector(&self) -> Option<(f64, f64)> {
        let n = self.position_history.len();
        if n < 2 {
            return None;
        }
        let p1 = &self.position_history[n - 2];
        let p2 = &self.position_history[n - 1];
        let dt = p2.timestamp - p1.timestamp;
        if dt <= 0.0 {
            return None;
        }

        let speed_knots = geo::distance_nm(p1, p2) / (dt / 3600.0);
        let heading = geo::bearing_deg(p1, p2);
        Some((speed_knots, heading))
    }

    /// Dead-reckoning position `dt_seconds` ahead along the velocity vector.
    ///
    /// Altitude is held constant. `None` under the same preconditions as
    /// [`Aircraft::velocity_vector`].
    pub fn predict_position(&self, dt_seconds: f64) -> Option<Position> {
        let current = self.current_position()?;
        let (speed_knots, heading) = self.velocity_vector()?;

        let distance_nm = speed_knots * dt_seconds / 3600.0;
        let hdg = heading.to_radians();

        // One arc-minute of latitude per nautical mile
        let dlat = distance_nm * hdg.cos() / 60.0;
        let cos_lat = current.lat.to_radians().cos();
        let dlon = if cos_lat.abs() < 1e-9 {
            0.0
        } else {
            distance_nm * hdg.sin() / (60.0 * cos_lat)
        };

        Some(Position::new(
            current.lat + dlat,
            current.lon + dlon,
            current.altitude_ft,
            current.timestamp + dt_seconds,
        ))
    }

    /// Great-circle distance (nm) between current positions.
    ///
    /// `f64::INFINITY` when either position is unknown.
    pub fn separation_from(&self, other: &Aircraft) -> f64 {
        match (self.current_position(), other.current_position()) {
            (Some(a), Some(b)) => geo::distance_nm(a, b),
            _ => f64::INFINITY,
        }
    }

    /// Absolute altitude difference in feet, when both are known.
    pub fn vertical_separation_from(&self, other: &Aircraft) -> Option<f64> {
        Some((self.altitude_ft()? - other.altitude_ft()?).abs())
    }

    pub fn record_clearance(&mut self, clearance: &str, timestamp: f64) {
        self.last_clearance = Some(clearance.to_string());
        self.last_clearance_time = Some(timestamp);
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
