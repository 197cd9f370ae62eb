//! World model: the single owner of every aircraft track.
//!
//! Pure logic, no I/O. Each perception snapshot goes through
//! [`WorldModel::update_from_perception`], which reconciles the track
//! registry, runs conflict detection and returns `WorldEvent`s for the
//! caller to log or persist. The decision layer reads [`WorldState`]
//! copies and reports accepted clearances back through
//! [`WorldModel::assign_runway`] and [`WorldModel::clear_aircraft`].

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::aircraft::Aircraft;
use crate::config::{ConflictRule, ModelConfig};
use crate::conflict::{Conflict, ConflictDetector, ConflictId};
use crate::geo::Position;
use crate::snapshot::{self, Observation, PerceptionSnapshot, Wind};
use crate::topology::{AirportTopology, Runway};
use crate::types::{AircraftStatus, AtcError, OperationType, Result};

/// Conflicts listed individually in [`WorldModel::situation_summary`].
const SUMMARY_CONFLICT_LIMIT: usize = 5;

// ---------------------------------------------------------------------------
// World events (output)
// ---------------------------------------------------------------------------

/// Events emitted by one update cycle.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum WorldEvent {
    /// First sighting of a callsign.
    AircraftEntered {
        callsign: String,
        operation: OperationType,
        timestamp: f64,
    },
    /// Callsign missing from the snapshot; the track was dropped.
    AircraftExited {
        callsign: String,
        /// Final status was LANDED or DEPARTED.
        successful: bool,
        timestamp: f64,
    },
    StatusChanged {
        callsign: String,
        from: AircraftStatus,
        to: AircraftStatus,
    },
    ConflictAppeared(ConflictId),
    ConflictResolved(ConflictId),
}

impl fmt::Display for WorldEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorldEvent::AircraftEntered { callsign, operation, .. } => {
                write!(f, "{callsign} entered ({operation})")
            }
            WorldEvent::AircraftExited { callsign, successful, .. } => {
                let outcome = if *successful { "completed" } else { "incomplete" };
                write!(f, "{callsign} exited ({outcome})")
            }
            WorldEvent::StatusChanged { callsign, from, to } => {
                write!(f, "{callsign} {from} -> {to}")
            }
            WorldEvent::ConflictAppeared(id) => write!(f, "conflict {id} appeared"),
            WorldEvent::ConflictResolved(id) => write!(f, "conflict {id} resolved"),
        }
    }
}

// ---------------------------------------------------------------------------
// Clearances
// ---------------------------------------------------------------------------

/// Clearance keywords the decision layer can issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Clearance {
    Takeoff,
    Landing,
    Taxi,
}

impl Clearance {
    pub fn as_str(&self) -> &'static str {
        match self {
            Clearance::Takeoff => "takeoff",
            Clearance::Landing => "landing",
            Clearance::Taxi => "taxi",
        }
    }

    /// Status an aircraft moves to once cleared.
    pub fn resulting_status(&self) -> AircraftStatus {
        match self {
            Clearance::Takeoff => AircraftStatus::TakingOff,
            Clearance::Landing => AircraftStatus::Landing,
            Clearance::Taxi => AircraftStatus::Taxiing,
        }
    }
}

impl FromStr for Clearance {
    type Err = AtcError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "takeoff" | "take_off" => Ok(Clearance::Takeoff),
            "landing" | "land" => Ok(Clearance::Landing),
            "taxi" => Ok(Clearance::Taxi),
            _ => Err(AtcError::InvalidKeyword {
                kind: "clearance",
                value: s.to_string(),
            }),
        }
    }
}

// ---------------------------------------------------------------------------
// World state (read-only copy)
// ---------------------------------------------------------------------------

/// Point-in-time copy of the world, safe to hand to another task.
#[derive(Debug, Clone, Serialize)]
pub struct WorldState {
    pub timestamp: f64,
    pub update_count: u64,
    pub aircraft: BTreeMap<String, Aircraft>,
    /// Runways with `occupied`/`active` reflecting the current cycle.
    pub runways: Vec<Runway>,
    pub active_runways: Vec<String>,
    pub wind: Wind,
    /// Conflict descriptions, most severe first.
    pub conflicts: Vec<String>,
}

impl WorldState {
    pub fn aircraft_count(&self) -> usize {
        self.aircraft.len()
    }

    pub fn airborne_count(&self) -> usize {
        self.aircraft.values().filter(|ac| ac.is_airborne()).count()
    }
}

// ---------------------------------------------------------------------------
// World model
// ---------------------------------------------------------------------------

/// Track registry plus environment, topology and conflict detector.
///
/// Not internally synchronized: one update cycle at a time.
pub struct WorldModel {
    topology: Arc<AirportTopology>,
    detector: ConflictDetector,
    aircraft: BTreeMap<String, Aircraft>,
    wind: Wind,
    active_runways: Vec<String>,
    conflicts: Vec<Conflict>,
    update_count: u64,
    last_update: Option<f64>,
}

impl WorldModel {
    pub fn new(topology: Arc<AirportTopology>, rules: ConflictRule) -> Self {
        info!(
            "world model initialized for {} ({} runways)",
            topology.airport_code,
            topology.runways().len()
        );
        WorldModel {
            topology,
            detector: ConflictDetector::new(rules),
            aircraft: BTreeMap::new(),
            wind: Wind::default(),
            active_runways: Vec::new(),
            conflicts: Vec::new(),
            update_count: 0,
            last_update: None,
        }
    }

    pub fn from_config(config: &ModelConfig) -> Result<Self> {
        let topology = AirportTopology::from_config(&config.airport)?;
        // Issues are logged by validation; they never block loading
        topology.validate_topology();
        Ok(Self::new(Arc::new(topology), config.rules.clone()))
    }

    /// Apply one perception cycle. Returns the events it produced, in order:
    /// entries and status changes, exits, then conflict transitions.
    pub fn update_from_perception(&mut self, snapshot: &PerceptionSnapshot) -> Vec<WorldEvent> {
        let now = snapshot.timestamp_or_now();
        if let Some(last) = self.last_update {
            debug!("cycle {} dt={:.2}s", self.update_count + 1, now - last);
        }

        if let Some(wind) = snapshot.valid_wind() {
            self.wind = wind;
        }
        if let Some(active) = &snapshot.active_runways {
            self.active_runways = active
                .iter()
                .map(|r| r.trim().to_uppercase())
                .filter(|r| !r.is_empty())
                .collect();
        }

        let mut events = Vec::new();
        let observations = snapshot.observations();

        for obs in &observations {
            match self.aircraft.get_mut(&obs.callsign) {
                Some(ac) => {
                    let from = ac.status;
                    apply_observation(ac, obs, now);
                    if ac.status != from {
                        debug!("{} status changed {} -> {}", obs.callsign, from, ac.status);
                        events.push(WorldEvent::StatusChanged {
                            callsign: obs.callsign.clone(),
                            from,
                            to: ac.status,
                        });
                    }
                }
                None => {
                    let mut ac = Aircraft::new(obs.callsign.clone(), now);
                    ac.status = obs.status.unwrap_or(AircraftStatus::EnRoute);
                    apply_observation(&mut ac, obs, now);

                    let operation = OperationType::from_initial_status(ac.status);
                    info!(
                        "aircraft entered: {} ({}, {operation})",
                        ac.callsign,
                        ac.aircraft_type.as_deref().unwrap_or("UNKNOWN")
                    );
                    events.push(WorldEvent::AircraftEntered {
                        callsign: ac.callsign.clone(),
                        operation,
                        timestamp: now,
                    });
                    self.aircraft.insert(ac.callsign.clone(), ac);
                }
            }
        }

        let exited: Vec<String> = self
            .aircraft
            .keys()
            .filter(|cs| !observations.iter().any(|o| &o.callsign == *cs))
            .cloned()
            .collect();
        for callsign in exited {
            if let Some(ac) = self.aircraft.remove(&callsign) {
                let successful = ac.status.is_completed();
                info!("aircraft exited: {callsign} ({})", ac.status);
                events.push(WorldEvent::AircraftExited {
                    callsign,
                    successful,
                    timestamp: now,
                });
            }
        }

        // Run even with no aircraft so the last conflicts resolve
        let tracks: Vec<&Aircraft> = self.aircraft.values().collect();
        self.conflicts = self
            .detector
            .detect_all_conflicts(&tracks, self.topology.runways(), now);

        let transitions = self.detector.last_transitions();
        events.extend(transitions.appeared.iter().cloned().map(WorldEvent::ConflictAppeared));
        events.extend(transitions.resolved.iter().cloned().map(WorldEvent::ConflictResolved));

        self.last_update = Some(now);
        self.update_count += 1;
        debug!(
            "world model updated: {} aircraft tracked, {} conflicts",
            self.aircraft.len(),
            self.conflicts.len()
        );
        events
    }

    // -- commands -----------------------------------------------------------

    /// Assign a runway. `false` (no change) if the callsign or runway is
    /// unknown.
    pub fn assign_runway(&mut self, callsign: &str, runway: &str) -> bool {
        let key = callsign_key(callsign);
        if !self.topology.has_runway(runway) {
            warn!("cannot assign unknown runway {runway} to {key}");
            return false;
        }
        let Some(ac) = self.aircraft.get_mut(&key) else {
            warn!("cannot assign runway to unknown aircraft {key}");
            return false;
        };
        ac.assigned_runway = Some(runway.to_string());
        info!("assigned {key} to runway {runway}");
        true
    }

    /// Apply a clearance. `false` only for an unknown callsign; an
    /// unrecognized clearance keyword is logged and leaves the track as is.
    pub fn clear_aircraft(&mut self, callsign: &str, clearance_type: &str) -> bool {
        let key = callsign_key(callsign);
        let timestamp = self.last_update.unwrap_or_else(snapshot::now);
        let Some(ac) = self.aircraft.get_mut(&key) else {
            warn!("cannot clear unknown aircraft {key}");
            return false;
        };

        match clearance_type.parse::<Clearance>() {
            Ok(clearance) => {
                ac.status = clearance.resulting_status();
                ac.record_clearance(clearance.as_str(), timestamp);
                info!("cleared {key} for {}", clearance.as_str());
            }
            Err(e) => warn!("{key}: {e}, no status change"),
        }
        true
    }

    // -- queries ------------------------------------------------------------

    pub fn aircraft(&self, callsign: &str) -> Option<&Aircraft> {
        self.aircraft.get(&callsign_key(callsign))
    }

    /// All tracks in callsign order.
    pub fn all_aircraft(&self) -> impl Iterator<Item = &Aircraft> {
        self.aircraft.values()
    }

    pub fn aircraft_count(&self) -> usize {
        self.aircraft.len()
    }

    pub fn aircraft_by_status(&self, status: AircraftStatus) -> Vec<&Aircraft> {
        self.aircraft.values().filter(|ac| ac.status == status).collect()
    }

    /// Aircraft assigned to `runway` in a runway-occupying status.
    pub fn aircraft_on_runway(&self, runway: &str) -> Vec<&Aircraft> {
        self.aircraft
            .values()
            .filter(|ac| {
                ac.assigned_runway.as_deref() == Some(runway) && ac.status.is_runway_occupying()
            })
            .collect()
    }

    pub fn is_runway_clear(&self, runway: &str) -> bool {
        self.aircraft_on_runway(runway).is_empty()
    }

    /// Conflicts from the last cycle, most severe first.
    pub fn conflicts(&self) -> &[Conflict] {
        &self.conflicts
    }

    pub fn conflicts_for_aircraft(&self, callsign: &str) -> Vec<String> {
        self.detector
            .conflicts_for_aircraft(&callsign_key(callsign))
            .into_iter()
            .map(|c| c.description.clone())
            .collect()
    }

    pub fn has_critical_conflicts(&self) -> bool {
        self.detector.has_critical_conflicts()
    }

    pub fn conflict_summary(&self) -> String {
        self.detector.conflict_summary()
    }

    /// Up to `max_count` other aircraft with known positions, nearest first.
    pub fn closest_aircraft(&self, callsign: &str, max_count: usize) -> Vec<(String, f64)> {
        let Some(target) = self.aircraft.get(&callsign_key(callsign)) else {
            return Vec::new();
        };

        let mut distances: Vec<(String, f64)> = self
            .aircraft
            .values()
            .filter(|ac| ac.callsign != target.callsign)
            .map(|ac| (ac.callsign.clone(), target.separation_from(ac)))
            .filter(|(_, d)| d.is_finite())
            .collect();
        distances.sort_by(|a, b| a.1.total_cmp(&b.1));
        distances.truncate(max_count);
        distances
    }

    /// Runway names ranked for the current wind, into-wind only.
    pub fn recommended_runways(&self) -> Vec<String> {
        self.topology
            .get_active_runways(self.wind.direction, self.wind.speed, true)
            .into_iter()
            .map(|r| r.name.clone())
            .collect()
    }

    pub fn topology(&self) -> &Arc<AirportTopology> {
        &self.topology
    }

    pub fn rules(&self) -> &ConflictRule {
        &self.detector.rules
    }

    pub fn wind(&self) -> Wind {
        self.wind
    }

    pub fn active_runways(&self) -> &[String] {
        &self.active_runways
    }

    pub fn update_count(&self) -> u64 {
        self.update_count
    }

    pub fn last_update(&self) -> Option<f64> {
        self.last_update
    }

    /// Copy of the current world for the decision layer.
    pub fn get_state(&self) -> WorldState {
        let runways = self
            .topology
            .runways()
            .iter()
            .map(|r| {
                let occupant = self.aircraft_on_runway(&r.name).first().map(|ac| ac.callsign.clone());
                Runway {
                    occupied: occupant.is_some(),
                    occupied_by: occupant,
                    active: self.active_runways.contains(&r.name),
                    ..r.clone()
                }
            })
            .collect();

        WorldState {
            timestamp: self.last_update.unwrap_or_else(snapshot::now),
            update_count: self.update_count,
            aircraft: self.aircraft.clone(),
            runways,
            active_runways: self.active_runways.clone(),
            wind: self.wind,
            conflicts: self.conflicts.iter().map(|c| c.description.clone()).collect(),
        }
    }

    /// Multi-line human-readable overview.
    pub fn situation_summary(&self) -> String {
        let state = self.get_state();
        let active = if state.active_runways.is_empty() {
            "None".to_string()
        } else {
            state.active_runways.join(", ")
        };

        let mut lines = vec![
            format!("=== ATC Situation at {} ===", clock_time(state.timestamp)),
            format!(
                "Aircraft: {} total ({} airborne)",
                state.aircraft_count(),
                state.airborne_count()
            ),
            format!("Active Runways: {active}"),
            format!(
                "Wind: {:.0}\u{b0} at {:.0}kt",
                state.wind.direction, state.wind.speed
            ),
            String::new(),
        ];

        let mut by_status: BTreeMap<&str, usize> = BTreeMap::new();
        for ac in state.aircraft.values() {
            *by_status.entry(ac.status.as_str()).or_default() += 1;
        }
        if !by_status.is_empty() {
            lines.push("Aircraft by Status:".to_string());
            for (status, count) in &by_status {
                lines.push(format!("  {status}: {count}"));
            }
            lines.push(String::new());
        }

        if state.conflicts.is_empty() {
            lines.push("No conflicts detected".to_string());
        } else {
            lines.push(format!("CONFLICTS ({}):", state.conflicts.len()));
            for description in state.conflicts.iter().take(SUMMARY_CONFLICT_LIMIT) {
                lines.push(format!("  - {description}"));
            }
            if state.conflicts.len() > SUMMARY_CONFLICT_LIMIT {
                lines.push(format!(
                    "  ... and {} more",
                    state.conflicts.len() - SUMMARY_CONFLICT_LIMIT
                ));
            }
        }
        lines.join("\n")
    }
}

/// Refresh a track from one validated observation. Missing fields keep
/// their prior values.
fn apply_observation(ac: &mut Aircraft, obs: &Observation, now: f64) {
    if let Some((lat, lon)) = obs.position {
        let altitude = obs.altitude_ft.or(ac.altitude_ft()).unwrap_or(0.0);
        ac.update_position(Position::new(lat, lon, altitude, now));
    }
    if let Some(heading) = obs.heading {
        ac.heading = Some(heading);
    }
    if let Some(speed) = obs.speed_knots {
        ac.speed_knots = Some(speed);
    }
    if let Some(status) = obs.status {
        ac.status = status;
    }
    if let Some(aircraft_type) = &obs.aircraft_type {
        ac.aircraft_type = Some(aircraft_type.clone());
    }
    if let Some(weight_class) = obs.weight_class {
        ac.weight_class = weight_class;
    }
    if let Some(confidence) = obs.confidence {
        ac.confidence = confidence;
    }
    ac.last_seen = ac.last_seen.max(now);
}

/// Registry key for a callsign, in the form snapshots store it.
fn callsign_key(callsign: &str) -> String {
    callsign.trim().to_uppercase()
}

/// `HH:MM:SSZ` for a Unix timestamp.
fn clock_time(timestamp: f64) -> String {
    let secs = timestamp.max(0.0) as u64 % 86_400;
    format!("{:02}:{:02}:{:02}Z", secs / 3600, secs / 60 % 60, secs % 60)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::AircraftReport;
    use crate::types::{ConflictType, WeightClass};

    fn topology() -> Arc<AirportTopology> {
        let mut topo = AirportTopology::new("KTST");
        topo.add_runway(Runway::new("09", 90.0, Position::new(40.0, -73.0, 0.0, 0.0)));
        topo.add_runway(Runway::new("27", 270.0, Position::new(40.0, -72.95, 0.0, 0.0)));
        topo.add_runway(Runway::new("04L", 44.0, Position::new(40.62, -73.78, 0.0, 0.0)));
        Arc::new(topo)
    }

    fn model() -> WorldModel {
        WorldModel::new(topology(), ConflictRule::default())
    }

    fn report(callsign: &str, lat: f64, lon: f64, status: &str) -> AircraftReport {
        AircraftReport {
            callsign: callsign.to_string(),
            position: Some([lat, lon]),
            altitude: Some(3000.0),
            status: Some(status.to_string()),
            ..Default::default()
        }
    }

    fn snap(ts: f64, aircraft: Vec<AircraftReport>) -> PerceptionSnapshot {
        PerceptionSnapshot {
            timestamp: Some(ts),
            aircraft,
            ..Default::default()
        }
    }

    #[test]
    fn test_enter_and_exit() {
        let mut world = model();
        let events = world.update_from_perception(&snap(
            1.0,
            vec![
                report("UAL1", 40.0, -73.5, "APPROACHING"),
                report("DAL2", 40.3, -73.5, "TAXIING"),
            ],
        ));
        assert_eq!(
            events,
            vec![
                WorldEvent::AircraftEntered {
                    callsign: "UAL1".into(),
                    operation: OperationType::Arrival,
                    timestamp: 1.0,
                },
                WorldEvent::AircraftEntered {
                    callsign: "DAL2".into(),
                    operation: OperationType::Departure,
                    timestamp: 1.0,
                },
            ]
        );
        assert_eq!(world.aircraft_count(), 2);

        let events =
            world.update_from_perception(&snap(2.0, vec![report("UAL1", 40.01, -73.5, "LANDED")]));
        assert!(events.contains(&WorldEvent::AircraftExited {
            callsign: "DAL2".into(),
            successful: false,
            timestamp: 2.0,
        }));
        assert!(world.aircraft("DAL2").is_none());
        assert!(!world.get_state().aircraft.contains_key("DAL2"));
        assert_eq!(world.update_count(), 2);
    }

    #[test]
    fn test_successful_exit() {
        let mut world = model();
        world.update_from_perception(&snap(1.0, vec![report("UAL1", 40.0, -73.5, "LANDED")]));
        let events = world.update_from_perception(&snap(2.0, vec![]));
        assert_eq!(
            events,
            vec![WorldEvent::AircraftExited {
                callsign: "UAL1".into(),
                successful: true,
                timestamp: 2.0,
            }]
        );
    }

    #[test]
    fn test_status_change_event() {
        let mut world = model();
        world.update_from_perception(&snap(1.0, vec![report("UAL1", 40.0, -73.5, "APPROACHING")]));
        let events =
            world.update_from_perception(&snap(2.0, vec![report("UAL1", 40.01, -73.5, "ON_FINAL")]));
        assert_eq!(
            events,
            vec![WorldEvent::StatusChanged {
                callsign: "UAL1".into(),
                from: AircraftStatus::Approaching,
                to: AircraftStatus::OnFinal,
            }]
        );
    }

    #[test]
    fn test_missing_fields_keep_prior_values() {
        let mut world = model();
        let mut first = report("UAL1", 40.0, -73.5, "EN_ROUTE");
        first.heading = Some(90.0);
        first.weight_class = Some("HEAVY".into());
        world.update_from_perception(&snap(1.0, vec![first]));

        let bare = AircraftReport {
            callsign: "UAL1".into(),
            position: Some([40.0, -73.49]),
            ..Default::default()
        };
        world.update_from_perception(&snap(2.0, vec![bare]));

        let ac = world.aircraft("UAL1").unwrap();
        assert_eq!(ac.status, AircraftStatus::EnRoute);
        assert_eq!(ac.heading, Some(90.0));
        assert_eq!(ac.weight_class, WeightClass::Heavy);
        assert_eq!(ac.altitude_ft(), Some(3000.0));
        assert_eq!(ac.history_len(), 2);
        assert_eq!(ac.last_seen, 2.0);
    }

    #[test]
    fn test_new_aircraft_without_status_is_en_route() {
        let mut world = model();
        let bare = AircraftReport {
            callsign: "N1".into(),
            ..Default::default()
        };
        world.update_from_perception(&snap(1.0, vec![bare]));
        let ac = world.aircraft("N1").unwrap();
        assert_eq!(ac.status, AircraftStatus::EnRoute);
        assert!(!ac.has_position());
    }

    #[test]
    fn test_wind_and_active_runways() {
        let mut world = model();
        let mut s = snap(1.0, vec![]);
        s.wind = Some(Wind { direction: 80.0, speed: 15.0 });
        s.active_runways = Some(vec!["09".into()]);
        world.update_from_perception(&s);

        // Omitted fields keep the prior values
        world.update_from_perception(&snap(2.0, vec![]));
        assert_eq!(world.wind(), Wind { direction: 80.0, speed: 15.0 });
        assert_eq!(world.active_runways(), ["09".to_string()]);
        assert_eq!(world.recommended_runways(), vec!["09".to_string(), "04L".to_string()]);

        let state = world.get_state();
        let rwy09 = state.runways.iter().find(|r| r.name == "09").unwrap();
        let rwy27 = state.runways.iter().find(|r| r.name == "27").unwrap();
        assert!(rwy09.active);
        assert!(!rwy27.active);
    }

    #[test]
    fn test_assign_runway() {
        let mut world = model();
        world.update_from_perception(&snap(1.0, vec![report("UAL1", 40.0, -73.5, "ON_FINAL")]));

        assert!(world.assign_runway("UAL1", "04L"));
        assert_eq!(world.aircraft("UAL1").unwrap().assigned_runway.as_deref(), Some("04L"));

        assert!(!world.assign_runway("UAL1", "99X"));
        assert_eq!(world.aircraft("UAL1").unwrap().assigned_runway.as_deref(), Some("04L"));
        assert!(!world.assign_runway("NOPE", "04L"));
    }

    #[test]
    fn test_clear_aircraft() {
        let mut world = model();
        world.update_from_perception(&snap(5.0, vec![report("SWA3", 40.0, -73.0, "TAXIING")]));

        assert!(world.clear_aircraft("SWA3", "takeoff"));
        let ac = world.aircraft("SWA3").unwrap();
        assert_eq!(ac.status, AircraftStatus::TakingOff);
        assert_eq!(ac.last_clearance.as_deref(), Some("takeoff"));
        assert_eq!(ac.last_clearance_time, Some(5.0));

        assert!(world.clear_aircraft("SWA3", "pushback"));
        let ac = world.aircraft("SWA3").unwrap();
        assert_eq!(ac.status, AircraftStatus::TakingOff);
        assert_eq!(ac.last_clearance.as_deref(), Some("takeoff"));

        assert!(!world.clear_aircraft("NOPE", "taxi"));
    }

    #[test]
    fn test_runway_occupancy() {
        let mut world = model();
        world.update_from_perception(&snap(
            1.0,
            vec![
                report("AAL1", 40.0, -73.0, "ON_RUNWAY"),
                report("AAL2", 40.005, -73.0, "ON_RUNWAY"),
            ],
        ));
        assert!(world.is_runway_clear("09"));

        world.assign_runway("AAL1", "09");
        world.assign_runway("AAL2", "09");
        assert!(!world.is_runway_clear("09"));
        assert_eq!(world.aircraft_on_runway("09").len(), 2);

        let state = world.get_state();
        let rwy = state.runways.iter().find(|r| r.name == "09").unwrap();
        assert!(rwy.occupied);
        assert_eq!(rwy.occupied_by.as_deref(), Some("AAL1"));

        // Assignments are picked up by the next cycle's detection
        let events = world.update_from_perception(&snap(
            2.0,
            vec![
                report("AAL1", 40.0, -73.0, "ON_RUNWAY"),
                report("AAL2", 40.005, -73.0, "ON_RUNWAY"),
            ],
        ));
        let incursion = ConflictId::new("AAL1", "AAL2", ConflictType::RunwayIncursion);
        assert!(events.contains(&WorldEvent::ConflictAppeared(incursion)));
        assert!(world.has_critical_conflicts());
        assert_eq!(world.conflicts_for_aircraft("AAL2").len(), 1);
    }

    #[test]
    fn test_conflict_resolves_when_aircraft_exits() {
        let mut world = model();
        let events = world.update_from_perception(&snap(
            1.0,
            vec![
                report("UAL1", 40.0, -73.5, "EN_ROUTE"),
                report("DAL2", 40.0 + 2.5 / 60.0, -73.5, "EN_ROUTE"),
            ],
        ));
        let id = ConflictId::new("UAL1", "DAL2", ConflictType::SeparationViolation);
        assert!(events.contains(&WorldEvent::ConflictAppeared(id.clone())));
        assert_eq!(world.get_state().conflicts.len(), 1);

        let events = world.update_from_perception(&snap(2.0, vec![]));
        assert!(events.contains(&WorldEvent::ConflictResolved(id)));
        assert!(world.conflicts().is_empty());
    }

    #[test]
    fn test_queries() {
        let mut world = model();
        world.update_from_perception(&snap(
            1.0,
            vec![
                report("A", 40.0, -73.5, "EN_ROUTE"),
                report("B", 40.5, -73.5, "EN_ROUTE"),
                report("C", 40.1, -73.5, "AT_GATE"),
                AircraftReport {
                    callsign: "D".into(),
                    ..Default::default()
                },
            ],
        ));
        assert_eq!(world.aircraft_by_status(AircraftStatus::EnRoute).len(), 3);

        let closest = world.closest_aircraft("A", 5);
        let names: Vec<&str> = closest.iter().map(|(cs, _)| cs.as_str()).collect();
        assert_eq!(names, vec!["C", "B"]);
        assert!(world.closest_aircraft("A", 1).len() == 1);
        assert!(world.closest_aircraft("ZZZ", 5).is_empty());

        let state = world.get_state();
        assert_eq!(state.aircraft_count(), 4);
        assert_eq!(state.airborne_count(), 3);
    }

    #[test]
    fn test_lookups_ignore_callsign_case() {
        let mut world = model();
        world.update_from_perception(&snap(
            1.0,
            vec![
                report("UAL1", 40.0, -73.5, "EN_ROUTE"),
                report("DAL2", 40.0 + 1.0 / 60.0, -73.5, "EN_ROUTE"),
            ],
        ));
        assert_eq!(world.aircraft(" ual1 ").map(|ac| ac.callsign.as_str()), Some("UAL1"));
        assert_eq!(world.conflicts_for_aircraft("ual1"), world.conflicts_for_aircraft("UAL1"));
        assert_eq!(world.conflicts_for_aircraft("ual1").len(), 1);
        let closest = world.closest_aircraft("ual1", 5);
        assert_eq!(closest.len(), 1);
        assert_eq!(closest[0].0, "DAL2");
        assert!(world.assign_runway("ual1", "09"));
        assert_eq!(world.aircraft("UAL1").and_then(|ac| ac.assigned_runway.as_deref()), Some("09"));
    }

    #[test]
    fn test_situation_summary() {
        let mut world = model();
        world.update_from_perception(&snap(
            3_661.0,
            vec![
                report("UAL1", 40.0, -73.5, "EN_ROUTE"),
                report("DAL2", 40.0 + 1.0 / 60.0, -73.5, "EN_ROUTE"),
            ],
        ));
        let summary = world.situation_summary();
        assert!(summary.starts_with("=== ATC Situation at 01:01:01Z ==="));
        assert!(summary.contains("Aircraft: 2 total (2 airborne)"));
        assert!(summary.contains("Active Runways: None"));
        assert!(summary.contains("  EN_ROUTE: 2"));
        assert!(summary.contains("CONFLICTS (1):"));
    }

    #[test]
    fn test_clearance_parse() {
        assert_eq!("TAKEOFF".parse::<Clearance>().unwrap(), Clearance::Takeoff);
        assert_eq!(" taxi ".parse::<Clearance>().unwrap(), Clearance::Taxi);
        assert!("hold".parse::<Clearance>().is_err());
    }
}
