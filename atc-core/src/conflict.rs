//! Conflict detection: separation, runway incursion, wake turbulence, and
//! short-horizon prediction.
//!
//! Each pass is a pure function of the tracks, the runways and the rules;
//! tracks are never mutated. The detector only remembers the previous pass's
//! conflict ids so it can report which conflicts appeared or resolved.

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::fmt;

use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::aircraft::Aircraft;
use crate::config::ConflictRule;
use crate::geo::{self, Position};
use crate::topology::Runway;
use crate::types::{AircraftStatus, ConflictType, Severity, WeightClass};

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// A detected violation or predicted loss of separation between two aircraft.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Conflict {
    pub aircraft1: String,
    pub aircraft2: String,
    pub conflict_type: ConflictType,
    pub severity: Severity,
    /// Current (or predicted) distance between the pair, nm.
    pub distance_nm: f64,
    /// Separation that was required, when the check has one.
    pub minimum_nm: Option<f64>,
    /// Seconds until the predicted loss of separation.
    pub time_to_conflict: Option<f64>,
    pub description: String,
    pub timestamp: f64,
}

impl Conflict {
    pub fn id(&self) -> ConflictId {
        ConflictId::new(&self.aircraft1, &self.aircraft2, self.conflict_type)
    }

    pub fn involves(&self, callsign: &str) -> bool {
        self.aircraft1 == callsign || self.aircraft2 == callsign
    }

    /// Current-state conflicts are violations; predictions are not.
    pub fn is_violation(&self) -> bool {
        self.conflict_type != ConflictType::PredictedConflict
    }
}

/// Canonical conflict key: callsign pair in sorted order plus type.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct ConflictId {
    pub first: String,
    pub second: String,
    pub conflict_type: ConflictType,
}

impl ConflictId {
    pub fn new(a: &str, b: &str, conflict_type: ConflictType) -> Self {
        let (first, second) = if a <= b { (a, b) } else { (b, a) };
        ConflictId {
            first: first.to_string(),
            second: second.to_string(),
            conflict_type,
        }
    }
}

impl fmt::Display for ConflictId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}_{}", self.first, self.second, self.conflict_type)
    }
}

/// Conflict ids that appeared or resolved in the last detection pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConflictTransitions {
    pub appeared: Vec<ConflictId>,
    pub resolved: Vec<ConflictId>,
}

impl ConflictTransitions {
    pub fn is_empty(&self) -> bool {
        self.appeared.is_empty() && self.resolved.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Detector
// ---------------------------------------------------------------------------

/// Runs every conflict check over a snapshot of tracks and runways.
pub struct ConflictDetector {
    pub rules: ConflictRule,
    active: BTreeMap<ConflictId, Conflict>,
    transitions: ConflictTransitions,
}

impl ConflictDetector {
    pub fn new(rules: ConflictRule) -> Self {
        ConflictDetector {
            rules,
            active: BTreeMap::new(),
            transitions: ConflictTransitions::default(),
        }
    }

    /// Run all checks. Returns conflicts sorted critical first; the relative
    /// order within a severity follows check order.
    pub fn detect_all_conflicts(
        &mut self,
        aircraft: &[&Aircraft],
        runways: &[Runway],
        now: f64,
    ) -> Vec<Conflict> {
        let mut conflicts = Vec::new();
        self.check_horizontal_separation(aircraft, now, &mut conflicts);
        self.check_runway_incursions(aircraft, runways, now, &mut conflicts);
        self.check_wake_turbulence(aircraft, runways, now, &mut conflicts);
        self.predict_conflicts(aircraft, now, &mut conflicts);

        conflicts.sort_by(|a, b| b.severity.cmp(&a.severity));
        self.update_active(&conflicts);

        let critical = conflicts
            .iter()
            .filter(|c| c.severity == Severity::Critical)
            .count();
        debug!("detected {} conflicts ({critical} critical)", conflicts.len());
        conflicts
    }

    /// True when the pair is exempt from horizontal checks by altitude.
    fn vertically_separated(&self, alt_a: Option<f64>, alt_b: Option<f64>) -> bool {
        if !self.rules.enforce_vertical_separation {
            return false;
        }
        match (alt_a, alt_b) {
            (Some(a), Some(b)) => (a - b).abs() >= self.rules.vertical_separation_ft,
            _ => false,
        }
    }

    fn check_horizontal_separation(
        &self,
        aircraft: &[&Aircraft],
        now: f64,
        out: &mut Vec<Conflict>,
    ) {
        let airborne: Vec<&Aircraft> = aircraft
            .iter()
            .copied()
            .filter(|ac| ac.is_airborne())
            .collect();

        for i in 0..airborne.len() {
            for j in (i + 1)..airborne.len() {
                let (a, b) = (airborne[i], airborne[j]);
                let separation = a.separation_from(b);
                if !(separation < self.rules.horizontal_separation_nm) {
                    continue;
                }
                if self.vertically_separated(a.altitude_ft(), b.altitude_ft()) {
                    continue;
                }

                let severity = if separation < self.rules.critical_separation_nm {
                    Severity::Critical
                } else {
                    Severity::Warning
                };
                let conflict = Conflict {
                    aircraft1: a.callsign.clone(),
                    aircraft2: b.callsign.clone(),
                    conflict_type: ConflictType::SeparationViolation,
                    severity,
                    distance_nm: separation,
                    minimum_nm: Some(self.rules.horizontal_separation_nm),
                    time_to_conflict: None,
                    description: format!(
                        "Separation violation: {} and {} are {:.2}nm apart (min: {}nm)",
                        a.callsign, b.callsign, separation, self.rules.horizontal_separation_nm
                    ),
                    timestamp: now,
                };
                warn!("SEPARATION VIOLATION: {}", conflict.description);
                out.push(conflict);
            }
        }
    }

    fn check_runway_incursions(
        &self,
        aircraft: &[&Aircraft],
        runways: &[Runway],
        now: f64,
        out: &mut Vec<Conflict>,
    ) {
        for runway in runways {
            let on_runway: Vec<&Aircraft> = aircraft
                .iter()
                .copied()
                .filter(|ac| is_on_runway(ac, runway))
                .collect();
            if on_runway.len() < 2 {
                continue;
            }

            let (a, b) = (on_runway[0], on_runway[1]);
            let names: Vec<&str> = on_runway.iter().map(|ac| ac.callsign.as_str()).collect();
            let conflict = Conflict {
                aircraft1: a.callsign.clone(),
                aircraft2: b.callsign.clone(),
                conflict_type: ConflictType::RunwayIncursion,
                severity: Severity::Critical,
                distance_nm: a.separation_from(b),
                minimum_nm: None,
                time_to_conflict: None,
                description: format!(
                    "Runway incursion on {}: {}",
                    runway.name,
                    names.join(", ")
                ),
                timestamp: now,
            };
            error!("RUNWAY INCURSION: {}", conflict.description);
            out.push(conflict);
        }
    }

    /// Sequences ON_FINAL aircraft per assigned runway by distance to the
    /// threshold. An aircraft on final with no runway assigned is not part
    /// of any sequence, so it raises no wake conflict until a runway is
    /// assigned; horizontal separation still covers it.
    fn check_wake_turbulence(
        &self,
        aircraft: &[&Aircraft],
        runways: &[Runway],
        now: f64,
        out: &mut Vec<Conflict>,
    ) {
        let mut approaches: BTreeMap<&str, Vec<&Aircraft>> = BTreeMap::new();
        for ac in aircraft.iter().copied() {
            if ac.status != AircraftStatus::OnFinal {
                continue;
            }
            // No threshold to sequence against without a runway
            if let Some(rwy) = ac.assigned_runway.as_deref() {
                approaches.entry(rwy).or_default().push(ac);
            }
        }

        for (runway_name, mut sequence) in approaches {
            let threshold = runways
                .iter()
                .find(|r| r.name == runway_name)
                .map(|r| r.threshold);
            sequence.sort_by(|a, b| {
                distance_to_threshold(a, threshold.as_ref())
                    .total_cmp(&distance_to_threshold(b, threshold.as_ref()))
            });

            for pair in sequence.windows(2) {
                let (leader, follower) = (pair[0], pair[1]);
                let required = self.required_wake_separation(leader, follower);
                let actual = leader.separation_from(follower);
                if !(actual < required) {
                    continue;
                }

                let conflict = Conflict {
                    aircraft1: leader.callsign.clone(),
                    aircraft2: follower.callsign.clone(),
                    conflict_type: ConflictType::WakeTurbulence,
                    severity: Severity::Warning,
                    distance_nm: actual,
                    minimum_nm: Some(required),
                    time_to_conflict: None,
                    description: format!(
                        "Wake turbulence: {} too close behind {} ({:.1}nm, need {:.1}nm)",
                        follower.callsign, leader.callsign, actual, required
                    ),
                    timestamp: now,
                };
                warn!("{}", conflict.description);
                out.push(conflict);
            }
        }
    }

    fn predict_conflicts(&self, aircraft: &[&Aircraft], now: f64, out: &mut Vec<Conflict>) {
        let interval = self.rules.prediction_interval();
        if self.rules.prediction_steps == 0 || interval <= 0.0 {
            return;
        }

        let candidates: Vec<&Aircraft> = aircraft
            .iter()
            .copied()
            .filter(|ac| ac.is_airborne() && ac.velocity_vector().is_some())
            .collect();
        let mut reported: HashSet<(usize, usize)> = HashSet::new();

        for step in 1..=self.rules.prediction_steps {
            let time_ahead = interval * step as f64;
            let predicted: Vec<Option<Position>> = candidates
                .iter()
                .map(|ac| ac.predict_position(time_ahead))
                .collect();

            for i in 0..candidates.len() {
                for j in (i + 1)..candidates.len() {
                    if reported.contains(&(i, j)) {
                        continue;
                    }
                    let (Some(p1), Some(p2)) = (&predicted[i], &predicted[j]) else {
                        continue;
                    };
                    let distance = geo::distance_nm(p1, p2);
                    if !(distance < self.rules.horizontal_separation_nm) {
                        continue;
                    }
                    if self.vertically_separated(Some(p1.altitude_ft), Some(p2.altitude_ft)) {
                        continue;
                    }

                    let (a, b) = (candidates[i], candidates[j]);
                    let conflict = Conflict {
                        aircraft1: a.callsign.clone(),
                        aircraft2: b.callsign.clone(),
                        conflict_type: ConflictType::PredictedConflict,
                        severity: Severity::Advisory,
                        distance_nm: distance,
                        minimum_nm: Some(self.rules.horizontal_separation_nm),
                        time_to_conflict: Some(time_ahead),
                        description: format!(
                            "Predicted conflict in {:.0}s: {} and {} will be {:.2}nm apart",
                            time_ahead, a.callsign, b.callsign, distance
                        ),
                        timestamp: now,
                    };
                    debug!("{}", conflict.description);
                    out.push(conflict);
                    reported.insert((i, j));
                }
            }
        }
    }

    /// Wake spacing behind `leader`. Only a HEAVY leader raises the minimum;
    /// every other pairing uses the standard horizontal minimum.
    pub fn required_wake_separation(&self, leader: &Aircraft, follower: &Aircraft) -> f64 {
        match (leader.weight_class, follower.weight_class) {
            (WeightClass::Heavy, WeightClass::Heavy) => self.rules.wake_separation_heavy_heavy,
            (WeightClass::Heavy, WeightClass::Medium) => self.rules.wake_separation_heavy_medium,
            (WeightClass::Heavy, WeightClass::Light) => self.rules.wake_separation_heavy_light,
            _ => self.rules.horizontal_separation_nm,
        }
    }

    fn update_active(&mut self, conflicts: &[Conflict]) {
        let next: BTreeMap<ConflictId, Conflict> =
            conflicts.iter().map(|c| (c.id(), c.clone())).collect();

        let old_ids: BTreeSet<&ConflictId> = self.active.keys().collect();
        let new_ids: BTreeSet<&ConflictId> = next.keys().collect();

        let appeared: Vec<ConflictId> = new_ids.difference(&old_ids).map(|&id| id.clone()).collect();
        let resolved: Vec<ConflictId> = old_ids.difference(&new_ids).map(|&id| id.clone()).collect();

        if !appeared.is_empty() {
            info!("new conflicts: {}", join_ids(&appeared));
        }
        if !resolved.is_empty() {
            info!("resolved conflicts: {}", join_ids(&resolved));
        }

        self.transitions = ConflictTransitions { appeared, resolved };
        self.active = next;
    }

    // -- queries ------------------------------------------------------------

    /// Conflicts from the last pass, in id order.
    pub fn active_conflicts(&self) -> impl Iterator<Item = &Conflict> {
        self.active.values()
    }

    pub fn active_count(&self) -> usize {
        self.active.len()
    }

    pub fn last_transitions(&self) -> &ConflictTransitions {
        &self.transitions
    }

    /// Active conflicts involving `callsign`, most severe first.
    pub fn conflicts_for_aircraft(&self, callsign: &str) -> Vec<&Conflict> {
        let mut found: Vec<&Conflict> = self
            .active
            .values()
            .filter(|c| c.involves(callsign))
            .collect();
        found.sort_by(|a, b| b.severity.cmp(&a.severity));
        found
    }

    pub fn has_critical_conflicts(&self) -> bool {
        self.active.values().any(|c| c.severity == Severity::Critical)
    }

    /// Multi-line summary grouped by severity, critical first.
    pub fn conflict_summary(&self) -> String {
        if self.active.is_empty() {
            return "No conflicts detected".to_string();
        }

        let mut lines = Vec::new();
        for (severity, label, noun) in [
            (Severity::Critical, "CRITICAL", "conflicts"),
            (Severity::Warning, "WARNING", "conflicts"),
            (Severity::Advisory, "ADVISORY", "predictions"),
        ] {
            let group: Vec<&Conflict> = self
                .active
                .values()
                .filter(|c| c.severity == severity)
                .collect();
            if group.is_empty() {
                continue;
            }
            lines.push(format!("{label}: {} {noun}", group.len()));
            for c in group {
                lines.push(format!("  - {}", c.description));
            }
        }
        lines.join("\n")
    }
}

impl Default for ConflictDetector {
    fn default() -> Self {
        Self::new(ConflictRule::default())
    }
}

fn is_on_runway(ac: &Aircraft, runway: &Runway) -> bool {
    ac.assigned_runway.as_deref() == Some(runway.name.as_str()) && ac.status.is_runway_occupying()
}

fn distance_to_threshold(ac: &Aircraft, threshold: Option<&Position>) -> f64 {
    match (ac.current_position(), threshold) {
        (Some(p), Some(t)) => geo::distance_nm(p, t),
        _ => f64::INFINITY,
    }
}

fn join_ids(ids: &[ConflictId]) -> String {
    ids.iter().map(ToString::to_string).collect::<Vec<_>>().join(", ")
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
