//! End-to-end update cycles driven by JSON snapshots against the demo airport.

use std::path::PathBuf;

use atc_core::{
    load_config, AircraftStatus, ConflictId, ConflictType, OperationType, PerceptionSnapshot,
    Severity, WorldEvent, WorldModel,
};
use serde_json::json;

fn demo_path(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("..")
        .join("demos")
        .join(name)
}

fn demo_world() -> WorldModel {
    let config = load_config(demo_path("ktst_airport.json")).unwrap();
    WorldModel::from_config(&config).unwrap()
}

fn snapshot(value: serde_json::Value) -> PerceptionSnapshot {
    serde_json::from_value(value).unwrap()
}

#[test]
fn test_demo_airport_loads() {
    let world = demo_world();
    let topo = world.topology();
    assert_eq!(topo.airport_code, "KTST");
    assert_eq!(topo.runways().len(), 3);
    assert!(topo.validate_topology().is_empty());

    let route = topo.find_route("09_threshold", "G1").unwrap();
    assert_eq!(route.nodes, vec!["09_threshold", "HS09", "A1", "A2", "G1"]);
    assert_eq!(route.distance_meters, 4920.0);
    assert_eq!(route.taxiways, vec!["A", "B"]);
}

#[test]
fn test_demo_replay() {
    let mut world = demo_world();
    let text = std::fs::read_to_string(demo_path("approach.jsonl")).unwrap();

    let mut events = Vec::new();
    for line in text.lines().filter(|l| !l.trim().is_empty()) {
        let snap: PerceptionSnapshot = serde_json::from_str(line).unwrap();
        events.extend(world.update_from_perception(&snap));
    }

    let entered: Vec<(&str, OperationType)> = events
        .iter()
        .filter_map(|e| match e {
            WorldEvent::AircraftEntered { callsign, operation, .. } => {
                Some((callsign.as_str(), *operation))
            }
            _ => None,
        })
        .collect();
    assert_eq!(
        entered,
        vec![
            ("UAL1", OperationType::Arrival),
            ("DAL2", OperationType::Departure),
            ("SWA3", OperationType::Departure),
        ]
    );

    let separation = ConflictId::new("UAL1", "DAL2", ConflictType::SeparationViolation);
    let appeared = events
        .iter()
        .position(|e| *e == WorldEvent::ConflictAppeared(separation.clone()))
        .unwrap();
    let resolved = events
        .iter()
        .position(|e| *e == WorldEvent::ConflictResolved(separation.clone()))
        .unwrap();
    assert!(appeared < resolved);

    assert!(events.contains(&WorldEvent::AircraftExited {
        callsign: "DAL2".into(),
        successful: false,
        timestamp: 1030.0,
    }));

    let state = world.get_state();
    assert_eq!(state.update_count, 5);
    assert_eq!(state.timestamp, 1040.0);
    assert_eq!(state.aircraft.keys().collect::<Vec<_>>(), vec!["UAL1"]);
    assert_eq!(state.aircraft["UAL1"].status, AircraftStatus::Landed);
    assert_eq!(state.aircraft["UAL1"].aircraft_type.as_deref(), Some("B738"));
    assert!(state.conflicts.is_empty());
    assert_eq!(world.recommended_runways()[0], "09");
}

#[test]
fn test_wake_sequence_on_final() {
    let mut world = demo_world();
    world.update_from_perception(&snapshot(json!({
        "timestamp": 10.0,
        "aircraft": [
            {"callsign": "BAW1", "position": [40.0, -73.04], "altitude": 1200,
             "status": "ON_FINAL", "weight_class": "HEAVY"},
            {"callsign": "N123", "position": [40.0, -73.15], "altitude": 2500,
             "status": "ON_FINAL", "weight_class": "LIGHT"}
        ]
    })));
    assert!(world.assign_runway("BAW1", "09"));
    assert!(world.assign_runway("N123", "09"));

    let events = world.update_from_perception(&snapshot(json!({
        "timestamp": 20.0,
        "aircraft": [
            {"callsign": "BAW1", "position": [40.0, -73.03]},
            {"callsign": "N123", "position": [40.0, -73.14]}
        ]
    })));

    let wake = ConflictId::new("BAW1", "N123", ConflictType::WakeTurbulence);
    assert!(events.contains(&WorldEvent::ConflictAppeared(wake)));

    let conflict = world
        .conflicts()
        .iter()
        .find(|c| c.conflict_type == ConflictType::WakeTurbulence)
        .unwrap();
    assert_eq!(conflict.severity, Severity::Warning);
    assert_eq!(conflict.aircraft1, "BAW1");
    assert_eq!(conflict.aircraft2, "N123");
    assert_eq!(conflict.minimum_nm, Some(6.0));
    assert!(conflict.description.contains("N123 too close behind BAW1"));
}

#[test]
fn test_clearance_round_trip() {
    let mut world = demo_world();
    world.update_from_perception(&snapshot(json!({
        "timestamp": 50.0,
        "aircraft": [
            {"callsign": "jbu7", "position": [39.998, -72.999], "status": "taxiing"}
        ]
    })));

    assert!(world.assign_runway("JBU7", "09"));
    assert!(world.is_runway_clear("09"));
    assert!(world.clear_aircraft("JBU7", "takeoff"));
    assert!(!world.is_runway_clear("09"));

    let state = world.get_state();
    let rwy = state.runways.iter().find(|r| r.name == "09").unwrap();
    assert_eq!(rwy.occupied_by.as_deref(), Some("JBU7"));
    assert_eq!(state.aircraft["JBU7"].last_clearance_time, Some(50.0));

    // Perception disagrees next cycle; the reported status wins
    let events = world.update_from_perception(&snapshot(json!({
        "timestamp": 60.0,
        "aircraft": [{"callsign": "JBU7", "status": "DEPARTING"}]
    })));
    assert_eq!(
        events,
        vec![WorldEvent::StatusChanged {
            callsign: "JBU7".into(),
            from: AircraftStatus::TakingOff,
            to: AircraftStatus::Departing,
        }]
    );
}

#[test]
fn test_state_serializes() {
    let mut world = demo_world();
    world.update_from_perception(&snapshot(json!({
        "timestamp": 1.0,
        "aircraft": [{"callsign": "UAL1", "position": [40.0, -73.2], "status": "EN_ROUTE"}]
    })));
    let value = serde_json::to_value(world.get_state()).unwrap();
    assert_eq!(value["aircraft"]["UAL1"]["status"], "EN_ROUTE");
    assert_eq!(value["runways"].as_array().unwrap().len(), 3);
}
