//! atc-core: Airspace world model for an airport control loop.
//!
//! No async, no I/O beyond loading a config file; just algorithms. Owns the
//! aircraft tracks, the airport topology and the conflict detector, and is
//! driven one perception snapshot at a time by `atc-replay` or any other host.

pub mod aircraft;
pub mod config;
pub mod conflict;
pub mod geo;
pub mod snapshot;
pub mod topology;
pub mod types;
pub mod world;

// Re-export commonly used types at crate root
pub use aircraft::Aircraft;
pub use config::{load_config, parse_config, AirportConfig, ConflictRule, ModelConfig};
pub use conflict::{Conflict, ConflictDetector, ConflictId};
pub use geo::Position;
pub use snapshot::{AircraftReport, PerceptionSnapshot, Wind};
pub use topology::{AirportTopology, Runway, TaxiRoute, TopologyIssue};
pub use types::*;
pub use world::{Clearance, WorldEvent, WorldModel, WorldState};
