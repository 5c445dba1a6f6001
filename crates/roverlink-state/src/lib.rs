//! `roverlink-state` – The Fleet's Working Memory.
//!
//! Holds everything the server knows about its robots, in volatile memory.
//!
//! # Modules
//!
//! - [`registry`] – [`RobotRegistry`][registry::RobotRegistry]: maps robot
//!   ids to their live [`RobotState`][roverlink_types::RobotState].
//! - [`telemetry_ledger`] – [`TelemetryLedger`][telemetry_ledger::TelemetryLedger]:
//!   bounded FIFO of telemetry snapshots (1000 records by default).
//! - [`mission_ledger`] – [`MissionLedger`][mission_ledger::MissionLedger]:
//!   creation-ordered list of missions with sequential ids.
//!
//! [`FleetState`] bundles the three so a caller can guard them with a single
//! lock.

pub mod mission_ledger;
pub mod registry;
pub mod telemetry_ledger;

pub use mission_ledger::{MissionLedger, NewMission};
pub use registry::RobotRegistry;
pub use telemetry_ledger::{DEFAULT_CAPACITY, TelemetryLedger};

/// Every piece of mutable fleet state, owned in one place.
#[derive(Debug, Default)]
pub struct FleetState {
    pub robots: RobotRegistry,
    pub telemetry: TelemetryLedger,
    pub missions: MissionLedger,
}

impl FleetState {
    /// Empty state whose telemetry ledger keeps at most `capacity` records.
    pub fn with_telemetry_capacity(capacity: usize) -> Self {
        Self {
            robots: RobotRegistry::new(),
            telemetry: TelemetryLedger::with_capacity(capacity),
            missions: MissionLedger::new(),
        }
    }
}
