//! [`RobotRegistry`] – robot id → live state.
//!
//! Entries are created (or reset) by [`RobotRegistry::connect`] and mutated by
//! telemetry, heartbeats and mission assignment.  Nothing removes an entry:
//! a robot whose real-time session drops stays registered.

use std::collections::HashMap;

use chrono::Utc;
use roverlink_types::{
    ConnectionStatus, FULL_BATTERY, FleetError, Position, RobotState, clamp_battery,
};

/// In-memory registry of connected robots.
#[derive(Debug, Default)]
pub struct RobotRegistry {
    robots: HashMap<String, RobotState>,
}

impl RobotRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `id`, replacing any previous entry with the same id.
    ///
    /// The new entry starts with a full battery, at the origin, with no
    /// mission, and both timestamps set to now.
    pub fn connect(&mut self, id: &str, name: &str) -> RobotState {
        let now = Utc::now();
        let state = RobotState {
            id: id.to_string(),
            name: name.to_string(),
            status: ConnectionStatus::Connected,
            connected_since: now,
            last_update: now,
            battery: FULL_BATTERY,
            position: Position::default(),
            current_mission: None,
        };
        self.robots.insert(id.to_string(), state.clone());
        state
    }

    /// Record the battery level and position from a telemetry report.
    ///
    /// # Errors
    ///
    /// Returns [`FleetError::RobotNotFound`] when `id` is not registered.
    pub fn update_telemetry(
        &mut self,
        id: &str,
        battery: f64,
        position: Position,
    ) -> Result<(), FleetError> {
        let robot = self.entry_mut(id)?;
        robot.last_update = Utc::now();
        robot.battery = clamp_battery(battery);
        robot.position = position;
        Ok(())
    }

    /// Point the robot's current mission at `mission_id`, overwriting any
    /// previous assignment.
    ///
    /// # Errors
    ///
    /// Returns [`FleetError::RobotNotFound`] when `id` is not registered.
    pub fn assign_mission(&mut self, id: &str, mission_id: &str) -> Result<(), FleetError> {
        self.entry_mut(id)?.current_mission = Some(mission_id.to_string());
        Ok(())
    }

    /// Refresh the last-seen timestamp only.  Returns `false` for unknown ids.
    pub fn touch(&mut self, id: &str) -> bool {
        match self.robots.get_mut(id) {
            Some(robot) => {
                robot.last_update = Utc::now();
                true
            }
            None => false,
        }
    }

    /// Snapshot copy of every registered robot.  Order is unspecified.
    pub fn get_all(&self) -> Vec<RobotState> {
        self.robots.values().cloned().collect()
    }

    pub fn get(&self, id: &str) -> Option<RobotState> {
        self.robots.get(id).cloned()
    }

    pub fn exists(&self, id: &str) -> bool {
        self.robots.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.robots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.robots.is_empty()
    }

    fn entry_mut(&mut self, id: &str) -> Result<&mut RobotState, FleetError> {
        self.robots
            .get_mut(id)
            .ok_or_else(|| FleetError::RobotNotFound(id.to_string()))
    }
}
