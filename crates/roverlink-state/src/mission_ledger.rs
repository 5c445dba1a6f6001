//! [`MissionLedger`] – creation-ordered list of operator missions.
//!
//! Mission ids are `mission_<n>` where `n` is the ledger length after the
//! insert.  Missions are never removed, so ids stay unique as long as every
//! [`MissionLedger::create`] call is serialized with the length read it
//! depends on; holding `&mut self` for the whole call guarantees that.

use chrono::Utc;
use roverlink_types::{FleetError, Mission, MissionStatus, Position};

use crate::registry::RobotRegistry;

/// Operator input for a new mission.
#[derive(Debug, Clone, PartialEq)]
pub struct NewMission {
    pub robot_id: String,
    pub mission_type: String,
    pub objective: String,
    pub destination: Position,
}

/// Ordered collection of [`Mission`]s.
#[derive(Debug, Default)]
pub struct MissionLedger {
    missions: Vec<Mission>,
}

impl MissionLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a `pending` mission for an existing robot and make it the
    /// robot's current mission.
    ///
    /// Any mission previously assigned to the robot is replaced without
    /// further checks.
    ///
    /// # Errors
    ///
    /// Returns [`FleetError::RobotNotFound`] when the target robot is not
    /// registered; neither the ledger nor the registry is modified.
    pub fn create(
        &mut self,
        robots: &mut RobotRegistry,
        request: NewMission,
    ) -> Result<Mission, FleetError> {
        if !robots.exists(&request.robot_id) {
            return Err(FleetError::RobotNotFound(request.robot_id));
        }

        let mission = Mission {
            id: format!("mission_{}", self.missions.len() + 1),
            robot_id: request.robot_id,
            mission_type: request.mission_type,
            objective: request.objective,
            destination: request.destination,
            status: MissionStatus::Pending,
            created_at: Utc::now(),
        };
        robots.assign_mission(&mission.robot_id, &mission.id)?;
        self.missions.push(mission.clone());
        Ok(mission)
    }

    /// Every mission, oldest first.
    pub fn list(&self) -> Vec<Mission> {
        self.missions.clone()
    }

    pub fn len(&self) -> usize {
        self.missions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.missions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pick_red_cube(robot_id: &str) -> NewMission {
        NewMission {
            robot_id: robot_id.to_string(),
            mission_type: "pick_object".to_string(),
            objective: "red_cube".to_string(),
            destination: Position::new(50.0, 50.0),
        }
    }

    #[test]
    fn create_assigns_sequential_ids_and_current_mission() {
        let mut robots = RobotRegistry::new();
        robots.connect("mbot_001", "Scout");
        let mut ledger = MissionLedger::new();

        let first = ledger.create(&mut robots, pick_red_cube("mbot_001")).unwrap();
        assert_eq!(first.id, "mission_1");
        assert_eq!(first.status, MissionStatus::Pending);
        assert_eq!(ledger.len(), 1);
        assert_eq!(
            robots.get("mbot_001").unwrap().current_mission.as_deref(),
            Some("mission_1")
        );

        let second = ledger.create(&mut robots, pick_red_cube("mbot_001")).unwrap();
        assert_eq!(second.id, "mission_2");
        assert_eq!(
            robots.get("mbot_001").unwrap().current_mission.as_deref(),
            Some("mission_2")
        );
    }

    #[test]
    fn create_for_unknown_robot_changes_nothing() {
        let mut robots = RobotRegistry::new();
        let mut ledger = MissionLedger::new();

        let err = ledger.create(&mut robots, pick_red_cube("ghost")).unwrap_err();

        assert_eq!(err, FleetError::RobotNotFound("ghost".to_string()));
        assert!(ledger.is_empty());
        assert!(robots.is_empty());
    }

    #[test]
    fn list_preserves_creation_order_across_robots() {
        let mut robots = RobotRegistry::new();
        robots.connect("a", "A");
        robots.connect("b", "B");
        let mut ledger = MissionLedger::new();

        ledger.create(&mut robots, pick_red_cube("b")).unwrap();
        ledger.create(&mut robots, pick_red_cube("a")).unwrap();

        let listed: Vec<(String, String)> = ledger
            .list()
            .into_iter()
            .map(|m| (m.id, m.robot_id))
            .collect();
        assert_eq!(
            listed,
            vec![
                ("mission_1".to_string(), "b".to_string()),
                ("mission_2".to_string(), "a".to_string()),
            ]
        );
    }
}
