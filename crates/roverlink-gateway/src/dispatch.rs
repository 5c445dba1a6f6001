//! [`Gateway`] – the single entry point for every inbound operation.
//!
//! Both transports (the HTTP API and the real-time WebSocket channel) call
//! into the same [`Gateway`] methods, so a telemetry report is validated,
//! stored and answered identically whichever way it arrives.
//!
//! # Serialization
//!
//! All mutable fleet state lives in one [`FleetState`] behind one
//! [`parking_lot::Mutex`].  Each operation takes the lock once, mutates, and
//! releases it before doing anything else (deciding, logging, pushing to a
//! session).  The lock is never held across an `.await`.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use roverlink_decision::DecisionEngine;
use roverlink_state::{DEFAULT_CAPACITY, FleetState};
use roverlink_types::{Action, Command, FleetError, Mission, TelemetryRecord};
use tracing::{debug, info, warn};

use crate::protocol::{
    ConnectReply, ConnectRequest, HealthReply, MissionList, MissionRequest, RobotList,
    ServerEvent, StatusSummary, TelemetryPage, TelemetryReport, UNKNOWN_ROBOT_ID, UNNAMED_ROBOT,
};
use crate::sessions::SessionHub;

/// Human-readable server name reported by `GET /`.
pub const SERVER_NAME: &str = "Roverlink fleet server";

/// Endpoint list reported by `GET /`.
pub const ENDPOINTS: &[&str] = &[
    "GET  / - server status",
    "GET  /health - liveness probe",
    "POST /api/robot/connect - register a robot",
    "POST /api/robot/telemetry - push telemetry, receive a command",
    "POST /api/mission/create - create a mission",
    "GET  /api/robots - list robots",
    "GET  /api/missions - list missions",
    "GET  /api/telemetry - telemetry history",
];

/// Shared dispatch gateway.  Wrap in an [`Arc`](std::sync::Arc) and hand a
/// clone to each transport.
pub struct Gateway {
    state: Mutex<FleetState>,
    engine: DecisionEngine,
    sessions: SessionHub,
}

impl Gateway {
    /// Gateway with the standard decision rules and a telemetry ledger of
    /// `telemetry_capacity` records.
    pub fn new(telemetry_capacity: usize) -> Self {
        Self::with_engine(telemetry_capacity, DecisionEngine::standard())
    }

    /// Gateway with a custom decision engine.
    pub fn with_engine(telemetry_capacity: usize, engine: DecisionEngine) -> Self {
        Self {
            state: Mutex::new(FleetState::with_telemetry_capacity(telemetry_capacity)),
            engine,
            sessions: SessionHub::new(),
        }
    }

    /// Real-time session registry.
    pub fn sessions(&self) -> &SessionHub {
        &self.sessions
    }

    // ─────────────────────────────────────────────────────────────────────
    // Mutating operations
    // ─────────────────────────────────────────────────────────────────────

    /// Register (or re-register) a robot.  Always succeeds.
    pub fn connect(&self, request: ConnectRequest) -> ConnectReply {
        let robot_id = request
            .robot_id
            .filter(|id| !id.is_empty())
            .unwrap_or_else(|| UNKNOWN_ROBOT_ID.to_string());
        let name = request.name.unwrap_or_else(|| UNNAMED_ROBOT.to_string());

        let (robot, total) = {
            let mut state = self.state.lock();
            let robot = state.robots.connect(&robot_id, &name);
            (robot, state.robots.len())
        };

        info!(robot_id = %robot.id, name = %robot.name, total, "robot connected");
        ConnectReply {
            success: true,
            message: format!("Robot {} connected successfully", robot.id),
            robot_id: robot.id,
        }
    }

    /// Store a telemetry report and compute the robot's next command.
    ///
    /// # Errors
    ///
    /// * [`FleetError::InvalidRequest`] when the report carries no robot id.
    /// * [`FleetError::RobotNotFound`] when the robot is not registered.
    ///
    /// On error neither the registry nor the ledger is modified.
    pub fn ingest_telemetry(&self, report: &TelemetryReport) -> Result<Command, FleetError> {
        let robot_id = report.robot_id()?;
        let snapshot = report.snapshot();

        {
            let mut state = self.state.lock();
            state
                .robots
                .update_telemetry(robot_id, snapshot.battery, snapshot.position)?;
            state
                .telemetry
                .append(TelemetryRecord::new(robot_id, snapshot.clone()));
        }

        let command = self.engine.decide(&snapshot);
        if command.action == Action::Stop {
            warn!(robot_id, distance = snapshot.distance, "obstacle detected");
        }
        info!(
            robot_id,
            distance = snapshot.distance,
            battery = snapshot.battery,
            action = ?command.action,
            "telemetry ingested"
        );
        Ok(command)
    }

    /// Create a mission and notify the target robot's real-time session, if
    /// it has one.
    ///
    /// # Errors
    ///
    /// * [`FleetError::InvalidRequest`] when a required field is missing.
    /// * [`FleetError::RobotNotFound`] when the robot is not registered.
    pub fn create_mission(&self, request: MissionRequest) -> Result<Mission, FleetError> {
        let new_mission = request.into_new_mission()?;

        let mission = {
            let mut state = self.state.lock();
            let FleetState {
                robots, missions, ..
            } = &mut *state;
            missions.create(robots, new_mission)?
        };

        let notified = self
            .sessions
            .push(&mission.robot_id, ServerEvent::NewMission(mission.clone()));
        info!(
            mission_id = %mission.id,
            robot_id = %mission.robot_id,
            mission_type = %mission.mission_type,
            notified,
            "mission created"
        );
        Ok(mission)
    }

    /// Refresh a robot's last-seen time.  Unknown or absent ids are accepted
    /// and simply not recorded; the acknowledgement time is returned either
    /// way.
    pub fn heartbeat(&self, robot_id: Option<&str>) -> DateTime<Utc> {
        let known = match robot_id {
            Some(id) => self.state.lock().robots.touch(id),
            None => false,
        };
        debug!(robot_id = robot_id.unwrap_or(""), known, "heartbeat");
        Utc::now()
    }

    // ─────────────────────────────────────────────────────────────────────
    // Reads
    // ─────────────────────────────────────────────────────────────────────

    pub fn robots(&self) -> RobotList {
        let robots = self.state.lock().robots.get_all();
        RobotList {
            total: robots.len(),
            robots,
        }
    }

    pub fn missions(&self) -> MissionList {
        let missions = self.state.lock().missions.list();
        MissionList {
            total: missions.len(),
            missions,
        }
    }

    /// Most recent `limit` records of the fleet, then filtered to `robot_id`.
    pub fn telemetry(&self, limit: usize, robot_id: Option<&str>) -> TelemetryPage {
        let data = self.state.lock().telemetry.query(limit, robot_id);
        TelemetryPage {
            total: data.len(),
            data,
        }
    }

    /// Whether `robot_id` is registered.
    pub fn is_registered(&self, robot_id: &str) -> bool {
        self.state.lock().robots.exists(robot_id)
    }

    pub fn health(&self) -> HealthReply {
        HealthReply {
            status: "OK".to_string(),
            timestamp: Utc::now(),
        }
    }

    pub fn status(&self) -> StatusSummary {
        let (robots, missions) = {
            let state = self.state.lock();
            (state.robots.len(), state.missions.len())
        };
        StatusSummary {
            server: SERVER_NAME.to_string(),
            status: "online".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            robots_connected: robots,
            missions,
            realtime_sessions: self.sessions.len(),
            timestamp: Utc::now(),
            endpoints: ENDPOINTS.iter().map(|e| e.to_string()).collect(),
        }
    }
}

impl Default for Gateway {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}
