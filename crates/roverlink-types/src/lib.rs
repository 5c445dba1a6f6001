use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Battery level assumed when a report omits it.
pub const FULL_BATTERY: f64 = 100.0;

/// Obstacle distance (cm) assumed when a report omits it: far enough that no
/// obstacle rule fires.
pub const FAR_DISTANCE_CM: f64 = 100.0;

/// 2D coordinate on the robot's working surface.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Position {
    #[serde(default)]
    pub x: f64,
    #[serde(default)]
    pub y: f64,
}

impl Position {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Connectivity status of a registered robot.
///
/// Registry entries are never removed, so `Connected` is the only status the
/// server assigns today.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionStatus {
    Connected,
}

/// Live state of one registered robot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RobotState {
    /// Caller-chosen identifier (e.g. `"mbot_001"`).
    pub id: String,
    /// Display name.
    pub name: String,
    pub status: ConnectionStatus,
    /// First-seen timestamp, reset on every reconnect.
    pub connected_since: DateTime<Utc>,
    /// Last-seen timestamp, refreshed by telemetry and heartbeats.
    pub last_update: DateTime<Utc>,
    /// Battery level, 0–100.
    pub battery: f64,
    pub position: Position,
    /// Id of the mission most recently assigned to this robot.
    pub current_mission: Option<String>,
}

/// Normalised sensor readings carried by one telemetry report.
///
/// Absent fields have already been replaced by their permissive defaults, so
/// the decision rules never see a missing value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorSnapshot {
    /// Four line-follower photodiodes, left to right (`0` = no line, `1` = line).
    /// Empty when the report carried an array that could not be read.
    pub line_sensor: Vec<f64>,
    /// Ultrasonic obstacle distance in centimetres.
    pub distance: f64,
    /// Battery level, 0–100.
    pub battery: f64,
    /// Colour tag reported by the colour sensor, if any (e.g. `"red"`).
    pub color_detected: Option<String>,
    pub position: Position,
}

impl Default for SensorSnapshot {
    fn default() -> Self {
        Self {
            line_sensor: vec![0.0; 4],
            distance: FAR_DISTANCE_CM,
            battery: FULL_BATTERY,
            color_detected: None,
            position: Position::default(),
        }
    }
}

/// Immutable entry of the telemetry ledger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetryRecord {
    pub robot_id: String,
    pub timestamp: DateTime<Utc>,
    #[serde(flatten)]
    pub snapshot: SensorSnapshot,
}

impl TelemetryRecord {
    /// Stamp `snapshot` with the current UTC time.
    pub fn new(robot_id: impl Into<String>, snapshot: SensorSnapshot) -> Self {
        Self {
            robot_id: robot_id.into(),
            timestamp: Utc::now(),
            snapshot,
        }
    }
}

/// Lifecycle state of a mission.
///
/// Missions are created `Pending`; nothing in the server moves them further.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissionStatus {
    Pending,
}

/// An operator-issued goal assigned to one robot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Mission {
    /// Sequential id, `mission_<n>`.
    pub id: String,
    pub robot_id: String,
    /// Free-form tag, e.g. `"pick_object"`.
    #[serde(rename = "type")]
    pub mission_type: String,
    /// What the robot should act on, e.g. `"red_cube"`.
    pub objective: String,
    pub destination: Position,
    pub status: MissionStatus,
    pub created_at: DateTime<Utc>,
}

/// High-level action of a motion command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    Continue,
    Stop,
    SlowDown,
    GrabObject,
    ReturnToBase,
}

/// Steering direction of a motion command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Heading {
    Forward,
    Left,
    Right,
}

/// Motion/actuation instruction computed from one sensor snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Command {
    pub action: Action,
    /// Motor speed, 0–100.
    pub speed: u8,
    pub heading: Heading,
    /// Steering correction in degrees.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub turn: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alert: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl Default for Command {
    fn default() -> Self {
        Self {
            action: Action::Continue,
            speed: 100,
            heading: Heading::Forward,
            turn: None,
            alert: None,
            message: None,
        }
    }
}

/// Clamp a raw battery reading into `0..=100` without rounding it.
///
/// Non-finite readings are treated as a full battery, matching the default
/// applied to absent readings.
pub fn clamp_battery(raw: f64) -> f64 {
    if !raw.is_finite() {
        return FULL_BATTERY;
    }
    raw.clamp(0.0, FULL_BATTERY)
}

/// Error type shared by the state, gateway and server crates.
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FleetError {
    #[error("Robot not connected: {0}")]
    RobotNotFound(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Transport error: {0}")]
    Transport(String),
}
