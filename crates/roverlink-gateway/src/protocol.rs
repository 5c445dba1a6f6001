//! Wire formats shared by the HTTP API and the real-time channel.
//!
//! Inbound bodies are deliberately permissive: every field is optional at the
//! serde level and the gateway decides which absences are errors and which
//! fall back to defaults.
//!
//! Real-time frames are JSON text of the form
//! `{"event": "<name>", "data": {...}}`.
//!
//! | Direction | Event | Data |
//! |---|---|---|
//! | in | `join` | `{robot_id}` |
//! | in | `telemetry_realtime` | same fields as `POST /api/robot/telemetry` |
//! | in | `heartbeat` | `{robot_id}` |
//! | out | `server_ready` | `{message}` |
//! | out | `joined` | `{robot_id}` |
//! | out | `command` | [`Command`] |
//! | out | `new_mission` | [`Mission`] |
//! | out | `heartbeat_ok` | `{timestamp}` |
//! | out | `error` | `{error}` |

use chrono::{DateTime, Utc};
use roverlink_state::NewMission;
use roverlink_types::{
    Command, FleetError, Mission, Position, RobotState, SensorSnapshot, TelemetryRecord,
    clamp_battery,
};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Robot id used when a connect request does not name one.
pub const UNKNOWN_ROBOT_ID: &str = "unknown_robot";

/// Display name used when a connect request does not give one.
pub const UNNAMED_ROBOT: &str = "Unnamed robot";

/// Default page size of `GET /api/telemetry`.
pub const DEFAULT_TELEMETRY_LIMIT: usize = 50;

// ─────────────────────────────────────────────────────────────────────────────
// Inbound
// ─────────────────────────────────────────────────────────────────────────────

/// Body of `POST /api/robot/connect`.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ConnectRequest {
    #[serde(default)]
    pub robot_id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
}

/// One telemetry report, from either channel.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct TelemetryReport {
    #[serde(default)]
    pub robot_id: Option<String>,
    /// Cells may be integers, floats or booleans; an array that cannot be
    /// read is kept as an empty (unrecognised) pattern.
    #[serde(default, deserialize_with = "lenient_line_sensor")]
    pub line_sensor: Option<Vec<f64>>,
    #[serde(default)]
    pub distance: Option<f64>,
    #[serde(default)]
    pub battery: Option<f64>,
    #[serde(default)]
    pub color_detected: Option<String>,
    #[serde(default)]
    pub position: Option<Position>,
}

impl TelemetryReport {
    /// The reporting robot's id.
    ///
    /// # Errors
    ///
    /// [`FleetError::InvalidRequest`] when `robot_id` is absent or empty.
    pub fn robot_id(&self) -> Result<&str, FleetError> {
        required(self.robot_id.as_deref(), "robot_id")
    }

    /// Normalise the readings, replacing every absent field with its default
    /// (no line, far distance, full battery, no colour, origin).
    pub fn snapshot(&self) -> SensorSnapshot {
        let defaults = SensorSnapshot::default();
        SensorSnapshot {
            line_sensor: self.line_sensor.clone().unwrap_or(defaults.line_sensor),
            distance: self.distance.unwrap_or(defaults.distance),
            battery: self.battery.map(clamp_battery).unwrap_or(defaults.battery),
            color_detected: self.color_detected.clone(),
            position: self.position.unwrap_or(defaults.position),
        }
    }
}

/// Body of `POST /api/mission/create`.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct MissionRequest {
    #[serde(default)]
    pub robot_id: Option<String>,
    #[serde(default, rename = "type")]
    pub mission_type: Option<String>,
    #[serde(default)]
    pub objective: Option<String>,
    #[serde(default)]
    pub destination: Option<Position>,
}

impl MissionRequest {
    /// Validate that every required field is present.
    ///
    /// # Errors
    ///
    /// [`FleetError::InvalidRequest`] naming the first missing field.
    pub fn into_new_mission(self) -> Result<NewMission, FleetError> {
        let robot_id = required(self.robot_id.as_deref(), "robot_id")?.to_string();
        let mission_type = required(self.mission_type.as_deref(), "type")?.to_string();
        let objective = required(self.objective.as_deref(), "objective")?.to_string();
        let destination = self
            .destination
            .ok_or_else(|| FleetError::InvalidRequest("missing field `destination`".to_string()))?;
        Ok(NewMission {
            robot_id,
            mission_type,
            objective,
            destination,
        })
    }
}

/// Data of the real-time `heartbeat` and `join` events.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RobotRef {
    #[serde(default)]
    pub robot_id: Option<String>,
}

/// Query string of `GET /api/telemetry`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TelemetryQuery {
    /// Empty or non-numeric values fall back to the default page size.
    #[serde(default, alias = "limite", deserialize_with = "lenient_limit")]
    pub limit: Option<usize>,
    #[serde(default)]
    pub robot_id: Option<String>,
}

/// Events a robot sends over its real-time session.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ClientEvent {
    /// Bind this session to a robot id so missions can be pushed to it.
    Join(RobotRef),
    /// Sensor report; answered with a `command` event.
    TelemetryRealtime(TelemetryReport),
    /// Keep-alive; answered with `heartbeat_ok`.  The data is optional.
    Heartbeat(Option<RobotRef>),
}

impl ClientEvent {
    /// Parse one real-time text frame.  A frame without `data` is read as
    /// if it carried `"data": null`.
    pub fn from_frame(text: &str) -> Result<Self, serde_json::Error> {
        let mut frame: Value = serde_json::from_str(text)?;
        if let Value::Object(fields) = &mut frame {
            fields.entry("data").or_insert(Value::Null);
        }
        serde_json::from_value(frame)
    }

    /// Robot id carried by the event, if any.
    pub fn robot_id(&self) -> Option<&str> {
        let id = match self {
            ClientEvent::Join(r) => r.robot_id.as_deref(),
            ClientEvent::Heartbeat(r) => r.as_ref().and_then(|r| r.robot_id.as_deref()),
            ClientEvent::TelemetryRealtime(t) => t.robot_id.as_deref(),
        };
        id.filter(|s| !s.is_empty())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Outbound
// ─────────────────────────────────────────────────────────────────────────────

/// Events the server pushes over a real-time session.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ServerEvent {
    ServerReady { message: String },
    Joined { robot_id: String },
    Command(Command),
    NewMission(Mission),
    HeartbeatOk { timestamp: DateTime<Utc> },
    Error { error: String },
}

impl ServerEvent {
    /// Wire name of the event.
    pub fn name(&self) -> &'static str {
        match self {
            ServerEvent::ServerReady { .. } => "server_ready",
            ServerEvent::Joined { .. } => "joined",
            ServerEvent::Command(_) => "command",
            ServerEvent::NewMission(_) => "new_mission",
            ServerEvent::HeartbeatOk { .. } => "heartbeat_ok",
            ServerEvent::Error { .. } => "error",
        }
    }
}

impl From<FleetError> for ServerEvent {
    fn from(err: FleetError) -> Self {
        ServerEvent::Error {
            error: err.to_string(),
        }
    }
}

/// Reply to `POST /api/robot/connect`.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ConnectReply {
    pub success: bool,
    pub message: String,
    pub robot_id: String,
}

/// Reply to `POST /api/robot/telemetry`.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct TelemetryReply {
    pub success: bool,
    pub command: Command,
}

/// Reply to `POST /api/mission/create`.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct MissionReply {
    pub success: bool,
    pub mission: Mission,
}

/// Reply to `GET /api/robots`.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RobotList {
    pub total: usize,
    pub robots: Vec<RobotState>,
}

/// Reply to `GET /api/missions`.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MissionList {
    pub total: usize,
    pub missions: Vec<Mission>,
}

/// Reply to `GET /api/telemetry`.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TelemetryPage {
    pub total: usize,
    pub data: Vec<TelemetryRecord>,
}

/// Reply to `GET /health`.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct HealthReply {
    pub status: String,
    pub timestamp: DateTime<Utc>,
}

/// Reply to `GET /`.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StatusSummary {
    pub server: String,
    pub status: String,
    pub version: String,
    pub robots_connected: usize,
    pub missions: usize,
    pub realtime_sessions: usize,
    pub timestamp: DateTime<Utc>,
    pub endpoints: Vec<String>,
}

/// Body of every 4xx reply.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ErrorReply {
    pub error: String,
}

fn lenient_line_sensor<'de, D>(deserializer: D) -> Result<Option<Vec<f64>>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<Value>::deserialize(deserializer)?;
    Ok(raw.map(|value| line_cells(&value).unwrap_or_default()))
}

fn lenient_limit<'de, D>(deserializer: D) -> Result<Option<usize>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<Value>::deserialize(deserializer)?;
    Ok(raw.and_then(|value| match value {
        Value::Number(n) => n.as_u64().and_then(|n| usize::try_from(n).ok()),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }))
}

fn line_cells(value: &Value) -> Option<Vec<f64>> {
    value
        .as_array()?
        .iter()
        .map(|cell| match cell {
            Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            other => other.as_f64(),
        })
        .collect()
}

fn required<'a>(value: Option<&'a str>, field: &str) -> Result<&'a str, FleetError> {
    match value {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(FleetError::InvalidRequest(format!("missing field `{field}`"))),
    }
}
