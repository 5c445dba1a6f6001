//! [`ApiServer`] – request/response surface of the gateway (axum).
//!
//! | Method | Path | Handler |
//! |---|---|---|
//! | GET | `/` | status summary |
//! | GET | `/health` | liveness probe |
//! | POST | `/api/robot/connect` | [`Gateway::connect`] |
//! | POST | `/api/robot/telemetry` | [`Gateway::ingest_telemetry`] |
//! | POST | `/api/mission/create` | [`Gateway::create_mission`] |
//! | GET | `/api/robots` | [`Gateway::robots`] |
//! | GET | `/api/missions` | [`Gateway::missions`] |
//! | GET | `/api/telemetry?limit=&robot_id=` | [`Gateway::telemetry`] |
//!
//! Every client error is answered with `400 {"error": "..."}`, including
//! malformed JSON bodies and query strings.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, post};
use roverlink_types::FleetError;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::dispatch::Gateway;
use crate::protocol::{
    ConnectReply, ConnectRequest, DEFAULT_TELEMETRY_LIMIT, ErrorReply, HealthReply, MissionList,
    MissionReply, MissionRequest, RobotList, StatusSummary, TelemetryPage, TelemetryQuery,
    TelemetryReply, TelemetryReport,
};

/// Default TCP port of the HTTP API.
pub const DEFAULT_HTTP_PORT: u16 = 5000;

// ---------------------------------------------------------------------------
// ApiServer
// ---------------------------------------------------------------------------

/// HTTP API server backed by a shared [`Gateway`].
pub struct ApiServer {
    gateway: Arc<Gateway>,
    addr: SocketAddr,
}

impl ApiServer {
    /// Server on `0.0.0.0:`[`DEFAULT_HTTP_PORT`].
    pub fn new(gateway: Arc<Gateway>) -> Self {
        Self {
            gateway,
            addr: SocketAddr::from(([0, 0, 0, 0], DEFAULT_HTTP_PORT)),
        }
    }

    /// Override the listening address (builder-style).
    pub fn with_addr(mut self, addr: SocketAddr) -> Self {
        self.addr = addr;
        self
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Bind and serve until the process stops.
    ///
    /// # Errors
    ///
    /// Returns [`FleetError::Transport`] if the listener cannot bind or the
    /// server loop fails.
    pub async fn run(self) -> Result<(), FleetError> {
        let listener = TcpListener::bind(self.addr)
            .await
            .map_err(|e| FleetError::Transport(format!("HTTP bind error on {}: {e}", self.addr)))?;
        info!(addr = %self.addr, "HTTP API listening");
        serve(listener, self.gateway).await
    }
}

/// Serve the API on an already-bound listener.
pub async fn serve(listener: TcpListener, gateway: Arc<Gateway>) -> Result<(), FleetError> {
    axum::serve(listener, router(gateway))
        .await
        .map_err(|e| FleetError::Transport(format!("HTTP server error: {e}")))
}

/// Build the axum router.
pub fn router(gateway: Arc<Gateway>) -> Router {
    Router::new()
        .route("/", get(status_handler))
        .route("/health", get(health_handler))
        .route("/api/robot/connect", post(connect_handler))
        .route("/api/robot/telemetry", post(telemetry_handler))
        .route("/api/mission/create", post(mission_handler))
        .route("/api/robots", get(robots_handler))
        .route("/api/missions", get(missions_handler))
        .route("/api/telemetry", get(telemetry_history_handler))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(gateway)
}

// ---------------------------------------------------------------------------
// Error mapping
// ---------------------------------------------------------------------------

/// [`FleetError`] rendered as `400 {"error": ...}`.
#[derive(Debug)]
pub struct ApiError(pub FleetError);

impl From<FleetError> for ApiError {
    fn from(err: FleetError) -> Self {
        Self(err)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self(FleetError::InvalidRequest(rejection.body_text()))
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        Self(FleetError::InvalidRequest(rejection.body_text()))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        warn!(error = %self.0, "request rejected");
        let body = ErrorReply {
            error: self.0.to_string(),
        };
        (StatusCode::BAD_REQUEST, Json(body)).into_response()
    }
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

type Shared = State<Arc<Gateway>>;

async fn status_handler(State(gw): Shared) -> Json<StatusSummary> {
    Json(gw.status())
}

async fn health_handler(State(gw): Shared) -> Json<HealthReply> {
    Json(gw.health())
}

async fn connect_handler(
    State(gw): Shared,
    body: Result<Json<ConnectRequest>, JsonRejection>,
) -> Result<Json<ConnectReply>, ApiError> {
    let Json(request) = body?;
    Ok(Json(gw.connect(request)))
}

async fn telemetry_handler(
    State(gw): Shared,
    body: Result<Json<TelemetryReport>, JsonRejection>,
) -> Result<Json<TelemetryReply>, ApiError> {
    let Json(report) = body?;
    let command = gw.ingest_telemetry(&report)?;
    Ok(Json(TelemetryReply {
        success: true,
        command,
    }))
}

async fn mission_handler(
    State(gw): Shared,
    body: Result<Json<MissionRequest>, JsonRejection>,
) -> Result<Json<MissionReply>, ApiError> {
    let Json(request) = body?;
    let mission = gw.create_mission(request)?;
    Ok(Json(MissionReply {
        success: true,
        mission,
    }))
}

async fn robots_handler(State(gw): Shared) -> Json<RobotList> {
    Json(gw.robots())
}

async fn missions_handler(State(gw): Shared) -> Json<MissionList> {
    Json(gw.missions())
}

async fn telemetry_history_handler(
    State(gw): Shared,
    query: Result<Query<TelemetryQuery>, QueryRejection>,
) -> Result<Json<TelemetryPage>, ApiError> {
    let Query(query) = query?;
    let limit = query.limit.unwrap_or(DEFAULT_TELEMETRY_LIMIT);
    let robot_id = query.robot_id.as_deref().filter(|id| !id.is_empty());
    Ok(Json(gw.telemetry(limit, robot_id)))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
