//! `roverlink-gateway` – The Dispatch Gateway
//!
//! Boundary between robots/operators and the fleet state.  Exposes two
//! transports that share one [`Gateway`]:
//!
//! 1. **HTTP API** ([`http`], axum, default port `5000`) – connect robots,
//!    push telemetry and receive a command, create missions, list robots,
//!    missions and telemetry history.
//!
//! 2. **Real-time channel** ([`realtime`], WebSocket, default port `5001`) –
//!    persistent per-robot sessions carrying `telemetry_realtime` →
//!    `command`, `heartbeat` → `heartbeat_ok`, and out-of-band `new_mission`
//!    pushes.
//!
//! # Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use roverlink_gateway::{ApiServer, Gateway, RealtimeServer};
//!
//! #[tokio::main]
//! async fn main() {
//!     let gateway = Arc::new(Gateway::default());
//!     let api = ApiServer::new(Arc::clone(&gateway));
//!     let realtime = RealtimeServer::new(Arc::clone(&gateway));
//!     let _ = tokio::join!(api.run(), realtime.run());
//! }
//! ```

pub mod dispatch;
pub mod http;
pub mod protocol;
pub mod realtime;
pub mod sessions;

pub use dispatch::Gateway;
pub use http::{ApiServer, DEFAULT_HTTP_PORT};
pub use protocol::{ClientEvent, ServerEvent};
pub use realtime::{DEFAULT_REALTIME_PORT, RealtimeServer};
pub use sessions::SessionHub;
