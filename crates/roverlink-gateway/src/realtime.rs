//! [`RealtimeServer`] – persistent WebSocket channel for robots.
//!
//! Listens on `0.0.0.0:5001` (configurable via [`RealtimeServer::with_addr`]).
//!
//! * On open the server sends `server_ready`.
//! * `join{robot_id}` binds the connection to a robot so that
//!   `new_mission` events can be pushed to it.  Any other event carrying a
//!   registered robot id binds an unbound connection implicitly.
//! * `telemetry_realtime` goes through [`Gateway::ingest_telemetry`]; the
//!   resulting `command` is sent to the caller only.
//! * `heartbeat` is always answered with `heartbeat_ok`.
//!
//! When the socket closes the robot's session is released.  Its registry
//! entry stays.

use std::net::SocketAddr;
use std::sync::Arc;

use futures_util::{Sink, SinkExt, StreamExt};
use roverlink_types::FleetError;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_tungstenite::{accept_async, tungstenite::Message};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::dispatch::Gateway;
use crate::protocol::{ClientEvent, ServerEvent};
use crate::sessions::SESSION_BUFFER;

/// Default TCP port of the real-time channel.
pub const DEFAULT_REALTIME_PORT: u16 = 5001;

// ---------------------------------------------------------------------------
// RealtimeServer
// ---------------------------------------------------------------------------

/// WebSocket server bridging robots' persistent sessions to the [`Gateway`].
pub struct RealtimeServer {
    gateway: Arc<Gateway>,
    addr: SocketAddr,
}

impl RealtimeServer {
    /// Server on `0.0.0.0:`[`DEFAULT_REALTIME_PORT`].
    pub fn new(gateway: Arc<Gateway>) -> Self {
        Self {
            gateway,
            addr: SocketAddr::from(([0, 0, 0, 0], DEFAULT_REALTIME_PORT)),
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

    /// Bind and accept connections until the process stops.
    ///
    /// # Errors
    ///
    /// Returns [`FleetError::Transport`] if the TCP listener cannot bind.
    pub async fn run(self) -> Result<(), FleetError> {
        let listener = TcpListener::bind(self.addr).await.map_err(|e| {
            FleetError::Transport(format!("real-time bind error on {}: {e}", self.addr))
        })?;
        info!(addr = %self.addr, "real-time channel listening");
        serve(listener, self.gateway).await;
        Ok(())
    }
}

/// Accept WebSocket connections on an already-bound listener, forever.
pub async fn serve(listener: TcpListener, gateway: Arc<Gateway>) {
    loop {
        match listener.accept().await {
            Ok((stream, peer)) => {
                let gateway = Arc::clone(&gateway);
                tokio::spawn(async move {
                    if let Err(e) = handle_ws(stream, peer, gateway).await {
                        warn!(%peer, error = %e, "real-time client error");
                    }
                });
            }
            Err(e) => {
                warn!(error = %e, "real-time accept error");
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Per-connection handler
// ---------------------------------------------------------------------------

/// State of one WebSocket connection.
pub(crate) struct Connection {
    id: Uuid,
    tx: mpsc::Sender<ServerEvent>,
    robot_id: Option<String>,
}

impl Connection {
    pub(crate) fn new(tx: mpsc::Sender<ServerEvent>) -> Self {
        Self {
            id: Uuid::new_v4(),
            tx,
            robot_id: None,
        }
    }

    fn bind(&mut self, gateway: &Gateway, robot_id: &str) {
        if self.robot_id.as_deref() == Some(robot_id) {
            return;
        }
        if let Some(previous) = self.robot_id.take() {
            gateway.sessions().release(&previous, self.id);
        }
        gateway.sessions().bind(robot_id, self.id, self.tx.clone());
        self.robot_id = Some(robot_id.to_string());
        info!(robot_id, connection = %self.id, "real-time session joined");
    }

    fn release(&mut self, gateway: &Gateway) {
        if let Some(robot_id) = self.robot_id.take()
            && gateway.sessions().release(&robot_id, self.id)
        {
            info!(robot_id = %robot_id, connection = %self.id, "real-time session left");
        }
    }
}

async fn handle_ws(
    stream: TcpStream,
    peer: SocketAddr,
    gateway: Arc<Gateway>,
) -> Result<(), FleetError> {
    let ws_stream = accept_async(stream)
        .await
        .map_err(|e| FleetError::Transport(format!("WS handshake from {peer}: {e}")))?;
    debug!(%peer, "real-time client connected");

    let (mut ws_tx, mut ws_rx) = ws_stream.split();
    let (tx, mut rx) = mpsc::channel(SESSION_BUFFER);
    let mut conn = Connection::new(tx);

    let ready = ServerEvent::ServerReady {
        message: "Connection established".to_string(),
    };
    send_event(&mut ws_tx, &ready).await?;

    let result = loop {
        tokio::select! {
            // ── Downstream: replies and pushes → robot ───────────────────────
            Some(event) = rx.recv() => {
                if let Err(e) = send_event(&mut ws_tx, &event).await {
                    break Err(e);
                }
            }
            // ── Upstream: robot → gateway ────────────────────────────────────
            msg = ws_rx.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        let reply = handle_client_message(text.as_str(), &mut conn, &gateway);
                        if let Err(e) = send_event(&mut ws_tx, &reply).await {
                            break Err(e);
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => break Ok(()),
                    Some(Err(e)) => break Err(FleetError::Transport(format!("WS read from {peer}: {e}"))),
                    _ => {}
                }
            }
        }
    };

    conn.release(&gateway);
    debug!(%peer, "real-time client disconnected");
    result
}

async fn send_event<S>(ws_tx: &mut S, event: &ServerEvent) -> Result<(), FleetError>
where
    S: Sink<Message> + Unpin,
    S::Error: std::fmt::Display,
{
    let json = serde_json::to_string(event)
        .map_err(|e| FleetError::Transport(format!("event serialization: {e}")))?;
    ws_tx
        .send(Message::Text(json.into()))
        .await
        .map_err(|e| FleetError::Transport(format!("WS write: {e}")))
}

// ---------------------------------------------------------------------------
// Upstream message dispatch
// ---------------------------------------------------------------------------

/// Parse one inbound text frame, run it through the gateway and return the
/// reply for the caller.
pub(crate) fn handle_client_message(
    text: &str,
    conn: &mut Connection,
    gateway: &Gateway,
) -> ServerEvent {
    let event = match ClientEvent::from_frame(text) {
        Ok(event) => event,
        Err(e) => {
            warn!(connection = %conn.id, error = %e, "malformed real-time event");
            return FleetError::InvalidRequest(format!("malformed event: {e}")).into();
        }
    };

    match event {
        ClientEvent::Join(robot) => match robot.robot_id.as_deref().filter(|id| !id.is_empty()) {
            Some(robot_id) => {
                conn.bind(gateway, robot_id);
                ServerEvent::Joined {
                    robot_id: robot_id.to_string(),
                }
            }
            None => FleetError::InvalidRequest("missing field `robot_id`".to_string()).into(),
        },
        ClientEvent::TelemetryRealtime(report) => match gateway.ingest_telemetry(&report) {
            Ok(command) => {
                bind_if_unbound(conn, gateway, report.robot_id.as_deref());
                ServerEvent::Command(command)
            }
            Err(e) => {
                warn!(connection = %conn.id, error = %e, "real-time telemetry rejected");
                e.into()
            }
        },
        ClientEvent::Heartbeat(robot) => {
            let robot_id = robot
                .as_ref()
                .and_then(|r| r.robot_id.as_deref())
                .filter(|id| !id.is_empty());
            let timestamp = gateway.heartbeat(robot_id);
            if robot_id.is_some_and(|id| gateway.is_registered(id)) {
                bind_if_unbound(conn, gateway, robot_id);
            }
            ServerEvent::HeartbeatOk { timestamp }
        }
    }
}

fn bind_if_unbound(conn: &mut Connection, gateway: &Gateway, robot_id: Option<&str>) {
    if conn.robot_id.is_none()
        && let Some(robot_id) = robot_id
    {
        conn.bind(gateway, robot_id);
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::ConnectRequest;
    use roverlink_types::Action;

    fn gateway_with(robot_id: &str) -> Gateway {
        let gw = Gateway::default();
        gw.connect(ConnectRequest {
            robot_id: Some(robot_id.to_string()),
            name: None,
        });
        gw
    }

    fn conn() -> (Connection, mpsc::Receiver<ServerEvent>) {
        let (tx, rx) = mpsc::channel(SESSION_BUFFER);
        (Connection::new(tx), rx)
    }

    #[test]
    fn default_addr_uses_port_5001() {
        let server = RealtimeServer::new(Arc::new(Gateway::default()));
        assert_eq!(server.addr().port(), DEFAULT_REALTIME_PORT);
    }

    #[test]
    fn join_binds_session() {
        let gw = gateway_with("mbot_001");
        let (mut c, _rx) = conn();

        let reply = handle_client_message(
            r#"{"event":"join","data":{"robot_id":"mbot_001"}}"#,
            &mut c,
            &gw,
        );

        assert_eq!(
            reply,
            ServerEvent::Joined {
                robot_id: "mbot_001".to_string()
            }
        );
        assert!(gw.sessions().is_active("mbot_001"));
    }

    #[test]
    fn realtime_telemetry_replies_with_command_and_stores_record() {
        let gw = gateway_with("mbot_001");
        let (mut c, _rx) = conn();

        let reply = handle_client_message(
            r#"{"event":"telemetry_realtime","data":{"robot_id":"mbot_001","distance":20,"battery":50}}"#,
            &mut c,
            &gw,
        );

        match reply {
            ServerEvent::Command(cmd) => assert_eq!(cmd.action, Action::SlowDown),
            other => panic!("expected command, got {other:?}"),
        }
        assert_eq!(gw.telemetry(50, Some("mbot_001")).total, 1);
        assert_eq!(gw.robots().robots[0].battery, 50.0);
        // First telemetry from a registered robot binds the session.
        assert!(gw.sessions().is_active("mbot_001"));
    }

    #[test]
    fn realtime_telemetry_for_unknown_robot_is_an_error_event() {
        let gw = Gateway::default();
        let (mut c, _rx) = conn();

        let reply = handle_client_message(
            r#"{"event":"telemetry_realtime","data":{"robot_id":"ghost","distance":5}}"#,
            &mut c,
            &gw,
        );

        assert!(matches!(reply, ServerEvent::Error { .. }));
        assert_eq!(gw.telemetry(1000, None).total, 0);
        assert_eq!(gw.robots().total, 0);
        assert!(!gw.sessions().is_active("ghost"));
    }

    #[test]
    fn heartbeat_is_acknowledged_for_unknown_robot() {
        let gw = Gateway::default();
        let (mut c, _rx) = conn();

        let reply = handle_client_message(
            r#"{"event":"heartbeat","data":{"robot_id":"ghost"}}"#,
            &mut c,
            &gw,
        );

        assert!(matches!(reply, ServerEvent::HeartbeatOk { .. }));
        assert!(gw.sessions().is_empty());

        for frame in [r#"{"event":"heartbeat"}"#, r#"{"event":"heartbeat","data":null}"#] {
            let reply = handle_client_message(frame, &mut c, &gw);
            assert!(matches!(reply, ServerEvent::HeartbeatOk { .. }), "{frame}");
        }
        assert!(gw.sessions().is_empty());
    }

    #[test]
    fn realtime_telemetry_accepts_float_line_sensor() {
        let gw = gateway_with("mbot_001");
        let (mut c, _rx) = conn();

        let reply = handle_client_message(
            r#"{"event":"telemetry_realtime","data":{"robot_id":"mbot_001","line_sensor":[1.0,1.0,0.0,0.0]}}"#,
            &mut c,
            &gw,
        );

        match reply {
            ServerEvent::Command(cmd) => assert_eq!(cmd.heading, roverlink_types::Heading::Right),
            other => panic!("expected command, got {other:?}"),
        }
    }

    #[test]
    fn heartbeat_binds_known_robot() {
        let gw = gateway_with("mbot_001");
        let (mut c, _rx) = conn();
        handle_client_message(
            r#"{"event":"heartbeat","data":{"robot_id":"mbot_001"}}"#,
            &mut c,
            &gw,
        );
        assert!(gw.sessions().is_active("mbot_001"));
    }

    #[test]
    fn malformed_and_unknown_events_yield_error() {
        let gw = Gateway::default();
        let (mut c, _rx) = conn();
        assert!(matches!(
            handle_client_message("not json at all", &mut c, &gw),
            ServerEvent::Error { .. }
        ));
        assert!(matches!(
            handle_client_message(r#"{"event":"dance","data":{}}"#, &mut c, &gw),
            ServerEvent::Error { .. }
        ));
    }

    #[test]
    fn release_unbinds_only_own_session() {
        let gw = gateway_with("mbot_001");
        let (mut first, _rx1) = conn();
        let (mut second, _rx2) = conn();
        let join = r#"{"event":"join","data":{"robot_id":"mbot_001"}}"#;

        handle_client_message(join, &mut first, &gw);
        handle_client_message(join, &mut second, &gw);
        first.release(&gw);

        assert!(gw.sessions().is_active("mbot_001"));
        second.release(&gw);
        assert!(!gw.sessions().is_active("mbot_001"));
        // The registry entry survives the dropped session.
        assert_eq!(gw.robots().total, 1);
    }

    #[tokio::test]
    async fn mission_push_reaches_joined_connection_queue() {
        let gw = gateway_with("mbot_001");
        let (mut c, mut rx) = conn();
        handle_client_message(
            r#"{"event":"join","data":{"robot_id":"mbot_001"}}"#,
            &mut c,
            &gw,
        );

        let mission = gw
            .create_mission(crate::protocol::MissionRequest {
                robot_id: Some("mbot_001".to_string()),
                mission_type: Some("pick_object".to_string()),
                objective: Some("red_cube".to_string()),
                destination: Some(roverlink_types::Position::new(1.0, 2.0)),
            })
            .unwrap();

        assert_eq!(rx.recv().await, Some(ServerEvent::NewMission(mission)));
    }
}
