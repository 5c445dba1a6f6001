//! [`SessionHub`] – addressable real-time sessions, keyed by robot id.
//!
//! Each live WebSocket connection owns a bounded outbound queue.  Binding a
//! connection to a robot id registers that queue in the hub so the gateway
//! can push events (e.g. `new_mission`) to the robot out of band.
//!
//! Pushing to a robot with no bound session is a no-op.  Delivery is
//! best-effort: when a session's queue is full the event is dropped with a
//! warning, and a session whose connection has gone away is unbound.

use std::collections::HashMap;

use parking_lot::RwLock;
use tokio::sync::mpsc;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::protocol::ServerEvent;

/// Outbound queue depth per session.
pub const SESSION_BUFFER: usize = 64;

struct Session {
    connection_id: Uuid,
    tx: mpsc::Sender<ServerEvent>,
}

/// Registry of real-time sessions.
#[derive(Default)]
pub struct SessionHub {
    sessions: RwLock<HashMap<String, Session>>,
}

impl SessionHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `robot_id` to the connection `connection_id`.
    ///
    /// A session previously bound to the same robot by another connection is
    /// replaced; the newest connection wins.
    pub fn bind(&self, robot_id: &str, connection_id: Uuid, tx: mpsc::Sender<ServerEvent>) {
        let mut sessions = self.sessions.write();
        if let Some(old) = sessions.insert(robot_id.to_string(), Session { connection_id, tx })
            && old.connection_id != connection_id
        {
            debug!(robot_id, old = %old.connection_id, new = %connection_id, "session rebound");
        }
    }

    /// Unbind `robot_id`, but only while it is still bound to `connection_id`.
    ///
    /// Returns `true` when a session was removed.
    pub fn release(&self, robot_id: &str, connection_id: Uuid) -> bool {
        let mut sessions = self.sessions.write();
        match sessions.get(robot_id) {
            Some(s) if s.connection_id == connection_id => {
                sessions.remove(robot_id);
                true
            }
            _ => false,
        }
    }

    /// Queue `event` on the session bound to `robot_id`.
    ///
    /// Returns `true` when the event was queued.
    pub fn push(&self, robot_id: &str, event: ServerEvent) -> bool {
        let stale = {
            let sessions = self.sessions.read();
            let Some(session) = sessions.get(robot_id) else {
                return false;
            };
            match session.tx.try_send(event) {
                Ok(()) => return true,
                Err(mpsc::error::TrySendError::Full(ev)) => {
                    warn!(robot_id, event = ev.name(), "session queue full, event dropped");
                    return false;
                }
                Err(mpsc::error::TrySendError::Closed(_)) => session.connection_id,
            }
        };
        self.release(robot_id, stale);
        false
    }

    /// Whether `robot_id` currently has a bound session.
    pub fn is_active(&self, robot_id: &str) -> bool {
        self.sessions.read().contains_key(robot_id)
    }

    /// Number of bound sessions.
    pub fn len(&self) -> usize {
        self.sessions.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.read().is_empty()
    }
}
