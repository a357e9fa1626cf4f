// src/connection/guard.rs

//! Defines `ConnectionGuard`, an RAII guard that tears a session's connection down.

use super::stream::Connection;
use crate::core::state::{SessionState, ShutdownReason};
use std::sync::Arc;
use tracing::debug;

/// Ensures the connection is shut down and the session latched closed when the
/// scope that owns the session is exited, including by panic or cancellation.
#[derive(Debug)]
pub struct ConnectionGuard {
    conn: Arc<Connection>,
    state: Arc<SessionState>,
}

impl ConnectionGuard {
    pub fn new(conn: Arc<Connection>, state: Arc<SessionState>) -> Self {
        Self { conn, state }
    }

    pub fn connection(&self) -> &Arc<Connection> {
        &self.conn
    }

    pub fn state(&self) -> &Arc<SessionState> {
        &self.state
    }

    /// Latches the session shut with `reason` (unless it already is) and closes
    /// the socket. Returns `true` if this call closed the socket.
    pub fn release(&self, reason: ShutdownReason) -> bool {
        self.state.begin_shutdown(reason);
        self.conn.close()
    }
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        // An orderly exit has already released; only an abnormal one gets here with work left.
        if self.release(ShutdownReason::Interrupted) {
            debug!(
                "ConnectionGuard released connection to {} during drop.",
                self.conn.addr()
            );
        }
    }
}
