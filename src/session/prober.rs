// src/session/prober.rs

//! The liveness prober: a periodic PING/PONG turn on the shared connection.

use crate::connection::Connection;
use crate::core::ClientError;
use crate::core::protocol::{PING, PONG};
use crate::core::state::{SessionState, ShutdownReason};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

/// The result of a probe that got a reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeOutcome {
    Pong,
    /// The server answered with something other than `PONG`. Logged, not fatal.
    Unexpected(String),
}

pub struct LivenessProber {
    conn: Arc<Connection>,
    state: Arc<SessionState>,
    interval: Duration,
    reply_timeout: Duration,
}

impl LivenessProber {
    pub fn new(
        conn: Arc<Connection>,
        state: Arc<SessionState>,
        interval: Duration,
        reply_timeout: Duration,
    ) -> Self {
        Self {
            conn,
            state,
            interval,
            reply_timeout,
        }
    }

    /// Probes once per interval, starting one interval from now, until the
    /// shutdown latch is set or a probe fails.
    pub async fn run(self) {
        let mut shutdown = self.state.shutdown_signal();
        let mut ticker = time::interval_at(Instant::now() + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!("Ping monitor started with interval {:?}.", self.interval);
        loop {
            tokio::select! {
                biased;
                reason = shutdown.wait() => {
                    debug!("Ping monitor stopping: {:?}", reason);
                    break;
                }
                _ = ticker.tick() => {}
            }

            if !self.state.is_connected() {
                continue;
            }
            if self.probe_once().await.is_err() {
                break;
            }
        }
    }

    /// Sends `PING` and waits for the next line under the send lock.
    ///
    /// A mismatched reply is a warning and leaves the session running. Any I/O
    /// failure, including a reply timeout, marks the session disconnected and
    /// sets the shutdown latch.
    pub async fn probe_once(&self) -> Result<ProbeOutcome, ClientError> {
        match self.conn.transact(PING, self.reply_timeout).await {
            Ok(reply) => {
                let reply = reply.trim();
                if reply == PONG {
                    info!("Received PONG");
                    Ok(ProbeOutcome::Pong)
                } else {
                    warn!("Unexpected response: {}", reply);
                    Ok(ProbeOutcome::Unexpected(reply.to_string()))
                }
            }
            Err(e) => {
                if self.state.is_shutting_down() {
                    debug!("Ping interrupted by shutdown: {}", e);
                } else {
                    error!("Ping failed: {}", e);
                    error!("Lost connection to server. Stopping ping monitor.");
                }
                self.state.begin_shutdown(ShutdownReason::PingFailed);
                Err(e)
            }
        }
    }
}
