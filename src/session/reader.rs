// src/session/reader.rs

//! The response reader: the only task that reads the socket.

use crate::connection::Connection;
use crate::core::protocol::{Inbound, is_handshake_ack};
use crate::core::state::{SessionState, ShutdownReason};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, error, info};

/// Where the reader is in the session's protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReaderState {
    AwaitingHandshakeAck,
    Streaming,
}

/// Drains incoming lines for the lifetime of a connection, classifies them,
/// logs them, and publishes them to subscribers.
pub struct ResponseReader {
    conn: Arc<Connection>,
    state: Arc<SessionState>,
    inbound_tx: broadcast::Sender<Inbound>,
    reader_state: ReaderState,
}

impl ResponseReader {
    pub fn new(
        conn: Arc<Connection>,
        state: Arc<SessionState>,
        inbound_tx: broadcast::Sender<Inbound>,
    ) -> Self {
        Self {
            conn,
            state,
            inbound_tx,
            reader_state: ReaderState::AwaitingHandshakeAck,
        }
    }

    pub fn reader_state(&self) -> ReaderState {
        self.reader_state
    }

    /// Runs until the shutdown latch is set or the socket fails. A receive
    /// failure is logged and converted into the shutdown latch; it is never retried.
    pub async fn run(mut self) {
        let mut shutdown = self.state.shutdown_signal();
        loop {
            let received = tokio::select! {
                biased;
                reason = shutdown.wait() => {
                    debug!("Response reader for {} stopping: {:?}", self.conn.addr(), reason);
                    break;
                }
                received = self.conn.receive_line() => received,
            };

            match received {
                Ok(line) => self.handle_line(&line),
                Err(e) => {
                    if self.state.is_shutting_down() || self.conn.is_closed() {
                        debug!("Response reader for {} ended: {}", self.conn.addr(), e);
                    } else {
                        error!("Error receiving data: {}", e);
                    }
                    if let Some(slot) = self.conn.take_reply_slot() {
                        let _ = slot.send(Err(e));
                    }
                    self.state.begin_shutdown(ShutdownReason::ReceiveFailed);
                    break;
                }
            }
        }
        // Dropping an unfilled slot wakes a probe that is still waiting for its reply.
        drop(self.conn.take_reply_slot());
    }

    /// Classifies one received line. Empty lines are ignored.
    fn handle_line(&mut self, raw: &str) {
        let line = raw.trim_end();
        if line.is_empty() {
            return;
        }

        if self.reader_state == ReaderState::AwaitingHandshakeAck && is_handshake_ack(line) {
            if self.state.complete_handshake() {
                info!("Handshake completed: {}", line);
            }
            self.reader_state = ReaderState::Streaming;
            self.publish(Inbound::HandshakeAck(line.to_string()));
            return;
        }

        // A pending probe owns the very next line.
        if let Some(slot) = self.conn.take_reply_slot() {
            debug!("Handing '{}' to the pending probe", line);
            let _ = slot.send(Ok(line.to_string()));
            return;
        }

        match self.reader_state {
            ReaderState::AwaitingHandshakeAck => {
                info!("Server response before handshake: {}", line);
                self.publish(Inbound::OutOfBand(line.to_string()));
            }
            ReaderState::Streaming => {
                info!("Received after handshake: {}", line);
                self.publish(Inbound::Message(line.to_string()));
            }
        }
    }

    fn publish(&self, inbound: Inbound) {
        // Having no subscribers is the normal case for the interactive binary.
        let _ = self.inbound_tx.send(inbound);
    }
}
