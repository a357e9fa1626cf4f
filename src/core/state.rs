// src/core/state.rs

//! Shared per-session flags and the controller's lifecycle phases.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::watch;

/// Lifecycle phases of a session, in the order the controller walks them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    Connecting,
    Handshaking,
    Running,
    Closing,
    Closed,
}

impl fmt::Display for SessionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionPhase::Connecting => "CONNECTING",
            SessionPhase::Handshaking => "HANDSHAKING",
            SessionPhase::Running => "RUNNING",
            SessionPhase::Closing => "CLOSING",
            SessionPhase::Closed => "CLOSED",
        };
        f.write_str(name)
    }
}

/// Why the shutdown latch was set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownReason {
    /// The operator typed `quit` (or closed standard input).
    Quit,
    /// The operator asked the server to close the application.
    CloseApp,
    /// The operator interrupted the client.
    Interrupted,
    /// The operator requested a reconnection; the old session ends.
    Reconnect,
    /// A ping went unanswered or failed.
    PingFailed,
    /// The response reader could not read from the socket.
    ReceiveFailed,
    /// A command could not be written to the socket.
    SendFailed,
    /// The encoding handshake could not be sent.
    HandshakeFailed,
}

/// Flags shared by the controller, reader, prober and dispatcher for one session.
///
/// A reconnection builds a new `SessionState`; none of the latches are ever reset.
#[derive(Debug)]
pub struct SessionState {
    connected: AtomicBool,
    handshake_done: AtomicBool,
    shutdown_tx: watch::Sender<Option<ShutdownReason>>,
}

impl Default for SessionState {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionState {
    pub fn new() -> Self {
        let (shutdown_tx, _) = watch::channel(None);
        Self {
            connected: AtomicBool::new(false),
            handshake_done: AtomicBool::new(false),
            shutdown_tx,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }

    /// Marks the session connected. Refused once shutdown has begun so a late
    /// caller cannot revive a session that is being torn down.
    pub fn mark_connected(&self) -> bool {
        if self.is_shutting_down() {
            return false;
        }
        self.connected.store(true, Ordering::Release);
        true
    }

    pub fn mark_disconnected(&self) {
        self.connected.store(false, Ordering::Release);
    }

    pub fn is_handshake_done(&self) -> bool {
        self.handshake_done.load(Ordering::Acquire)
    }

    /// Flips the handshake latch. Returns `true` only for the call that flipped it.
    pub fn complete_handshake(&self) -> bool {
        !self.handshake_done.swap(true, Ordering::AcqRel)
    }

    pub fn is_shutting_down(&self) -> bool {
        self.shutdown_tx.borrow().is_some()
    }

    /// The reason recorded by whoever set the latch first.
    pub fn shutdown_reason(&self) -> Option<ShutdownReason> {
        *self.shutdown_tx.borrow()
    }

    /// Sets the shutdown latch and clears `connected`. Returns `true` only for
    /// the call that set the latch; later reasons are ignored.
    pub fn begin_shutdown(&self, reason: ShutdownReason) -> bool {
        self.mark_disconnected();
        self.shutdown_tx.send_if_modified(|current| {
            if current.is_some() {
                return false;
            }
            *current = Some(reason);
            true
        })
    }

    /// Subscribes to the shutdown latch.
    pub fn shutdown_signal(&self) -> ShutdownSignal {
        ShutdownSignal {
            rx: self.shutdown_tx.subscribe(),
        }
    }
}

/// A receiver half of the shutdown latch that background tasks can await.
#[derive(Debug, Clone)]
pub struct ShutdownSignal {
    rx: watch::Receiver<Option<ShutdownReason>>,
}

impl ShutdownSignal {
    /// Resolves once the latch is set, immediately if it already is.
    pub async fn wait(&mut self) -> ShutdownReason {
        loop {
            if let Some(reason) = *self.rx.borrow_and_update() {
                return reason;
            }
            // The sender lives in `SessionState`; if it is gone the session is gone too.
            if self.rx.changed().await.is_err() {
                return ShutdownReason::Quit;
            }
        }
    }

    pub fn is_set(&self) -> bool {
        self.rx.borrow().is_some()
    }
}
