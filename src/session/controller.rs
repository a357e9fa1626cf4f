// src/session/controller.rs

//! Defines `SessionController`, which drives a session from connect to teardown.

use super::dispatcher::dispatch;
use super::input::CommandSource;
use super::prober::LivenessProber;
use super::reader::ResponseReader;
use crate::config::Config;
use crate::connection::{Connection, ConnectionGuard, perform_handshake};
use crate::core::ClientError;
use crate::core::encoding::TextEncoding;
use crate::core::protocol::{Inbound, OperatorCommand};
use crate::core::state::{SessionPhase, SessionState, ShutdownReason};
use futures::FutureExt;
use futures::future::BoxFuture;
use std::future::Future;
use std::io;
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

/// Capacity of the inbound-message feed handed to subscribers.
const INBOUND_CHANNEL_CAPACITY: usize = 256;

/// Produces the future that resolves when the operator interrupts the client.
type InterruptSource = Arc<dyn Fn() -> BoxFuture<'static, io::Result<()>> + Send + Sync>;

/// The resources of the session currently in `Running`.
struct ActiveSession {
    guard: ConnectionGuard,
    tasks: JoinSet<()>,
}

/// Owns the connection lifecycle:
/// `CONNECTING -> HANDSHAKING -> RUNNING -> CLOSING -> CLOSED`.
///
/// The controller is the only owner that ever closes a connection. A reconnect
/// closes the current session completely and replaces it with a new connection
/// and a new `SessionState`, so the dispatcher, reader and prober of the new
/// session never see the old socket.
pub struct SessionController {
    config: Config,
    encoding: TextEncoding,
    phase: SessionPhase,
    inbound_tx: broadcast::Sender<Inbound>,
    interrupt: InterruptSource,
    active: Option<ActiveSession>,
    last_connection: Option<Arc<Connection>>,
    last_state: Option<Arc<SessionState>>,
    sessions_opened: u64,
}

impl SessionController {
    pub fn new(config: Config, encoding: TextEncoding) -> Self {
        let (inbound_tx, _) = broadcast::channel(INBOUND_CHANNEL_CAPACITY);
        Self {
            config,
            encoding,
            phase: SessionPhase::Closed,
            inbound_tx,
            interrupt: Arc::new(|| tokio::signal::ctrl_c().boxed()),
            active: None,
            last_connection: None,
            last_state: None,
            sessions_opened: 0,
        }
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    /// Replaces Ctrl-C as the operator interrupt. If the future fails, the
    /// session keeps running with interrupts disabled.
    pub fn with_interrupt<F, Fut>(mut self, interrupt: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = io::Result<()>> + Send + 'static,
    {
        self.interrupt = Arc::new(move || interrupt().boxed());
        self
    }

    /// Subscribes to every line the response readers classify, across reconnects.
    pub fn subscribe(&self) -> broadcast::Receiver<Inbound> {
        self.inbound_tx.subscribe()
    }

    /// The most recently opened connection, kept after close for inspection.
    /// Its socket is released by the time the session reaches `CLOSED`.
    pub fn last_connection(&self) -> Option<&Arc<Connection>> {
        self.last_connection.as_ref()
    }

    /// The state of the most recently opened session.
    pub fn last_session_state(&self) -> Option<&Arc<SessionState>> {
        self.last_state.as_ref()
    }

    /// How many sessions reached `RUNNING`.
    pub fn sessions_opened(&self) -> u64 {
        self.sessions_opened
    }

    /// Runs sessions until the operator leaves or a session ends on its own.
    ///
    /// Returns the reason the final session ended. A connect or handshake
    /// failure, for the first session or a reconnect, is returned as an error
    /// with the controller already in `CLOSED`.
    pub async fn run<S>(&mut self, input: &mut S) -> Result<ShutdownReason, ClientError>
    where
        S: CommandSource + ?Sized,
    {
        self.open().await?;
        loop {
            let session = self.active.as_ref().map(|active| {
                (
                    active.guard.connection().clone(),
                    active.guard.state().clone(),
                )
            });
            let interrupt = self.interrupt.clone();
            let reason = match session {
                Some((conn, state)) => command_loop(&conn, &state, &interrupt, input).await,
                None => ShutdownReason::Quit,
            };
            self.close(reason).await;

            if reason != ShutdownReason::Reconnect {
                return Ok(reason);
            }
            info!("Reconnecting in {:?}...", self.config.reconnect_delay);
            tokio::time::sleep(self.config.reconnect_delay).await;
            self.open().await?;
            info!("Reconnected to server!");
        }
    }

    fn set_phase(&mut self, phase: SessionPhase) {
        debug!("Session phase {} -> {}", self.phase, phase);
        self.phase = phase;
    }

    /// `CONNECTING` and `HANDSHAKING`, then entry into `RUNNING`.
    async fn open(&mut self) -> Result<(), ClientError> {
        self.set_phase(SessionPhase::Connecting);
        let conn = match Connection::connect(
            &self.config.host,
            self.config.port,
            self.encoding.clone(),
            self.config.connect_timeout,
        )
        .await
        {
            Ok(conn) => Arc::new(conn),
            Err(e) => {
                // Nothing was opened, so there is nothing to release.
                self.set_phase(SessionPhase::Closed);
                return Err(e);
            }
        };
        let state = Arc::new(SessionState::new());
        self.last_connection = Some(conn.clone());
        self.last_state = Some(state.clone());
        let guard = ConnectionGuard::new(conn.clone(), state.clone());

        self.set_phase(SessionPhase::Handshaking);
        if let Err(e) = perform_handshake(&conn, &self.encoding).await {
            guard.release(ShutdownReason::HandshakeFailed);
            drop(guard);
            self.set_phase(SessionPhase::Closed);
            return Err(e);
        }

        let mut tasks = JoinSet::new();
        tasks.spawn(ResponseReader::new(conn.clone(), state.clone(), self.inbound_tx.clone()).run());
        tasks.spawn(
            LivenessProber::new(
                conn.clone(),
                state.clone(),
                self.config.ping_interval,
                self.config.effective_pong_timeout(),
            )
            .run(),
        );
        state.mark_connected();

        self.sessions_opened += 1;
        self.active = Some(ActiveSession { guard, tasks });
        self.set_phase(SessionPhase::Running);
        Ok(())
    }

    /// `CLOSING`: latch the session shut, shut the socket down, join the
    /// background tasks, then `CLOSED`.
    async fn close(&mut self, reason: ShutdownReason) {
        let Some(mut active) = self.active.take() else {
            self.set_phase(SessionPhase::Closed);
            return;
        };
        self.set_phase(SessionPhase::Closing);

        active.guard.release(reason);

        let grace = self.config.shutdown_grace;
        let joined = tokio::time::timeout(grace, async {
            while let Some(res) = active.tasks.join_next().await {
                if let Err(e) = res
                    && e.is_panic()
                {
                    error!("A session task panicked: {e:?}");
                }
            }
        })
        .await;
        if joined.is_err() {
            warn!(
                "Timed out after {:?} waiting for session tasks; aborting them.",
                grace
            );
            active.tasks.shutdown().await;
        }

        // Every task is gone, so neither half is locked any more.
        active.guard.connection().release().await;
        drop(active);
        self.set_phase(SessionPhase::Closed);
        info!("Session closed ({:?}).", reason);
    }
}

/// The foreground loop of `RUNNING`. Returns why the session should end.
async fn command_loop<S>(
    conn: &Connection,
    state: &SessionState,
    interrupt: &InterruptSource,
    input: &mut S,
) -> ShutdownReason
where
    S: CommandSource + ?Sized,
{
    let mut shutdown = state.shutdown_signal();
    let mut interrupted = interrupt();
    let mut interrupt_armed = true;

    loop {
        if !state.is_connected() || state.is_shutting_down() {
            return state.shutdown_reason().unwrap_or(ShutdownReason::Quit);
        }

        let next = tokio::select! {
            biased;
            reason = shutdown.wait() => {
                warn!("Session ended by a background task: {:?}", reason);
                return reason;
            }
            result = &mut interrupted, if interrupt_armed => {
                match result {
                    Ok(()) => {
                        info!("Exiting program by interrupt.");
                        return ShutdownReason::Interrupted;
                    }
                    Err(e) => {
                        warn!("Cannot listen for interrupts, continuing without: {}", e);
                        interrupt_armed = false;
                        continue;
                    }
                }
            }
            next = input.next_command() => next,
        };

        let Some(line) = next else {
            info!("Operator input closed. Exiting program...");
            return ShutdownReason::Quit;
        };

        match OperatorCommand::parse(&line) {
            OperatorCommand::Quit => {
                info!("Exiting program...");
                return ShutdownReason::Quit;
            }
            OperatorCommand::Reconnect => {
                info!("Reconnect requested by operator.");
                return ShutdownReason::Reconnect;
            }
            OperatorCommand::Control(command, token) => {
                if command.ends_session() {
                    info!("Sending {} command...", token);
                }
                match dispatch(conn, &token).await {
                    Ok(_) if command.ends_session() => return ShutdownReason::CloseApp,
                    Ok(_) | Err(ClientError::Rejected(_)) => {}
                    Err(e) => {
                        error!("Ending session after failed send: {}", e);
                        return ShutdownReason::SendFailed;
                    }
                }
            }
            OperatorCommand::Invalid(token) => {
                warn!("Invalid command: {}", token);
            }
        }
    }
}
