// src/session/input.rs

//! Sources of operator command lines.

use async_trait::async_trait;
use std::io::{BufRead, Write};
use std::thread;
use tokio::sync::mpsc;
use tracing::error;

/// Supplies one line of operator input at a time.
#[async_trait]
pub trait CommandSource: Send {
    /// Waits for the next line. `None` means the operator's input is exhausted.
    /// Implementations must be cancel-safe: the controller races this against
    /// the shutdown latch.
    async fn next_command(&mut self) -> Option<String>;
}

/// Lines pushed through a channel, e.g. by tests or an embedding application.
#[async_trait]
impl CommandSource for mpsc::Receiver<String> {
    async fn next_command(&mut self) -> Option<String> {
        self.recv().await
    }
}

/// Reads commands from standard input, printing a prompt before each one.
///
/// Blocking stdin reads happen on a dedicated OS thread so a pending read never
/// holds up the async runtime when the session ends.
pub struct StdinCommandSource {
    rx: mpsc::Receiver<String>,
    prompt: &'static str,
}

impl StdinCommandSource {
    pub const DEFAULT_PROMPT: &'static str = "Enter command: ";

    pub fn spawn() -> Self {
        Self::spawn_with_prompt(Self::DEFAULT_PROMPT)
    }

    pub fn spawn_with_prompt(prompt: &'static str) -> Self {
        let (tx, rx) = mpsc::channel(16);
        let spawned = thread::Builder::new()
            .name("castctl-stdin".to_string())
            .spawn(move || {
                let stdin = std::io::stdin();
                for line in stdin.lock().lines() {
                    match line {
                        Ok(line) => {
                            if tx.blocking_send(line).is_err() {
                                break;
                            }
                        }
                        Err(e) => {
                            error!("Failed to read from standard input: {}", e);
                            break;
                        }
                    }
                }
            });
        if let Err(e) = spawned {
            // `rx` then reports end of input right away.
            error!("Failed to start the standard input reader: {}", e);
        }
        Self { rx, prompt }
    }
}

#[async_trait]
impl CommandSource for StdinCommandSource {
    async fn next_command(&mut self) -> Option<String> {
        let mut stdout = std::io::stdout();
        let _ = write!(stdout, "{}", self.prompt);
        let _ = stdout.flush();
        self.rx.recv().await
    }
}
