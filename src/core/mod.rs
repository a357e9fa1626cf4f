// src/core/mod.rs

//! Protocol, encoding, error and shared-state types used by every part of the client.

pub mod encoding;
pub mod errors;
pub mod protocol;
pub mod state;

pub use encoding::TextEncoding;
pub use errors::ClientError;
pub use protocol::{ControlCommand, Inbound, OperatorCommand};
pub use state::{SessionPhase, SessionState, ShutdownReason, ShutdownSignal};
