// src/session/mod.rs

//! The session layer: the controller plus the reader, prober and dispatcher it
//! runs over one shared connection.

mod controller;
pub mod dispatcher;
pub mod input;
pub mod prober;
pub mod reader;

pub use controller::SessionController;
pub use dispatcher::dispatch;
pub use input::{CommandSource, StdinCommandSource};
pub use prober::{LivenessProber, ProbeOutcome};
pub use reader::{ReaderState, ResponseReader};
