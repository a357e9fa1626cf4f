// src/lib.rs

pub mod config;
pub mod connection;
pub mod core;
pub mod session;

// Re-export
pub use crate::core::ClientError;
pub use crate::session::SessionController;
