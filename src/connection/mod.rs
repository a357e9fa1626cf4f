// src/connection/mod.rs

//! Owns the TCP stream to the control API server: connecting, sending,
//! receiving, the encoding handshake, and guaranteed teardown.

mod guard;
mod handshake;
mod stream;

pub use guard::ConnectionGuard;
pub use handshake::perform_handshake;
pub use stream::Connection;
