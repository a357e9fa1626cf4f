// src/core/protocol/mod.rs

//! The newline-delimited text protocol spoken with the control API server.

pub mod command;
pub mod line_codec;

pub use command::{ControlCommand, OperatorCommand};
pub use line_codec::{LineCodec, MAX_LINE_LENGTH, READ_CHUNK_SIZE};

/// Prefix of the client's handshake line.
pub const HANDSHAKE_PREFIX: &str = "ENCODING:";
/// Prefix the server uses to acknowledge the handshake.
pub const HANDSHAKE_ACK_PREFIX: &str = "Server encoding set to:";
/// Liveness probe sent by the client.
pub const PING: &str = "PING";
/// Expected reply to [`PING`].
pub const PONG: &str = "PONG";

/// Builds the handshake line (without the trailing newline) for an encoding name.
pub fn handshake_line(encoding_name: &str) -> String {
    format!("{HANDSHAKE_PREFIX}{encoding_name}")
}

/// Returns true if a trimmed line acknowledges the handshake.
pub fn is_handshake_ack(line: &str) -> bool {
    line.starts_with(HANDSHAKE_ACK_PREFIX)
}

/// A line received from the server, classified by the response reader.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound {
    /// The server acknowledged the encoding handshake.
    HandshakeAck(String),
    /// A line that arrived before the handshake was acknowledged.
    OutOfBand(String),
    /// Any line received after the handshake completed.
    Message(String),
}

impl Inbound {
    /// The text of the line, whatever its classification.
    pub fn text(&self) -> &str {
        match self {
            Inbound::HandshakeAck(s) | Inbound::OutOfBand(s) | Inbound::Message(s) => s,
        }
    }
}
