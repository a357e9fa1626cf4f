// src/connection/handshake.rs

//! The one-shot encoding announcement that opens every session.

use super::stream::Connection;
use crate::core::ClientError;
use crate::core::encoding::TextEncoding;
use crate::core::protocol::handshake_line;
use tracing::{error, info};

/// Sends `ENCODING:<name>` on the connection.
///
/// The acknowledgment is not awaited here; the response reader owns the
/// handshake latch and flips it when the server's ack line arrives.
pub async fn perform_handshake(
    conn: &Connection,
    encoding: &TextEncoding,
) -> Result<(), ClientError> {
    let name = encoding.name();
    // The server parses the header as ASCII before it knows the session encoding.
    if !name.is_ascii() {
        let e = ClientError::Handshake(format!("encoding name '{name}' is not ASCII"));
        error!("Handshake error: {}", e);
        return Err(e);
    }

    let line = handshake_line(name);
    if let Err(e) = conn.send_line(&line).await {
        error!("Handshake error: {}", e);
        return Err(ClientError::Handshake(e.to_string()));
    }
    info!("Handshake sent: {}", line);
    Ok(())
}
