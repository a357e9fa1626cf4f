// src/session/dispatcher.rs

//! Validates operator tokens against the command vocabulary and sends them.

use crate::connection::Connection;
use crate::core::ClientError;
use crate::core::protocol::ControlCommand;
use tracing::{error, info, warn};

/// Sends `token` if it names a vocabulary command.
///
/// Matching ignores ASCII case, but the line written is the token exactly as
/// typed. Unknown tokens are rejected without touching the network.
pub async fn dispatch(conn: &Connection, token: &str) -> Result<ControlCommand, ClientError> {
    let Some(command) = ControlCommand::parse(token) else {
        warn!("Invalid command: {}", token);
        return Err(ClientError::Rejected(token.to_string()));
    };

    if let Err(e) = conn.send_line(token).await {
        error!("Command send failed: {}", e);
        return Err(e);
    }
    info!("Sent command: {}", token);
    Ok(command)
}
