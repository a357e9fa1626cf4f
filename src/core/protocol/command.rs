// src/core/protocol/command.rs

//! The closed vocabulary of operator commands.

use std::str::FromStr;
use strum_macros::{Display, EnumIter, EnumString};

/// A control command forwarded to the server. Matching is ASCII
/// case-insensitive; the wire form is the kebab-case name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, EnumIter)]
#[strum(serialize_all = "kebab-case", ascii_case_insensitive)]
pub enum ControlCommand {
    StartStream,
    StopStream,
    Status,
    GetSettings,
    CloseApp,
}

impl ControlCommand {
    /// Looks a token up in the vocabulary, ignoring ASCII case.
    pub fn parse(token: &str) -> Option<Self> {
        Self::from_str(token).ok()
    }

    /// Whether sending this command also ends the local session.
    pub fn ends_session(self) -> bool {
        matches!(self, ControlCommand::CloseApp)
    }
}

/// One line of operator input, classified for the session controller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperatorCommand {
    /// Leave the session without telling the server.
    Quit,
    /// Tear the connection down and establish a fresh session.
    Reconnect,
    /// A vocabulary command, carrying the token exactly as typed.
    Control(ControlCommand, String),
    /// Anything else; warned about and ignored.
    Invalid(String),
}

impl OperatorCommand {
    /// Classifies a raw input line. Surrounding whitespace is ignored.
    pub fn parse(input: &str) -> Self {
        let token = input.trim();
        if token.eq_ignore_ascii_case("quit") {
            return OperatorCommand::Quit;
        }
        if token.eq_ignore_ascii_case("reconnect") {
            return OperatorCommand::Reconnect;
        }
        match ControlCommand::parse(token) {
            Some(command) => OperatorCommand::Control(command, token.to_string()),
            None => OperatorCommand::Invalid(token.to_string()),
        }
    }
}
