//! Inbound message classification.
//!
//! Two entry points, matching the two phases of a session:
//!
//! - [`parse_registration`] for the first line of a connection, which must
//!   carry the `NAME:` marker.
//! - [`ClientMessage::parse`] for every line after registration.
//!
//! Classification is total: every line maps to exactly one variant.

use crate::errors::ProtocolError;

/// Required prefix on the registration line.
pub const NAME_PREFIX: &str = "NAME:";

/// Reserved prefix character for commands.
const COMMAND_PREFIX: char = '/';

const QUIT_COMMAND: &str = "/quit";
const HELP_COMMAND: &str = "/help";

/// A classified post-registration message from a client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientMessage {
    /// `/quit` - leave the chat cleanly.
    Quit,
    /// `/help` - request the static help text.
    Help,
    /// A line starting with `/` that is not a known command.
    Unknown(String),
    /// Anything else - chat text to relay to the other members.
    Chat(String),
}

impl ClientMessage {
    /// Classify one line from an active session.
    ///
    /// Leading/trailing whitespace is not significant for command
    /// recognition, but chat text is preserved as sent (minus the line
    /// terminator, which the framing layer already stripped).
    pub fn parse(line: &str) -> Self {
        let trimmed = line.trim();
        if trimmed == QUIT_COMMAND {
            Self::Quit
        } else if trimmed == HELP_COMMAND {
            Self::Help
        } else if trimmed.starts_with(COMMAND_PREFIX) {
            Self::Unknown(trimmed.to_string())
        } else {
            Self::Chat(line.to_string())
        }
    }
}

/// Parse the mandatory first line of a session into a display name.
///
/// The line must be `NAME:<name>` with a non-empty name after trimming.
/// Control characters are rejected so a name can never smuggle a line
/// break into later notices.
pub fn parse_registration(line: &str) -> Result<String, ProtocolError> {
    let trimmed = line.trim();
    let Some(name) = trimmed.strip_prefix(NAME_PREFIX) else {
        return Err(ProtocolError::MalformedRegistration(format!(
            "expected {NAME_PREFIX}<name>, got {trimmed:?}"
        )));
    };

    let name = name.trim();
    if name.is_empty() {
        return Err(ProtocolError::MalformedRegistration("empty name".to_string()));
    }
    if name.chars().any(char::is_control) {
        return Err(ProtocolError::MalformedRegistration(
            "name contains control characters".to_string(),
        ));
    }

    Ok(name.to_string())
}
