//! Server-issued notice formatting.
//!
//! Notices are plain lines using fixed phrasings so clients and tests can
//! match on them. All formatting of outbound text lives here; the server
//! never builds chat lines by hand.

/// Usage hint sent when the first message is not a valid registration.
pub const USAGE_HINT: &str = "Please register with NAME:yourname";

/// Reply to a line starting with `/` that is not a known command.
pub const UNKNOWN_COMMAND: &str = "Unknown command";

/// Static help text for `/help`.
pub const HELP_TEXT: &str = "Commands: /help - this text, /quit - leave the chat";

/// Format a chat message for relay: `[<name>]: <text>`.
pub fn chat_line(name: &str, text: &str) -> String {
    format!("[{name}]: {text}")
}

/// Notice broadcast when a member registers.
pub fn joined(name: &str) -> String {
    format!("{name} joined the chat")
}

/// Notice broadcast when a member leaves, for any reason.
pub fn left(name: &str) -> String {
    format!("{name} left the chat")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chat_line_embeds_sender_name() {
        assert_eq!(chat_line("alice", "hello"), "[alice]: hello");
    }

    #[test]
    fn membership_notices() {
        assert_eq!(joined("bob"), "bob joined the chat");
        assert_eq!(left("bob"), "bob left the chat");
    }
}
