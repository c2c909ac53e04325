//! Protocol error types.

use thiserror::Error;

/// Errors that can occur while framing or classifying protocol lines.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// First message did not carry a valid `NAME:<name>` registration.
    ///
    /// Fatal for the session that sent it, never for the server.
    #[error("malformed registration: {0}")]
    MalformedRegistration(String),

    /// A line exceeded the configured maximum length.
    ///
    /// The original implementation silently truncated at a fixed buffer
    /// size; we reject instead so no message is ever delivered mangled.
    #[error("line exceeds maximum length of {max} bytes")]
    LineTooLong {
        /// Configured limit that was exceeded.
        max: usize,
    },

    /// Transport-level read failure.
    #[error("read failed: {0}")]
    Io(#[from] std::io::Error),
}
