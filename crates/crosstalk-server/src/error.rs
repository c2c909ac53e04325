//! Server error types.

use thiserror::Error;

/// Errors that can abort the server itself.
///
/// Per-client failures never appear here: a malformed registration, a read
/// error, or a failed broadcast write terminates that client's session and
/// is logged, while the server keeps serving everyone else. Only
/// startup-time resource acquisition is process-fatal.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Could not acquire the listening endpoint.
    #[error("failed to bind {addr}: {source}")]
    Bind {
        /// Address that could not be bound.
        addr: String,
        /// Underlying I/O failure.
        #[source]
        source: std::io::Error,
    },

    /// I/O failure on the shared datagram socket.
    #[error("socket error: {0}")]
    Io(#[from] std::io::Error),
}
