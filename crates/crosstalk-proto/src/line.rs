//! Newline-delimited framing over an async byte stream.
//!
//! Stream transports deliver arbitrary read chunks; [`LineReader`]
//! reassembles them into whole lines so classification always sees one
//! complete message. A final unterminated line before EOF is still
//! delivered - peers that close without a trailing newline don't lose
//! their last message.

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};

use crate::errors::ProtocolError;

/// Default maximum accepted line length in bytes.
pub const MAX_LINE_LEN: usize = 8 * 1024;

/// Reads `\n`-terminated lines from any async byte stream.
///
/// Lines longer than the configured limit produce
/// [`ProtocolError::LineTooLong`] instead of being truncated; the caller
/// is expected to drop the connection at that point.
#[derive(Debug)]
pub struct LineReader<R> {
    inner: BufReader<R>,
    max_line_len: usize,
    buf: Vec<u8>,
}

impl<R: AsyncRead + Unpin> LineReader<R> {
    /// Create a reader with the default length limit.
    pub fn new(inner: R) -> Self {
        Self::with_limit(inner, MAX_LINE_LEN)
    }

    /// Create a reader with an explicit length limit.
    pub fn with_limit(inner: R, max_line_len: usize) -> Self {
        Self { inner: BufReader::new(inner), max_line_len, buf: Vec::new() }
    }

    /// Read the next complete line, without its terminator.
    ///
    /// Returns `Ok(None)` on clean EOF. A trailing `\r` (CRLF peers) is
    /// stripped. Invalid UTF-8 is replaced rather than rejected; names are
    /// validated separately at registration.
    ///
    /// Cancel-safe: partial line data survives in `self.buf` if the
    /// returned future is dropped, so callers may wrap this in a timeout
    /// and retry without losing bytes.
    pub async fn next_line(&mut self) -> Result<Option<String>, ProtocolError> {
        loop {
            let (consumed, complete) = {
                let chunk = self.inner.fill_buf().await?;
                if chunk.is_empty() {
                    // EOF: flush any unterminated final line
                    if self.buf.is_empty() {
                        return Ok(None);
                    }
                    return Ok(Some(self.take_line()));
                }

                match chunk.iter().position(|&b| b == b'\n') {
                    Some(pos) => {
                        if self.buf.len() + pos > self.max_line_len {
                            return Err(ProtocolError::LineTooLong { max: self.max_line_len });
                        }
                        self.buf.extend_from_slice(&chunk[..pos]);
                        (pos + 1, true)
                    },
                    None => {
                        if self.buf.len() + chunk.len() > self.max_line_len {
                            return Err(ProtocolError::LineTooLong { max: self.max_line_len });
                        }
                        self.buf.extend_from_slice(chunk);
                        (chunk.len(), false)
                    },
                }
            };

            self.inner.consume(consumed);
            if complete {
                return Ok(Some(self.take_line()));
            }
        }
    }

    fn take_line(&mut self) -> String {
        let mut bytes = std::mem::take(&mut self.buf);
        if bytes.last() == Some(&b'\r') {
            bytes.pop();
        }
        String::from_utf8_lossy(&bytes).into_owned()
    }
}
