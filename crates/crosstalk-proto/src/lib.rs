//! Crosstalk wire protocol.
//!
//! The protocol is line-oriented text: every message, in either direction,
//! is one `\n`-terminated line. Clients open a conversation with a
//! registration line (`NAME:<display name>`), then send chat text and
//! slash-commands; the server answers with plain-text notices.
//!
//! This crate is pure classification and formatting - it owns no sockets.
//! [`LineReader`] provides the framing layer both the server and the client
//! read through, so partial reads are always reassembled into whole lines
//! before anything is classified.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod errors;
mod line;
mod message;
pub mod notice;

pub use errors::ProtocolError;
pub use line::{LineReader, MAX_LINE_LEN};
pub use message::{ClientMessage, NAME_PREFIX, parse_registration};
