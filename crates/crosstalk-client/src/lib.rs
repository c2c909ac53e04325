//! Crosstalk terminal client.
//!
//! A thin front-end over the relay protocol: [`transport::connect`] gives
//! channel-based access to a server over TCP or UDP, and the binary wires
//! those channels to stdin/stdout. Protocol formatting lives in
//! `crosstalk-proto`; this crate owns only the socket plumbing and the
//! input loop.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod transport;

pub use transport::{ConnectedClient, Transport, TransportError};
