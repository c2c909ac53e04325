//! Fuzz target for message classification and registration parsing
//!
//! # Strategy
//!
//! - Arbitrary bytes decoded lossily, as the server does for datagrams
//! - Both the registration parser and the active-phase classifier see
//!   every input
//!
//! # Invariants
//!
//! - Parsing NEVER panics on any input
//! - Accepted registrations are non-empty and contain no control
//!   characters (a name can never smuggle a line break into a notice)
//! - Lines not starting with the reserved `/` prefix always classify as
//!   chat

#![no_main]

use crosstalk_proto::{ClientMessage, parse_registration};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let line = String::from_utf8_lossy(data);

    if let Ok(name) = parse_registration(&line) {
        assert!(!name.is_empty());
        assert!(!name.chars().any(char::is_control));
    }

    let message = ClientMessage::parse(&line);
    if !line.trim().starts_with('/') {
        assert!(matches!(message, ClientMessage::Chat(_)));
    }
});
