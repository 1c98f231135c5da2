//! Signaling protocol
//!
//! JSON messages discriminated by a `type` field. Clients send `register`
//! and addressed messages; the relay sends `clients`, `user-joined` and
//! `user-left`, and forwards addressed messages with `from` stamped in.

pub mod messages;
pub mod parser;

pub use messages::{Addressed, Inbound, Outbound};
pub use parser::{parse_binary, parse_message};
