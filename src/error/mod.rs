//! Error handling
//!
//! Defines error types and handling for the signaling relay.

pub mod handlers;
pub mod types;

pub use types::*;
