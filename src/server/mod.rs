//! Server core functionality
//!
//! Binds the listener and runs the accept loop, spawning one task per
//! connection.

pub mod core;

pub use self::core::Server;
