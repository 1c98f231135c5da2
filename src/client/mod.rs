//! Client management system
//!
//! Handles client connections, the identity registry, and per-connection
//! session state.

pub mod handler;
pub mod registry;
pub mod session;

pub use handler::handle_connection;
pub use registry::{ClientRegistry, ConnectionId, Delivery, Frame, PeerHandle, SharedRegistry};
pub use session::Session;
