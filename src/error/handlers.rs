//! Error handlers
//!
//! Failures never travel back to clients; they end up here as log lines.

use crate::error::types::{MessageError, RelayError};
use log::{debug, error, warn};
use std::net::SocketAddr;

/// Log a frame that was dropped because it could not be decoded.
pub fn handle_message_error(peer: &SocketAddr, err: &MessageError) {
    warn!("Dropping malformed message from {}: {}", peer, err);
}

/// Log the error that terminated a connection.
pub fn handle_connection_error(peer: &SocketAddr, err: &RelayError) {
    if err.is_disconnect() {
        debug!("Connection {} ended: {}", peer, err);
    } else if err.is_rejected_handshake() {
        warn!("Refused upgrade from {}: {}", peer, err);
    } else {
        error!("Connection {} failed: {}", peer, err);
    }
}
