//! Error types
//!
//! Two layers: `MessageError` for a single bad frame (logged and dropped,
//! never fatal to the connection) and `RelayError` for everything that ends
//! a connection or stops the server from starting.

use std::fmt;
use std::io;

use tokio_tungstenite::tungstenite;

/// Errors raised while decoding one inbound frame.
#[derive(Debug)]
pub enum MessageError {
    InvalidUtf8,
    InvalidJson(serde_json::Error),
    NotAnObject,
    MissingType,
    MissingField(&'static str),
}

impl fmt::Display for MessageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MessageError::InvalidUtf8 => write!(f, "Frame is not valid UTF-8"),
            MessageError::InvalidJson(e) => write!(f, "Invalid JSON: {}", e),
            MessageError::NotAnObject => write!(f, "Message is not a JSON object"),
            MessageError::MissingType => write!(f, "Message has no string `type` field"),
            MessageError::MissingField(name) => {
                write!(f, "Message is missing required field `{}`", name)
            }
        }
    }
}

impl std::error::Error for MessageError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            MessageError::InvalidJson(e) => Some(e),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for MessageError {
    fn from(error: serde_json::Error) -> Self {
        MessageError::InvalidJson(error)
    }
}

/// General relay error that encompasses all error types
#[derive(Debug)]
pub enum RelayError {
    Io(io::Error),
    WebSocket(tungstenite::Error),
    Config(config::ConfigError),
}

impl fmt::Display for RelayError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RelayError::Io(e) => write!(f, "I/O error: {}", e),
            RelayError::WebSocket(e) => write!(f, "WebSocket error: {}", e),
            RelayError::Config(e) => write!(f, "Configuration error: {}", e),
        }
    }
}

impl std::error::Error for RelayError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RelayError::Io(e) => Some(e),
            RelayError::WebSocket(e) => Some(e),
            RelayError::Config(e) => Some(e),
        }
    }
}

impl RelayError {
    /// True for the ways a peer normally goes away (close handshake,
    /// reset, EOF mid-frame). These are logged quietly.
    pub fn is_disconnect(&self) -> bool {
        match self {
            RelayError::Io(e) => is_disconnect_kind(e.kind()),
            RelayError::WebSocket(e) => match e {
                tungstenite::Error::ConnectionClosed | tungstenite::Error::AlreadyClosed => true,
                tungstenite::Error::Protocol(
                    tungstenite::error::ProtocolError::ResetWithoutClosingHandshake,
                ) => true,
                tungstenite::Error::Io(io) => is_disconnect_kind(io.kind()),
                _ => false,
            },
            _ => false,
        }
    }
}

impl RelayError {
    /// True when the client's upgrade request was refused (wrong path,
    /// not a WebSocket request). Routine client mistakes, not relay faults.
    pub fn is_rejected_handshake(&self) -> bool {
        matches!(
            self,
            RelayError::WebSocket(tungstenite::Error::Http(_))
                | RelayError::WebSocket(tungstenite::Error::HttpFormat(_))
                | RelayError::WebSocket(tungstenite::Error::Protocol(
                    tungstenite::error::ProtocolError::WrongHttpMethod
                        | tungstenite::error::ProtocolError::MissingConnectionUpgradeHeader
                        | tungstenite::error::ProtocolError::MissingUpgradeWebSocketHeader
                        | tungstenite::error::ProtocolError::MissingSecWebSocketVersionHeader
                        | tungstenite::error::ProtocolError::MissingSecWebSocketKey
                ))
        )
    }
}

fn is_disconnect_kind(kind: io::ErrorKind) -> bool {
    matches!(
        kind,
        io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::BrokenPipe
            | io::ErrorKind::UnexpectedEof
    )
}

impl From<io::Error> for RelayError {
    fn from(error: io::Error) -> Self {
        RelayError::Io(error)
    }
}

impl From<tungstenite::Error> for RelayError {
    fn from(error: tungstenite::Error) -> Self {
        RelayError::WebSocket(error)
    }
}

impl From<config::ConfigError> for RelayError {
    fn from(error: config::ConfigError) -> Self {
        RelayError::Config(error)
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reset_counts_as_disconnect() {
        let err = RelayError::from(io::Error::from(io::ErrorKind::ConnectionReset));
        assert!(err.is_disconnect());

        let err = RelayError::from(tungstenite::Error::ConnectionClosed);
        assert!(err.is_disconnect());
    }

    #[test]
    fn config_error_is_not_a_disconnect() {
        let err = RelayError::from(config::ConfigError::Message("bad".into()));
        assert!(!err.is_disconnect());
        assert_eq!(err.to_string(), "Configuration error: bad");
    }

    #[test]
    fn refused_upgrade_is_a_rejected_handshake() {
        let refusal = tungstenite::http::Response::new(None);
        let err = RelayError::from(tungstenite::Error::Http(refusal));
        assert!(err.is_rejected_handshake());
        assert!(!err.is_disconnect());

        let err = RelayError::from(io::Error::from(io::ErrorKind::PermissionDenied));
        assert!(!err.is_rejected_handshake());
    }

    #[test]
    fn missing_field_names_the_field() {
        let err = MessageError::MissingField("clientId");
        assert_eq!(
            err.to_string(),
            "Message is missing required field `clientId`"
        );
    }
}
