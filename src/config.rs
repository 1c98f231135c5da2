//! Configuration management for the signaling relay
//!
//! Values are layered: built-in defaults, then an optional `config.toml`,
//! then `SIGNAL_RELAY_*` environment variables (e.g. `SIGNAL_RELAY_PORT`).

use config::{Config, Environment, File};
use serde::Deserialize;
use std::time::Duration;

use crate::error::RelayError;

const DEFAULT_BIND_ADDRESS: &str = "0.0.0.0";
const DEFAULT_PORT: i64 = 8080;
const DEFAULT_PATH: &str = "/ws/signaling";
const DEFAULT_OUTBOUND_BUFFER: i64 = 256;
const DEFAULT_MAX_MESSAGE_SIZE: i64 = 1024 * 1024;

/// Relay configuration. Everything is read once at startup.
#[derive(Debug, Deserialize, Clone)]
pub struct RelayConfig {
    // ═══ NETWORK (Environment Override Supported) ═══
    /// IP address to listen on
    pub bind_address: String,

    /// TCP port to listen on; 0 picks an ephemeral port
    pub port: u16,

    /// Request path the WebSocket upgrade must target. Empty accepts any path.
    pub path: String,

    // ═══ LIMITS ═══
    /// Maximum simultaneous connections, 0 for no limit
    pub max_connections: usize,

    /// Largest accepted WebSocket message in bytes
    pub max_message_size: usize,

    /// Frames queued per connection before further frames to it are dropped
    pub outbound_buffer: usize,

    // ═══ BEHAVIOR ═══
    /// Send a close frame to a connection whose identity was re-registered elsewhere
    pub close_superseded: bool,

    /// Ping interval in seconds, 0 disables keepalive
    pub keepalive_interval_secs: u64,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            bind_address: DEFAULT_BIND_ADDRESS.to_string(),
            port: DEFAULT_PORT as u16,
            path: DEFAULT_PATH.to_string(),
            max_connections: 0,
            max_message_size: DEFAULT_MAX_MESSAGE_SIZE as usize,
            outbound_buffer: DEFAULT_OUTBOUND_BUFFER as usize,
            close_superseded: false,
            keepalive_interval_secs: 0,
        }
    }
}

impl RelayConfig {
    /// Load configuration from `config.toml` (if present) with environment overrides
    pub fn load() -> Result<Self, RelayError> {
        Self::load_from("config")
    }

    /// Same as [`RelayConfig::load`] but reads the named file instead of `config`.
    pub fn load_from(file: &str) -> Result<Self, RelayError> {
        let settings = Config::builder()
            .set_default("bind_address", DEFAULT_BIND_ADDRESS)?
            .set_default("port", DEFAULT_PORT)?
            .set_default("path", DEFAULT_PATH)?
            .set_default("max_connections", 0_i64)?
            .set_default("max_message_size", DEFAULT_MAX_MESSAGE_SIZE)?
            .set_default("outbound_buffer", DEFAULT_OUTBOUND_BUFFER)?
            .set_default("close_superseded", false)?
            .set_default("keepalive_interval_secs", 0_i64)?
            .add_source(File::with_name(file).required(false))
            .add_source(Environment::with_prefix("SIGNAL_RELAY").try_parsing(true))
            .build()?;

        let config: RelayConfig = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Validation for all configuration values
    pub fn validate(&self) -> Result<(), config::ConfigError> {
        if self.bind_address.trim().is_empty() {
            return Err(config::ConfigError::Message(
                "bind_address cannot be empty".into(),
            ));
        }

        if !self.path.is_empty() && !self.path.starts_with('/') {
            return Err(config::ConfigError::Message(
                "path must be empty or start with '/'".into(),
            ));
        }

        if self.max_message_size == 0 {
            return Err(config::ConfigError::Message(
                "max_message_size must be greater than 0".into(),
            ));
        }

        if self.outbound_buffer == 0 {
            return Err(config::ConfigError::Message(
                "outbound_buffer must be greater than 0".into(),
            ));
        }

        Ok(())
    }

    /// Bind address and port as a listen address
    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.bind_address, self.port)
    }

    /// Keepalive interval, or `None` when disabled
    pub fn keepalive_interval(&self) -> Option<Duration> {
        match self.keepalive_interval_secs {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        }
    }

    /// Whether an upgrade request for `request_path` should be accepted.
    /// Query strings are ignored.
    pub fn accepts_path(&self, request_path: &str) -> bool {
        if self.path.is_empty() {
            return true;
        }
        let path = request_path.split('?').next().unwrap_or_default();
        path == self.path || path.strip_suffix('/') == Some(self.path.as_str())
    }

    /// Connection limit, or `None` when unlimited
    pub fn connection_limit(&self) -> Option<usize> {
        match self.max_connections {
            0 => None,
            n => Some(n),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        let config = RelayConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.listen_addr(), "0.0.0.0:8080");
        assert!(config.keepalive_interval().is_none());
        assert!(config.connection_limit().is_none());
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let config = RelayConfig::load_from("does-not-exist/relay").unwrap();
        assert_eq!(config.path, "/ws/signaling");
        assert_eq!(config.outbound_buffer, 256);
        assert!(!config.close_superseded);
    }

    #[test]
    fn invalid_file_surfaces_as_config_error() {
        let dir = std::env::temp_dir().join(format!("signal-relay-config-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let file = dir.join("relay.toml");
        std::fs::write(&file, "outbound_buffer = 0\n").unwrap();

        let result = RelayConfig::load_from(file.with_extension("").to_str().unwrap());
        std::fs::remove_dir_all(&dir).unwrap();

        match result {
            Err(RelayError::Config(e)) => assert!(e.to_string().contains("outbound_buffer")),
            other => panic!("expected a configuration error, got {other:?}"),
        }
    }

    #[test]
    fn rejects_relative_path() {
        let config = RelayConfig {
            path: "ws".into(),
            ..RelayConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_zero_buffer() {
        let config = RelayConfig {
            outbound_buffer: 0,
            ..RelayConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn path_matching() {
        let config = RelayConfig::default();
        assert!(config.accepts_path("/ws/signaling"));
        assert!(config.accepts_path("/ws/signaling/"));
        assert!(config.accepts_path("/ws/signaling?lesson=4"));
        assert!(!config.accepts_path("/"));
        assert!(!config.accepts_path("/ws/signalingx"));

        let any = RelayConfig {
            path: String::new(),
            ..RelayConfig::default()
        };
        assert!(any.accepts_path("/"));
        assert!(any.accepts_path("/whatever"));
    }

    #[test]
    fn keepalive_interval_in_seconds() {
        let config = RelayConfig {
            keepalive_interval_secs: 15,
            ..RelayConfig::default()
        };
        assert_eq!(config.keepalive_interval(), Some(Duration::from_secs(15)));
    }
}
