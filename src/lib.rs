pub mod client;
pub mod config;
pub mod error;
pub mod protocol;
pub mod server;

pub use crate::config::RelayConfig;
pub use error::RelayError;
pub use server::Server;
