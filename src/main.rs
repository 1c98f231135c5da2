//! Signaling relay - Entry Point
//!
//! Brokers WebRTC connection setup between lesson participants over WebSocket.

use classroom_signal_relay::{RelayConfig, Server};
use env_logger::Env;
use log::{error, info};
use std::process::ExitCode;

#[tokio::main]
async fn main() -> ExitCode {
    // RUST_LOG overrides the default level
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    info!("Launching signaling relay...");

    let config = match RelayConfig::load() {
        Ok(config) => config,
        Err(e) => {
            error!("Startup failed: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let server = match Server::bind(config).await {
        Ok(server) => server,
        Err(e) => {
            error!("Server startup failed: {}", e);
            return ExitCode::FAILURE;
        }
    };

    server.run().await;
    ExitCode::SUCCESS
}
