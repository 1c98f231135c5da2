//! Client session management
//!
//! One `Session` per connection. It starts unregistered, becomes
//! registered on `register`, and is torn down by [`Session::close`].
//! Nothing here touches the socket; frames go out through the
//! connection's [`PeerHandle`].

use log::{debug, error, info, warn};
use std::net::SocketAddr;

use crate::client::registry::{ClientRegistry, Delivery, Frame, PeerHandle, SharedRegistry};
use crate::error::handlers::handle_message_error;
use crate::protocol::{Addressed, Inbound, Outbound, parse_binary, parse_message};

pub struct Session {
    addr: SocketAddr,
    handle: PeerHandle,
    identity: Option<String>,
    registry: SharedRegistry,
    close_superseded: bool,
}

impl Session {
    pub fn new(
        addr: SocketAddr,
        handle: PeerHandle,
        registry: SharedRegistry,
        close_superseded: bool,
    ) -> Self {
        Self {
            addr,
            handle,
            identity: None,
            registry,
            close_superseded,
        }
    }

    /// Identity this connection registered under, if any.
    pub fn identity(&self) -> Option<&str> {
        self.identity.as_deref()
    }

    pub fn is_registered(&self) -> bool {
        self.identity.is_some()
    }

    /// Handle one text frame. Bad frames are logged and dropped.
    pub async fn handle_text(&mut self, raw: &str) {
        match parse_message(raw) {
            Ok(message) => self.dispatch(message).await,
            Err(e) => handle_message_error(&self.addr, &e),
        }
    }

    pub async fn handle_binary(&mut self, raw: &[u8]) {
        match parse_binary(raw) {
            Ok(message) => self.dispatch(message).await,
            Err(e) => handle_message_error(&self.addr, &e),
        }
    }

    pub async fn dispatch(&mut self, message: Inbound) {
        match message {
            Inbound::Register { client_id } => self.register(client_id).await,
            Inbound::Addressed(message) => {
                self.forward(message).await;
            }
            Inbound::Unrecognized { kind } => {
                warn!("Unknown message type from {}: {}", self.addr, kind);
            }
        }
    }

    /// Register `client_id`: insert, reply with the peer list, announce the
    /// join. All under one lock so no peer sees a half-registered client.
    async fn register(&mut self, client_id: String) {
        let mut registry = self.registry.lock().await;

        if let Some(previous) = self.identity.take() {
            if previous != client_id {
                release(&mut registry, &previous, &self.handle);
            }
        }

        if let Some(superseded) = registry.insert(client_id.clone(), self.handle.clone()) {
            info!(
                "Client {} re-registered from {}, superseding connection #{}",
                client_id,
                self.addr,
                superseded.id()
            );
            if self.close_superseded {
                superseded.deliver(Frame::Close);
            }
        }

        info!(
            "Client registered: {} ({} connected)",
            client_id,
            registry.len()
        );

        let reply = Outbound::Clients {
            clients: registry.identities_except(&client_id),
        };
        match reply.encode() {
            Ok(text) => {
                if self.handle.deliver(Frame::Text(text)) != Delivery::Queued {
                    warn!("Could not queue peer list for {}", client_id);
                }
            }
            Err(e) => error!("Failed to encode peer list: {}", e),
        }

        announce(
            &registry,
            &client_id,
            Outbound::UserJoined {
                client_id: client_id.clone(),
            },
        );

        self.identity = Some(client_id);
    }

    /// Forward an addressed message to its target with `from` stamped in.
    /// Returns what happened to the frame, or `None` when it was dropped
    /// before reaching any queue.
    async fn forward(&self, message: Addressed) -> Option<Delivery> {
        let Some(from) = self.identity.as_deref() else {
            warn!(
                "Dropping {} from unregistered connection {}",
                message.kind(),
                self.addr
            );
            return None;
        };

        let registry = self.registry.lock().await;
        let Some(target) = registry.get(message.target()).filter(|h| h.is_open()) else {
            warn!(
                "Target {} not found, dropping {} from {}",
                message.target(),
                message.kind(),
                from
            );
            return None;
        };

        let kind = message.kind().to_string();
        let to = message.target().to_string();
        let delivery = target.deliver(Frame::Text(message.stamped(from)));
        match delivery {
            Delivery::Queued => debug!("Forwarded {} from {} to {}", kind, from, to),
            Delivery::Full => warn!(
                "Outbound queue full for {}, dropped {} from {}",
                to, kind, from
            ),
            Delivery::Closed => debug!(
                "Target {} closed before {} from {} was queued",
                to, kind, from
            ),
        }
        Some(delivery)
    }

    /// Release this connection's identity and tell the others it left.
    /// Safe to call more than once.
    pub async fn close(&mut self) {
        let Some(identity) = self.identity.take() else {
            debug!("Unregistered connection {} closed", self.addr);
            return;
        };
        let mut registry = self.registry.lock().await;
        release(&mut registry, &identity, &self.handle);
    }
}

/// Drop `identity` if `handle` still owns it and broadcast `user-left`.
fn release(registry: &mut ClientRegistry, identity: &str, handle: &PeerHandle) {
    if registry.remove_if_owned(identity, handle.id()) {
        info!(
            "Client disconnected: {} ({} connected)",
            identity,
            registry.len()
        );
        announce(
            registry,
            identity,
            Outbound::UserLeft {
                client_id: identity.to_string(),
            },
        );
    } else {
        debug!(
            "Client {} already superseded, leaving registry untouched",
            identity
        );
    }
}

fn announce(registry: &ClientRegistry, identity: &str, event: Outbound) {
    match event.encode() {
        Ok(text) => {
            let delivered = registry.broadcast_except(identity, &text);
            debug!("Announced {:?} to {} peers", event, delivered);
        }
        Err(e) => error!("Failed to encode {:?}: {}", event, e),
    }
}
