//! Client registry
//!
//! Maps client identities to the outbound queue of the connection that
//! registered them. Last registration wins; removal checks ownership so a
//! closing connection never evicts the connection that replaced it.

use log::{debug, warn};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::sync::mpsc::{self, error::TrySendError};

/// Process-unique id assigned to each accepted connection.
pub type ConnectionId = u64;

/// Registry shared by all connection tasks.
pub type SharedRegistry = Arc<Mutex<ClientRegistry>>;

/// A unit of work for a connection's writer task.
#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    Text(String),
    Ping,
    /// Send a close frame and stop writing.
    Close,
}

/// Outcome of handing a frame to a connection's queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Queued,
    /// The peer is not draining its queue fast enough.
    Full,
    /// The connection's writer is gone.
    Closed,
}

/// Handle to a live connection: its id plus the sending side of its queue.
#[derive(Debug, Clone)]
pub struct PeerHandle {
    id: ConnectionId,
    tx: mpsc::Sender<Frame>,
}

impl PeerHandle {
    pub fn new(id: ConnectionId, tx: mpsc::Sender<Frame>) -> Self {
        Self { id, tx }
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn is_open(&self) -> bool {
        !self.tx.is_closed()
    }

    /// Queue a frame without waiting. Never blocks on a slow peer.
    pub fn deliver(&self, frame: Frame) -> Delivery {
        match self.tx.try_send(frame) {
            Ok(()) => Delivery::Queued,
            Err(TrySendError::Full(_)) => Delivery::Full,
            Err(TrySendError::Closed(_)) => Delivery::Closed,
        }
    }
}

/// Registry for tracking registered clients
#[derive(Debug, Default)]
pub struct ClientRegistry {
    peers: HashMap<String, PeerHandle>,
}

impl ClientRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shared() -> SharedRegistry {
        Arc::new(Mutex::new(Self::new()))
    }

    /// Point `identity` at `handle`. Returns the handle it replaced when
    /// that belonged to a different connection.
    pub fn insert(&mut self, identity: String, handle: PeerHandle) -> Option<PeerHandle> {
        let id = handle.id();
        self.peers
            .insert(identity, handle)
            .filter(|previous| previous.id() != id)
    }

    pub fn get(&self, identity: &str) -> Option<&PeerHandle> {
        self.peers.get(identity)
    }

    pub fn contains(&self, identity: &str) -> bool {
        self.peers.contains_key(identity)
    }

    /// Remove `identity` only if it is still owned by connection `id`.
    pub fn remove_if_owned(&mut self, identity: &str, id: ConnectionId) -> bool {
        match self.peers.get(identity) {
            Some(handle) if handle.id() == id => {
                self.peers.remove(identity);
                true
            }
            _ => false,
        }
    }

    /// Registered identities other than `identity`, sorted.
    pub fn identities_except(&self, identity: &str) -> Vec<String> {
        let mut others: Vec<String> = self
            .peers
            .keys()
            .filter(|key| key.as_str() != identity)
            .cloned()
            .collect();
        others.sort();
        others
    }

    /// Copy of every (identity, handle) pair except `identity`.
    pub fn snapshot_except(&self, identity: &str) -> Vec<(String, PeerHandle)> {
        self.peers
            .iter()
            .filter(|(key, _)| key.as_str() != identity)
            .map(|(key, handle)| (key.clone(), handle.clone()))
            .collect()
    }

    /// Deliver `text` to every open connection except `identity`'s.
    /// Returns how many connections accepted the frame.
    pub fn broadcast_except(&self, identity: &str, text: &str) -> usize {
        let mut delivered = 0;
        for (peer, handle) in self.snapshot_except(identity) {
            if !handle.is_open() {
                debug!("Skipping closed connection for {}", peer);
                continue;
            }
            match handle.deliver(Frame::Text(text.to_string())) {
                Delivery::Queued => delivered += 1,
                Delivery::Full => warn!("Outbound queue full for {}, broadcast dropped", peer),
                Delivery::Closed => debug!("Connection for {} closed during broadcast", peer),
            }
        }
        delivered
    }

    pub fn len(&self) -> usize {
        self.peers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }
}
