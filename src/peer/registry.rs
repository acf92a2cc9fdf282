//! Live connection registry
//!
//! Tracks the set of open data links for the local identity. Storage is
//! keyed by remote identifier: a second insert for the same identifier
//! replaces the first in place, so `snapshot` can never contain duplicates.

use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

use crate::transport::DataLink;

/// One registered connection: remote identifier plus its send handle
pub struct RegisteredPeer {
    /// Remote peer identifier
    pub id: String,

    /// Transport handle for sending and teardown
    pub link: Arc<dyn DataLink>,
}

impl Clone for RegisteredPeer {
    fn clone(&self) -> Self {
        Self {
            id: self.id.clone(),
            link: Arc::clone(&self.link),
        }
    }
}

impl std::fmt::Debug for RegisteredPeer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegisteredPeer").field("id", &self.id).finish()
    }
}

/// Insertion-ordered, identifier-keyed set of live connections
#[derive(Default)]
pub struct ConnectionRegistry {
    peers: RwLock<Vec<RegisteredPeer>>,
}

impl ConnectionRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a connection; replaces any existing entry with the same
    /// identifier in place. Returns true when an entry was replaced.
    pub async fn insert(&self, peer: RegisteredPeer) -> bool {
        let mut peers = self.peers.write().await;
        if let Some(existing) = peers.iter_mut().find(|p| p.id == peer.id) {
            debug!(peer = %peer.id, "replacing registered connection");
            *existing = peer;
            true
        } else {
            debug!(peer = %peer.id, "registering connection");
            peers.push(peer);
            false
        }
    }

    /// Remove the entry with this identifier; no-op if absent
    pub async fn remove(&self, id: &str) -> bool {
        let mut peers = self.peers.write().await;
        let before = peers.len();
        peers.retain(|p| p.id != id);
        peers.len() != before
    }

    /// Ordered snapshot of all connections (insertion order)
    pub async fn snapshot(&self) -> Vec<RegisteredPeer> {
        self.peers.read().await.clone()
    }

    /// Ordered snapshot of remote identifiers only
    pub async fn peer_ids(&self) -> Vec<String> {
        self.peers.read().await.iter().map(|p| p.id.clone()).collect()
    }

    /// True iff no connections are present
    pub async fn is_empty(&self) -> bool {
        self.peers.read().await.is_empty()
    }

    /// Number of live connections
    pub async fn len(&self) -> usize {
        self.peers.read().await.len()
    }

    /// Drain all connections, returning them for teardown
    pub async fn clear(&self) -> Vec<RegisteredPeer> {
        let mut peers = self.peers.write().await;
        peers.drain(..).collect()
    }
}
