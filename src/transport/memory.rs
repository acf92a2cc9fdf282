//! In-process transport implementation
//!
//! A hub keyed by identity, pairing endpoints in the same process. Used by
//! the test suite and the demo binary; real deployments plug a WebRTC
//! backend into the same traits.

use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::mpsc;
use tracing::debug;

use super::{
    ConnectMetadata, DataLink, Endpoint, EndpointEvent, EndpointEvents, LinkEvent, LinkEvents,
    Transport, TransportError, TransportErrorKind,
};
use crate::config::PeerChatConfig;
use crate::{Error, Result};

/// In-process transport backend
///
/// All endpoints opened through one `MemoryTransport` (or a shared
/// `Arc<MemoryTransport>`) can reach each other by identity.
#[derive(Default)]
pub struct MemoryTransport {
    hub: Arc<Hub>,
    scripted: Mutex<VecDeque<String>>,
}

impl MemoryTransport {
    /// Create a transport with random identity assignment
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a transport that assigns the given identities in order
    ///
    /// Once the script runs out, identities fall back to random. If a
    /// scripted identity is already registered, the opened endpoint is dead
    /// on arrival and reports `unavailable-id` (PeerJS semantics).
    pub fn with_identities<I, S>(identities: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            hub: Arc::new(Hub::default()),
            scripted: Mutex::new(identities.into_iter().map(Into::into).collect()),
        }
    }

    /// Push a transport error event to a live endpoint
    ///
    /// Test hook simulating signaling-server failures. Returns false if no
    /// endpoint is registered under `identity`.
    pub fn inject_error(&self, identity: &str, error: TransportError) -> bool {
        match self.hub.sender(identity) {
            Some(tx) => tx.send(EndpointEvent::Error(error)).is_ok(),
            None => false,
        }
    }

    /// True if an endpoint is currently registered under `identity`
    pub fn is_registered(&self, identity: &str) -> bool {
        self.hub.sender(identity).is_some()
    }

    fn next_identity(&self) -> String {
        self.scripted
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front()
            .unwrap_or_else(|| format!("peer-{}", uuid::Uuid::new_v4()))
    }
}

#[async_trait]
impl Transport for MemoryTransport {
    async fn open_endpoint(
        &self,
        _config: &PeerChatConfig,
    ) -> Result<(Arc<dyn Endpoint>, EndpointEvents)> {
        let identity = self.next_identity();
        let (events_tx, events_rx) = mpsc::unbounded_channel();

        if !self.hub.register(&identity, events_tx.clone()) {
            debug!(identity = %identity, "identity already registered");
            let _ = events_tx.send(EndpointEvent::Error(TransportError::new(
                TransportErrorKind::UnavailableId,
                format!("identity {} is already registered", identity),
            )));
            let endpoint = Arc::new(MemoryEndpoint {
                identity: Mutex::new(None),
                hub: self.hub.clone(),
                events: events_tx,
            });
            return Ok((endpoint, events_rx));
        }

        debug!(identity = %identity, "endpoint registered");
        let _ = events_tx.send(EndpointEvent::Open {
            identity: identity.clone(),
        });

        let endpoint = Arc::new(MemoryEndpoint {
            identity: Mutex::new(Some(identity)),
            hub: self.hub.clone(),
            events: events_tx,
        });
        Ok((endpoint, events_rx))
    }
}

/// Shared registry of live endpoints, keyed by identity
#[derive(Default)]
struct Hub {
    endpoints: Mutex<HashMap<String, mpsc::UnboundedSender<EndpointEvent>>>,
}

impl Hub {
    /// Register an endpoint; false if the identity is taken
    fn register(&self, identity: &str, tx: mpsc::UnboundedSender<EndpointEvent>) -> bool {
        let mut endpoints = self.lock();
        if endpoints.contains_key(identity) {
            return false;
        }
        endpoints.insert(identity.to_string(), tx);
        true
    }

    fn deregister(&self, identity: &str) {
        self.lock().remove(identity);
    }

    fn sender(&self, identity: &str) -> Option<mpsc::UnboundedSender<EndpointEvent>> {
        self.lock().get(identity).cloned()
    }

    fn lock(
        &self,
    ) -> std::sync::MutexGuard<'_, HashMap<String, mpsc::UnboundedSender<EndpointEvent>>> {
        self.endpoints
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

struct MemoryEndpoint {
    /// None before open succeeded or after shutdown
    identity: Mutex<Option<String>>,
    hub: Arc<Hub>,
    events: mpsc::UnboundedSender<EndpointEvent>,
}

#[async_trait]
impl Endpoint for MemoryEndpoint {
    fn identity(&self) -> Option<String> {
        self.identity
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    async fn connect(
        &self,
        remote_id: &str,
        metadata: ConnectMetadata,
    ) -> Result<(Arc<dyn DataLink>, LinkEvents)> {
        let local_id = self.identity().ok_or(Error::EndpointClosed)?;

        let Some(remote_tx) = self.hub.sender(remote_id) else {
            let _ = self.events.send(EndpointEvent::Error(TransportError::new(
                TransportErrorKind::PeerUnavailable,
                format!("no peer registered as {}", remote_id),
            )));
            return Err(Error::PeerUnreachable(remote_id.to_string()));
        };

        // Two paired halves: each half's outbound feeds the other half's
        // event stream, and its feedback feeds its own (close notification).
        let (local_tx, local_rx) = mpsc::unbounded_channel();
        let (remote_link_tx, remote_link_rx) = mpsc::unbounded_channel();

        let local_link = Arc::new(MemoryLink {
            remote_id: remote_id.to_string(),
            metadata: None,
            outbound: remote_link_tx.clone(),
            feedback: local_tx.clone(),
        });
        let remote_link = Arc::new(MemoryLink {
            remote_id: local_id,
            metadata: Some(metadata),
            outbound: local_tx,
            feedback: remote_link_tx,
        });

        let _ = remote_tx.send(EndpointEvent::Connection {
            link: remote_link,
            events: remote_link_rx,
        });

        Ok((local_link, local_rx))
    }

    async fn resume(&self) -> Result<()> {
        let identity = self.identity().ok_or(Error::EndpointClosed)?;
        debug!(identity = %identity, "resuming endpoint");
        let _ = self.events.send(EndpointEvent::Open { identity });
        Ok(())
    }

    async fn shutdown(&self) {
        let taken = self
            .identity
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(identity) = taken {
            debug!(identity = %identity, "endpoint shut down");
            self.hub.deregister(&identity);
        }
    }
}

struct MemoryLink {
    remote_id: String,
    metadata: Option<ConnectMetadata>,
    /// Delivers to the remote half's event stream
    outbound: mpsc::UnboundedSender<LinkEvent>,
    /// Delivers to this half's own event stream
    feedback: mpsc::UnboundedSender<LinkEvent>,
}

#[async_trait]
impl DataLink for MemoryLink {
    fn remote_id(&self) -> &str {
        &self.remote_id
    }

    fn metadata(&self) -> Option<ConnectMetadata> {
        self.metadata.clone()
    }

    async fn send(&self, text: &str) -> Result<()> {
        self.outbound
            .send(LinkEvent::Data(text.to_string()))
            .map_err(|_| Error::LinkClosed(self.remote_id.clone()))
    }

    async fn close(&self) {
        let _ = self.outbound.send(LinkEvent::Closed);
        let _ = self.feedback.send(LinkEvent::Closed);
    }
}
