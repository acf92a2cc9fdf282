//! Peer connection lifecycle manager
//!
//! [`PeerClient`] owns the local identity, wires transport events into the
//! registry, event log, classifier and reconnection controller, and emits
//! three outward callbacks to its caller. All shared-state mutation happens
//! on pump tasks that each consume a single mpsc receiver, so transport
//! callbacks are serialized without exposing any lock to callers.
//!
//! Cancellation is epoch-based: `disconnect` and identity renewal bump the
//! epoch, and every pump task and reconnect directive carries the epoch it
//! was born under. Stale work is dropped instead of racing the new identity.

use async_trait::async_trait;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex as StdMutex, PoisonError};
use tokio::sync::{mpsc, RwLock};
use tracing::{debug, info, warn};

use super::classifier::{ErrorAction, ErrorClassifier};
use super::reconnect::{ReconnectController, ReconnectDirective, ReconnectPhase};
use super::registry::{ConnectionRegistry, RegisteredPeer};
use crate::config::PeerChatConfig;
use crate::log::{EventLog, Severity};
use crate::message::Message;
use crate::transport::{
    ConnectMetadata, DataLink, Endpoint, EndpointEvent, EndpointEvents, LinkEvent, LinkEvents,
    Transport,
};
use crate::{Error, Result};

/// Outward event surface of the lifecycle manager
///
/// Implementations are invoked from the manager's pump tasks; at most one
/// call per callback type is in flight at a time, and within one type
/// delivery order equals event order.
#[async_trait]
pub trait PeerCallbacks: Send + Sync {
    /// The local identity is open and usable
    async fn on_identity_ready(&self, identity: String);

    /// A message arrived from a remote peer
    async fn on_message(&self, message: Message);

    /// The set of live connections changed
    async fn on_connections_changed(&self, peers: Vec<String>);
}

/// Peer connection lifecycle manager
///
/// Cheap to clone; clones share the same underlying state.
#[derive(Clone)]
pub struct PeerClient {
    inner: Arc<Inner>,
}

struct Inner {
    transport: Arc<dyn Transport>,
    config: PeerChatConfig,
    registry: ConnectionRegistry,
    log: Arc<EventLog>,
    classifier: ErrorClassifier,
    reconnect: ReconnectController,
    endpoint: RwLock<Option<Arc<dyn Endpoint>>>,
    callbacks: RwLock<Option<Arc<dyn PeerCallbacks>>>,
    /// Identity epoch; bumped by every endpoint open and by disconnect.
    epoch: AtomicU64,
    /// Directive receiver, consumed once by the driver task.
    directive_rx: StdMutex<Option<mpsc::UnboundedReceiver<ReconnectDirective>>>,
}

impl PeerClient {
    /// Create a client over the given transport backend
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn new(transport: Arc<dyn Transport>, config: PeerChatConfig) -> Result<Self> {
        config.validate()?;

        let log = Arc::new(EventLog::new());
        let (directive_tx, directive_rx) = mpsc::unbounded_channel();

        let inner = Arc::new(Inner {
            classifier: ErrorClassifier::new(log.clone()),
            reconnect: ReconnectController::new(
                config.reconnect.clone(),
                log.clone(),
                directive_tx,
            ),
            transport,
            config,
            registry: ConnectionRegistry::new(),
            log,
            endpoint: RwLock::new(None),
            callbacks: RwLock::new(None),
            epoch: AtomicU64::new(0),
            directive_rx: StdMutex::new(Some(directive_rx)),
        });

        Ok(Self { inner })
    }

    /// Activate the local identity and register the callback bundle
    ///
    /// Spawns the event pump for the new endpoint. Callable again after
    /// [`disconnect`](Self::disconnect); returns
    /// [`Error::AlreadyInitialized`] while an identity is live.
    pub async fn initialize(&self, callbacks: Arc<dyn PeerCallbacks>) -> Result<()> {
        if self.inner.endpoint.read().await.is_some() {
            return Err(Error::AlreadyInitialized);
        }

        info!("initializing peer client");
        *self.inner.callbacks.write().await = Some(callbacks);

        // The reconnect driver lives for the client's lifetime; start it on
        // first initialization only.
        let driver_rx = self
            .inner
            .directive_rx
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(rx) = driver_rx {
            tokio::spawn(drive_reconnects(self.inner.clone(), rx));
        }

        open_endpoint(&self.inner).await
    }

    /// Open an outbound connection to `remote_id`
    ///
    /// Attaches diagnostic metadata (platform, agent, timestamp) and wires
    /// the connection through the same path as inbound ones. A duplicate
    /// connect to an already-registered identifier replaces the old entry.
    pub async fn connect(&self, remote_id: &str) -> Result<()> {
        let endpoint = current_endpoint(&self.inner).await?;
        let epoch = self.inner.epoch.load(Ordering::SeqCst);

        match endpoint.connect(remote_id, ConnectMetadata::local()).await {
            Ok((link, events)) => {
                self.inner
                    .log
                    .info(format!("Connecting to: {}", remote_id));
                wire_link(self.inner.clone(), link, events, epoch).await;
                Ok(())
            }
            Err(e) => {
                self.inner.log.append(
                    format!("Connection to {} failed: {}", remote_id, e),
                    Severity::Error,
                );
                Err(e)
            }
        }
    }

    /// Broadcast a text message over every live connection
    ///
    /// Fire-and-forget, at most once per connection per call, one log entry
    /// per send. Send failures surface through the connection's own error
    /// event, not here.
    pub async fn send_message(&self, text: &str) -> Result<()> {
        current_endpoint(&self.inner).await?;

        for peer in self.inner.registry.snapshot().await {
            self.inner
                .log
                .info(format!("Sending message to {}: {}", peer.id, text));
            if let Err(e) = peer.link.send(text).await {
                debug!(peer = %peer.id, "send failed: {}", e);
            }
        }
        Ok(())
    }

    /// Tear down the local identity and release all connections
    ///
    /// Idempotent. Pending reconnect timers are neutralized by the epoch
    /// bump before any teardown happens.
    pub async fn disconnect(&self) {
        self.inner.epoch.fetch_add(1, Ordering::SeqCst);

        let endpoint = self.inner.endpoint.write().await.take();
        if let Some(endpoint) = endpoint {
            endpoint.shutdown().await;
            self.inner.log.info("Local peer destroyed");
        }

        for peer in self.inner.registry.clear().await {
            peer.link.close().await;
        }
    }

    /// Current identity, or `None` when not (yet) open
    pub async fn identity(&self) -> Option<String> {
        self.inner
            .endpoint
            .read()
            .await
            .as_ref()
            .and_then(|e| e.identity())
    }

    /// Forward a reconnect request to the reconnection controller
    ///
    /// Must be called from within a tokio runtime.
    pub fn handle_reconnect(&self, force_new_identity: bool) {
        let epoch = self.inner.epoch.load(Ordering::SeqCst);
        self.inner.reconnect.request(force_new_identity, epoch);
    }

    /// The diagnostic event log for this client
    pub fn log(&self) -> Arc<EventLog> {
        self.inner.log.clone()
    }

    /// Ordered identifiers of the live connections
    pub async fn connected_peers(&self) -> Vec<String> {
        self.inner.registry.peer_ids().await
    }

    /// Current reconnection phase
    pub fn reconnect_phase(&self) -> ReconnectPhase {
        self.inner.reconnect.phase()
    }

    /// Reconnection attempts since the last identity-open
    pub fn reconnect_attempts(&self) -> u32 {
        self.inner.reconnect.attempts()
    }
}

async fn current_endpoint(inner: &Arc<Inner>) -> Result<Arc<dyn Endpoint>> {
    inner
        .endpoint
        .read()
        .await
        .clone()
        .ok_or(Error::NotInitialized)
}

async fn callbacks(inner: &Arc<Inner>) -> Option<Arc<dyn PeerCallbacks>> {
    inner.callbacks.read().await.clone()
}

/// Open a fresh endpoint under a new epoch and start its event pump
async fn open_endpoint(inner: &Arc<Inner>) -> Result<()> {
    let epoch = inner.epoch.fetch_add(1, Ordering::SeqCst) + 1;
    let (endpoint, events) = inner.transport.open_endpoint(&inner.config).await?;
    *inner.endpoint.write().await = Some(endpoint);
    tokio::spawn(pump_endpoint_events(inner.clone(), events, epoch));
    Ok(())
}

/// Consume endpoint events until the stream ends or the epoch moves on
async fn pump_endpoint_events(inner: Arc<Inner>, mut events: EndpointEvents, epoch: u64) {
    while let Some(event) = events.recv().await {
        if inner.epoch.load(Ordering::SeqCst) != epoch {
            debug!("endpoint pump for stale epoch {} exiting", epoch);
            break;
        }

        match event {
            EndpointEvent::Open { identity } => {
                inner
                    .log
                    .append(format!("Peer opened with ID: {}", identity), Severity::Success);
                inner.reconnect.mark_connected();
                if let Some(cb) = callbacks(&inner).await {
                    cb.on_identity_ready(identity).await;
                }
            }
            EndpointEvent::Connection { link, events } => {
                inner.log.append(
                    format!("Incoming connection from: {}", link.remote_id()),
                    Severity::Success,
                );
                wire_link(inner.clone(), link, events, epoch).await;
            }
            EndpointEvent::Error(error) => {
                warn!(kind = %error.kind, "transport error: {}", error.message);
                match inner.classifier.handle(&error) {
                    ErrorAction::LogOnly => {}
                    ErrorAction::Reconnect => {
                        inner.reconnect.request(false, epoch);
                    }
                    ErrorAction::ReconnectNewIdentity => {
                        inner.reconnect.request(true, epoch);
                    }
                }
            }
        }
    }
}

/// Shared wiring for inbound and outbound connections
async fn wire_link(inner: Arc<Inner>, link: Arc<dyn DataLink>, events: LinkEvents, epoch: u64) {
    let peer_id = link.remote_id().to_string();
    inner
        .registry
        .insert(RegisteredPeer {
            id: peer_id.clone(),
            link,
        })
        .await;
    notify_connections_changed(&inner).await;
    tokio::spawn(pump_link_events(inner, peer_id, events, epoch));
}

/// Consume one connection's events until it closes or the epoch moves on
async fn pump_link_events(inner: Arc<Inner>, peer_id: String, mut events: LinkEvents, epoch: u64) {
    while let Some(event) = events.recv().await {
        if inner.epoch.load(Ordering::SeqCst) != epoch {
            debug!(peer = %peer_id, "link pump for stale epoch exiting");
            break;
        }

        match event {
            LinkEvent::Data(text) => {
                inner
                    .log
                    .info(format!("Received message from {}: {}", peer_id, text));
                if let Some(cb) = callbacks(&inner).await {
                    cb.on_message(Message {
                        text,
                        sender_id: peer_id.clone(),
                        is_mine: false,
                    })
                    .await;
                }
            }
            LinkEvent::Closed => {
                inner.registry.remove(&peer_id).await;
                inner
                    .log
                    .info(format!("Connection closed with {}", peer_id));
                notify_connections_changed(&inner).await;
                break;
            }
            LinkEvent::Error(message) => {
                // Connection-local; never triggers reconnection.
                inner.log.append(
                    format!("Connection error with {}: {}", peer_id, message),
                    Severity::Error,
                );
            }
        }
    }
}

async fn notify_connections_changed(inner: &Arc<Inner>) {
    let peers = inner.registry.peer_ids().await;
    if let Some(cb) = callbacks(inner).await {
        cb.on_connections_changed(peers).await;
    }
}

/// Execute reconnect directives for the client's lifetime
async fn drive_reconnects(
    inner: Arc<Inner>,
    mut directives: mpsc::UnboundedReceiver<ReconnectDirective>,
) {
    while let Some(directive) = directives.recv().await {
        if inner.epoch.load(Ordering::SeqCst) != directive.epoch {
            debug!("dropping reconnect directive for stale epoch");
            continue;
        }
        if inner.reconnect.phase() != ReconnectPhase::Scheduled {
            // Identity recovered (or exhausted) before the timer fired.
            continue;
        }

        inner.log.info("Attempting to reconnect...");

        if directive.force_new_identity {
            let old = inner.endpoint.write().await.take();
            if let Some(endpoint) = old {
                endpoint.shutdown().await;
            }
            if let Err(e) = open_endpoint(&inner).await {
                inner
                    .log
                    .append(format!("Re-initialization failed: {}", e), Severity::Error);
            }
        } else {
            let endpoint = inner.endpoint.read().await.clone();
            if let Some(endpoint) = endpoint {
                if let Err(e) = endpoint.resume().await {
                    inner
                        .log
                        .append(format!("Reconnect failed: {}", e), Severity::Error);
                }
            }
        }
    }
}
