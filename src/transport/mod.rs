//! Transport backend boundary
//!
//! The peer lifecycle manager does not talk to a signaling server or a
//! WebRTC stack directly. It talks to these traits: a [`Transport`] opens
//! [`Endpoint`]s (one live identity each), an endpoint opens [`DataLink`]s
//! (one bidirectional channel per remote peer). Events flow back on mpsc
//! receivers handed out at creation time, which keeps delivery serialized:
//! one pump task per receiver, no listener registration.

pub mod memory;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tokio::sync::mpsc;

use crate::config::PeerChatConfig;
use crate::Result;

/// Receiver for endpoint-level events
pub type EndpointEvents = mpsc::UnboundedReceiver<EndpointEvent>;

/// Receiver for per-connection events
pub type LinkEvents = mpsc::UnboundedReceiver<LinkEvent>;

/// Fixed error taxonomy of the transport backend
///
/// Mirrors the PeerJS-style signaling error codes. Codes outside the
/// taxonomy arrive as [`Other`](TransportErrorKind::Other) with detail in
/// the accompanying message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TransportErrorKind {
    /// The runtime lacks WebRTC support entirely
    BrowserIncompatible,
    /// Lost the signaling server; the identity may be resumable
    Disconnected,
    /// The configured identity is malformed
    InvalidId,
    /// The configured API key is rejected
    InvalidKey,
    /// General network failure
    Network,
    /// The requested remote peer does not exist or is offline
    PeerUnavailable,
    /// Secure transport to the signaling server is unavailable
    SslUnavailable,
    /// Signaling server reported an internal error
    ServerError,
    /// Socket-level failure
    SocketError,
    /// Signaling socket closed unexpectedly
    SocketClosed,
    /// The requested identity is already claimed by another peer
    UnavailableId,
    /// Native WebRTC failure
    Webrtc,
    /// Anything outside the fixed taxonomy
    Other,
}

impl TransportErrorKind {
    /// Wire-format tag for this kind
    pub fn as_str(&self) -> &'static str {
        match self {
            TransportErrorKind::BrowserIncompatible => "browser-incompatible",
            TransportErrorKind::Disconnected => "disconnected",
            TransportErrorKind::InvalidId => "invalid-id",
            TransportErrorKind::InvalidKey => "invalid-key",
            TransportErrorKind::Network => "network",
            TransportErrorKind::PeerUnavailable => "peer-unavailable",
            TransportErrorKind::SslUnavailable => "ssl-unavailable",
            TransportErrorKind::ServerError => "server-error",
            TransportErrorKind::SocketError => "socket-error",
            TransportErrorKind::SocketClosed => "socket-closed",
            TransportErrorKind::UnavailableId => "unavailable-id",
            TransportErrorKind::Webrtc => "webrtc",
            TransportErrorKind::Other => "other",
        }
    }
}

impl fmt::Display for TransportErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A transport-level error event: raw classification input
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportError {
    /// Taxonomy tag
    pub kind: TransportErrorKind,

    /// Backend-supplied detail text
    pub message: String,
}

impl TransportError {
    /// Create a new transport error
    pub fn new(kind: TransportErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

/// Events emitted by an [`Endpoint`]
pub enum EndpointEvent {
    /// The identity has been assigned and the endpoint is usable
    Open {
        /// The identity the backend assigned
        identity: String,
    },

    /// A remote peer opened a connection to us
    Connection {
        /// Send/close handle for the new connection
        link: Arc<dyn DataLink>,
        /// Event stream for the new connection
        events: LinkEvents,
    },

    /// Transport-level failure
    Error(TransportError),
}

impl fmt::Debug for EndpointEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EndpointEvent::Open { identity } => {
                f.debug_struct("Open").field("identity", identity).finish()
            }
            EndpointEvent::Connection { link, .. } => f
                .debug_struct("Connection")
                .field("remote_id", &link.remote_id())
                .finish(),
            EndpointEvent::Error(err) => f.debug_tuple("Error").field(err).finish(),
        }
    }
}

/// Events emitted by a [`DataLink`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkEvent {
    /// Payload received from the remote peer
    Data(String),

    /// The connection has closed (either side)
    Closed,

    /// Connection-local failure; does not affect other links
    Error(String),
}

/// Diagnostic metadata attached to outbound connection attempts
///
/// Purely informational; no protocol decision reads it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectMetadata {
    /// Operating system of the connecting peer
    pub platform: String,

    /// Client name and version
    pub agent: String,

    /// RFC 3339 timestamp of the connection attempt
    pub timestamp: String,
}

impl ConnectMetadata {
    /// Metadata describing this process
    pub fn local() -> Self {
        Self {
            platform: std::env::consts::OS.to_string(),
            agent: format!("{}/{}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION")),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

/// One bidirectional data channel to a remote peer
#[async_trait]
pub trait DataLink: Send + Sync {
    /// Identity of the remote peer
    fn remote_id(&self) -> &str;

    /// Metadata the initiator attached, if any
    fn metadata(&self) -> Option<ConnectMetadata>;

    /// Transmit a text payload; fire-and-forget, no acknowledgment
    async fn send(&self, text: &str) -> Result<()>;

    /// Close the link; both sides observe [`LinkEvent::Closed`]
    async fn close(&self);
}

/// One live local identity against the transport backend
#[async_trait]
pub trait Endpoint: Send + Sync {
    /// The assigned identity, or `None` before open / after shutdown
    fn identity(&self) -> Option<String>;

    /// Open an outbound connection to `remote_id`
    ///
    /// Returns the link handle together with its event stream so the caller
    /// owns event delivery from the first instant.
    async fn connect(
        &self,
        remote_id: &str,
        metadata: ConnectMetadata,
    ) -> Result<(Arc<dyn DataLink>, LinkEvents)>;

    /// Lightweight reconnect keeping the existing identity
    ///
    /// On success the backend re-announces [`EndpointEvent::Open`].
    async fn resume(&self) -> Result<()>;

    /// Tear down the identity; idempotent
    async fn shutdown(&self);
}

/// Factory for endpoints; the outermost transport handle
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    /// Create and activate a fresh local identity
    ///
    /// Each call yields a new identity; identity renewal is
    /// `shutdown` + `open_endpoint`.
    async fn open_endpoint(
        &self,
        config: &PeerChatConfig,
    ) -> Result<(Arc<dyn Endpoint>, EndpointEvents)>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kind_wire_tags() {
        assert_eq!(
            TransportErrorKind::BrowserIncompatible.as_str(),
            "browser-incompatible"
        );
        assert_eq!(TransportErrorKind::UnavailableId.as_str(), "unavailable-id");
        assert_eq!(TransportErrorKind::SocketClosed.as_str(), "socket-closed");
    }

    #[test]
    fn test_error_kind_serde_kebab_case() {
        let json = serde_json::to_string(&TransportErrorKind::PeerUnavailable).unwrap();
        assert_eq!(json, "\"peer-unavailable\"");
        let kind: TransportErrorKind = serde_json::from_str("\"invalid-key\"").unwrap();
        assert_eq!(kind, TransportErrorKind::InvalidKey);
    }

    #[test]
    fn test_transport_error_display() {
        let err = TransportError::new(TransportErrorKind::Network, "link flapped");
        assert_eq!(err.to_string(), "network: link flapped");
    }

    #[test]
    fn test_connect_metadata_local() {
        let meta = ConnectMetadata::local();
        assert_eq!(meta.platform, std::env::consts::OS);
        assert!(meta.agent.starts_with("peerchat/"));
        assert!(!meta.timestamp.is_empty());

        let json = serde_json::to_string(&meta).unwrap();
        let decoded: ConnectMetadata = serde_json::from_str(&json).unwrap();
        assert_eq!(meta, decoded);
    }
}
