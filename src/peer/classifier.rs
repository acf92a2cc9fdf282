//! Transport error classification
//!
//! Maps a transport error to a handling policy. The mapping and the text
//! are pure functions of the error kind; the classifier only adds the two
//! log appends. Executing the returned action is the lifecycle manager's
//! job, which keeps this component trivially testable.

use std::sync::Arc;

use crate::log::{EventLog, Severity};
use crate::transport::{TransportError, TransportErrorKind};

/// How the lifecycle manager should react to a transport error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorAction {
    /// Log only; fatal or peer-local, no automatic recovery
    LogOnly,

    /// Schedule a reconnect that keeps the current identity
    Reconnect,

    /// Schedule a reconnect with forced identity renewal
    ReconnectNewIdentity,
}

/// Handling policy for an error kind; pure
pub fn action_for(kind: TransportErrorKind) -> ErrorAction {
    use TransportErrorKind::*;
    match kind {
        Disconnected | Network | ServerError | SocketError | SocketClosed | Webrtc => {
            ErrorAction::Reconnect
        }
        UnavailableId => ErrorAction::ReconnectNewIdentity,
        BrowserIncompatible | InvalidId | InvalidKey | PeerUnavailable | SslUnavailable
        | Other => ErrorAction::LogOnly,
    }
}

/// Human-readable entry text for an error kind; pure
pub fn describe(kind: TransportErrorKind) -> &'static str {
    use TransportErrorKind::*;
    match kind {
        BrowserIncompatible => "WebRTC is not supported by this runtime.",
        Disconnected => "Disconnected from the signaling server. Attempting to reconnect...",
        InvalidId | InvalidKey => "Invalid configuration. Restart the client with corrected settings.",
        Network => "Network connection lost. Attempting to reconnect...",
        PeerUnavailable => "The peer you are trying to reach is unavailable.",
        SslUnavailable => "Secure connection unavailable. Restart the client.",
        ServerError | SocketError | SocketClosed => {
            "Server connection error. Attempting to reconnect..."
        }
        UnavailableId => "Local ID is taken. Generating a new ID...",
        Webrtc => "WebRTC transport error. Attempting to reconnect...",
        Other => "Unknown error reported by the transport.",
    }
}

/// Logs transport errors and decides the recovery action
pub struct ErrorClassifier {
    log: Arc<EventLog>,
}

impl ErrorClassifier {
    /// Create a classifier writing to the given log
    pub fn new(log: Arc<EventLog>) -> Self {
        Self { log }
    }

    /// Record the error and return the action the caller must execute
    ///
    /// Always appends two entries: the generic
    /// `Peer error: <kind> - <message>` line, then the kind-specific text.
    pub fn handle(&self, error: &TransportError) -> ErrorAction {
        self.log.append(
            format!("Peer error: {} - {}", error.kind, error.message),
            Severity::Error,
        );
        self.log.append(describe(error.kind), Severity::Error);
        action_for(error.kind)
    }
}
