//! Peer connection lifecycle
//!
//! The lifecycle manager ([`PeerClient`]) composes the connection registry,
//! the error classifier and the reconnection controller over a pluggable
//! [`Transport`](crate::transport::Transport) backend.

pub mod classifier;
pub mod client;
pub mod reconnect;
pub mod registry;

pub use classifier::{action_for, describe, ErrorAction, ErrorClassifier};
pub use client::{PeerCallbacks, PeerClient};
pub use reconnect::{ReconnectController, ReconnectDirective, ReconnectPhase};
pub use registry::{ConnectionRegistry, RegisteredPeer};
