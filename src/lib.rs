//! Peer-to-peer chat client core
//!
//! Connection lifecycle management for a serverless text chat: identity
//! acquisition, connection tracking, error classification and bounded
//! reconnection over a pluggable transport backend.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │                      ChatSession                        │
//! │        (message store, auto-connect, callbacks)         │
//! ├─────────────────────────────────────────────────────────┤
//! │                       PeerClient                        │
//! │  ┌──────────────┐ ┌────────────────┐ ┌──────────────┐   │
//! │  │ Connection   │ │ Error          │ │ Reconnect    │   │
//! │  │ Registry     │ │ Classifier     │ │ Controller   │   │
//! │  └──────────────┘ └────────────────┘ └──────────────┘   │
//! │                  ┌────────────────┐                     │
//! │                  │   Event Log    │                     │
//! │                  └────────────────┘                     │
//! ├─────────────────────────────────────────────────────────┤
//! │              Transport / Endpoint / DataLink            │
//! │            (in-memory backend for local use)            │
//! └─────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```no_run
//! use peerchat::chat::ChatSession;
//! use peerchat::config::PeerChatConfig;
//! use peerchat::peer::{PeerCallbacks, PeerClient};
//! use peerchat::transport::memory::MemoryTransport;
//! use peerchat::Message;
//! use std::sync::Arc;
//!
//! struct Printer;
//!
//! #[async_trait::async_trait]
//! impl PeerCallbacks for Printer {
//!     async fn on_identity_ready(&self, identity: String) {
//!         println!("ready as {}", identity);
//!     }
//!     async fn on_message(&self, message: Message) {
//!         println!("{}: {}", message.sender_id, message.text);
//!     }
//!     async fn on_connections_changed(&self, peers: Vec<String>) {
//!         println!("connected: {:?}", peers);
//!     }
//! }
//!
//! # async fn run() -> peerchat::Result<()> {
//! let transport = Arc::new(MemoryTransport::new());
//! let client = PeerClient::new(transport, PeerChatConfig::default())?;
//! let session = ChatSession::new(client);
//! session.start(Arc::new(Printer)).await?;
//! session.send("hello out there").await?;
//! # Ok(())
//! # }
//! ```

pub mod chat;
pub mod config;
pub mod error;
pub mod log;
pub mod message;
pub mod peer;
pub mod transport;

pub use chat::ChatSession;
pub use config::{PeerChatConfig, ReconnectOptions, TurnServerConfig};
pub use error::{Error, Result};
pub use log::{EventLog, LogEntry, Severity};
pub use message::{Message, MessageStore};
pub use peer::{PeerCallbacks, PeerClient, ReconnectPhase};
pub use transport::{Transport, TransportError, TransportErrorKind};

/// Crate version
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
