//! Chat session facade
//!
//! [`ChatSession`] pairs a [`PeerClient`] with a local message store and an
//! optional auto-connect target, which is enough to run a two-party chat on
//! top of any transport backend. Incoming and outgoing messages are
//! recorded in order; everything else is forwarded to the caller's own
//! callback bundle unchanged.

use async_trait::async_trait;
use std::sync::Arc;
use tracing::warn;

use crate::message::{Message, MessageStore};
use crate::peer::{PeerCallbacks, PeerClient};
use crate::Result;

/// A chat conversation bound to one local identity
#[derive(Clone)]
pub struct ChatSession {
    client: PeerClient,
    messages: Arc<MessageStore>,
    auto_connect: Option<String>,
}

impl ChatSession {
    /// Wrap an existing client in a session
    pub fn new(client: PeerClient) -> Self {
        Self {
            client,
            messages: Arc::new(MessageStore::new()),
            auto_connect: None,
        }
    }

    /// Dial this remote identifier as soon as the local identity opens
    ///
    /// Connecting to the own identity is skipped, so two sessions may share
    /// the same target without dialing themselves.
    pub fn with_auto_connect(mut self, remote_id: impl Into<String>) -> Self {
        self.auto_connect = Some(remote_id.into());
        self
    }

    /// Initialize the underlying client, bridging its callbacks through
    /// the session's message store
    pub async fn start(&self, callbacks: Arc<dyn PeerCallbacks>) -> Result<()> {
        let bridge = Arc::new(SessionBridge {
            client: self.client.clone(),
            messages: self.messages.clone(),
            auto_connect: self.auto_connect.clone(),
            forward: callbacks,
        });
        self.client.initialize(bridge).await
    }

    /// Broadcast a message and record it locally as the sender's own
    pub async fn send(&self, text: &str) -> Result<()> {
        self.client.send_message(text).await?;
        let sender_id = self
            .client
            .identity()
            .await
            .unwrap_or_else(|| "local".to_string());
        self.messages.push(Message {
            text: text.to_string(),
            sender_id,
            is_mine: true,
        });
        Ok(())
    }

    /// Dial a remote peer directly
    pub async fn connect(&self, remote_id: &str) -> Result<()> {
        self.client.connect(remote_id).await
    }

    /// Tear down the session's identity and connections
    pub async fn disconnect(&self) {
        self.client.disconnect().await;
    }

    /// Messages seen by this session, in arrival order
    pub fn messages(&self) -> Arc<MessageStore> {
        self.messages.clone()
    }

    /// The underlying lifecycle manager
    pub fn client(&self) -> &PeerClient {
        &self.client
    }

    /// Current local identity, if open
    pub async fn identity(&self) -> Option<String> {
        self.client.identity().await
    }

    /// Identifiers of the live connections
    pub async fn connected_peers(&self) -> Vec<String> {
        self.client.connected_peers().await
    }
}

/// Callback adapter that records messages and performs auto-connect
struct SessionBridge {
    client: PeerClient,
    messages: Arc<MessageStore>,
    auto_connect: Option<String>,
    forward: Arc<dyn PeerCallbacks>,
}

#[async_trait]
impl PeerCallbacks for SessionBridge {
    async fn on_identity_ready(&self, identity: String) {
        if let Some(target) = &self.auto_connect {
            if *target != identity {
                if let Err(e) = self.client.connect(target).await {
                    warn!(target = %target, "auto-connect failed: {}", e);
                }
            }
        }
        self.forward.on_identity_ready(identity).await;
    }

    async fn on_message(&self, message: Message) {
        self.messages.push(message.clone());
        self.forward.on_message(message).await;
    }

    async fn on_connections_changed(&self, peers: Vec<String>) {
        self.forward.on_connections_changed(peers).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PeerChatConfig;
    use crate::transport::memory::MemoryTransport;
    use std::time::Duration;

    struct Quiet;

    #[async_trait]
    impl PeerCallbacks for Quiet {
        async fn on_identity_ready(&self, _identity: String) {}
        async fn on_message(&self, _message: Message) {}
        async fn on_connections_changed(&self, _peers: Vec<String>) {}
    }

    fn session(transport: &Arc<MemoryTransport>) -> ChatSession {
        let client = PeerClient::new(
            Arc::clone(transport) as Arc<dyn crate::transport::Transport>,
            PeerChatConfig::default(),
        )
        .unwrap();
        ChatSession::new(client)
    }

    #[tokio::test]
    async fn test_send_records_own_message() {
        let transport = Arc::new(MemoryTransport::with_identities(vec!["alice"]));
        let session = session(&transport);
        session.start(Arc::new(Quiet)).await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;

        session.send("hello").await.unwrap();
        let messages = session.messages().all();
        assert_eq!(messages.len(), 1);
        assert!(messages[0].is_mine);
        assert_eq!(messages[0].sender_id, "alice");
        assert_eq!(messages[0].text, "hello");
    }

    #[tokio::test]
    async fn test_auto_connect_skips_own_identity() {
        let transport = Arc::new(MemoryTransport::with_identities(vec!["alice"]));
        let session = session(&transport).with_auto_connect("alice");
        session.start(Arc::new(Quiet)).await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert!(session.connected_peers().await.is_empty());
    }
}
