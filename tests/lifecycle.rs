//! End-to-end lifecycle scenarios over the in-memory transport

use async_trait::async_trait;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use peerchat::chat::ChatSession;
use peerchat::config::{PeerChatConfig, ReconnectOptions};
use peerchat::peer::{PeerCallbacks, PeerClient, ReconnectPhase};
use peerchat::transport::memory::MemoryTransport;
use peerchat::transport::{Transport, TransportError, TransportErrorKind};
use peerchat::Message;

/// Callback bundle that records everything it sees
#[derive(Default)]
struct Recording {
    identities: Mutex<Vec<String>>,
    messages: Mutex<Vec<Message>>,
    connection_sets: Mutex<Vec<Vec<String>>>,
}

impl Recording {
    fn identities(&self) -> Vec<String> {
        self.identities
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn messages(&self) -> Vec<Message> {
        self.messages
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn connection_sets(&self) -> Vec<Vec<String>> {
        self.connection_sets
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl PeerCallbacks for Recording {
    async fn on_identity_ready(&self, identity: String) {
        self.identities
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(identity);
    }

    async fn on_message(&self, message: Message) {
        self.messages
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(message);
    }

    async fn on_connections_changed(&self, peers: Vec<String>) {
        self.connection_sets
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(peers);
    }
}

fn fast_config() -> PeerChatConfig {
    PeerChatConfig::default().with_reconnect(ReconnectOptions {
        max_attempts: 5,
        delay_ms: 25,
    })
}

async fn settle() {
    tokio::time::sleep(Duration::from_millis(100)).await;
}

fn client(transport: &Arc<MemoryTransport>, config: PeerChatConfig) -> PeerClient {
    PeerClient::new(Arc::clone(transport) as Arc<dyn Transport>, config).unwrap()
}

#[tokio::test]
async fn incoming_connection_delivers_messages() {
    let transport = Arc::new(MemoryTransport::with_identities(["alice", "bob"]));
    let alice = client(&transport, fast_config());
    let bob = client(&transport, fast_config());
    let alice_cb = Arc::new(Recording::default());

    alice.initialize(alice_cb.clone()).await.unwrap();
    bob.initialize(Arc::new(Recording::default())).await.unwrap();
    settle().await;

    assert_eq!(alice_cb.identities(), vec!["alice"]);

    bob.connect("alice").await.unwrap();
    bob.send_message("hello").await.unwrap();
    settle().await;

    // Both sides registered the connection.
    assert_eq!(alice.connected_peers().await, vec!["bob"]);
    assert_eq!(bob.connected_peers().await, vec!["alice"]);
    assert_eq!(alice_cb.connection_sets().last().unwrap(), &vec!["bob"]);

    let log = alice.log();
    assert_eq!(log.count_matching("Incoming connection from: bob"), 1);
    assert_eq!(log.count_matching("Received message from bob: hello"), 1);

    let received = alice_cb.messages();
    assert_eq!(received.len(), 1);
    assert_eq!(received[0].text, "hello");
    assert_eq!(received[0].sender_id, "bob");
    assert!(!received[0].is_mine);
}

#[tokio::test]
async fn send_fans_out_to_every_connection() {
    let transport = Arc::new(MemoryTransport::with_identities(["hub", "spoke-1", "spoke-2"]));
    let hub = client(&transport, fast_config());
    let spoke1 = client(&transport, fast_config());
    let spoke2 = client(&transport, fast_config());
    let cb1 = Arc::new(Recording::default());
    let cb2 = Arc::new(Recording::default());

    hub.initialize(Arc::new(Recording::default())).await.unwrap();
    spoke1.initialize(cb1.clone()).await.unwrap();
    spoke2.initialize(cb2.clone()).await.unwrap();
    settle().await;

    hub.connect("spoke-1").await.unwrap();
    hub.connect("spoke-2").await.unwrap();
    settle().await;

    hub.send_message("broadcast").await.unwrap();
    settle().await;

    assert_eq!(hub.log().count_matching("Sending message to"), 2);
    assert_eq!(cb1.messages().len(), 1);
    assert_eq!(cb2.messages().len(), 1);
    assert_eq!(cb1.messages()[0].sender_id, "hub");
}

#[tokio::test]
async fn send_with_no_connections_is_a_quiet_success() {
    let transport = Arc::new(MemoryTransport::with_identities(["lonely"]));
    let lonely = client(&transport, fast_config());
    lonely.initialize(Arc::new(Recording::default())).await.unwrap();
    settle().await;

    lonely.send_message("anyone there?").await.unwrap();
    assert_eq!(lonely.log().count_matching("Sending message to"), 0);
}

#[tokio::test]
async fn duplicate_connect_keeps_one_registry_entry() {
    let transport = Arc::new(MemoryTransport::with_identities(["alice", "bob"]));
    let alice = client(&transport, fast_config());
    let bob = client(&transport, fast_config());

    alice.initialize(Arc::new(Recording::default())).await.unwrap();
    bob.initialize(Arc::new(Recording::default())).await.unwrap();
    settle().await;

    bob.connect("alice").await.unwrap();
    bob.connect("alice").await.unwrap();
    settle().await;

    assert_eq!(bob.connected_peers().await, vec!["alice"]);
    // Only the replacement link receives the send.
    bob.send_message("once").await.unwrap();
    assert_eq!(bob.log().count_matching("Sending message to alice"), 1);
}

#[tokio::test]
async fn taken_identity_triggers_renewal() {
    // The first "alice" occupies the identity; the client then draws
    // "alice" (taken) and renews into "alice-2".
    let transport = Arc::new(MemoryTransport::with_identities(["alice", "alice", "alice-2"]));
    let occupant_config = fast_config();
    let (_occupant, _occupant_events) =
        transport.open_endpoint(&occupant_config).await.unwrap();

    let renewing = client(&transport, fast_config());
    let cb = Arc::new(Recording::default());
    renewing.initialize(cb.clone()).await.unwrap();
    tokio::time::sleep(Duration::from_millis(250)).await;

    assert_eq!(renewing.identity().await.as_deref(), Some("alice-2"));
    assert_eq!(cb.identities(), vec!["alice-2"]);
    assert_eq!(renewing.reconnect_phase(), ReconnectPhase::Idle);
    assert_eq!(renewing.reconnect_attempts(), 0);

    let log = renewing.log();
    assert_eq!(log.count_matching("ID is taken"), 1);
    assert_eq!(log.count_matching("Reconnection attempt 1/5"), 1);
    assert_eq!(log.count_matching("Peer opened with ID: alice-2"), 1);
}

#[tokio::test]
async fn renewal_request_during_pending_reconnect_still_renews() {
    // A recoverable error arms the timer; an identity conflict lands in
    // the same delay window. The coalesced attempt must renew the
    // identity, not resume the old one.
    let transport = Arc::new(MemoryTransport::with_identities(["alice", "alice-2"]));
    let alice = client(&transport, fast_config());
    let cb = Arc::new(Recording::default());
    alice.initialize(cb.clone()).await.unwrap();
    settle().await;

    transport.inject_error(
        "alice",
        TransportError::new(TransportErrorKind::Network, "link flapped"),
    );
    transport.inject_error(
        "alice",
        TransportError::new(TransportErrorKind::UnavailableId, "taken"),
    );
    tokio::time::sleep(Duration::from_millis(250)).await;

    assert_eq!(alice.identity().await.as_deref(), Some("alice-2"));
    assert_eq!(cb.identities(), vec!["alice", "alice-2"]);
    assert_eq!(alice.reconnect_phase(), ReconnectPhase::Idle);
    assert_eq!(alice.reconnect_attempts(), 0);
    assert!(!transport.is_registered("alice"));

    let log = alice.log();
    assert_eq!(log.count_matching("Reconnection attempt"), 2);
    assert_eq!(log.count_matching("Attempting to reconnect..."), 1);
    assert_eq!(log.count_matching("Peer opened with ID: alice-2"), 1);
}

#[tokio::test]
async fn network_error_recovers_and_resets_the_budget() {
    let transport = Arc::new(MemoryTransport::with_identities(["alice"]));
    let alice = client(&transport, fast_config());
    let cb = Arc::new(Recording::default());
    alice.initialize(cb.clone()).await.unwrap();
    settle().await;

    transport.inject_error(
        "alice",
        TransportError::new(TransportErrorKind::Network, "link flapped"),
    );
    tokio::time::sleep(Duration::from_millis(250)).await;

    // Resume re-announced the identity, which reset the retry budget.
    assert_eq!(alice.reconnect_phase(), ReconnectPhase::Idle);
    assert_eq!(alice.reconnect_attempts(), 0);
    assert_eq!(cb.identities(), vec!["alice", "alice"]);

    let log = alice.log();
    assert_eq!(log.count_matching("Peer error: network - link flapped"), 1);
    assert_eq!(log.count_matching("Reconnection attempt 1/5"), 1);
    assert_eq!(log.count_matching("Attempting to reconnect..."), 1);
    assert_eq!(log.count_matching("Peer opened with ID: alice"), 2);
}

#[tokio::test]
async fn retry_budget_exhausts_without_recovery() {
    // Long delay keeps the timer from firing, so the identity never
    // recovers and repeated errors burn through the budget.
    let transport = Arc::new(MemoryTransport::with_identities(["alice"]));
    let config = PeerChatConfig::default().with_reconnect(ReconnectOptions {
        max_attempts: 2,
        delay_ms: 60_000,
    });
    let alice = client(&transport, config);
    alice.initialize(Arc::new(Recording::default())).await.unwrap();
    settle().await;

    for _ in 0..3 {
        transport.inject_error(
            "alice",
            TransportError::new(TransportErrorKind::Disconnected, "gone"),
        );
        tokio::time::sleep(Duration::from_millis(50)).await;
    }

    assert_eq!(alice.reconnect_phase(), ReconnectPhase::Exhausted);
    assert_eq!(alice.reconnect_attempts(), 2);

    let log = alice.log();
    assert_eq!(log.count_matching("Reconnection attempt 1/2"), 1);
    assert_eq!(log.count_matching("Reconnection attempt 2/2"), 1);
    assert_eq!(log.count_matching("Max reconnection attempts"), 1);
}

#[tokio::test]
async fn fatal_errors_do_not_schedule_reconnects() {
    let transport = Arc::new(MemoryTransport::with_identities(["alice"]));
    let alice = client(&transport, fast_config());
    alice.initialize(Arc::new(Recording::default())).await.unwrap();
    settle().await;

    transport.inject_error(
        "alice",
        TransportError::new(TransportErrorKind::SslUnavailable, "no tls"),
    );
    settle().await;

    assert_eq!(alice.reconnect_phase(), ReconnectPhase::Idle);
    assert_eq!(alice.reconnect_attempts(), 0);
    assert_eq!(alice.log().count_matching("Secure connection unavailable"), 1);
}

#[tokio::test]
async fn disconnect_tears_down_both_sides() {
    let transport = Arc::new(MemoryTransport::with_identities(["alice", "bob"]));
    let alice = client(&transport, fast_config());
    let bob = client(&transport, fast_config());
    let bob_cb = Arc::new(Recording::default());

    alice.initialize(Arc::new(Recording::default())).await.unwrap();
    bob.initialize(bob_cb.clone()).await.unwrap();
    settle().await;

    bob.connect("alice").await.unwrap();
    settle().await;

    alice.disconnect().await;
    settle().await;

    assert_eq!(alice.identity().await, None);
    assert!(alice.connected_peers().await.is_empty());
    assert!(!transport.is_registered("alice"));
    assert_eq!(alice.log().count_matching("Local peer destroyed"), 1);

    // Bob observed the close on his half of the link.
    assert!(bob.connected_peers().await.is_empty());
    assert_eq!(bob.log().count_matching("Connection closed with alice"), 1);
    assert!(bob_cb.connection_sets().last().unwrap().is_empty());

    // Second disconnect is a no-op.
    alice.disconnect().await;
    assert_eq!(alice.log().count_matching("Local peer destroyed"), 1);
}

#[tokio::test]
async fn chat_sessions_exchange_and_record_messages() {
    let transport = Arc::new(MemoryTransport::with_identities(["alice", "bob"]));
    let alice = ChatSession::new(client(&transport, fast_config()));
    let bob = ChatSession::new(client(&transport, fast_config())).with_auto_connect("alice");

    alice.start(Arc::new(Recording::default())).await.unwrap();
    settle().await;
    bob.start(Arc::new(Recording::default())).await.unwrap();
    settle().await;

    assert_eq!(bob.connected_peers().await, vec!["alice"]);
    assert_eq!(alice.connected_peers().await, vec!["bob"]);

    bob.send("hi alice").await.unwrap();
    settle().await;
    alice.send("hi bob").await.unwrap();
    settle().await;

    let alice_msgs = alice.messages().all();
    assert_eq!(alice_msgs.len(), 2);
    assert_eq!(alice_msgs[0].text, "hi alice");
    assert!(!alice_msgs[0].is_mine);
    assert_eq!(alice_msgs[1].text, "hi bob");
    assert!(alice_msgs[1].is_mine);

    let bob_msgs = bob.messages().all();
    assert_eq!(bob_msgs.len(), 2);
    assert!(bob_msgs[0].is_mine);
    assert_eq!(bob_msgs[1].sender_id, "alice");
}
