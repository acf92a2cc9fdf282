//! Two-party chat demo over the in-memory transport
//!
//! Spins up two sessions on one hub, lets the second auto-connect to the
//! first, exchanges a couple of messages in each direction and dumps both
//! event logs.

use async_trait::async_trait;
use clap::Parser;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use peerchat::chat::ChatSession;
use peerchat::config::PeerChatConfig;
use peerchat::peer::{PeerCallbacks, PeerClient};
use peerchat::transport::memory::MemoryTransport;
use peerchat::Message;

#[derive(Parser, Debug)]
#[command(name = "peerchat_demo")]
#[command(about = "Two-party peerchat demo on the in-memory transport")]
struct Args {
    /// Identity for the first session
    #[arg(long, env = "PEERCHAT_ALICE_ID", default_value = "alice")]
    alice_id: String,

    /// Identity for the second session
    #[arg(long, env = "PEERCHAT_BOB_ID", default_value = "bob")]
    bob_id: String,

    /// Messages to send from each side
    #[arg(long, env = "PEERCHAT_MESSAGES", default_value_t = 2)]
    messages: u32,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "PEERCHAT_LOG_LEVEL", default_value = "info")]
    log_level: String,
}

struct Console {
    name: &'static str,
}

#[async_trait]
impl PeerCallbacks for Console {
    async fn on_identity_ready(&self, identity: String) {
        info!("[{}] identity ready: {}", self.name, identity);
    }

    async fn on_message(&self, message: Message) {
        info!("[{}] {}: {}", self.name, message.sender_id, message.text);
    }

    async fn on_connections_changed(&self, peers: Vec<String>) {
        info!("[{}] connections: {:?}", self.name, peers);
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| args.log_level.clone().into()),
        )
        .init();

    info!("peerchat demo v{}", peerchat::version());

    let transport = Arc::new(MemoryTransport::with_identities(vec![
        args.alice_id.as_str(),
        args.bob_id.as_str(),
    ]));

    let alice = ChatSession::new(PeerClient::new(
        transport.clone(),
        PeerChatConfig::default(),
    )?);
    let bob = ChatSession::new(PeerClient::new(
        transport.clone(),
        PeerChatConfig::default(),
    )?)
    .with_auto_connect(args.alice_id.clone());

    alice.start(Arc::new(Console { name: "alice" })).await?;
    tokio::time::sleep(Duration::from_millis(100)).await;
    bob.start(Arc::new(Console { name: "bob" })).await?;
    tokio::time::sleep(Duration::from_millis(200)).await;

    for n in 1..=args.messages {
        alice.send(&format!("ping {}", n)).await?;
        bob.send(&format!("pong {}", n)).await?;
        tokio::time::sleep(Duration::from_millis(50)).await;
    }

    tokio::time::sleep(Duration::from_millis(200)).await;

    println!("--- alice log ---");
    for entry in alice.client().log().entries() {
        println!("[{}] {} {}", entry.timestamp, entry.severity, entry.message);
    }
    println!("--- bob log ---");
    for entry in bob.client().log().entries() {
        println!("[{}] {} {}", entry.timestamp, entry.severity, entry.message);
    }

    bob.disconnect().await;
    alice.disconnect().await;

    Ok(())
}
