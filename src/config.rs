//! Configuration types for the peerchat client

use serde::{Deserialize, Serialize};

/// Main configuration for a [`PeerClient`](crate::PeerClient)
///
/// The default ICE set points at public STUN servers plus the openrelay
/// TURN relay with its shared fallback credential. This is NAT-traversal
/// infrastructure only, not an authentication boundary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PeerChatConfig {
    /// STUN server URLs (at least one required)
    pub stun_servers: Vec<String>,

    /// TURN server configurations (optional)
    pub turn_servers: Vec<TurnServerConfig>,

    /// Reconnection behavior
    pub reconnect: ReconnectOptions,
}

/// TURN server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TurnServerConfig {
    /// TURN server URL (turn:// or turns://)
    pub url: String,

    /// Username for TURN authentication
    pub username: String,

    /// Credential for TURN authentication
    pub credential: String,
}

/// Reconnection behavior options
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconnectOptions {
    /// Maximum number of reconnection attempts before giving up (default: 5)
    pub max_attempts: u32,

    /// Fixed delay before a scheduled reconnect fires, in milliseconds
    /// (default: 3000)
    pub delay_ms: u64,
}

impl Default for ReconnectOptions {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            delay_ms: 3000,
        }
    }
}

const OPENRELAY_CREDENTIAL: &str = "openrelayproject";

impl Default for PeerChatConfig {
    fn default() -> Self {
        Self {
            stun_servers: vec![
                "stun:stun.l.google.com:19302".to_string(),
                "stun:stun1.l.google.com:19302".to_string(),
                "stun:stun2.l.google.com:19302".to_string(),
                "stun:stun3.l.google.com:19302".to_string(),
                "stun:stun4.l.google.com:19302".to_string(),
                "stun:openrelay.metered.ca:80".to_string(),
            ],
            turn_servers: vec![
                TurnServerConfig {
                    url: "turn:openrelay.metered.ca:80".to_string(),
                    username: OPENRELAY_CREDENTIAL.to_string(),
                    credential: OPENRELAY_CREDENTIAL.to_string(),
                },
                TurnServerConfig {
                    url: "turn:openrelay.metered.ca:443".to_string(),
                    username: OPENRELAY_CREDENTIAL.to_string(),
                    credential: OPENRELAY_CREDENTIAL.to_string(),
                },
            ],
            reconnect: ReconnectOptions::default(),
        }
    }
}

impl PeerChatConfig {
    /// Validate configuration parameters
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - `stun_servers` is empty or contains a URL without a `stun:` scheme
    /// - a TURN URL lacks a `turn:`/`turns:` scheme
    /// - `reconnect.max_attempts` is zero
    /// - `reconnect.delay_ms` is zero
    pub fn validate(&self) -> crate::Result<()> {
        use crate::Error;

        if self.stun_servers.is_empty() {
            return Err(Error::InvalidConfig(
                "At least one STUN server is required".to_string(),
            ));
        }

        for url in &self.stun_servers {
            if !url.starts_with("stun:") && !url.starts_with("stuns:") {
                return Err(Error::InvalidConfig(format!(
                    "STUN URL must start with stun: or stuns:, got {}",
                    url
                )));
            }
        }

        for turn in &self.turn_servers {
            if !turn.url.starts_with("turn:") && !turn.url.starts_with("turns:") {
                return Err(Error::InvalidConfig(format!(
                    "TURN URL must start with turn: or turns:, got {}",
                    turn.url
                )));
            }
        }

        if self.reconnect.max_attempts == 0 {
            return Err(Error::InvalidConfig(
                "reconnect.max_attempts must be at least 1".to_string(),
            ));
        }

        if self.reconnect.delay_ms == 0 {
            return Err(Error::InvalidConfig(
                "reconnect.delay_ms must be non-zero".to_string(),
            ));
        }

        Ok(())
    }

    /// Set the reconnection options
    ///
    /// Useful for chaining on top of `Default`.
    pub fn with_reconnect(mut self, reconnect: ReconnectOptions) -> Self {
        self.reconnect = reconnect;
        self
    }

    /// Add TURN servers to this configuration
    pub fn with_turn_servers(mut self, turn_servers: Vec<TurnServerConfig>) -> Self {
        self.turn_servers = turn_servers;
        self
    }
}
