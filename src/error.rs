//! Error types for the peerchat client

/// Result type alias using the peerchat Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in peerchat operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Invalid configuration parameter
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Operation requires an initialized client
    #[error("Peer client is not initialized")]
    NotInitialized,

    /// The client already owns a live identity
    #[error("Peer client is already initialized")]
    AlreadyInitialized,

    /// The local endpoint has been shut down or never opened
    #[error("Endpoint is not open")]
    EndpointClosed,

    /// No peer is registered under the requested identifier
    #[error("Peer unreachable: {0}")]
    PeerUnreachable(String),

    /// The data link to a peer has been closed
    #[error("Data link to {0} is closed")]
    LinkClosed(String),

    /// I/O error
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// Any other error
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl Error {
    /// Check if this error is a configuration error
    pub fn is_config_error(&self) -> bool {
        matches!(self, Error::InvalidConfig(_))
    }

    /// Check if this error relates to a specific peer or its data link
    pub fn is_peer_error(&self) -> bool {
        matches!(self, Error::PeerUnreachable(_) | Error::LinkClosed(_))
    }

    /// Check if this error is an API misuse (wrong lifecycle order)
    pub fn is_usage_error(&self) -> bool {
        matches!(
            self,
            Error::NotInitialized | Error::AlreadyInitialized | Error::EndpointClosed
        )
    }
}
