//! Error types for the gating engine

/// Failure to get any response out of the transport.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("Network error: {0}")]
    Network(String),
    #[error("Request timed out after {0}s")]
    Timeout(u64),
}

#[derive(Debug, thiserror::Error)]
pub enum GateError {
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error("HTTP {status} from {path}")]
    Http { status: u16, path: String },
    #[error("Could not decode response: {0}")]
    Decode(#[from] serde_json::Error),
}
