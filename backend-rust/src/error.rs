//! Error types for the game server.
//!
//! Most failures in this crate are recovered where they happen (a bad frame drops one
//! client, a failed fetch skips one refresh cycle), so only a few surface as types.

/// Reasons a flight feed request produced no usable records.
#[derive(Debug, thiserror::Error)]
pub enum FeedError {
    /// The configured feed URL does not parse.
    #[error("invalid feed URL {0}")]
    InvalidUrl(String),

    /// The request never completed (DNS, connect, timeout, TLS).
    #[error("feed request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// The provider answered with a non-success status.
    #[error("feed returned HTTP {0}")]
    Status(u16),

    /// The body was not the JSON document we expected.
    #[error("feed body could not be decoded: {0}")]
    Decode(#[from] serde_json::Error),

    /// The document decoded but has no `states` field.
    #[error("feed response has no `states` field")]
    MissingStates,
}

/// Failures that stop the server from starting or serving.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("could not bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("server error: {0}")]
    Serve(#[from] std::io::Error),
}
