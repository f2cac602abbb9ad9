use xswap_core::{CoreError, Hash};
use xswap_crypto::CryptoError;

/// Watcher and chain-client errors.
#[derive(Debug, thiserror::Error)]
pub enum WatcherError {
    #[error("core error: {0}")]
    Core(#[from] CoreError),

    #[error("crypto error: {0}")]
    Crypto(#[from] CryptoError),

    #[error("rpc error on {endpoint}: {message}")]
    Rpc { endpoint: String, message: String },

    #[error("interop address mismatch on {platform}: derived {derived}, registered {registered:?}")]
    AddressMismatch {
        platform: String,
        derived: String,
        registered: Vec<String>,
    },

    #[error("no block decoder registered for platform {0}")]
    UnknownPlatform(String),

    #[error("block {height} not found on {platform}")]
    BlockNotFound { platform: String, height: u64 },

    #[error("transaction not found: {0}")]
    TransactionNotFound(Hash),

    #[error("invalid oracle url: {0}")]
    InvalidUrl(String),

    #[error("unsupported asset: {0}")]
    UnsupportedAsset(String),

    #[error("no rpc endpoints configured for {0}")]
    NoEndpoints(String),
}

impl WatcherError {
    pub fn rpc(endpoint: impl Into<String>, message: impl std::fmt::Display) -> Self {
        Self::Rpc {
            endpoint: endpoint.into(),
            message: message.to_string(),
        }
    }
}

/// Render an error with its full `source()` chain.
pub fn error_chain(err: &dyn std::error::Error) -> String {
    let mut out = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        out.push_str(": ");
        out.push_str(&cause.to_string());
        source = cause.source();
    }
    out
}
