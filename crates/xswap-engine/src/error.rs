use xswap_core::{CoreError, Hash};
use xswap_crypto::CryptoError;
use xswap_watcher::WatcherError;

/// Swapper errors.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("core error: {0}")]
    Core(#[from] CoreError),

    #[error("crypto error: {0}")]
    Crypto(#[from] CryptoError),

    #[error("watcher error: {0}")]
    Watcher(#[from] WatcherError),

    /// Invalid platform setup; never retried.
    #[error("configuration error: {0}")]
    Config(String),

    #[error("home chain error: {0}")]
    HomeChain(String),

    #[error("unknown platform: {0}")]
    UnknownPlatform(String),

    #[error("swapper not initialised: home chain has no genesis yet")]
    NotReady,

    #[error("unsupported asset {symbol} on {platform}")]
    UnsupportedAsset { platform: String, symbol: String },

    #[error("transaction {hash} on {platform} not confirmed after {attempts} attempts")]
    VerificationTimeout {
        platform: String,
        hash: Hash,
        attempts: u32,
    },

    #[error("transaction {hash} on {platform} is neither mined nor in the mempool")]
    Dropped { platform: String, hash: Hash },

    #[error("transaction {hash} on {platform} reverted")]
    Reverted { platform: String, hash: Hash },

    #[error("internal error: {0}")]
    Internal(String),
}

impl EngineError {
    /// Errors that must stop the node instead of being retried next cycle.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Config(_))
    }
}
