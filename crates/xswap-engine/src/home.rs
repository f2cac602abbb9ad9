//! Home-chain access.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use xswap_core::{Address, ChainSwap, Hash, InteropTransfer, PlatformInfo};
use xswap_crypto::InteropKey;

use crate::error::EngineError;

/// Outcome of a home-chain transaction lookup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TxStatus {
    Success,
    Pending,
    Failed(String),
}

/// The home chain: platform registry, interop contract, and transaction
/// submission.
#[async_trait]
pub trait HomeChain: Send + Sync {
    /// Whether the chain has produced its genesis block.
    async fn has_genesis(&self) -> Result<bool, EngineError>;

    async fn platforms(&self) -> Result<Vec<PlatformInfo>, EngineError>;

    /// Home-chain settlement recorded for an external transaction, if any.
    async fn get_settlement(&self, platform: &str, hash: &Hash) -> Result<Option<Hash>, EngineError>;

    /// Interop transfers carried by a home-chain transaction.
    async fn interop_transfers(&self, hash: &Hash) -> Result<Vec<InteropTransfer>, EngineError>;

    /// Submit a settlement of the external transaction `hash`. Returns the
    /// home-chain transaction hash.
    async fn settle_transaction(
        &self,
        key: &InteropKey,
        platform: &str,
        chain: &str,
        hash: &Hash,
    ) -> Result<Hash, EngineError>;

    async fn transaction_status(&self, hash: &Hash) -> Result<TxStatus, EngineError>;

    /// Swaps the home chain knows about for `address`.
    async fn swaps_for_address(&self, address: &Address) -> Result<Vec<ChainSwap>, EngineError>;
}
