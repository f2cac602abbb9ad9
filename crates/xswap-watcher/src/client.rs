//! Chain-client interfaces.
//!
//! These are the only points where the watchers and payout routines touch
//! an external ledger. Transaction building and signing formats stay behind
//! `send_transfer`.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use alloy_primitives::{Address as EvmAddress, Bytes, B256, U256};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use xswap_core::Hash;
use xswap_crypto::InteropKey;

use crate::assets::AssetInfo;
use crate::error::WatcherError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvmTransaction {
    pub hash: Hash,
    pub from: EvmAddress,
    pub to: Option<EvmAddress>,
    pub value: U256,
    /// Digest the sender signed.
    pub signing_hash: Hash,
    pub r: B256,
    pub s: B256,
    pub v: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvmBlock {
    pub number: u64,
    pub hash: Hash,
    pub transactions: Vec<EvmTransaction>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvmLog {
    pub address: EvmAddress,
    pub topics: Vec<B256>,
    pub data: Bytes,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvmReceipt {
    pub transaction_hash: Hash,
    pub block_number: u64,
    pub success: bool,
    pub logs: Vec<EvmLog>,
}

/// Client for one EVM-compatible chain.
#[async_trait]
pub trait EvmClient: Send + Sync {
    fn endpoint(&self) -> &str;

    async fn block_number(&self) -> Result<u64, WatcherError>;

    async fn block(&self, height: u64) -> Result<Option<EvmBlock>, WatcherError>;

    /// `None` while the transaction is unknown or not yet mined.
    async fn transaction_receipt(&self, hash: &Hash) -> Result<Option<EvmReceipt>, WatcherError>;

    /// Build, sign and broadcast a transfer of `amount` (external decimals).
    async fn send_transfer(
        &self,
        key: &InteropKey,
        to: &str,
        asset: &AssetInfo,
        amount: u128,
    ) -> Result<Hash, WatcherError>;
}

/// A UTXO output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NeoOutput {
    /// Asset id.
    pub asset: String,
    pub address: String,
    /// Amount in the asset's decimals.
    pub value: u128,
}

/// A contract notification emitted during invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NeoNotification {
    /// Script hash of the emitting contract.
    pub contract: String,
    pub event: String,
    pub from: String,
    pub to: String,
    pub amount: u128,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NeoTransaction {
    pub hash: Hash,
    /// Hex compressed public key from the first witness, if any.
    pub witness_key: Option<String>,
    pub outputs: Vec<NeoOutput>,
    pub notifications: Vec<NeoNotification>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NeoBlock {
    pub index: u64,
    pub hash: Hash,
    pub transactions: Vec<NeoTransaction>,
}

/// Client for one account-chain RPC endpoint.
#[async_trait]
pub trait NeoClient: Send + Sync {
    fn endpoint(&self) -> &str;

    async fn block_count(&self) -> Result<u64, WatcherError>;

    async fn block(&self, height: u64) -> Result<Option<NeoBlock>, WatcherError>;

    /// Height of the block that includes `hash`, if it has been mined.
    async fn transaction_height(&self, hash: &Hash) -> Result<Option<u64>, WatcherError>;

    async fn mempool_contains(&self, hash: &Hash) -> Result<bool, WatcherError>;

    async fn send_transfer(
        &self,
        key: &InteropKey,
        to: &str,
        asset: &AssetInfo,
        amount: u128,
    ) -> Result<Hash, WatcherError>;
}

/// Round-robin set of account-chain endpoints.
pub struct NeoRpcPool {
    platform: String,
    clients: Vec<Arc<dyn NeoClient>>,
    next: AtomicUsize,
}

impl NeoRpcPool {
    pub fn new(platform: &str, clients: Vec<Arc<dyn NeoClient>>) -> Result<Self, WatcherError> {
        if clients.is_empty() {
            return Err(WatcherError::NoEndpoints(platform.to_string()));
        }
        Ok(Self {
            platform: platform.to_string(),
            clients,
            next: AtomicUsize::new(0),
        })
    }

    pub fn platform(&self) -> &str {
        &self.platform
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }

    /// Next endpoint in rotation.
    pub fn next_client(&self) -> Arc<dyn NeoClient> {
        let index = self.next.fetch_add(1, Ordering::Relaxed) % self.clients.len();
        self.clients[index].clone()
    }

    /// The client for a specific endpoint, falling back to rotation when the
    /// endpoint is no longer configured.
    pub fn by_endpoint(&self, endpoint: &str) -> Arc<dyn NeoClient> {
        self.clients
            .iter()
            .find(|c| c.endpoint() == endpoint)
            .cloned()
            .unwrap_or_else(|| self.next_client())
    }

    /// Try each endpoint once, starting at the rotation cursor.
    pub async fn block_count(&self) -> Result<u64, WatcherError> {
        let mut last_err = WatcherError::NoEndpoints(self.platform.clone());
        for _ in 0..self.clients.len() {
            let client = self.next_client();
            match client.block_count().await {
                Ok(count) => return Ok(count),
                Err(e) => {
                    tracing::warn!(platform = %self.platform, endpoint = client.endpoint(), error = %e, "block count failed, rotating");
                    last_err = e;
                }
            }
        }
        Err(last_err)
    }

    pub async fn block(&self, height: u64) -> Result<Option<NeoBlock>, WatcherError> {
        let mut last_err = WatcherError::NoEndpoints(self.platform.clone());
        for _ in 0..self.clients.len() {
            let client = self.next_client();
            match client.block(height).await {
                Ok(block) => return Ok(block),
                Err(e) => {
                    tracing::warn!(platform = %self.platform, endpoint = client.endpoint(), height, error = %e, "block fetch failed, rotating");
                    last_err = e;
                }
            }
        }
        Err(last_err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockNeoClient;

    fn pool(clients: &[Arc<MockNeoClient>]) -> NeoRpcPool {
        let clients = clients
            .iter()
            .map(|c| c.clone() as Arc<dyn NeoClient>)
            .collect();
        NeoRpcPool::new("neo", clients).unwrap()
    }

    #[test]
    fn test_empty_pool_rejected() {
        assert!(matches!(
            NeoRpcPool::new("neo", Vec::new()),
            Err(WatcherError::NoEndpoints(_))
        ));
    }

    #[test]
    fn test_round_robin_and_lookup() {
        let a = Arc::new(MockNeoClient::new("http://a"));
        let b = Arc::new(MockNeoClient::new("http://b"));
        let pool = pool(&[a, b]);

        let order: Vec<String> = (0..4).map(|_| pool.next_client().endpoint().to_string()).collect();
        assert_eq!(order, vec!["http://a", "http://b", "http://a", "http://b"]);
        assert_eq!(pool.by_endpoint("http://b").endpoint(), "http://b");
    }

    #[tokio::test]
    async fn test_reads_fail_over_to_next_endpoint() {
        let a = Arc::new(MockNeoClient::new("http://a"));
        let b = Arc::new(MockNeoClient::new("http://b"));
        a.set_fail_reads(true);
        b.set_block_count(77);
        let pool = pool(&[a.clone(), b]);

        assert_eq!(pool.block_count().await.unwrap(), 77);

        a.set_fail_reads(false);
        a.set_block_count(78);
        let count = pool.block_count().await.unwrap();
        assert!(count == 77 || count == 78);
    }

    #[tokio::test]
    async fn test_all_endpoints_down() {
        let a = Arc::new(MockNeoClient::new("http://a"));
        a.set_fail_reads(true);
        let pool = pool(&[a]);
        assert!(matches!(pool.block(1).await, Err(WatcherError::Rpc { .. })));
    }
}
