//! Scriptable home chain for tests.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use dashmap::DashMap;

use xswap_core::{Address, ChainSwap, Hash, InteropTransfer, PlatformInfo};
use xswap_crypto::InteropKey;

use crate::error::EngineError;
use crate::home::{HomeChain, TxStatus};

fn lock<T>(m: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|e| e.into_inner())
}

pub struct MockHomeChain {
    genesis: AtomicBool,
    platforms: Mutex<Vec<PlatformInfo>>,
    settlements: DashMap<Hash, Hash>,
    transfers: DashMap<Hash, Vec<InteropTransfer>>,
    statuses: DashMap<Hash, TxStatus>,
    default_status: Mutex<TxStatus>,
    swaps: DashMap<Address, Vec<ChainSwap>>,
    settle_calls: Mutex<Vec<(String, Hash)>>,
    fail_settle: AtomicBool,
    fail_reads: AtomicBool,
    next_tx: AtomicU64,
}

impl Default for MockHomeChain {
    fn default() -> Self {
        Self::new()
    }
}

impl MockHomeChain {
    pub fn new() -> Self {
        Self {
            genesis: AtomicBool::new(true),
            platforms: Mutex::new(Vec::new()),
            settlements: DashMap::new(),
            transfers: DashMap::new(),
            statuses: DashMap::new(),
            default_status: Mutex::new(TxStatus::Success),
            swaps: DashMap::new(),
            settle_calls: Mutex::new(Vec::new()),
            fail_settle: AtomicBool::new(false),
            fail_reads: AtomicBool::new(false),
            next_tx: AtomicU64::new(1),
        }
    }

    pub fn set_genesis(&self, genesis: bool) {
        self.genesis.store(genesis, Ordering::SeqCst);
    }

    pub fn add_platform(&self, info: PlatformInfo) {
        lock(&self.platforms).push(info);
    }

    /// Settlement the interop contract reports for an external hash.
    pub fn set_settlement(&self, external: Hash, settlement: Hash) {
        self.settlements.insert(external, settlement);
    }

    pub fn set_transfers(&self, hash: Hash, transfers: Vec<InteropTransfer>) {
        self.transfers.insert(hash, transfers);
    }

    pub fn set_status(&self, hash: Hash, status: TxStatus) {
        self.statuses.insert(hash, status);
    }

    /// Status of transactions without an explicit one.
    pub fn set_default_status(&self, status: TxStatus) {
        *lock(&self.default_status) = status;
    }

    pub fn set_swaps(&self, address: Address, swaps: Vec<ChainSwap>) {
        self.swaps.insert(address, swaps);
    }

    pub fn set_fail_settle(&self, fail: bool) {
        self.fail_settle.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    /// `(platform, hash)` of every `settle_transaction` call.
    pub fn settle_calls(&self) -> Vec<(String, Hash)> {
        lock(&self.settle_calls).clone()
    }

    fn check_reads(&self) -> Result<(), EngineError> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(EngineError::HomeChain("connection refused".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl HomeChain for MockHomeChain {
    async fn has_genesis(&self) -> Result<bool, EngineError> {
        self.check_reads()?;
        Ok(self.genesis.load(Ordering::SeqCst))
    }

    async fn platforms(&self) -> Result<Vec<PlatformInfo>, EngineError> {
        self.check_reads()?;
        Ok(lock(&self.platforms).clone())
    }

    async fn get_settlement(&self, _platform: &str, hash: &Hash) -> Result<Option<Hash>, EngineError> {
        self.check_reads()?;
        Ok(self.settlements.get(hash).map(|h| *h.value()))
    }

    async fn interop_transfers(&self, hash: &Hash) -> Result<Vec<InteropTransfer>, EngineError> {
        self.check_reads()?;
        Ok(self
            .transfers
            .get(hash)
            .map(|t| t.value().clone())
            .unwrap_or_default())
    }

    async fn settle_transaction(
        &self,
        _key: &InteropKey,
        platform: &str,
        _chain: &str,
        hash: &Hash,
    ) -> Result<Hash, EngineError> {
        if self.fail_settle.load(Ordering::SeqCst) {
            return Err(EngineError::HomeChain("settlement rejected".into()));
        }
        lock(&self.settle_calls).push((platform.to_string(), *hash));
        let seq = self.next_tx.fetch_add(1, Ordering::SeqCst);
        let mut tx = [0xeeu8; 32];
        tx[24..].copy_from_slice(&seq.to_be_bytes());
        Ok(Hash(tx))
    }

    async fn transaction_status(&self, hash: &Hash) -> Result<TxStatus, EngineError> {
        self.check_reads()?;
        Ok(self
            .statuses
            .get(hash)
            .map(|s| s.value().clone())
            .unwrap_or_else(|| lock(&self.default_status).clone()))
    }

    async fn swaps_for_address(&self, address: &Address) -> Result<Vec<ChainSwap>, EngineError> {
        self.check_reads()?;
        Ok(self
            .swaps
            .get(address)
            .map(|s| s.value().clone())
            .unwrap_or_default())
    }
}
