//! In-memory chain clients for tests.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Mutex;

use alloy_primitives::{keccak256, Address as EvmAddress, Bytes, B256, U256};
use async_trait::async_trait;
use dashmap::DashMap;

use xswap_core::Hash;
use xswap_crypto::InteropKey;

use crate::assets::AssetInfo;
use crate::client::{
    EvmBlock, EvmClient, EvmLog, EvmReceipt, EvmTransaction, NeoBlock, NeoClient,
};
use crate::error::WatcherError;
use crate::evm::TRANSFER_TOPIC;

/// A transfer submitted through a mock client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentTransfer {
    pub endpoint: String,
    pub to: String,
    pub symbol: String,
    pub amount: u128,
    pub hash: Hash,
}

type SendHook = Box<dyn Fn(&SentTransfer) + Send + Sync>;

fn lock<T>(m: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|e| e.into_inner())
}

fn sent_hash(endpoint: &str, seq: u64) -> Hash {
    Hash(keccak256(format!("{}:{}", endpoint, seq)).0)
}

/// Sign `signing_hash` with `key` and fill the signature fields of an EVM
/// transaction sent from that key.
pub fn signed_evm_tx(
    key: &InteropKey,
    hash: Hash,
    to: EvmAddress,
    value: U256,
) -> EvmTransaction {
    let signing_hash = Hash(keccak256(hash.0).0);
    let (signature, recid) = key
        .sign_prehash_recoverable(&signing_hash.0)
        .unwrap_or_else(|e| panic!("mock signing failed: {}", e));
    let bytes = signature.to_bytes();
    EvmTransaction {
        hash,
        from: key.evm_address(),
        to: Some(to),
        value,
        signing_hash,
        r: B256::from_slice(&bytes[..32]),
        s: B256::from_slice(&bytes[32..]),
        v: 27 + u64::from(recid.to_byte()),
    }
}

/// An ERC-20 `Transfer` log.
pub fn token_transfer_log(contract: EvmAddress, from: EvmAddress, to: EvmAddress, amount: U256) -> EvmLog {
    EvmLog {
        address: contract,
        topics: vec![TRANSFER_TOPIC, from.into_word(), to.into_word()],
        data: Bytes::from(amount.to_be_bytes::<32>().to_vec()),
    }
}

/// Scriptable EVM chain.
pub struct MockEvmClient {
    endpoint: String,
    height: AtomicU64,
    blocks: DashMap<u64, EvmBlock>,
    receipts: DashMap<Hash, EvmReceipt>,
    sent: Mutex<Vec<SentTransfer>>,
    fail_reads: AtomicBool,
    fail_sends: AtomicBool,
    /// Mine submitted transfers immediately.
    auto_mine: AtomicBool,
    send_hook: Mutex<Option<SendHook>>,
}

impl MockEvmClient {
    pub fn new(endpoint: &str) -> Self {
        Self {
            endpoint: endpoint.to_string(),
            height: AtomicU64::new(0),
            blocks: DashMap::new(),
            receipts: DashMap::new(),
            sent: Mutex::new(Vec::new()),
            fail_reads: AtomicBool::new(false),
            fail_sends: AtomicBool::new(false),
            auto_mine: AtomicBool::new(true),
            send_hook: Mutex::new(None),
        }
    }

    pub fn set_height(&self, height: u64) {
        self.height.store(height, Ordering::SeqCst);
    }

    /// Add a block; every transaction gets a successful receipt carrying `logs`
    /// for that transaction hash.
    pub fn add_block(&self, number: u64, transactions: Vec<EvmTransaction>, logs: Vec<(Hash, EvmLog)>) {
        for tx in &transactions {
            let tx_logs = logs
                .iter()
                .filter(|(h, _)| *h == tx.hash)
                .map(|(_, l)| l.clone())
                .collect();
            self.receipts.insert(
                tx.hash,
                EvmReceipt {
                    transaction_hash: tx.hash,
                    block_number: number,
                    success: true,
                    logs: tx_logs,
                },
            );
        }
        let mut hash = [0u8; 32];
        hash[..8].copy_from_slice(&number.to_be_bytes());
        self.blocks.insert(
            number,
            EvmBlock {
                number,
                hash: Hash(hash),
                transactions,
            },
        );
    }

    pub fn set_receipt(&self, receipt: EvmReceipt) {
        self.receipts.insert(receipt.transaction_hash, receipt);
    }

    pub fn remove_receipt(&self, hash: &Hash) {
        self.receipts.remove(hash);
    }

    pub fn set_fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_sends(&self, fail: bool) {
        self.fail_sends.store(fail, Ordering::SeqCst);
    }

    pub fn set_auto_mine(&self, mine: bool) {
        self.auto_mine.store(mine, Ordering::SeqCst);
    }

    /// Called synchronously inside `send_transfer`, before it returns.
    pub fn on_send(&self, hook: impl Fn(&SentTransfer) + Send + Sync + 'static) {
        *lock(&self.send_hook) = Some(Box::new(hook));
    }

    pub fn sent(&self) -> Vec<SentTransfer> {
        lock(&self.sent).clone()
    }

    fn check_reads(&self) -> Result<(), WatcherError> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(WatcherError::rpc(&self.endpoint, "connection refused"));
        }
        Ok(())
    }
}

#[async_trait]
impl EvmClient for MockEvmClient {
    fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn block_number(&self) -> Result<u64, WatcherError> {
        self.check_reads()?;
        Ok(self.height.load(Ordering::SeqCst))
    }

    async fn block(&self, height: u64) -> Result<Option<EvmBlock>, WatcherError> {
        self.check_reads()?;
        Ok(self.blocks.get(&height).map(|b| b.value().clone()))
    }

    async fn transaction_receipt(&self, hash: &Hash) -> Result<Option<EvmReceipt>, WatcherError> {
        self.check_reads()?;
        Ok(self.receipts.get(hash).map(|r| r.value().clone()))
    }

    async fn send_transfer(
        &self,
        _key: &InteropKey,
        to: &str,
        asset: &AssetInfo,
        amount: u128,
    ) -> Result<Hash, WatcherError> {
        if self.fail_sends.load(Ordering::SeqCst) {
            return Err(WatcherError::rpc(&self.endpoint, "broadcast rejected"));
        }
        let transfer = {
            let mut sent = lock(&self.sent);
            let transfer = SentTransfer {
                endpoint: self.endpoint.clone(),
                to: to.to_string(),
                symbol: asset.symbol.clone(),
                amount,
                hash: sent_hash(&self.endpoint, sent.len() as u64),
            };
            sent.push(transfer.clone());
            transfer
        };
        if let Some(hook) = lock(&self.send_hook).as_ref() {
            hook(&transfer);
        }
        if self.auto_mine.load(Ordering::SeqCst) {
            self.set_receipt(EvmReceipt {
                transaction_hash: transfer.hash,
                block_number: self.height.load(Ordering::SeqCst),
                success: true,
                logs: Vec::new(),
            });
        }
        Ok(transfer.hash)
    }
}

/// Scriptable account-chain endpoint.
pub struct MockNeoClient {
    endpoint: String,
    block_count: AtomicU64,
    blocks: DashMap<u64, NeoBlock>,
    mined: DashMap<Hash, u64>,
    mempool: Mutex<HashSet<Hash>>,
    sent: Mutex<Vec<SentTransfer>>,
    fail_reads: AtomicBool,
    /// Where submitted transfers land: mined, mempool, or nowhere (dropped).
    send_outcome: Mutex<SendOutcome>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    Mined,
    Mempool,
    Dropped,
}

impl MockNeoClient {
    pub fn new(endpoint: &str) -> Self {
        Self {
            endpoint: endpoint.to_string(),
            block_count: AtomicU64::new(1),
            blocks: DashMap::new(),
            mined: DashMap::new(),
            mempool: Mutex::new(HashSet::new()),
            sent: Mutex::new(Vec::new()),
            fail_reads: AtomicBool::new(false),
            send_outcome: Mutex::new(SendOutcome::Mined),
        }
    }

    pub fn set_block_count(&self, count: u64) {
        self.block_count.store(count, Ordering::SeqCst);
    }

    pub fn add_block(&self, block: NeoBlock) {
        for tx in &block.transactions {
            self.mined.insert(tx.hash, block.index);
        }
        self.blocks.insert(block.index, block);
    }

    pub fn mine(&self, hash: Hash, height: u64) {
        lock(&self.mempool).remove(&hash);
        self.mined.insert(hash, height);
    }

    pub fn add_to_mempool(&self, hash: Hash) {
        lock(&self.mempool).insert(hash);
    }

    pub fn set_send_outcome(&self, outcome: SendOutcome) {
        *lock(&self.send_outcome) = outcome;
    }

    pub fn set_fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    pub fn sent(&self) -> Vec<SentTransfer> {
        lock(&self.sent).clone()
    }

    fn check_reads(&self) -> Result<(), WatcherError> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(WatcherError::rpc(&self.endpoint, "connection refused"));
        }
        Ok(())
    }
}

#[async_trait]
impl NeoClient for MockNeoClient {
    fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn block_count(&self) -> Result<u64, WatcherError> {
        self.check_reads()?;
        Ok(self.block_count.load(Ordering::SeqCst))
    }

    async fn block(&self, height: u64) -> Result<Option<NeoBlock>, WatcherError> {
        self.check_reads()?;
        Ok(self.blocks.get(&height).map(|b| b.value().clone()))
    }

    async fn transaction_height(&self, hash: &Hash) -> Result<Option<u64>, WatcherError> {
        self.check_reads()?;
        Ok(self.mined.get(hash).map(|h| *h.value()))
    }

    async fn mempool_contains(&self, hash: &Hash) -> Result<bool, WatcherError> {
        self.check_reads()?;
        Ok(lock(&self.mempool).contains(hash))
    }

    async fn send_transfer(
        &self,
        _key: &InteropKey,
        to: &str,
        asset: &AssetInfo,
        amount: u128,
    ) -> Result<Hash, WatcherError> {
        let hash = {
            let mut sent = lock(&self.sent);
            let hash = sent_hash(&self.endpoint, sent.len() as u64);
            sent.push(SentTransfer {
                endpoint: self.endpoint.clone(),
                to: to.to_string(),
                symbol: asset.symbol.clone(),
                amount,
                hash,
            });
            hash
        };
        let outcome = *lock(&self.send_outcome);
        match outcome {
            SendOutcome::Mined => {
                self.mined
                    .insert(hash, self.block_count.load(Ordering::SeqCst));
            }
            SendOutcome::Mempool => self.add_to_mempool(hash),
            SendOutcome::Dropped => {}
        }
        Ok(hash)
    }
}
