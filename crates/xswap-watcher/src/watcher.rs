//! The per-platform watcher contract and the block-cursor logic shared by
//! every concrete watcher.

use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{mpsc, Mutex};

use xswap_core::{Address, Hash, InteropBlock, PendingSwap, PlatformInfo};
use xswap_crypto::InteropKey;

use crate::error::{error_chain, WatcherError};
use crate::oracle::{OracleReader, OracleUrl};

/// Default number of blocks processed by one polling pass.
pub const DEFAULT_BLOCKS_PER_UPDATE: u64 = 50;

/// Detects inbound deposits on one external platform.
#[async_trait]
pub trait ChainWatcher: Send + Sync {
    fn platform(&self) -> &str;

    /// Interop address this key controls on the watched platform.
    fn available_address(&self, key: &InteropKey) -> String;

    /// One polling pass. Never fails: errors are logged and whatever was
    /// collected before the failure is returned. A swap is reported at most
    /// once per process.
    async fn update(&self) -> Vec<PendingSwap>;

    /// Queue a block for re-processing on the next pass.
    fn resync_block(&self, height: u64);
}

/// Static watcher parameters.
#[derive(Debug, Clone)]
pub struct WatcherSettings {
    pub platform: String,
    pub chain: String,
    pub confirmations: u64,
    pub blocks_per_update: u64,
    /// First height to scan when no cursor is stored yet; defaults to the
    /// confirmed tip.
    pub start_height: Option<u64>,
}

impl WatcherSettings {
    pub fn new(platform: &str, confirmations: u64) -> Self {
        Self {
            platform: platform.to_string(),
            chain: platform.to_string(),
            confirmations,
            blocks_per_update: DEFAULT_BLOCKS_PER_UPDATE,
            start_height: None,
        }
    }
}

/// Ensure the address derived from our key is registered for the platform.
pub fn validate_interop_address(
    info: &PlatformInfo,
    derived: &str,
) -> Result<(), WatcherError> {
    if info.owns(derived) {
        return Ok(());
    }
    tracing::error!(
        platform = %info.name,
        derived,
        registered = ?info.interop_addresses,
        "interop key does not match any registered address"
    );
    Err(WatcherError::AddressMismatch {
        platform: info.name.clone(),
        derived: derived.to_string(),
        registered: info.interop_addresses.clone(),
    })
}

struct PollState {
    /// Replay every recorded block once before incremental polling.
    initial_start: bool,
    /// Hashes already returned by this process. Grows for the process
    /// lifetime; the swap index drops settled swaps independently.
    reported: HashSet<Hash>,
    resync_rx: mpsc::UnboundedReceiver<u64>,
    /// Resync heights waiting for enough confirmations.
    resync_pending: BTreeSet<u64>,
}

/// Confirmation-gated height cursor over the oracle, with once-per-process
/// history replay, a resync queue and per-process swap deduplication.
pub struct BlockPoller {
    settings: WatcherSettings,
    interop_address: String,
    oracle: Arc<dyn OracleReader>,
    resync_tx: mpsc::UnboundedSender<u64>,
    state: Mutex<PollState>,
}

impl BlockPoller {
    pub fn new(
        settings: WatcherSettings,
        interop_address: String,
        oracle: Arc<dyn OracleReader>,
    ) -> Self {
        let (resync_tx, resync_rx) = mpsc::unbounded_channel();
        Self {
            settings,
            interop_address,
            oracle,
            resync_tx,
            state: Mutex::new(PollState {
                initial_start: true,
                reported: HashSet::new(),
                resync_rx,
                resync_pending: BTreeSet::new(),
            }),
        }
    }

    pub fn platform(&self) -> &str {
        &self.settings.platform
    }

    pub fn interop_address(&self) -> &str {
        &self.interop_address
    }

    pub fn resync_block(&self, height: u64) {
        tracing::info!(platform = %self.settings.platform, height, "block queued for resync");
        if self.resync_tx.send(height).is_err() {
            tracing::warn!(platform = %self.settings.platform, height, "resync queue closed");
        }
    }

    /// Run one pass against a chain at `chain_height`, logging instead of
    /// propagating failures.
    pub async fn poll(&self, chain_height: u64) -> Vec<PendingSwap> {
        let mut found = Vec::new();
        if let Err(e) = self.poll_inner(chain_height, &mut found).await {
            tracing::error!(
                platform = %self.settings.platform,
                error = %error_chain(&e),
                collected = found.len(),
                "polling pass failed"
            );
        }
        found
    }

    async fn poll_inner(
        &self,
        chain_height: u64,
        found: &mut Vec<PendingSwap>,
    ) -> Result<(), WatcherError> {
        let mut state = self.state.lock().await;
        let platform = self.settings.platform.as_str();

        if state.initial_start {
            let blocks = self.oracle.read_all_blocks(platform).await?;
            tracing::info!(platform, blocks = blocks.len(), "replaying recorded blocks");
            for block in &blocks {
                self.process_block(block, &mut state, found).await?;
            }
            state.initial_start = false;
        }

        while let Ok(height) = state.resync_rx.try_recv() {
            state.resync_pending.insert(height);
        }
        let ready: Vec<u64> = state
            .resync_pending
            .iter()
            .copied()
            .filter(|&height| self.is_confirmed(height, chain_height))
            .collect();
        if ready.len() < state.resync_pending.len() {
            tracing::debug!(
                platform,
                waiting = state.resync_pending.len() - ready.len(),
                "resync deferred until confirmed"
            );
        }
        for height in ready {
            let url = OracleUrl::block(platform, &self.settings.chain, height).to_string();
            let block = self.oracle.reload_block(platform, &url).await?;
            self.process_block(&block, &mut state, found).await?;
            state.resync_pending.remove(&height);
        }

        let mut next = match self.oracle.current_height(platform)? {
            Some(last) => last + 1,
            None => self
                .settings
                .start_height
                .unwrap_or_else(|| chain_height.saturating_sub(self.settings.confirmations)),
        };

        let mut processed = 0u64;
        while processed < self.settings.blocks_per_update && self.is_confirmed(next, chain_height) {
            let url = OracleUrl::block(platform, &self.settings.chain, next).to_string();
            let block = self.oracle.read_block(platform, &url).await?;
            self.process_block(&block, &mut state, found).await?;
            self.oracle.set_current_height(platform, next)?;
            tracing::debug!(platform, height = next, "block processed");
            next += 1;
            processed += 1;
        }
        Ok(())
    }

    fn is_confirmed(&self, height: u64, chain_height: u64) -> bool {
        chain_height >= height && chain_height - height >= self.settings.confirmations
    }

    async fn process_block(
        &self,
        block: &InteropBlock,
        state: &mut PollState,
        found: &mut Vec<PendingSwap>,
    ) -> Result<(), WatcherError> {
        let platform = self.settings.platform.as_str();
        for hash in &block.transactions {
            if state.reported.contains(hash) {
                continue;
            }
            let url = OracleUrl::transaction(platform, &self.settings.chain, *hash).to_string();
            let tx = self.oracle.read_transaction(platform, &url).await?;

            let inbound: Vec<_> = tx
                .transfers
                .iter()
                .filter(|t| {
                    t.source_platform == platform
                        && t.interop_address.eq_ignore_ascii_case(&self.interop_address)
                })
                .collect();
            let transfer = match inbound.as_slice() {
                [] => continue,
                [single] => *single,
                _ => {
                    tracing::warn!(platform, hash = %tx.hash, count = inbound.len(), "multiple transfers in one transaction are not supported");
                    continue;
                }
            };

            let destination: Address = match transfer.destination_address.parse() {
                Ok(address) => address,
                Err(e) => {
                    tracing::warn!(platform, hash = %tx.hash, error = %e, "unparseable destination");
                    continue;
                }
            };

            state.reported.insert(tx.hash);
            tracing::info!(
                platform,
                hash = %tx.hash,
                source = %transfer.source_address,
                destination = %destination,
                symbol = %transfer.symbol,
                amount = transfer.amount,
                "inbound swap detected"
            );
            found.push(PendingSwap {
                platform: platform.to_string(),
                hash: tx.hash,
                source: transfer.source_address.clone(),
                destination,
            });
        }
        Ok(())
    }
}
