use std::sync::Arc;

use async_trait::async_trait;

use xswap_core::{
    convert_decimals, Address, InteropBlock, InteropTransaction, InteropTransfer, PendingSwap,
    PlatformInfo,
};
use xswap_crypto::{neo_address_from_key, InteropKey};

use crate::assets::{AssetInfo, AssetTable};
use crate::client::{NeoRpcPool, NeoTransaction};
use crate::error::WatcherError;
use crate::oracle::{BlockDecoder, DecodedBlock, OracleReader};
use crate::watcher::{validate_interop_address, BlockPoller, ChainWatcher, WatcherSettings};

const TRANSFER_EVENT: &str = "transfer";

/// Extracts deposits from UTXO outputs and token transfer notifications.
pub struct NeoBlockDecoder {
    platform: String,
    chain: String,
    home_platform: String,
    interop_address: String,
    assets: AssetTable,
    pool: Arc<NeoRpcPool>,
}

impl NeoBlockDecoder {
    pub fn new(
        settings: &WatcherSettings,
        home_platform: &str,
        interop_address: &str,
        assets: AssetTable,
        pool: Arc<NeoRpcPool>,
    ) -> Self {
        Self {
            platform: settings.platform.clone(),
            chain: settings.chain.clone(),
            home_platform: home_platform.to_string(),
            interop_address: interop_address.to_string(),
            assets,
            pool,
        }
    }

    fn deposit(
        &self,
        tx: &NeoTransaction,
        sender: &str,
        key: &[u8; 33],
        asset: &AssetInfo,
        value: u128,
    ) -> Option<InteropTransfer> {
        let amount = match convert_decimals(value, asset.decimals, asset.home_decimals) {
            Ok(amount) => amount,
            Err(e) => {
                tracing::warn!(platform = %self.platform, hash = %tx.hash, error = %e, "deposit amount not representable");
                return None;
            }
        };
        Some(InteropTransfer {
            source_platform: self.platform.clone(),
            source_address: sender.to_string(),
            destination_platform: self.home_platform.clone(),
            destination_address: Address::from_compressed_key(key).to_string(),
            interop_address: self.interop_address.clone(),
            symbol: asset.symbol.clone(),
            amount,
        })
    }

    fn transfers(&self, tx: &NeoTransaction) -> Vec<InteropTransfer> {
        let to_interop = |address: &str| address == self.interop_address;
        let has_deposit = tx.outputs.iter().any(|o| to_interop(&o.address))
            || tx
                .notifications
                .iter()
                .any(|n| n.event.eq_ignore_ascii_case(TRANSFER_EVENT) && to_interop(&n.to));
        if !has_deposit {
            return Vec::new();
        }

        let Some((sender, key)) = self.witness(tx) else {
            return Vec::new();
        };
        // Change outputs of our own payouts.
        if sender == self.interop_address {
            return Vec::new();
        }

        let mut transfers = Vec::new();
        for output in tx.outputs.iter().filter(|o| to_interop(&o.address)) {
            match self.assets.by_contract(&output.asset) {
                Some(asset) => transfers.extend(self.deposit(tx, &sender, &key, asset, output.value)),
                None => tracing::warn!(platform = %self.platform, hash = %tx.hash, asset = %output.asset, "deposit of unsupported asset skipped"),
            }
        }
        for note in tx
            .notifications
            .iter()
            .filter(|n| n.event.eq_ignore_ascii_case(TRANSFER_EVENT) && to_interop(&n.to))
        {
            if note.from != sender {
                tracing::warn!(platform = %self.platform, hash = %tx.hash, from = %note.from, "token sender differs from witness");
                continue;
            }
            match self.assets.by_contract(&note.contract) {
                Some(asset) => transfers.extend(self.deposit(tx, &sender, &key, asset, note.amount)),
                None => tracing::warn!(platform = %self.platform, hash = %tx.hash, contract = %note.contract, "deposit of unsupported token skipped"),
            }
        }
        transfers
    }

    /// Sender address and compressed key taken from the transaction witness.
    fn witness(&self, tx: &NeoTransaction) -> Option<(String, [u8; 33])> {
        let raw = tx.witness_key.as_deref().and_then(|k| hex::decode(k).ok());
        let key: Option<[u8; 33]> = raw.and_then(|r| r.as_slice().try_into().ok());
        let Some(key) = key else {
            tracing::warn!(platform = %self.platform, hash = %tx.hash, "deposit without usable witness key");
            return None;
        };
        match neo_address_from_key(&key) {
            Ok(address) => Some((address, key)),
            Err(e) => {
                tracing::warn!(platform = %self.platform, hash = %tx.hash, error = %e, "invalid witness key");
                None
            }
        }
    }
}

#[async_trait]
impl BlockDecoder for NeoBlockDecoder {
    fn platform(&self) -> &str {
        &self.platform
    }

    async fn decode_block(&self, height: u64) -> Result<DecodedBlock, WatcherError> {
        let block = self
            .pool
            .block(height)
            .await?
            .ok_or_else(|| WatcherError::BlockNotFound {
                platform: self.platform.clone(),
                height,
            })?;

        let transactions: Vec<InteropTransaction> = block
            .transactions
            .iter()
            .filter_map(|tx| {
                let transfers = self.transfers(tx);
                (!transfers.is_empty()).then(|| InteropTransaction {
                    hash: tx.hash,
                    transfers,
                })
            })
            .collect();

        Ok(DecodedBlock {
            block: InteropBlock {
                platform: self.platform.clone(),
                chain: self.chain.clone(),
                height,
                hash: block.hash,
                transactions: transactions.iter().map(|t| t.hash).collect(),
            },
            transactions,
        })
    }
}

/// Watcher for the account chain.
pub struct NeoWatcher {
    poller: BlockPoller,
    pool: Arc<NeoRpcPool>,
}

impl NeoWatcher {
    pub fn new(
        settings: WatcherSettings,
        home_platform: &str,
        key: &InteropKey,
        info: &PlatformInfo,
        assets: AssetTable,
        pool: Arc<NeoRpcPool>,
        oracle: Arc<dyn OracleReader>,
    ) -> Result<Self, WatcherError> {
        let address = key.neo_address();
        validate_interop_address(info, &address)?;

        let decoder = NeoBlockDecoder::new(&settings, home_platform, &address, assets, pool.clone());
        oracle.register_decoder(Arc::new(decoder));

        tracing::info!(platform = %settings.platform, address = %address, endpoints = pool.len(), "neo watcher ready");
        Ok(Self {
            poller: BlockPoller::new(settings, address, oracle),
            pool,
        })
    }

    pub fn interop_address(&self) -> &str {
        self.poller.interop_address()
    }
}

#[async_trait]
impl ChainWatcher for NeoWatcher {
    fn platform(&self) -> &str {
        self.poller.platform()
    }

    fn available_address(&self, key: &InteropKey) -> String {
        key.neo_address()
    }

    async fn update(&self) -> Vec<PendingSwap> {
        match self.pool.block_count().await {
            // Block count includes the genesis block.
            Ok(count) => self.poller.poll(count.saturating_sub(1)).await,
            Err(e) => {
                tracing::error!(platform = %self.platform(), error = %e, "failed to read block count");
                Vec::new()
            }
        }
    }

    fn resync_block(&self, height: u64) {
        self.poller.resync_block(height);
    }
}
