use std::sync::Arc;

use alloy_primitives::{b256, Address as EvmAddress, B256, U256};
use async_trait::async_trait;

use xswap_core::{
    convert_decimals, Address, InteropBlock, InteropTransaction, InteropTransfer,
    PendingSwap, PlatformInfo,
};
use xswap_crypto::{encode_evm_address, evm_address_from_key, recover_public_key, InteropKey};

use crate::assets::{AssetInfo, AssetTable};
use crate::client::{EvmClient, EvmLog, EvmTransaction};
use crate::error::WatcherError;
use crate::oracle::{BlockDecoder, DecodedBlock, OracleReader};
use crate::watcher::{validate_interop_address, BlockPoller, ChainWatcher, WatcherSettings};

/// `keccak256("Transfer(address,address,uint256)")`
pub const TRANSFER_TOPIC: B256 =
    b256!("ddf252ad1be2c89b69c2b068fc378daa952ba7f163c4a11628f55a4df523b3ef");

/// Extracts native and token deposits to the interop address from EVM blocks.
pub struct EvmBlockDecoder {
    platform: String,
    chain: String,
    home_platform: String,
    interop_address: EvmAddress,
    assets: AssetTable,
    client: Arc<dyn EvmClient>,
}

struct Deposit<'a> {
    asset: &'a AssetInfo,
    from: EvmAddress,
    value: U256,
}

impl EvmBlockDecoder {
    pub fn new(
        settings: &WatcherSettings,
        home_platform: &str,
        interop_address: EvmAddress,
        assets: AssetTable,
        client: Arc<dyn EvmClient>,
    ) -> Self {
        Self {
            platform: settings.platform.clone(),
            chain: settings.chain.clone(),
            home_platform: home_platform.to_string(),
            interop_address,
            assets,
            client,
        }
    }

    fn token_deposit<'a>(&'a self, log: &EvmLog) -> Option<Deposit<'a>> {
        if log.topics.len() != 3 || log.topics[0] != TRANSFER_TOPIC || log.data.len() < 32 {
            return None;
        }
        let to = EvmAddress::from_word(log.topics[2]);
        if to != self.interop_address {
            return None;
        }
        let contract = encode_evm_address(&log.address);
        let Some(asset) = self.assets.by_contract(&contract) else {
            tracing::warn!(platform = %self.platform, contract = %contract, "deposit of unsupported token skipped");
            return None;
        };
        Some(Deposit {
            asset,
            from: EvmAddress::from_word(log.topics[1]),
            value: U256::from_be_slice(&log.data[..32]),
        })
    }

    /// Deposits carried by `tx`; receipt logs are only fetched for calls that
    /// may emit a token transfer.
    async fn deposits(&self, tx: &EvmTransaction) -> Result<Vec<Deposit<'_>>, WatcherError> {
        let Some(to) = tx.to else {
            return Ok(Vec::new());
        };
        let native_deposit = to == self.interop_address && !tx.value.is_zero();
        let token_call = self.assets.by_contract(&encode_evm_address(&to)).is_some();
        if !native_deposit && !token_call {
            return Ok(Vec::new());
        }

        let Some(receipt) = self.client.transaction_receipt(&tx.hash).await? else {
            return Ok(Vec::new());
        };
        if !receipt.success {
            tracing::debug!(platform = %self.platform, hash = %tx.hash, "reverted transaction ignored");
            return Ok(Vec::new());
        }

        let mut deposits = Vec::new();
        if native_deposit {
            match self.assets.native() {
                Some(asset) => deposits.push(Deposit {
                    asset,
                    from: tx.from,
                    value: tx.value,
                }),
                None => tracing::warn!(platform = %self.platform, hash = %tx.hash, "native deposit on platform without native asset"),
            }
        }
        deposits.extend(receipt.logs.iter().filter_map(|log| self.token_deposit(log)));
        Ok(deposits)
    }

    /// Recover the signer's compressed key and check it owns `tx.from`.
    fn signer_key(&self, tx: &EvmTransaction) -> Option<[u8; 33]> {
        let key = match recover_public_key(&tx.signing_hash.0, &tx.r.0, &tx.s.0, tx.v) {
            Ok(key) => key,
            Err(e) => {
                tracing::warn!(platform = %self.platform, hash = %tx.hash, error = %e, "signature recovery failed");
                return None;
            }
        };
        match evm_address_from_key(&key) {
            Ok(address) if address == tx.from => Some(key),
            _ => {
                tracing::warn!(platform = %self.platform, hash = %tx.hash, "recovered signer does not match sender");
                None
            }
        }
    }

    fn transfer(&self, tx: &EvmTransaction, key: &[u8; 33], deposit: &Deposit<'_>) -> Option<InteropTransfer> {
        if deposit.from != tx.from {
            tracing::warn!(platform = %self.platform, hash = %tx.hash, "token sender differs from transaction signer");
            return None;
        }
        let Ok(raw) = u128::try_from(deposit.value) else {
            tracing::warn!(platform = %self.platform, hash = %tx.hash, value = %deposit.value, "deposit amount too large");
            return None;
        };
        let amount = match convert_decimals(raw, deposit.asset.decimals, deposit.asset.home_decimals) {
            Ok(amount) => amount,
            Err(e) => {
                tracing::warn!(platform = %self.platform, hash = %tx.hash, error = %e, "deposit amount not representable");
                return None;
            }
        };
        Some(InteropTransfer {
            source_platform: self.platform.clone(),
            source_address: encode_evm_address(&tx.from),
            destination_platform: self.home_platform.clone(),
            destination_address: Address::from_compressed_key(key).to_string(),
            interop_address: encode_evm_address(&self.interop_address),
            symbol: deposit.asset.symbol.clone(),
            amount,
        })
    }
}

#[async_trait]
impl BlockDecoder for EvmBlockDecoder {
    fn platform(&self) -> &str {
        &self.platform
    }

    async fn decode_block(&self, height: u64) -> Result<DecodedBlock, WatcherError> {
        let block = self
            .client
            .block(height)
            .await?
            .ok_or_else(|| WatcherError::BlockNotFound {
                platform: self.platform.clone(),
                height,
            })?;

        let mut transactions = Vec::new();
        for tx in &block.transactions {
            // Outbound payouts are signed by the interop key itself.
            if tx.from == self.interop_address {
                continue;
            }
            let deposits = self.deposits(tx).await?;
            if deposits.is_empty() {
                continue;
            }
            let Some(key) = self.signer_key(tx) else {
                continue;
            };
            let transfers: Vec<InteropTransfer> = deposits
                .iter()
                .filter_map(|d| self.transfer(tx, &key, d))
                .collect();
            if !transfers.is_empty() {
                transactions.push(InteropTransaction {
                    hash: tx.hash,
                    transfers,
                });
            }
        }

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

/// Watcher for any EVM-compatible chain, parameterised by platform name.
pub struct EvmWatcher {
    poller: BlockPoller,
    client: Arc<dyn EvmClient>,
}

impl EvmWatcher {
    /// Fails if `key` does not control one of the platform's registered
    /// interop addresses.
    pub fn new(
        settings: WatcherSettings,
        home_platform: &str,
        key: &InteropKey,
        info: &PlatformInfo,
        assets: AssetTable,
        client: Arc<dyn EvmClient>,
        oracle: Arc<dyn OracleReader>,
    ) -> Result<Self, WatcherError> {
        let interop = key.evm_address();
        let address = encode_evm_address(&interop);
        validate_interop_address(info, &address)?;

        let decoder = EvmBlockDecoder::new(&settings, home_platform, interop, assets, client.clone());
        oracle.register_decoder(Arc::new(decoder));

        tracing::info!(platform = %settings.platform, address = %address, "evm watcher ready");
        Ok(Self {
            poller: BlockPoller::new(settings, address, oracle),
            client,
        })
    }

    pub fn interop_address(&self) -> &str {
        self.poller.interop_address()
    }
}

#[async_trait]
impl ChainWatcher for EvmWatcher {
    fn platform(&self) -> &str {
        self.poller.platform()
    }

    fn available_address(&self, key: &InteropKey) -> String {
        encode_evm_address(&key.evm_address())
    }

    async fn update(&self) -> Vec<PendingSwap> {
        match self.client.block_number().await {
            Ok(height) => self.poller.poll(height).await,
            Err(e) => {
                tracing::error!(platform = %self.platform(), error = %e, "failed to read chain height");
                Vec::new()
            }
        }
    }

    fn resync_block(&self, height: u64) {
        self.poller.resync_block(height);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::AssetInfo;
    use crate::oracle::LocalOracle;
    use crate::testing::{signed_evm_tx, token_transfer_log, MockEvmClient};
    use xswap_core::{Hash, MemoryStore};

    const USDT: &str = "0xdac17f958d2ee523a2206206994597c13d831ec7";

    struct Fixture {
        interop: InteropKey,
        user: InteropKey,
        client: Arc<MockEvmClient>,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                interop: InteropKey::generate(),
                user: InteropKey::generate(),
                client: Arc::new(MockEvmClient::new("http://eth-rpc")),
            }
        }

        fn info(&self) -> PlatformInfo {
            PlatformInfo {
                name: "ethereum".into(),
                native_symbol: "ETH".into(),
                interop_addresses: vec![encode_evm_address(&self.interop.evm_address())],
            }
        }

        fn assets() -> AssetTable {
            AssetTable::new(vec![
                AssetInfo::native("ETH", 18, 8),
                AssetInfo::token("USDT", USDT, 6, 8),
            ])
        }

        fn decoder(&self) -> EvmBlockDecoder {
            EvmBlockDecoder::new(
                &WatcherSettings::new("ethereum", 0),
                "nexus",
                self.interop.evm_address(),
                Self::assets(),
                self.client.clone(),
            )
        }

        fn usdt() -> EvmAddress {
            USDT.parse().unwrap()
        }
    }

    #[tokio::test]
    async fn test_native_deposit_end_to_end() {
        let fx = Fixture::new();
        let tx = signed_evm_tx(
            &fx.user,
            Hash([0x11; 32]),
            fx.interop.evm_address(),
            U256::from(10u64) * U256::from(10u64).pow(U256::from(18u64)),
        );
        fx.client.add_block(5, vec![tx], vec![]);
        fx.client.set_height(5);

        let oracle = Arc::new(LocalOracle::new(Arc::new(MemoryStore::new())));
        let mut settings = WatcherSettings::new("ethereum", 0);
        settings.start_height = Some(5);
        let watcher = EvmWatcher::new(
            settings,
            "nexus",
            &fx.interop,
            &fx.info(),
            Fixture::assets(),
            fx.client.clone(),
            oracle,
        )
        .unwrap();

        let swaps = watcher.update().await;
        assert_eq!(swaps.len(), 1);
        assert_eq!(swaps[0].hash, Hash([0x11; 32]));
        assert_eq!(swaps[0].source, encode_evm_address(&fx.user.evm_address()));
        assert_eq!(swaps[0].destination, fx.user.home_address());
        assert!(watcher.update().await.is_empty());
    }

    #[tokio::test]
    async fn test_native_amount_converted_to_home_decimals() {
        let fx = Fixture::new();
        let tx = signed_evm_tx(
            &fx.user,
            Hash([0x12; 32]),
            fx.interop.evm_address(),
            U256::from(1_500_000_000_000_000_000u128),
        );
        fx.client.add_block(1, vec![tx], vec![]);

        let decoded = fx.decoder().decode_block(1).await.unwrap();
        let transfer = &decoded.transactions[0].transfers[0];
        assert_eq!(transfer.symbol, "ETH");
        assert_eq!(transfer.amount, 150_000_000);
        assert_eq!(transfer.destination_platform, "nexus");
        assert_eq!(decoded.block.transactions, vec![Hash([0x12; 32])]);
    }

    #[tokio::test]
    async fn test_token_deposit_from_transfer_log() {
        let fx = Fixture::new();
        let hash = Hash([0x21; 32]);
        let tx = signed_evm_tx(&fx.user, hash, Fixture::usdt(), U256::ZERO);
        let log = token_transfer_log(
            Fixture::usdt(),
            fx.user.evm_address(),
            fx.interop.evm_address(),
            U256::from(5_000_000u64),
        );
        fx.client.add_block(2, vec![tx], vec![(hash, log)]);

        let decoded = fx.decoder().decode_block(2).await.unwrap();
        let transfer = &decoded.transactions[0].transfers[0];
        assert_eq!(transfer.symbol, "USDT");
        assert_eq!(transfer.amount, 500_000_000);
    }

    #[tokio::test]
    async fn test_unknown_token_contract_skipped() {
        let fx = Fixture::new();
        let hash = Hash([0x31; 32]);
        let unknown: EvmAddress = "0x00000000000000000000000000000000000000ff".parse().unwrap();
        let tx = signed_evm_tx(&fx.user, hash, Fixture::usdt(), U256::ZERO);
        let log = token_transfer_log(
            unknown,
            fx.user.evm_address(),
            fx.interop.evm_address(),
            U256::from(7u64),
        );
        fx.client.add_block(3, vec![tx], vec![(hash, log)]);

        let decoded = fx.decoder().decode_block(3).await.unwrap();
        assert!(decoded.transactions.is_empty());
    }

    #[tokio::test]
    async fn test_forged_sender_skipped() {
        let fx = Fixture::new();
        let mut tx = signed_evm_tx(&fx.user, Hash([0x41; 32]), fx.interop.evm_address(), U256::from(1u64));
        tx.from = InteropKey::generate().evm_address();
        fx.client.add_block(4, vec![tx], vec![]);

        let decoded = fx.decoder().decode_block(4).await.unwrap();
        assert!(decoded.transactions.is_empty());
    }

    #[tokio::test]
    async fn test_outbound_payout_not_reported() {
        let fx = Fixture::new();
        let tx = signed_evm_tx(&fx.interop, Hash([0x51; 32]), fx.interop.evm_address(), U256::from(1u64));
        fx.client.add_block(6, vec![tx], vec![]);

        let decoded = fx.decoder().decode_block(6).await.unwrap();
        assert!(decoded.transactions.is_empty());
    }

    #[tokio::test]
    async fn test_missing_block_is_an_error() {
        let fx = Fixture::new();
        assert!(matches!(
            fx.decoder().decode_block(99).await,
            Err(WatcherError::BlockNotFound { height: 99, .. })
        ));
    }

    #[test]
    fn test_constructor_rejects_foreign_key() {
        let fx = Fixture::new();
        let oracle = Arc::new(LocalOracle::new(Arc::new(MemoryStore::new())));
        let result = EvmWatcher::new(
            WatcherSettings::new("ethereum", 12),
            "nexus",
            &fx.user,
            &fx.info(),
            Fixture::assets(),
            fx.client.clone(),
            oracle,
        );
        assert!(matches!(result, Err(WatcherError::AddressMismatch { .. })));
    }

    #[test]
    fn test_transfer_topic_matches_signature() {
        assert_eq!(
            TRANSFER_TOPIC,
            alloy_primitives::keccak256("Transfer(address,address,uint256)")
        );
    }
}
