//! Shared harness for the cross-crate scenarios under `tests/`.
//!
//! Wires a [`TokenSwapper`] to an in-memory home chain, an in-memory store
//! and scripted clients for one EVM platform (`eth`) and one account-chain
//! platform (`neo`).

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use xswap_core::{Hash, InteropTransfer, KvStore, MemoryStore, PlatformInfo};
use xswap_crypto::{encode_evm_address, InteropKey};
use xswap_engine::testing::MockHomeChain;
use xswap_engine::{ChainBackend, PlatformBackend, SwapperConfig, TokenSwapper, VerifyPolicy};
use xswap_watcher::testing::{MockEvmClient, MockNeoClient};
use xswap_watcher::{neo_assets, AssetInfo, AssetTable, LocalOracle, NeoClient, NeoRpcPool};

pub const EVM_DESTINATION: &str = "0x00000000000000000000000000000000000000be";
pub const NEO_DESTINATION: &str = "AQVh2pG732YvtNaxEGkQUei3YA4cvo7d2i";

pub fn h(b: u8) -> Hash {
    Hash([b; 32])
}

/// Fast verification for tests.
pub fn quick_verify() -> VerifyPolicy {
    VerifyPolicy {
        max_attempts: 3,
        delay: Duration::from_millis(1),
        mempool_check_after: 2,
        ..VerifyPolicy::default()
    }
}

pub struct Harness {
    pub home: Arc<MockHomeChain>,
    pub store: Arc<MemoryStore>,
    pub evm: Arc<MockEvmClient>,
    pub neo: Arc<MockNeoClient>,
    pub eth_key: Arc<InteropKey>,
    pub neo_key: Arc<InteropKey>,
    pub eth_confirmations: u64,
    pub eth_start_height: Option<u64>,
}

impl Default for Harness {
    fn default() -> Self {
        Self::new()
    }
}

impl Harness {
    pub fn new() -> Self {
        let eth_key = Arc::new(InteropKey::generate());
        let neo_key = Arc::new(InteropKey::generate());
        let home = Arc::new(MockHomeChain::new());
        home.add_platform(PlatformInfo {
            name: "eth".into(),
            native_symbol: "ETH".into(),
            interop_addresses: vec![encode_evm_address(&eth_key.evm_address())],
        });
        home.add_platform(PlatformInfo {
            name: "neo".into(),
            native_symbol: "NEO".into(),
            interop_addresses: vec![neo_key.neo_address()],
        });
        Self {
            home,
            store: Arc::new(MemoryStore::new()),
            evm: Arc::new(MockEvmClient::new("http://eth")),
            neo: Arc::new(MockNeoClient::new("http://neo-a")),
            eth_key,
            neo_key,
            eth_confirmations: 0,
            eth_start_height: None,
        }
    }

    pub fn backends(&self) -> Vec<PlatformBackend> {
        let mut eth = PlatformBackend::new(
            "eth",
            self.eth_key.clone(),
            self.eth_confirmations,
            AssetTable::new(vec![AssetInfo::native("ETH", 18, 8)]),
            ChainBackend::Evm(self.evm.clone()),
        )
        .with_verify(quick_verify());
        if let Some(height) = self.eth_start_height {
            eth = eth.with_start_height(height);
        }

        let clients = vec![self.neo.clone() as Arc<dyn NeoClient>];
        let pool = NeoRpcPool::new("neo", clients).unwrap_or_else(|e| panic!("neo pool: {}", e));
        let neo = PlatformBackend::new(
            "neo",
            self.neo_key.clone(),
            1,
            neo_assets(),
            ChainBackend::Neo(Arc::new(pool)),
        )
        .with_verify(quick_verify());

        vec![eth, neo]
    }

    /// A swapper over the harness store. Calling this twice simulates a
    /// process restart.
    pub fn swapper(&self) -> Arc<TokenSwapper> {
        let store: Arc<dyn KvStore> = self.store.clone();
        let config = SwapperConfig {
            settle_delay: Duration::ZERO,
            ..SwapperConfig::default()
        };
        TokenSwapper::new(
            config,
            self.home.clone(),
            store.clone(),
            Arc::new(InteropKey::generate()),
            self.backends(),
            Arc::new(LocalOracle::new(store)),
        )
        .unwrap_or_else(|e| panic!("swapper: {}", e))
    }

    /// Register a home-chain swap `source` paying `amount` (home decimals)
    /// of `symbol` out on `platform`.
    pub fn outbound(&self, source: Hash, platform: &str, symbol: &str, amount: u128) {
        let (destination, interop) = match platform {
            "eth" => (
                EVM_DESTINATION.to_string(),
                encode_evm_address(&self.eth_key.evm_address()),
            ),
            _ => (NEO_DESTINATION.to_string(), self.neo_key.neo_address()),
        };
        self.home.set_transfers(
            source,
            vec![InteropTransfer {
                source_platform: "nexus".into(),
                source_address: "Puser".into(),
                destination_platform: platform.into(),
                destination_address: destination,
                interop_address: interop,
                symbol: symbol.into(),
                amount,
            }],
        );
    }
}

/// Run swapper cycles until `check` holds. Panics after `rounds` cycles.
pub async fn drive_until<F, Fut>(swapper: &Arc<TokenSwapper>, rounds: usize, mut check: F)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    for _ in 0..rounds {
        if let Err(e) = swapper.update().await {
            panic!("update failed: {}", e);
        }
        if check().await {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("condition not reached after {} cycles", rounds);
}
