//! Swapper parameters and per-platform backends.

use std::sync::Arc;
use std::time::Duration;

use xswap_crypto::InteropKey;
use xswap_watcher::{AssetTable, EvmClient, NeoRpcPool, DEFAULT_BLOCKS_PER_UPDATE};

use crate::payout::VerifyPolicy;

/// Default delay between a verified payout and its fee settlement.
pub const DEFAULT_SETTLE_DELAY: Duration = Duration::from_secs(60);

/// Home-chain platform name used when none is configured.
pub const DEFAULT_HOME_PLATFORM: &str = "nexus";

#[derive(Debug, Clone)]
pub struct SwapperConfig {
    /// Platform name of the home chain.
    pub home_platform: String,
    pub settle_delay: Duration,
    pub blocks_per_update: u64,
}

impl Default for SwapperConfig {
    fn default() -> Self {
        Self {
            home_platform: DEFAULT_HOME_PLATFORM.to_string(),
            settle_delay: DEFAULT_SETTLE_DELAY,
            blocks_per_update: DEFAULT_BLOCKS_PER_UPDATE,
        }
    }
}

/// Chain access for one external platform.
#[derive(Clone)]
pub enum ChainBackend {
    Evm(Arc<dyn EvmClient>),
    Neo(Arc<NeoRpcPool>),
}

impl ChainBackend {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Evm(_) => "evm",
            Self::Neo(_) => "neo",
        }
    }
}

/// Everything the swapper needs to watch and pay out on one platform.
#[derive(Clone)]
pub struct PlatformBackend {
    pub name: String,
    pub chain: String,
    /// Key controlling the platform's interop address.
    pub key: Arc<InteropKey>,
    pub confirmations: u64,
    pub start_height: Option<u64>,
    pub verify: VerifyPolicy,
    pub assets: AssetTable,
    pub chain_backend: ChainBackend,
}

impl PlatformBackend {
    pub fn new(
        name: &str,
        key: Arc<InteropKey>,
        confirmations: u64,
        assets: AssetTable,
        chain_backend: ChainBackend,
    ) -> Self {
        Self {
            name: name.to_string(),
            chain: name.to_string(),
            key,
            confirmations,
            start_height: None,
            verify: VerifyPolicy::default(),
            assets,
            chain_backend,
        }
    }

    pub fn with_verify(mut self, verify: VerifyPolicy) -> Self {
        self.verify = verify;
        self
    }

    pub fn with_start_height(mut self, height: u64) -> Self {
        self.start_height = Some(height);
        self
    }
}
