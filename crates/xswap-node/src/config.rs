//! Node configuration loading and management.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use xswap_crypto::InteropKey;
use xswap_engine::{SwapperConfig, VerifyPolicy, DEFAULT_HOME_PLATFORM};
use xswap_watcher::{neo_assets, AssetInfo, AssetTable, DEFAULT_BLOCKS_PER_UPDATE};

/// Full configuration for the xswap node.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct XswapConfig {
    /// Home-chain connection and swapper key.
    #[serde(default)]
    pub node: NodeConfig,

    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub api: ApiConfig,

    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub swapper: SwapperSection,

    /// External platforms, one entry each.
    #[serde(default)]
    pub platforms: Vec<PlatformConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeConfig {
    /// Home-chain RPC endpoint.
    #[serde(default = "default_home_rpc")]
    pub rpc_url: String,
    /// Secret (hex or WIF) signing home-chain settlements.
    #[serde(default)]
    pub swapper_secret: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Path to the data directory.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_api_addr")]
    pub listen_addr: String,
    #[serde(default = "default_api_port")]
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Log format (text, json).
    #[serde(default = "default_log_format")]
    pub format: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SwapperSection {
    #[serde(default = "default_home_platform")]
    pub home_platform: String,
    #[serde(default = "default_update_interval_ms")]
    pub update_interval_ms: u64,
    #[serde(default = "default_settle_delay_secs")]
    pub settle_delay_secs: u64,
    #[serde(default = "default_blocks_per_update")]
    pub blocks_per_update: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlatformKind {
    Evm,
    Neo,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlatformConfig {
    pub name: String,
    pub kind: PlatformKind,
    /// Chain name on the home chain; defaults to `name`.
    #[serde(default)]
    pub chain: Option<String>,
    #[serde(default)]
    pub rpc_urls: Vec<String>,
    /// Secret (hex or WIF) of the platform's interop address.
    #[serde(default)]
    pub interop_secret: String,
    /// Defaults to 12 on EVM chains and 1 on account chains.
    #[serde(default)]
    pub confirmations: Option<u64>,
    #[serde(default)]
    pub start_height: Option<u64>,
    #[serde(default)]
    pub chain_id: Option<u64>,
    /// Native coin symbol (EVM only).
    #[serde(default)]
    pub native_symbol: Option<String>,
    /// Native coin decimals (EVM only).
    #[serde(default = "default_evm_decimals")]
    pub decimals: u8,
    /// Home-chain decimals of the native coin.
    #[serde(default = "default_home_decimals")]
    pub home_decimals: u8,
    #[serde(default)]
    pub tokens: Vec<TokenConfig>,
    #[serde(default)]
    pub verify: VerifyConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerifyConfig {
    #[serde(default = "default_verify_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_verify_delay_ms")]
    pub delay_ms: u64,
    #[serde(default)]
    pub backoff: bool,
    #[serde(default = "default_verify_max_delay_ms")]
    pub max_delay_ms: u64,
    #[serde(default = "default_mempool_check_after")]
    pub mempool_check_after: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenConfig {
    pub symbol: String,
    pub contract: String,
    pub decimals: u8,
    #[serde(default)]
    pub home_decimals: Option<u8>,
}

// Default value functions
fn default_home_rpc() -> String {
    "http://127.0.0.1:7077/rpc".into()
}
fn default_data_dir() -> PathBuf {
    PathBuf::from("./data")
}
fn default_api_addr() -> String {
    "127.0.0.1".into()
}
fn default_api_port() -> u16 {
    7090
}
fn default_log_level() -> String {
    "info".into()
}
fn default_log_format() -> String {
    "text".into()
}
fn default_home_platform() -> String {
    DEFAULT_HOME_PLATFORM.into()
}
fn default_update_interval_ms() -> u64 {
    5_000
}
fn default_settle_delay_secs() -> u64 {
    60
}
fn default_blocks_per_update() -> u64 {
    DEFAULT_BLOCKS_PER_UPDATE
}
fn default_evm_decimals() -> u8 {
    18
}
fn default_home_decimals() -> u8 {
    8
}
fn default_verify_attempts() -> u32 {
    12
}
fn default_verify_delay_ms() -> u64 {
    5_000
}
fn default_verify_max_delay_ms() -> u64 {
    60_000
}
fn default_mempool_check_after() -> u32 {
    3
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            rpc_url: default_home_rpc(),
            swapper_secret: String::new(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
        }
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_api_addr(),
            port: default_api_port(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl Default for SwapperSection {
    fn default() -> Self {
        Self {
            home_platform: default_home_platform(),
            update_interval_ms: default_update_interval_ms(),
            settle_delay_secs: default_settle_delay_secs(),
            blocks_per_update: default_blocks_per_update(),
        }
    }
}

impl Default for VerifyConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_verify_attempts(),
            delay_ms: default_verify_delay_ms(),
            backoff: false,
            max_delay_ms: default_verify_max_delay_ms(),
            mempool_check_after: default_mempool_check_after(),
        }
    }
}

impl VerifyConfig {
    pub fn policy(&self) -> VerifyPolicy {
        VerifyPolicy {
            max_attempts: self.max_attempts,
            delay: Duration::from_millis(self.delay_ms),
            backoff: self.backoff,
            max_delay: Duration::from_millis(self.max_delay_ms),
            mempool_check_after: self.mempool_check_after,
        }
    }
}

impl PlatformConfig {
    pub fn chain(&self) -> &str {
        self.chain.as_deref().unwrap_or(&self.name)
    }

    pub fn confirmations(&self) -> u64 {
        self.confirmations.unwrap_or(match self.kind {
            PlatformKind::Evm => 12,
            PlatformKind::Neo => 1,
        })
    }

    /// Assets transferable on this platform.
    pub fn assets(&self) -> AssetTable {
        let mut assets: Vec<AssetInfo> = match self.kind {
            PlatformKind::Evm => {
                let symbol = self.native_symbol.as_deref().unwrap_or("ETH");
                vec![AssetInfo::native(symbol, self.decimals, self.home_decimals)]
            }
            PlatformKind::Neo => neo_assets().iter().cloned().collect(),
        };
        for token in &self.tokens {
            let home_decimals = token.home_decimals.unwrap_or(token.decimals);
            assets.push(AssetInfo::token(
                &token.symbol,
                &token.contract,
                token.decimals,
                home_decimals,
            ));
        }
        AssetTable::new(assets)
    }

    pub fn interop_key(&self) -> anyhow::Result<InteropKey> {
        InteropKey::parse(&self.interop_secret)
            .map_err(|e| anyhow::anyhow!("platform {}: invalid interop secret: {}", self.name, e))
    }
}

impl XswapConfig {
    /// Load config from a TOML file, falling back to defaults for missing fields.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        if path.exists() {
            let contents = std::fs::read_to_string(path)?;
            let config: XswapConfig = toml::from_str(&contents)?;
            Ok(config)
        } else {
            Ok(Self::default())
        }
    }

    /// Save the current config to a TOML file.
    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        let contents = toml::to_string_pretty(self)?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, contents)?;
        Ok(())
    }

    /// Reject configurations the swapper cannot run with.
    pub fn validate(&self) -> anyhow::Result<()> {
        InteropKey::parse(&self.node.swapper_secret)
            .map_err(|e| anyhow::anyhow!("invalid swapper secret: {}", e))?;

        let mut names = HashSet::new();
        for platform in &self.platforms {
            if platform.name.eq_ignore_ascii_case(&self.swapper.home_platform) {
                anyhow::bail!("platform {} collides with the home platform", platform.name);
            }
            if !names.insert(platform.name.to_ascii_lowercase()) {
                anyhow::bail!("duplicate platform {}", platform.name);
            }
            if platform.rpc_urls.is_empty() {
                anyhow::bail!("platform {} has no rpc_urls", platform.name);
            }
            if platform.verify.max_attempts == 0 {
                anyhow::bail!("platform {}: verify.max_attempts must be positive", platform.name);
            }
            platform.interop_key()?;
        }
        Ok(())
    }

    pub fn swapper_key(&self) -> anyhow::Result<InteropKey> {
        InteropKey::parse(&self.node.swapper_secret)
            .map_err(|e| anyhow::anyhow!("invalid swapper secret: {}", e))
    }

    pub fn swapper_config(&self) -> SwapperConfig {
        SwapperConfig {
            home_platform: self.swapper.home_platform.clone(),
            settle_delay: Duration::from_secs(self.swapper.settle_delay_secs),
            blocks_per_update: self.swapper.blocks_per_update,
        }
    }

    pub fn update_interval(&self) -> Duration {
        Duration::from_millis(self.swapper.update_interval_ms)
    }

    /// Default config with freshly generated keys and one example platform
    /// of each kind.
    pub fn generate() -> Self {
        let platform = |name: &str, kind: PlatformKind, url: &str| PlatformConfig {
            name: name.into(),
            kind,
            chain: None,
            rpc_urls: vec![url.into()],
            interop_secret: hex::encode(*InteropKey::generate().secret_bytes()),
            confirmations: None,
            start_height: None,
            chain_id: (kind == PlatformKind::Evm).then_some(1),
            native_symbol: (kind == PlatformKind::Evm).then(|| "ETH".to_string()),
            decimals: default_evm_decimals(),
            home_decimals: default_home_decimals(),
            tokens: Vec::new(),
            verify: VerifyConfig::default(),
        };
        Self {
            node: NodeConfig {
                swapper_secret: hex::encode(*InteropKey::generate().secret_bytes()),
                ..NodeConfig::default()
            },
            platforms: vec![
                platform("ethereum", PlatformKind::Evm, "http://127.0.0.1:8545"),
                platform("neo", PlatformKind::Neo, "http://127.0.0.1:10332"),
            ],
            ..Self::default()
        }
    }
}
