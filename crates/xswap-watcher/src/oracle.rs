//! Oracle reader: decoded external blocks and transactions, plus the
//! per-platform height cursor.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;

use xswap_core::{Hash, InteropBlock, InteropTransaction, KvStore, StorageMap};

use crate::error::WatcherError;

const URL_SCHEME: &str = "interop://";
const HEIGHT_TAG: &str = ".oracle.height";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OracleTarget {
    Block(u64),
    Transaction(Hash),
}

/// Reference to one external block or transaction:
/// `interop://<platform>/<chain>/block/<height bytes hex>` or
/// `interop://<platform>/<chain>/tx/<hash hex>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OracleUrl {
    pub platform: String,
    pub chain: String,
    pub target: OracleTarget,
}

impl OracleUrl {
    pub fn block(platform: &str, chain: &str, height: u64) -> Self {
        Self {
            platform: platform.to_string(),
            chain: chain.to_string(),
            target: OracleTarget::Block(height),
        }
    }

    pub fn transaction(platform: &str, chain: &str, hash: Hash) -> Self {
        Self {
            platform: platform.to_string(),
            chain: chain.to_string(),
            target: OracleTarget::Transaction(hash),
        }
    }
}

impl fmt::Display for OracleUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.target {
            OracleTarget::Block(height) => write!(
                f,
                "{}{}/{}/block/{}",
                URL_SCHEME,
                self.platform,
                self.chain,
                hex::encode(height.to_le_bytes())
            ),
            OracleTarget::Transaction(hash) => {
                write!(f, "{}{}/{}/tx/{}", URL_SCHEME, self.platform, self.chain, hash)
            }
        }
    }
}

impl FromStr for OracleUrl {
    type Err = WatcherError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || WatcherError::InvalidUrl(s.to_string());
        let rest = s.strip_prefix(URL_SCHEME).ok_or_else(invalid)?;
        let parts: Vec<&str> = rest.split('/').collect();
        let [platform, chain, kind, value] = parts.as_slice() else {
            return Err(invalid());
        };
        if platform.is_empty() || chain.is_empty() {
            return Err(invalid());
        }
        let target = match *kind {
            "block" => {
                let raw = hex::decode(value).map_err(|_| invalid())?;
                let bytes: [u8; 8] = raw.as_slice().try_into().map_err(|_| invalid())?;
                OracleTarget::Block(u64::from_le_bytes(bytes))
            }
            "tx" => OracleTarget::Transaction(value.parse().map_err(|_| invalid())?),
            _ => return Err(invalid()),
        };
        Ok(Self {
            platform: platform.to_string(),
            chain: chain.to_string(),
            target,
        })
    }
}

/// Block and transaction with interop transfers already extracted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedBlock {
    pub block: InteropBlock,
    pub transactions: Vec<InteropTransaction>,
}

/// Platform-specific extraction of interop transfers from a raw block.
#[async_trait]
pub trait BlockDecoder: Send + Sync {
    fn platform(&self) -> &str;

    async fn decode_block(&self, height: u64) -> Result<DecodedBlock, WatcherError>;
}

/// Read access to decoded external chain data. URLs are opaque strings
/// produced by [`OracleUrl`].
#[async_trait]
pub trait OracleReader: Send + Sync {
    async fn read_block(&self, platform: &str, url: &str) -> Result<InteropBlock, WatcherError>;

    async fn read_transaction(
        &self,
        platform: &str,
        url: &str,
    ) -> Result<InteropTransaction, WatcherError>;

    /// Re-read a block from the chain, replacing any cached copy.
    async fn reload_block(&self, platform: &str, url: &str) -> Result<InteropBlock, WatcherError> {
        self.read_block(platform, url).await
    }

    /// Every block recorded so far for `platform`, by increasing height.
    async fn read_all_blocks(&self, platform: &str) -> Result<Vec<InteropBlock>, WatcherError>;

    /// Last processed height, if any.
    fn current_height(&self, platform: &str) -> Result<Option<u64>, WatcherError>;

    fn set_current_height(&self, platform: &str, height: u64) -> Result<(), WatcherError>;

    fn register_decoder(&self, _decoder: Arc<dyn BlockDecoder>) {}
}

/// Oracle that decodes blocks through registered [`BlockDecoder`]s and
/// caches the results in the durable store.
pub struct LocalOracle {
    store: Arc<dyn KvStore>,
    decoders: DashMap<String, Arc<dyn BlockDecoder>>,
}

impl LocalOracle {
    pub fn new(store: Arc<dyn KvStore>) -> Self {
        Self {
            store,
            decoders: DashMap::new(),
        }
    }

    fn blocks(&self, platform: &str) -> StorageMap<'_, u64, InteropBlock> {
        StorageMap::new(&format!(".oracle.blocks.{}", platform), self.store.as_ref())
    }

    fn transactions(&self, platform: &str) -> StorageMap<'_, Hash, InteropTransaction> {
        StorageMap::new(&format!(".oracle.tx.{}", platform), self.store.as_ref())
    }

    fn heights(&self) -> StorageMap<'_, String, u64> {
        StorageMap::new(HEIGHT_TAG, self.store.as_ref())
    }

    fn parse(platform: &str, url: &str) -> Result<OracleUrl, WatcherError> {
        let parsed: OracleUrl = url.parse()?;
        if parsed.platform != platform {
            return Err(WatcherError::InvalidUrl(format!(
                "{} does not belong to platform {}",
                url, platform
            )));
        }
        Ok(parsed)
    }

    async fn decode_and_cache(
        &self,
        platform: &str,
        height: u64,
    ) -> Result<InteropBlock, WatcherError> {
        let decoder = self
            .decoders
            .get(platform)
            .map(|d| d.value().clone())
            .ok_or_else(|| WatcherError::UnknownPlatform(platform.to_string()))?;

        let decoded = decoder.decode_block(height).await?;
        let txs = self.transactions(platform);
        for tx in &decoded.transactions {
            txs.set(&tx.hash, tx)?;
        }
        self.blocks(platform).set(&height, &decoded.block)?;
        tracing::debug!(
            platform,
            height,
            transactions = decoded.transactions.len(),
            "cached decoded block"
        );
        Ok(decoded.block)
    }

    fn block_height(platform: &str, url: &str) -> Result<u64, WatcherError> {
        match Self::parse(platform, url)?.target {
            OracleTarget::Block(height) => Ok(height),
            OracleTarget::Transaction(_) => Err(WatcherError::InvalidUrl(url.to_string())),
        }
    }
}

#[async_trait]
impl OracleReader for LocalOracle {
    async fn read_block(&self, platform: &str, url: &str) -> Result<InteropBlock, WatcherError> {
        let height = Self::block_height(platform, url)?;
        if let Some(block) = self.blocks(platform).get(&height)? {
            return Ok(block);
        }
        self.decode_and_cache(platform, height).await
    }

    async fn read_transaction(
        &self,
        platform: &str,
        url: &str,
    ) -> Result<InteropTransaction, WatcherError> {
        let hash = match Self::parse(platform, url)?.target {
            OracleTarget::Transaction(hash) => hash,
            OracleTarget::Block(_) => return Err(WatcherError::InvalidUrl(url.to_string())),
        };
        self.transactions(platform)
            .get(&hash)?
            .ok_or(WatcherError::TransactionNotFound(hash))
    }

    async fn reload_block(&self, platform: &str, url: &str) -> Result<InteropBlock, WatcherError> {
        let height = Self::block_height(platform, url)?;
        self.decode_and_cache(platform, height).await
    }

    async fn read_all_blocks(&self, platform: &str) -> Result<Vec<InteropBlock>, WatcherError> {
        let mut blocks: Vec<InteropBlock> = self
            .blocks(platform)
            .entries()?
            .into_iter()
            .map(|(_, block)| block)
            .collect();
        blocks.sort_by_key(|b| b.height);
        Ok(blocks)
    }

    fn current_height(&self, platform: &str) -> Result<Option<u64>, WatcherError> {
        Ok(self.heights().get(&platform.to_string())?)
    }

    fn set_current_height(&self, platform: &str, height: u64) -> Result<(), WatcherError> {
        Ok(self.heights().set(&platform.to_string(), &height)?)
    }

    fn register_decoder(&self, decoder: Arc<dyn BlockDecoder>) {
        tracing::info!(platform = decoder.platform(), "registered block decoder");
        self.decoders.insert(decoder.platform().to_string(), decoder);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use xswap_core::{InteropTransfer, MemoryStore};

    struct CountingDecoder {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl BlockDecoder for CountingDecoder {
        fn platform(&self) -> &str {
            "ethereum"
        }

        async fn decode_block(&self, height: u64) -> Result<DecodedBlock, WatcherError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let tx = InteropTransaction {
                hash: Hash([height as u8; 32]),
                transfers: vec![InteropTransfer {
                    source_platform: "ethereum".into(),
                    source_address: "0x01".into(),
                    destination_platform: "nexus".into(),
                    destination_address: "P1".into(),
                    interop_address: "0x02".into(),
                    symbol: "ETH".into(),
                    amount: 5,
                }],
            };
            Ok(DecodedBlock {
                block: InteropBlock {
                    platform: "ethereum".into(),
                    chain: "ethereum".into(),
                    height,
                    hash: Hash([0xaa; 32]),
                    transactions: vec![tx.hash],
                },
                transactions: vec![tx],
            })
        }
    }

    fn oracle() -> (LocalOracle, Arc<CountingDecoder>) {
        let oracle = LocalOracle::new(Arc::new(MemoryStore::new()));
        let decoder = Arc::new(CountingDecoder {
            calls: AtomicUsize::new(0),
        });
        oracle.register_decoder(decoder.clone());
        (oracle, decoder)
    }

    #[test]
    fn test_url_format_and_parse() {
        let url = OracleUrl::block("ethereum", "ethereum", 258);
        let text = url.to_string();
        assert_eq!(text, "interop://ethereum/ethereum/block/0201000000000000");
        assert_eq!(text.parse::<OracleUrl>().unwrap(), url);

        let tx = OracleUrl::transaction("neo", "neo", Hash([7; 32]));
        assert_eq!(tx.to_string().parse::<OracleUrl>().unwrap(), tx);
    }

    #[test]
    fn test_url_rejects_garbage() {
        assert!("http://x/y/block/00".parse::<OracleUrl>().is_err());
        assert!("interop://a/b/block/zz".parse::<OracleUrl>().is_err());
        assert!("interop://a/b/block/0102".parse::<OracleUrl>().is_err());
        assert!("interop://a/b/receipt/00".parse::<OracleUrl>().is_err());
    }

    #[tokio::test]
    async fn test_read_block_caches_decoded_block() {
        let (oracle, decoder) = oracle();
        let url = OracleUrl::block("ethereum", "ethereum", 3).to_string();

        let first = oracle.read_block("ethereum", &url).await.unwrap();
        let second = oracle.read_block("ethereum", &url).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(decoder.calls.load(Ordering::SeqCst), 1);

        let tx_url = OracleUrl::transaction("ethereum", "ethereum", Hash([3; 32])).to_string();
        let tx = oracle.read_transaction("ethereum", &tx_url).await.unwrap();
        assert_eq!(tx.transfers[0].amount, 5);
    }

    #[tokio::test]
    async fn test_reload_bypasses_cache() {
        let (oracle, decoder) = oracle();
        let url = OracleUrl::block("ethereum", "ethereum", 4).to_string();
        oracle.read_block("ethereum", &url).await.unwrap();
        oracle.reload_block("ethereum", &url).await.unwrap();
        assert_eq!(decoder.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_read_all_blocks_sorted_by_height() {
        let (oracle, _) = oracle();
        for height in [300u64, 2, 17] {
            let url = OracleUrl::block("ethereum", "ethereum", height).to_string();
            oracle.read_block("ethereum", &url).await.unwrap();
        }
        let heights: Vec<u64> = oracle
            .read_all_blocks("ethereum")
            .await
            .unwrap()
            .iter()
            .map(|b| b.height)
            .collect();
        assert_eq!(heights, vec![2, 17, 300]);
    }

    #[tokio::test]
    async fn test_unknown_platform_and_foreign_url() {
        let (oracle, _) = oracle();
        let url = OracleUrl::block("bsc", "bsc", 1).to_string();
        assert!(matches!(
            oracle.read_block("bsc", &url).await,
            Err(WatcherError::UnknownPlatform(_))
        ));
        assert!(matches!(
            oracle.read_block("ethereum", &url).await,
            Err(WatcherError::InvalidUrl(_))
        ));
    }

    #[test]
    fn test_height_cursor() {
        let (oracle, _) = oracle();
        assert_eq!(oracle.current_height("ethereum").unwrap(), None);
        oracle.set_current_height("ethereum", 42).unwrap();
        assert_eq!(oracle.current_height("ethereum").unwrap(), Some(42));
        assert_eq!(oracle.current_height("neo").unwrap(), None);
    }
}
