//! xswap watchers
//!
//! One [`ChainWatcher`] per external platform polls its chain through the
//! [`OracleReader`], gates blocks on confirmations, and reports deposits to
//! the node's interop address as [`PendingSwap`](xswap_core::PendingSwap)s.

pub mod assets;
pub mod client;
pub mod error;
pub mod evm;
pub mod neo;
pub mod oracle;
pub mod watcher;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use assets::{neo_assets, AssetInfo, AssetTable};
pub use client::{
    EvmBlock, EvmClient, EvmLog, EvmReceipt, EvmTransaction, NeoBlock, NeoClient, NeoNotification,
    NeoOutput, NeoRpcPool, NeoTransaction,
};
pub use error::{error_chain, WatcherError};
pub use evm::{EvmBlockDecoder, EvmWatcher, TRANSFER_TOPIC};
pub use neo::{NeoBlockDecoder, NeoWatcher};
pub use oracle::{BlockDecoder, DecodedBlock, LocalOracle, OracleReader, OracleTarget, OracleUrl};
pub use watcher::{
    validate_interop_address, BlockPoller, ChainWatcher, WatcherSettings,
    DEFAULT_BLOCKS_PER_UPDATE,
};
