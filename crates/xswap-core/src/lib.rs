//! xswap core
//!
//! Domain types shared by the watchers and the settlement engine, the
//! deterministic binary codec used for every durable value, and the
//! namespaced key/value store the engine treats as its only source of truth.

pub mod error;
pub mod types;
pub mod codec;
pub mod store;

pub use codec::StoreCodec;
pub use error::CoreError;
pub use store::{KvStore, MemoryStore, StorageList, StorageMap};
pub use types::{
    convert_decimals, unix_now, Address, ChainSwap, Hash, InteropBlock, InteropTransaction,
    InteropTransfer, PendingFee, PendingSwap, PlatformInfo, SwapStatus,
};
