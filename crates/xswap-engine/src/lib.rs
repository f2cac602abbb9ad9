//! xswap engine
//!
//! The [`TokenSwapper`] that turns watcher detections into settlements:
//! it schedules one polling task per platform, claims swaps durably
//! before paying out, verifies payouts on the destination chain, and runs
//! the home-chain fee-settlement state machine.

pub mod config;
pub mod error;
pub mod home;
pub mod index;
pub mod payout;
pub mod settlement;
pub mod state;
pub mod swapper;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use config::{ChainBackend, PlatformBackend, SwapperConfig, DEFAULT_HOME_PLATFORM, DEFAULT_SETTLE_DELAY};
pub use error::EngineError;
pub use home::{HomeChain, TxStatus};
pub use index::SwapIndex;
pub use payout::{Broadcast, EvmPayout, NeoPayout, PayoutRoutine, VerifyPolicy};
pub use settlement::{advance_fee, FeeStep};
pub use state::{SwapState, IN_PROGRESS_TAG, PENDING_TAG, SETTLED_TAG, USED_RPC_TAG};
pub use swapper::{SwapperStatus, TokenSwapper};
