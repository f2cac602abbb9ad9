//! Outbound payouts on external platforms.
//!
//! A [`PayoutRoutine`] broadcasts one transfer and then waits for it to be
//! included. Broadcast and verification are separate calls so the swapper
//! can persist the transaction id in between.

pub mod evm;
pub mod neo;

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use xswap_core::Hash;
use xswap_watcher::AssetInfo;

use crate::error::EngineError;

pub use evm::EvmPayout;
pub use neo::NeoPayout;

/// A submitted payout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Broadcast {
    pub hash: Hash,
    /// Endpoint that accepted the transaction, when the platform rotates
    /// between several.
    pub endpoint: Option<String>,
}

/// Bounded inclusion polling.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VerifyPolicy {
    pub max_attempts: u32,
    pub delay: Duration,
    /// Double the delay after every attempt, up to `max_delay`.
    pub backoff: bool,
    pub max_delay: Duration,
    /// Attempts after which a still-unmined transaction is looked up in the
    /// mempool. Platforms without a mempool query ignore it.
    pub mempool_check_after: u32,
}

impl Default for VerifyPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 12,
            delay: Duration::from_secs(5),
            backoff: false,
            max_delay: Duration::from_secs(60),
            mempool_check_after: 3,
        }
    }
}

impl VerifyPolicy {
    /// Delay before the next attempt, after `attempt` (0-based) failed.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        if !self.backoff {
            return self.delay;
        }
        let factor = 1u32.checked_shl(attempt.min(16)).unwrap_or(u32::MAX);
        self.delay.saturating_mul(factor).min(self.max_delay)
    }
}

#[async_trait]
pub trait PayoutRoutine: Send + Sync {
    fn platform(&self) -> &str;

    fn asset(&self, symbol: &str) -> Option<&AssetInfo>;

    /// Sign and submit a transfer of `amount` (external decimals).
    async fn broadcast(
        &self,
        destination: &str,
        asset: &AssetInfo,
        amount: u128,
    ) -> Result<Broadcast, EngineError>;

    /// Wait until `hash` is included. `endpoint` is the one recorded at
    /// broadcast time.
    async fn verify(&self, hash: &Hash, endpoint: Option<&str>) -> Result<(), EngineError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_delay() {
        let policy = VerifyPolicy::default();
        assert_eq!(policy.delay_for(0), Duration::from_secs(5));
        assert_eq!(policy.delay_for(9), Duration::from_secs(5));
    }

    #[test]
    fn test_backoff_is_capped() {
        let policy = VerifyPolicy {
            backoff: true,
            delay: Duration::from_secs(2),
            max_delay: Duration::from_secs(20),
            ..VerifyPolicy::default()
        };
        assert_eq!(policy.delay_for(0), Duration::from_secs(2));
        assert_eq!(policy.delay_for(1), Duration::from_secs(4));
        assert_eq!(policy.delay_for(3), Duration::from_secs(16));
        assert_eq!(policy.delay_for(4), Duration::from_secs(20));
        assert_eq!(policy.delay_for(40), Duration::from_secs(20));
    }
}
