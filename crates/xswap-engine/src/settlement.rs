//! Fee-settlement state machine.
//!
//! After a payout is verified the swapper records a [`PendingFee`] in
//! `Settle`. Each update cycle advances every record at most one step:
//!
//! - `Settle`: once `settle_delay` has passed, submit the home-chain
//!   settlement and move to `Confirm`.
//! - `Confirm`: success moves to `Finished`, a failed transaction goes back
//!   to `Settle` with a fresh timestamp, pending stays put.
//! - `Finished`: the caller records `.settled` and drops the record.

use std::time::Duration;

use xswap_core::{PendingFee, SwapStatus};
use xswap_crypto::InteropKey;

use crate::home::{HomeChain, TxStatus};

/// Result of advancing one fee record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeeStep {
    Unchanged,
    Updated(PendingFee),
    Finished(PendingFee),
}

fn reset(fee: &PendingFee, now: u32) -> PendingFee {
    PendingFee {
        settle_hash: None,
        status: SwapStatus::Settle,
        time: now,
        ..fee.clone()
    }
}

pub async fn advance_fee(
    home: &dyn HomeChain,
    key: &InteropKey,
    fee: &PendingFee,
    chain: &str,
    now: u32,
    settle_delay: Duration,
) -> FeeStep {
    match fee.status {
        SwapStatus::Settle => {
            let delay = u32::try_from(settle_delay.as_secs()).unwrap_or(u32::MAX);
            if now.saturating_sub(fee.time) < delay {
                return FeeStep::Unchanged;
            }

            // A previous submission may have landed after we lost track of it.
            match home.get_settlement(&fee.platform, &fee.destination_hash).await {
                Ok(Some(settle_hash)) => {
                    tracing::info!(source = %fee.source_hash, %settle_hash, "fee already settled on home chain");
                    return FeeStep::Finished(PendingFee {
                        settle_hash: Some(settle_hash),
                        status: SwapStatus::Finished,
                        time: now,
                        ..fee.clone()
                    });
                }
                Ok(None) => {}
                Err(e) => {
                    tracing::warn!(source = %fee.source_hash, error = %e, "settlement lookup failed");
                    return FeeStep::Unchanged;
                }
            }

            match home
                .settle_transaction(key, &fee.platform, chain, &fee.destination_hash)
                .await
            {
                Ok(settle_hash) => {
                    tracing::info!(
                        source = %fee.source_hash,
                        destination = %fee.destination_hash,
                        %settle_hash,
                        "fee settlement submitted"
                    );
                    FeeStep::Updated(PendingFee {
                        settle_hash: Some(settle_hash),
                        status: SwapStatus::Confirm,
                        time: now,
                        ..fee.clone()
                    })
                }
                Err(e) => {
                    tracing::error!(source = %fee.source_hash, error = %e, "fee settlement submission failed");
                    FeeStep::Unchanged
                }
            }
        }
        SwapStatus::Confirm => {
            let Some(settle_hash) = fee.settle_hash else {
                tracing::warn!(source = %fee.source_hash, "confirm without settlement hash, resubmitting");
                return FeeStep::Updated(reset(fee, now));
            };
            match home.transaction_status(&settle_hash).await {
                Ok(TxStatus::Success) => FeeStep::Finished(PendingFee {
                    status: SwapStatus::Finished,
                    time: now,
                    ..fee.clone()
                }),
                Ok(TxStatus::Pending) => FeeStep::Unchanged,
                Ok(TxStatus::Failed(reason)) => {
                    tracing::warn!(source = %fee.source_hash, %settle_hash, %reason, "fee settlement failed, retrying");
                    FeeStep::Updated(reset(fee, now))
                }
                Err(e) => {
                    tracing::warn!(source = %fee.source_hash, %settle_hash, error = %e, "fee status lookup failed");
                    FeeStep::Unchanged
                }
            }
        }
        SwapStatus::Finished => FeeStep::Finished(fee.clone()),
        SwapStatus::InProgress => FeeStep::Updated(reset(fee, now)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockHomeChain;
    use xswap_core::Hash;

    const DELAY: Duration = Duration::from_secs(60);

    fn fee() -> PendingFee {
        PendingFee::new(Hash([1; 32]), Hash([2; 32]), "eth", 1_000)
    }

    #[tokio::test]
    async fn test_settle_waits_for_delay() {
        let home = MockHomeChain::new();
        let key = InteropKey::generate();

        let step = advance_fee(&home, &key, &fee(), "eth", 1_059, DELAY).await;
        assert_eq!(step, FeeStep::Unchanged);
        assert!(home.settle_calls().is_empty());
    }

    #[tokio::test]
    async fn test_settle_then_confirm() {
        let home = MockHomeChain::new();
        let key = InteropKey::generate();

        let FeeStep::Updated(confirm) = advance_fee(&home, &key, &fee(), "eth", 1_061, DELAY).await
        else {
            panic!("expected settle submission");
        };
        assert_eq!(confirm.status, SwapStatus::Confirm);
        assert_eq!(confirm.time, 1_061);
        assert!(confirm.settle_hash.is_some());
        assert_eq!(home.settle_calls(), vec![("eth".to_string(), Hash([2; 32]))]);

        let step = advance_fee(&home, &key, &confirm, "eth", 1_070, DELAY).await;
        let FeeStep::Finished(done) = step else {
            panic!("expected finished");
        };
        assert_eq!(done.status, SwapStatus::Finished);
    }

    #[tokio::test]
    async fn test_pending_status_keeps_confirm() {
        let home = MockHomeChain::new();
        home.set_default_status(TxStatus::Pending);
        let key = InteropKey::generate();

        let FeeStep::Updated(confirm) = advance_fee(&home, &key, &fee(), "eth", 2_000, DELAY).await
        else {
            panic!("expected settle submission");
        };
        assert_eq!(
            advance_fee(&home, &key, &confirm, "eth", 2_010, DELAY).await,
            FeeStep::Unchanged
        );
    }

    #[tokio::test]
    async fn test_failed_status_resets_to_settle() {
        let home = MockHomeChain::new();
        home.set_default_status(TxStatus::Failed("out of gas".into()));
        let key = InteropKey::generate();

        let FeeStep::Updated(confirm) = advance_fee(&home, &key, &fee(), "eth", 2_000, DELAY).await
        else {
            panic!("expected settle submission");
        };
        let FeeStep::Updated(again) = advance_fee(&home, &key, &confirm, "eth", 2_005, DELAY).await
        else {
            panic!("expected reset");
        };
        assert_eq!(again.status, SwapStatus::Settle);
        assert_eq!(again.time, 2_005);
        assert_eq!(again.settle_hash, None);

        // Fresh delay applies again.
        assert_eq!(
            advance_fee(&home, &key, &again, "eth", 2_030, DELAY).await,
            FeeStep::Unchanged
        );
    }

    #[tokio::test]
    async fn test_submission_error_keeps_state() {
        let home = MockHomeChain::new();
        home.set_fail_settle(true);
        let key = InteropKey::generate();

        assert_eq!(
            advance_fee(&home, &key, &fee(), "eth", 5_000, DELAY).await,
            FeeStep::Unchanged
        );
    }

    #[tokio::test]
    async fn test_existing_settlement_finishes_immediately() {
        let home = MockHomeChain::new();
        home.set_settlement(Hash([2; 32]), Hash([9; 32]));
        let key = InteropKey::generate();

        let FeeStep::Finished(done) = advance_fee(&home, &key, &fee(), "eth", 5_000, DELAY).await
        else {
            panic!("expected finished");
        };
        assert_eq!(done.settle_hash, Some(Hash([9; 32])));
        assert!(home.settle_calls().is_empty());
    }
}
