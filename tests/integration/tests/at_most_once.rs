//! Integration test: a swap is never paid out twice, across concurrent
//! requests, failed verification and restarts.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use xswap_core::KvStore;
use xswap_engine::{EngineError, SwapState};
use xswap_integration_tests::{drive_until, h, Harness};
use xswap_watcher::testing::SendOutcome;
use xswap_watcher::EvmReceipt;

#[tokio::test]
async fn test_concurrent_settle_broadcasts_once() {
    let hx = Harness::new();
    hx.outbound(h(1), "eth", "ETH", 7);
    let swapper = hx.swapper();

    let (a, b, c) = tokio::join!(
        swapper.settle_swap("nexus", "eth", h(1)),
        swapper.settle_swap("nexus", "eth", h(1)),
        swapper.settle_swap("nexus", "eth", h(1)),
    );
    assert_eq!(a.unwrap(), None);
    assert_eq!(b.unwrap(), None);
    assert_eq!(c.unwrap(), None);

    let lookup = swapper.clone();
    drive_until(&swapper, 200, || {
        let swapper = lookup.clone();
        async move { swapper.state().settled().contains(&h(1)).unwrap() }
    })
    .await;

    assert_eq!(hx.evm.sent().len(), 1);
    assert_eq!(hx.home.settle_calls().len(), 1);
}

#[tokio::test]
async fn test_claim_persisted_before_broadcast() {
    let hx = Harness::new();
    hx.outbound(h(2), "eth", "ETH", 1);

    let store: Arc<dyn KvStore> = hx.store.clone();
    let observer = SwapState::new(store);
    let claimed = Arc::new(AtomicBool::new(false));
    let seen = claimed.clone();
    hx.evm.on_send(move |_| {
        let held = observer.in_progress().contains(&h(2)).unwrap_or(false);
        seen.store(held, Ordering::SeqCst);
    });

    let swapper = hx.swapper();
    swapper.update().await.unwrap();
    swapper.settle_swap_to_external(h(2), "eth").await.unwrap();

    assert!(claimed.load(Ordering::SeqCst));
}

#[tokio::test]
async fn test_restart_resumes_verification_without_rebroadcast() {
    let hx = Harness::new();
    hx.outbound(h(3), "eth", "ETH", 2);
    hx.evm.set_auto_mine(false);

    let first = hx.swapper();
    first.update().await.unwrap();
    assert!(matches!(
        first.settle_swap_to_external(h(3), "eth").await,
        Err(EngineError::VerificationTimeout { .. })
    ));
    drop(first);

    let txid = hx.evm.sent()[0].hash;
    hx.evm.set_receipt(EvmReceipt {
        transaction_hash: txid,
        block_number: 10,
        success: true,
        logs: Vec::new(),
    });

    let second = hx.swapper();
    let lookup = second.clone();
    drive_until(&second, 200, || {
        let swapper = lookup.clone();
        async move { swapper.state().settled().contains(&h(3)).unwrap() }
    })
    .await;

    assert_eq!(hx.evm.sent().len(), 1);
    assert_eq!(second.state().settled().get(&h(3)).unwrap(), Some(txid));
}

#[tokio::test]
async fn test_dropped_payout_is_never_rebroadcast() {
    let hx = Harness::new();
    hx.outbound(h(4), "neo", "GAS", 10);
    hx.neo.set_send_outcome(SendOutcome::Dropped);

    let first = hx.swapper();
    first.update().await.unwrap();
    assert!(matches!(
        first.settle_swap_to_external(h(4), "neo").await,
        Err(EngineError::Dropped { .. })
    ));
    assert_eq!(first.settle_swap("nexus", "neo", h(4)).await.unwrap(), None);
    drop(first);

    let second = hx.swapper();
    second.update().await.unwrap();
    assert_eq!(second.resume_in_progress().await.unwrap(), 0);

    assert_eq!(hx.neo.sent().len(), 1);
    assert!(matches!(
        second.state().in_progress().get(&h(4)).unwrap(),
        Some(Some(_))
    ));
    assert!(second.state().find_pending(&h(4)).unwrap().is_none());
}

#[tokio::test]
async fn test_failed_broadcast_keeps_claim() {
    let hx = Harness::new();
    hx.outbound(h(5), "eth", "ETH", 1);
    hx.evm.set_fail_sends(true);
    let swapper = hx.swapper();
    swapper.update().await.unwrap();

    assert!(swapper.settle_swap_to_external(h(5), "eth").await.is_err());
    assert_eq!(swapper.state().in_progress().get(&h(5)).unwrap(), Some(None));

    hx.evm.set_fail_sends(false);
    assert_eq!(swapper.settle_swap("nexus", "eth", h(5)).await.unwrap(), None);
    assert!(hx.evm.sent().is_empty());
}
