//! Integration test: the home-chain fee-settlement state machine driven by
//! the swapper's update cycle.

use xswap_core::SwapStatus;
use xswap_engine::TxStatus;
use xswap_integration_tests::{h, Harness};

async fn paid_out(hx: &Harness) -> std::sync::Arc<xswap_engine::TokenSwapper> {
    hx.outbound(h(1), "eth", "ETH", 1);
    let swapper = hx.swapper();
    swapper.update().await.unwrap();
    swapper.settle_swap_to_external(h(1), "eth").await.unwrap();
    swapper
}

fn status_of(swapper: &xswap_engine::TokenSwapper) -> Option<SwapStatus> {
    swapper
        .state()
        .find_pending(&h(1))
        .unwrap()
        .map(|(_, fee)| fee.status)
}

#[tokio::test]
async fn test_failed_fee_transaction_is_resubmitted() {
    let hx = Harness::new();
    hx.home.set_default_status(TxStatus::Failed("out of gas".into()));
    let swapper = paid_out(&hx).await;
    assert_eq!(status_of(&swapper), Some(SwapStatus::Settle));

    swapper.update().await.unwrap();
    assert_eq!(status_of(&swapper), Some(SwapStatus::Confirm));
    assert_eq!(hx.home.settle_calls().len(), 1);

    swapper.update().await.unwrap();
    assert_eq!(status_of(&swapper), Some(SwapStatus::Settle));
    let (_, fee) = swapper.state().find_pending(&h(1)).unwrap().unwrap();
    assert_eq!(fee.settle_hash, None);

    swapper.update().await.unwrap();
    assert_eq!(status_of(&swapper), Some(SwapStatus::Confirm));
    assert_eq!(hx.home.settle_calls().len(), 2);

    hx.home.set_default_status(TxStatus::Success);
    swapper.update().await.unwrap();
    assert_eq!(status_of(&swapper), None);
    assert!(swapper.state().settled().contains(&h(1)).unwrap());
    assert_eq!(hx.evm.sent().len(), 1);
}

#[tokio::test]
async fn test_pending_fee_transaction_waits() {
    let hx = Harness::new();
    hx.home.set_default_status(TxStatus::Pending);
    let swapper = paid_out(&hx).await;

    for _ in 0..3 {
        swapper.update().await.unwrap();
    }
    assert_eq!(status_of(&swapper), Some(SwapStatus::Confirm));
    assert_eq!(hx.home.settle_calls().len(), 1);
    assert!(swapper.state().in_progress().contains(&h(1)).unwrap());
}

#[tokio::test]
async fn test_settlement_found_on_home_chain_finishes() {
    let hx = Harness::new();
    hx.home.set_default_status(TxStatus::Failed("reverted".into()));
    let swapper = paid_out(&hx).await;
    let payout = hx.evm.sent()[0].hash;

    swapper.update().await.unwrap();
    swapper.update().await.unwrap();
    assert_eq!(status_of(&swapper), Some(SwapStatus::Settle));

    // Another node settled the payout in the meantime.
    hx.home.set_settlement(payout, h(0x99));
    swapper.update().await.unwrap();

    assert_eq!(status_of(&swapper), None);
    assert_eq!(swapper.state().settled().get(&h(1)).unwrap(), Some(payout));
    assert_eq!(hx.home.settle_calls().len(), 1);
}

#[tokio::test]
async fn test_home_chain_outage_leaves_fee_untouched() {
    let hx = Harness::new();
    let swapper = paid_out(&hx).await;

    hx.home.set_fail_reads(true);
    swapper.update().await.unwrap();
    swapper.update().await.unwrap();
    assert_eq!(status_of(&swapper), Some(SwapStatus::Settle));

    hx.home.set_fail_reads(false);
    swapper.update().await.unwrap();
    swapper.update().await.unwrap();
    assert_eq!(status_of(&swapper), None);
    assert!(swapper.state().settled().contains(&h(1)).unwrap());
}
