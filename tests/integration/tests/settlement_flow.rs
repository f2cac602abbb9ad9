//! Integration test: swaps settled end to end across the watcher, payout
//! and fee-settlement layers.

use alloy_primitives::U256;
use xswap_crypto::InteropKey;
use xswap_integration_tests::{drive_until, h, Harness, EVM_DESTINATION, NEO_DESTINATION};
use xswap_watcher::testing::signed_evm_tx;

// =========================================================================
// Home chain -> external chain
// =========================================================================

#[tokio::test]
async fn test_evm_payout_settles_fee() {
    let hx = Harness::new();
    hx.outbound(h(1), "eth", "ETH", 5);
    let swapper = hx.swapper();

    assert_eq!(swapper.settle_swap("nexus", "eth", h(1)).await.unwrap(), None);

    let state_swapper = swapper.clone();
    drive_until(&swapper, 200, || {
        let swapper = state_swapper.clone();
        async move { swapper.state().settled().contains(&h(1)).unwrap() }
    })
    .await;

    let sent = hx.evm.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].to, EVM_DESTINATION);
    assert_eq!(sent[0].amount, 5 * 10u128.pow(10));
    assert_eq!(swapper.state().settled().get(&h(1)).unwrap(), Some(sent[0].hash));
    assert_eq!(hx.home.settle_calls(), vec![("eth".to_string(), sent[0].hash)]);

    // Everything transient is gone once the swap is settled.
    assert!(!swapper.state().in_progress().contains(&h(1)).unwrap());
    assert!(!swapper.state().used_rpc().contains(&h(1)).unwrap());
    assert_eq!(swapper.state().pending().count().unwrap(), 0);
}

#[tokio::test]
async fn test_neo_payout_records_endpoint() {
    let hx = Harness::new();
    hx.outbound(h(2), "neo", "GAS", 300);
    let swapper = hx.swapper();
    swapper.update().await.unwrap();

    let payout = swapper
        .settle_swap_to_external(h(2), "neo")
        .await
        .unwrap()
        .unwrap();

    let sent = hx.neo.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].to, NEO_DESTINATION);
    assert_eq!(sent[0].symbol, "GAS");
    assert_eq!(sent[0].amount, 300);
    assert_eq!(sent[0].hash, payout);
    assert_eq!(
        swapper.state().used_rpc().get(&h(2)).unwrap().as_deref(),
        Some("http://neo-a")
    );
    let (_, fee) = swapper.state().find_pending(&h(2)).unwrap().unwrap();
    assert_eq!(fee.platform, "neo");
}

#[tokio::test]
async fn test_payout_for_settled_swap_is_skipped() {
    let hx = Harness::new();
    hx.outbound(h(3), "eth", "ETH", 1);
    let swapper = hx.swapper();
    swapper.update().await.unwrap();
    swapper.state().settled().set(&h(3), &h(0x33)).unwrap();

    assert_eq!(
        swapper.settle_swap_to_external(h(3), "eth").await.unwrap(),
        Some(h(0x33))
    );
    assert!(hx.evm.sent().is_empty());
}

// =========================================================================
// External chain -> home chain
// =========================================================================

#[tokio::test]
async fn test_deposit_discovered_and_settled_on_home() {
    let mut hx = Harness::new();
    hx.eth_start_height = Some(4);
    let user = InteropKey::generate();
    let one_eth = U256::from(10u64).pow(U256::from(18u64));
    let deposit = signed_evm_tx(&user, h(0x10), hx.eth_key.evm_address(), one_eth);
    hx.evm.add_block(4, vec![deposit], vec![]);
    hx.evm.set_height(4);
    let swapper = hx.swapper();

    let address = user.home_address();
    let lookup = swapper.clone();
    drive_until(&swapper, 200, || {
        let swapper = lookup.clone();
        async move { !swapper.get_pending_swaps(&address).await.unwrap().is_empty() }
    })
    .await;

    let settlement = swapper.settle_swap("eth", "nexus", h(0x10)).await.unwrap();
    assert!(settlement.is_some());
    assert_eq!(swapper.state().settled().get(&h(0x10)).unwrap(), settlement);
    assert!(swapper.get_pending_swaps(&address).await.unwrap().is_empty());
    assert!(hx.evm.sent().is_empty());
}
