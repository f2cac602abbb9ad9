//! Integration test: deposit discovery through the EVM watcher, gated on
//! confirmations and deduplicated across resyncs.

use alloy_primitives::U256;
use xswap_crypto::InteropKey;
use xswap_integration_tests::{drive_until, h, Harness};
use xswap_watcher::testing::signed_evm_tx;

fn with_deposit(confirmations: u64, height: u64) -> (Harness, InteropKey) {
    let mut hx = Harness::new();
    hx.eth_confirmations = confirmations;
    hx.eth_start_height = Some(5);
    let user = InteropKey::generate();
    let value = U256::from(42u64) * U256::from(10u64).pow(U256::from(16u64));
    let deposit = signed_evm_tx(&user, h(0x51), hx.eth_key.evm_address(), value);
    hx.evm.add_block(5, vec![deposit], vec![]);
    hx.evm.set_height(height);
    (hx, user)
}

#[tokio::test]
async fn test_deposit_waits_for_confirmations() {
    let (hx, user) = with_deposit(3, 7);
    let swapper = hx.swapper();
    let address = user.home_address();

    for _ in 0..20 {
        swapper.update().await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(2)).await;
    }
    assert!(swapper.get_pending_swaps(&address).await.unwrap().is_empty());

    hx.evm.set_height(8);
    let lookup = swapper.clone();
    drive_until(&swapper, 200, || {
        let swapper = lookup.clone();
        async move { !swapper.get_pending_swaps(&address).await.unwrap().is_empty() }
    })
    .await;

    let swaps = swapper.get_pending_swaps(&address).await.unwrap();
    assert_eq!(swaps.len(), 1);
    assert_eq!(swaps[0].source_platform, "eth");
    assert_eq!(swaps[0].source_hash, h(0x51));
    assert_eq!(swaps[0].destination_platform, "nexus");
}

#[tokio::test]
async fn test_resync_does_not_duplicate_swaps() {
    let (hx, user) = with_deposit(0, 5);
    let swapper = hx.swapper();
    let address = user.home_address();

    let lookup = swapper.clone();
    drive_until(&swapper, 200, || {
        let swapper = lookup.clone();
        async move { !swapper.get_pending_swaps(&address).await.unwrap().is_empty() }
    })
    .await;

    swapper.resync_block("eth", 5).unwrap();
    for _ in 0..20 {
        swapper.update().await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(2)).await;
    }
    assert_eq!(swapper.get_pending_swaps(&address).await.unwrap().len(), 1);
    assert_eq!(swapper.status().await.unwrap().discovered, 1);

    let first = swapper.settle_swap("eth", "nexus", h(0x51)).await.unwrap();
    let second = swapper.settle_swap("eth", "nexus", h(0x51)).await.unwrap();
    assert!(first.is_some());
    assert_eq!(first, second);
    assert_eq!(hx.home.settle_calls().len(), 1);

    // A settled swap is not rediscovered.
    swapper.resync_block("eth", 5).unwrap();
    for _ in 0..20 {
        swapper.update().await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(2)).await;
    }
    assert!(swapper.get_pending_swaps(&address).await.unwrap().is_empty());
    assert_eq!(swapper.status().await.unwrap().discovered, 0);
}
