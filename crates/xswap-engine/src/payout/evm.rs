use std::sync::Arc;

use async_trait::async_trait;

use xswap_core::Hash;
use xswap_crypto::InteropKey;
use xswap_watcher::{AssetInfo, AssetTable, EvmClient};

use super::{Broadcast, PayoutRoutine, VerifyPolicy};
use crate::error::EngineError;

/// Payouts on an EVM chain, verified by polling for the receipt.
pub struct EvmPayout {
    platform: String,
    key: Arc<InteropKey>,
    client: Arc<dyn EvmClient>,
    assets: AssetTable,
    policy: VerifyPolicy,
}

impl EvmPayout {
    pub fn new(
        platform: &str,
        key: Arc<InteropKey>,
        client: Arc<dyn EvmClient>,
        assets: AssetTable,
        policy: VerifyPolicy,
    ) -> Self {
        Self {
            platform: platform.to_string(),
            key,
            client,
            assets,
            policy,
        }
    }
}

#[async_trait]
impl PayoutRoutine for EvmPayout {
    fn platform(&self) -> &str {
        &self.platform
    }

    fn asset(&self, symbol: &str) -> Option<&AssetInfo> {
        self.assets.by_symbol(symbol)
    }

    async fn broadcast(
        &self,
        destination: &str,
        asset: &AssetInfo,
        amount: u128,
    ) -> Result<Broadcast, EngineError> {
        let hash = self
            .client
            .send_transfer(&self.key, destination, asset, amount)
            .await?;
        Ok(Broadcast {
            hash,
            endpoint: Some(self.client.endpoint().to_string()),
        })
    }

    async fn verify(&self, hash: &Hash, _endpoint: Option<&str>) -> Result<(), EngineError> {
        for attempt in 0..self.policy.max_attempts {
            match self.client.transaction_receipt(hash).await {
                Ok(Some(receipt)) if receipt.success => {
                    tracing::debug!(platform = %self.platform, %hash, block = receipt.block_number, "payout confirmed");
                    return Ok(());
                }
                Ok(Some(_)) => {
                    return Err(EngineError::Reverted {
                        platform: self.platform.clone(),
                        hash: *hash,
                    })
                }
                Ok(None) => {}
                Err(e) => {
                    tracing::warn!(platform = %self.platform, %hash, attempt, error = %e, "receipt lookup failed");
                }
            }
            if attempt + 1 < self.policy.max_attempts {
                tokio::time::sleep(self.policy.delay_for(attempt)).await;
            }
        }
        Err(EngineError::VerificationTimeout {
            platform: self.platform.clone(),
            hash: *hash,
            attempts: self.policy.max_attempts,
        })
    }
}
