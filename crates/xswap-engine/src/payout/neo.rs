use std::sync::Arc;

use async_trait::async_trait;

use xswap_core::Hash;
use xswap_crypto::InteropKey;
use xswap_watcher::{AssetInfo, AssetTable, NeoRpcPool};

use super::{Broadcast, PayoutRoutine, VerifyPolicy};
use crate::error::EngineError;

/// Payouts on an account chain with rotating endpoints.
///
/// Each broadcast goes to the next endpoint in rotation, without retry.
/// Verification talks to the endpoint that accepted the transaction and
/// reports [`EngineError::Dropped`] once the transaction is neither mined
/// nor in that endpoint's mempool.
pub struct NeoPayout {
    platform: String,
    key: Arc<InteropKey>,
    pool: Arc<NeoRpcPool>,
    assets: AssetTable,
    policy: VerifyPolicy,
}

impl NeoPayout {
    pub fn new(
        platform: &str,
        key: Arc<InteropKey>,
        pool: Arc<NeoRpcPool>,
        assets: AssetTable,
        policy: VerifyPolicy,
    ) -> Self {
        Self {
            platform: platform.to_string(),
            key,
            pool,
            assets,
            policy,
        }
    }
}

#[async_trait]
impl PayoutRoutine for NeoPayout {
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
        let client = self.pool.next_client();
        let hash = client
            .send_transfer(&self.key, destination, asset, amount)
            .await?;
        Ok(Broadcast {
            hash,
            endpoint: Some(client.endpoint().to_string()),
        })
    }

    async fn verify(&self, hash: &Hash, endpoint: Option<&str>) -> Result<(), EngineError> {
        let client = match endpoint {
            Some(endpoint) => self.pool.by_endpoint(endpoint),
            None => self.pool.next_client(),
        };

        for attempt in 0..self.policy.max_attempts {
            match client.transaction_height(hash).await {
                Ok(Some(height)) => {
                    tracing::debug!(platform = %self.platform, %hash, height, "payout confirmed");
                    return Ok(());
                }
                Ok(None) if attempt + 1 >= self.policy.mempool_check_after => {
                    match client.mempool_contains(hash).await {
                        Ok(false) => {
                            return Err(EngineError::Dropped {
                                platform: self.platform.clone(),
                                hash: *hash,
                            })
                        }
                        Ok(true) => {
                            tracing::debug!(platform = %self.platform, %hash, attempt, "payout still in mempool");
                        }
                        Err(e) => {
                            tracing::warn!(platform = %self.platform, %hash, error = %e, "mempool lookup failed");
                        }
                    }
                }
                Ok(None) => {}
                Err(e) => {
                    tracing::warn!(platform = %self.platform, endpoint = client.endpoint(), %hash, attempt, error = %e, "transaction lookup failed");
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
