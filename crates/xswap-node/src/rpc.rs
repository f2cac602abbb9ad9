//! JSON-RPC clients for the home chain and the external-chain gateways.
//!
//! Each external platform is reached through a gateway exposing `xswap_*`
//! methods that return decoded blocks and receipts and build transfers.
//! Transfers are authorised by signing the request payload with the
//! interop key; the key itself never leaves the node.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use alloy_primitives::keccak256;
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use xswap_core::{Address, ChainSwap, Hash, InteropTransfer, PlatformInfo};
use xswap_crypto::{encode_evm_address, InteropKey};
use xswap_engine::{EngineError, HomeChain, TxStatus};
use xswap_watcher::{
    AssetInfo, EvmBlock, EvmClient, EvmReceipt, NeoBlock, NeoClient, WatcherError,
};

#[derive(Debug, Serialize)]
struct JsonRpcRequest<'a> {
    jsonrpc: &'static str,
    method: &'a str,
    params: Vec<Value>,
    id: u64,
}

#[derive(Debug, Deserialize)]
struct JsonRpcResponse {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<JsonRpcError>,
}

#[derive(Debug, Deserialize)]
struct JsonRpcError {
    code: i64,
    message: String,
}

/// Minimal JSON-RPC 2.0 client over HTTP.
pub struct JsonRpcClient {
    http: reqwest::Client,
    url: String,
    request_id: AtomicU64,
}

impl JsonRpcClient {
    pub fn new(url: &str) -> Result<Self> {
        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(5))
            .timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self {
            http,
            url: url.to_string(),
            request_id: AtomicU64::new(1),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub async fn call<T: DeserializeOwned>(&self, method: &str, params: Vec<Value>) -> Result<T> {
        let request = JsonRpcRequest {
            jsonrpc: "2.0",
            method,
            params,
            id: self.request_id.fetch_add(1, Ordering::Relaxed),
        };

        let response = self
            .http
            .post(&self.url)
            .json(&request)
            .send()
            .await
            .with_context(|| format!("{} request failed", method))?;
        if !response.status().is_success() {
            return Err(anyhow!("{}: HTTP {}", method, response.status()));
        }

        let body: JsonRpcResponse = response
            .json()
            .await
            .with_context(|| format!("{}: malformed response", method))?;
        if let Some(error) = body.error {
            return Err(anyhow!("{}: rpc error {}: {}", method, error.code, error.message));
        }
        serde_json::from_value(body.result.unwrap_or(Value::Null))
            .with_context(|| format!("{}: unexpected result", method))
    }
}

/// Sign `keccak256(payload)` with `key`; returns hex `r || s || v`.
pub fn sign_intent(key: &InteropKey, payload: &Value) -> Result<String> {
    let digest = keccak256(serde_json::to_vec(payload)?);
    let (signature, recid) = key.sign_prehash_recoverable(&digest.0)?;
    let mut bytes = signature.to_bytes().to_vec();
    bytes.push(recid.to_byte());
    Ok(hex::encode(bytes))
}

fn home_error(e: anyhow::Error) -> EngineError {
    EngineError::HomeChain(format!("{:#}", e))
}

/// Home-chain node.
pub struct HomeRpc {
    rpc: JsonRpcClient,
}

impl HomeRpc {
    pub fn new(url: &str) -> Result<Self> {
        Ok(Self {
            rpc: JsonRpcClient::new(url)?,
        })
    }
}

#[async_trait]
impl HomeChain for HomeRpc {
    async fn has_genesis(&self) -> Result<bool, EngineError> {
        self.rpc.call("xswap_hasGenesis", vec![]).await.map_err(home_error)
    }

    async fn platforms(&self) -> Result<Vec<PlatformInfo>, EngineError> {
        self.rpc.call("xswap_getPlatforms", vec![]).await.map_err(home_error)
    }

    async fn get_settlement(&self, platform: &str, hash: &Hash) -> Result<Option<Hash>, EngineError> {
        self.rpc
            .call("xswap_getSettlement", vec![json!(platform), json!(hash)])
            .await
            .map_err(home_error)
    }

    async fn interop_transfers(&self, hash: &Hash) -> Result<Vec<InteropTransfer>, EngineError> {
        self.rpc
            .call("xswap_getInteropTransfers", vec![json!(hash)])
            .await
            .map_err(home_error)
    }

    async fn settle_transaction(
        &self,
        key: &InteropKey,
        platform: &str,
        chain: &str,
        hash: &Hash,
    ) -> Result<Hash, EngineError> {
        let payload = json!({
            "signer": key.home_address(),
            "platform": platform,
            "chain": chain,
            "hash": hash,
        });
        let signature = sign_intent(key, &payload).map_err(home_error)?;
        self.rpc
            .call("xswap_settleTransaction", vec![payload, json!(signature)])
            .await
            .map_err(home_error)
    }

    async fn transaction_status(&self, hash: &Hash) -> Result<TxStatus, EngineError> {
        self.rpc
            .call("xswap_getTransactionStatus", vec![json!(hash)])
            .await
            .map_err(home_error)
    }

    async fn swaps_for_address(&self, address: &Address) -> Result<Vec<ChainSwap>, EngineError> {
        self.rpc
            .call("xswap_getSwapsForAddress", vec![json!(address)])
            .await
            .map_err(home_error)
    }
}

/// EVM chain gateway.
pub struct EvmRpc {
    rpc: JsonRpcClient,
    chain_id: Option<u64>,
}

impl EvmRpc {
    pub fn new(url: &str, chain_id: Option<u64>) -> Result<Self> {
        Ok(Self {
            rpc: JsonRpcClient::new(url)?,
            chain_id,
        })
    }

    fn error(&self, e: anyhow::Error) -> WatcherError {
        WatcherError::rpc(self.rpc.url(), format!("{:#}", e))
    }
}

#[async_trait]
impl EvmClient for EvmRpc {
    fn endpoint(&self) -> &str {
        self.rpc.url()
    }

    async fn block_number(&self) -> Result<u64, WatcherError> {
        self.rpc
            .call("xswap_blockNumber", vec![])
            .await
            .map_err(|e| self.error(e))
    }

    async fn block(&self, height: u64) -> Result<Option<EvmBlock>, WatcherError> {
        self.rpc
            .call("xswap_getBlock", vec![json!(height)])
            .await
            .map_err(|e| self.error(e))
    }

    async fn transaction_receipt(&self, hash: &Hash) -> Result<Option<EvmReceipt>, WatcherError> {
        self.rpc
            .call("xswap_getTransactionReceipt", vec![json!(hash)])
            .await
            .map_err(|e| self.error(e))
    }

    async fn send_transfer(
        &self,
        key: &InteropKey,
        to: &str,
        asset: &AssetInfo,
        amount: u128,
    ) -> Result<Hash, WatcherError> {
        let payload = json!({
            "chain_id": self.chain_id,
            "from": encode_evm_address(&key.evm_address()),
            "to": to,
            "symbol": asset.symbol,
            "contract": asset.contract,
            "amount": amount.to_string(),
        });
        let signature = sign_intent(key, &payload).map_err(|e| self.error(e))?;
        self.rpc
            .call("xswap_sendTransfer", vec![payload, json!(signature)])
            .await
            .map_err(|e| self.error(e))
    }
}

/// One account-chain RPC endpoint.
pub struct NeoRpc {
    rpc: JsonRpcClient,
}

impl NeoRpc {
    pub fn new(url: &str) -> Result<Self> {
        Ok(Self {
            rpc: JsonRpcClient::new(url)?,
        })
    }

    fn error(&self, e: anyhow::Error) -> WatcherError {
        WatcherError::rpc(self.rpc.url(), format!("{:#}", e))
    }
}

#[async_trait]
impl NeoClient for NeoRpc {
    fn endpoint(&self) -> &str {
        self.rpc.url()
    }

    async fn block_count(&self) -> Result<u64, WatcherError> {
        self.rpc
            .call("xswap_getBlockCount", vec![])
            .await
            .map_err(|e| self.error(e))
    }

    async fn block(&self, height: u64) -> Result<Option<NeoBlock>, WatcherError> {
        self.rpc
            .call("xswap_getBlock", vec![json!(height)])
            .await
            .map_err(|e| self.error(e))
    }

    async fn transaction_height(&self, hash: &Hash) -> Result<Option<u64>, WatcherError> {
        self.rpc
            .call("xswap_getTransactionHeight", vec![json!(hash)])
            .await
            .map_err(|e| self.error(e))
    }

    async fn mempool_contains(&self, hash: &Hash) -> Result<bool, WatcherError> {
        self.rpc
            .call("xswap_mempoolContains", vec![json!(hash)])
            .await
            .map_err(|e| self.error(e))
    }

    async fn send_transfer(
        &self,
        key: &InteropKey,
        to: &str,
        asset: &AssetInfo,
        amount: u128,
    ) -> Result<Hash, WatcherError> {
        let payload = json!({
            "from": key.neo_address(),
            "to": to,
            "symbol": asset.symbol,
            "asset": asset.contract,
            "amount": amount.to_string(),
        });
        let signature = sign_intent(key, &payload).map_err(|e| self.error(e))?;
        self.rpc
            .call("xswap_sendTransfer", vec![payload, json!(signature)])
            .await
            .map_err(|e| self.error(e))
    }
}
