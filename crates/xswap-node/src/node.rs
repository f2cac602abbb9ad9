//! The xswap node orchestrator.
//!
//! Opens storage, connects the home chain and every configured platform,
//! builds the [`TokenSwapper`], serves the HTTP API and drives the swapper
//! on a fixed interval.

use anyhow::Result;
use std::net::SocketAddr;
use std::sync::Arc;

use xswap_core::KvStore;
use xswap_engine::{ChainBackend, HomeChain, PlatformBackend, TokenSwapper};
use xswap_watcher::{error_chain, LocalOracle, NeoClient, NeoRpcPool};

use crate::api::ApiState;
use crate::config::{PlatformKind, XswapConfig};
use crate::rpc::{EvmRpc, HomeRpc, NeoRpc};
use crate::storage::RocksStore;

pub struct XswapNode {
    config: XswapConfig,
    swapper: Arc<TokenSwapper>,
}

/// Connect every configured platform.
pub fn build_backends(config: &XswapConfig) -> Result<Vec<PlatformBackend>> {
    let mut backends = Vec::with_capacity(config.platforms.len());
    for platform in &config.platforms {
        let chain_backend = match platform.kind {
            PlatformKind::Evm => {
                let url = platform
                    .rpc_urls
                    .first()
                    .ok_or_else(|| anyhow::anyhow!("platform {} has no rpc_urls", platform.name))?;
                if platform.rpc_urls.len() > 1 {
                    tracing::warn!(platform = %platform.name, "evm platforms use only the first rpc url");
                }
                ChainBackend::Evm(Arc::new(EvmRpc::new(url, platform.chain_id)?))
            }
            PlatformKind::Neo => {
                let mut clients: Vec<Arc<dyn NeoClient>> = Vec::new();
                for url in &platform.rpc_urls {
                    clients.push(Arc::new(NeoRpc::new(url)?));
                }
                ChainBackend::Neo(Arc::new(NeoRpcPool::new(&platform.name, clients)?))
            }
        };

        let mut backend = PlatformBackend::new(
            &platform.name,
            Arc::new(platform.interop_key()?),
            platform.confirmations(),
            platform.assets(),
            chain_backend,
        )
        .with_verify(platform.verify.policy());
        backend.chain = platform.chain().to_string();
        if let Some(height) = platform.start_height {
            backend = backend.with_start_height(height);
        }

        tracing::info!(
            platform = %platform.name,
            kind = backend.chain_backend.kind(),
            endpoints = platform.rpc_urls.len(),
            confirmations = backend.confirmations,
            "platform configured"
        );
        backends.push(backend);
    }
    Ok(backends)
}

impl XswapNode {
    /// Open storage under the configured data directory and connect over RPC.
    pub fn new(config: XswapConfig) -> Result<Self> {
        let store: Arc<dyn KvStore> = Arc::new(RocksStore::open(&config.storage.data_dir)?);
        tracing::info!(path = %config.storage.data_dir.display(), "storage initialized");
        let home: Arc<dyn HomeChain> = Arc::new(HomeRpc::new(&config.node.rpc_url)?);
        Self::with_components(config, home, store)
    }

    pub fn with_components(
        config: XswapConfig,
        home: Arc<dyn HomeChain>,
        store: Arc<dyn KvStore>,
    ) -> Result<Self> {
        let backends = build_backends(&config)?;
        let oracle = Arc::new(LocalOracle::new(store.clone()));
        let swapper = TokenSwapper::new(
            config.swapper_config(),
            home,
            store,
            Arc::new(config.swapper_key()?),
            backends,
            oracle,
        )?;
        Ok(Self { config, swapper })
    }

    pub fn swapper(&self) -> &Arc<TokenSwapper> {
        &self.swapper
    }

    /// Spawn the HTTP API server.
    pub fn start_api(&self) -> Result<()> {
        let api_addr: SocketAddr =
            format!("{}:{}", self.config.api.listen_addr, self.config.api.port).parse()?;
        let state = Arc::new(ApiState::new(self.swapper.clone()));
        tokio::spawn(async move {
            if let Err(e) = crate::api::start_api_server(api_addr, state).await {
                tracing::error!(error = %e, "HTTP API server error");
            }
        });
        Ok(())
    }

    /// Drive the swapper until a configuration error makes progress
    /// impossible.
    pub async fn run(&self) -> Result<()> {
        let mut interval = tokio::time::interval(self.config.update_interval());
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        tracing::info!(
            interval_ms = self.config.swapper.update_interval_ms,
            "entering swapper loop"
        );

        loop {
            interval.tick().await;
            if let Err(e) = self.swapper.update().await {
                tracing::error!(error = %error_chain(&e), "swapper stopped");
                return Err(e.into());
            }
        }
    }
}
