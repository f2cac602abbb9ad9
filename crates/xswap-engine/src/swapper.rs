//! The token swapper.
//!
//! [`TokenSwapper`] owns one watcher and one payout routine per external
//! platform, the in-memory index of discovered swaps, and the durable swap
//! state. The node drives it by calling [`TokenSwapper::update`] on a fixed
//! interval; API handlers call [`TokenSwapper::settle_swap`] and friends.
//!
//! Every read-decide-write on the durable state happens under one async
//! lock. A swap is claimed in `.inprogress` before any payout is broadcast
//! and the claim is only dropped once `.settled` holds the result, so a
//! restart never pays twice.

use std::any::Any;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use futures::FutureExt;
use serde::Serialize;
use tokio::sync::{mpsc, Mutex, OnceCell};

use xswap_core::{
    convert_decimals, unix_now, Address, ChainSwap, Hash, InteropTransfer, KvStore, PendingFee,
    PendingSwap,
};
use xswap_crypto::InteropKey;
use xswap_watcher::{
    error_chain, AssetInfo, ChainWatcher, EvmWatcher, NeoWatcher, OracleReader, WatcherSettings,
};

use crate::config::{ChainBackend, PlatformBackend, SwapperConfig};
use crate::error::EngineError;
use crate::home::HomeChain;
use crate::index::SwapIndex;
use crate::payout::{Broadcast, EvmPayout, NeoPayout, PayoutRoutine};
use crate::settlement::{advance_fee, FeeStep};
use crate::state::SwapState;

/// Watchers and payout routines, built once the home chain is live.
struct Runtime {
    watchers: HashMap<String, Arc<dyn ChainWatcher>>,
    payouts: HashMap<String, Arc<dyn PayoutRoutine>>,
}

struct PollResult {
    platform: String,
    /// `Err` carries the panic message of a faulted task.
    outcome: Result<Vec<PendingSwap>, String>,
}

struct Scheduler {
    results: mpsc::UnboundedReceiver<PollResult>,
    in_flight: HashSet<String>,
}

/// Snapshot for the status endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct SwapperStatus {
    pub ready: bool,
    pub home_platform: String,
    /// Interop address per external platform.
    pub platforms: BTreeMap<String, String>,
    pub polling: Vec<String>,
    pub discovered: usize,
    pub in_progress: usize,
    pub pending_fees: u64,
}

/// A payout that passed every check and can be broadcast.
struct PreparedPayout {
    transfer: InteropTransfer,
    asset: AssetInfo,
    amount: u128,
}

pub struct TokenSwapper {
    config: SwapperConfig,
    home: Arc<dyn HomeChain>,
    state: SwapState,
    /// Home-chain key used for settlements.
    swapper_key: Arc<InteropKey>,
    backends: HashMap<String, PlatformBackend>,
    oracle: Arc<dyn OracleReader>,
    /// Guards every read-decide-write on `state`.
    state_lock: Mutex<()>,
    runtime: OnceCell<Runtime>,
    recovery_started: AtomicBool,
    index: SwapIndex,
    scheduler: Mutex<Scheduler>,
    results_tx: mpsc::UnboundedSender<PollResult>,
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        return msg.to_string();
    }
    payload
        .downcast_ref::<String>()
        .cloned()
        .unwrap_or_else(|| "unknown panic".to_string())
}

impl TokenSwapper {
    pub fn new(
        config: SwapperConfig,
        home: Arc<dyn HomeChain>,
        store: Arc<dyn KvStore>,
        swapper_key: Arc<InteropKey>,
        backends: Vec<PlatformBackend>,
        oracle: Arc<dyn OracleReader>,
    ) -> Result<Arc<Self>, EngineError> {
        let mut by_name = HashMap::new();
        for backend in backends {
            if backend.name.eq_ignore_ascii_case(&config.home_platform) {
                return Err(EngineError::Config(format!(
                    "platform {} is the home platform",
                    backend.name
                )));
            }
            let name = backend.name.clone();
            if by_name.insert(name.clone(), backend).is_some() {
                return Err(EngineError::Config(format!("duplicate platform {}", name)));
            }
        }

        let (results_tx, results) = mpsc::unbounded_channel();
        tracing::info!(
            home = %config.home_platform,
            platforms = by_name.len(),
            address = %swapper_key.home_address(),
            "token swapper created"
        );
        Ok(Arc::new(Self {
            config,
            home,
            state: SwapState::new(store),
            swapper_key,
            backends: by_name,
            oracle,
            state_lock: Mutex::new(()),
            runtime: OnceCell::new(),
            recovery_started: AtomicBool::new(false),
            index: SwapIndex::new(),
            scheduler: Mutex::new(Scheduler {
                results,
                in_flight: HashSet::new(),
            }),
            results_tx,
        }))
    }

    pub fn home_platform(&self) -> &str {
        &self.config.home_platform
    }

    pub fn state(&self) -> &SwapState {
        &self.state
    }

    pub fn is_ready(&self) -> bool {
        self.runtime.initialized()
    }

    /// Build the runtime on first use. `None` until the home chain has a
    /// genesis block.
    async fn runtime(self: &Arc<Self>) -> Result<Option<&Runtime>, EngineError> {
        if let Some(runtime) = self.runtime.get() {
            return Ok(Some(runtime));
        }
        if !self.home.has_genesis().await? {
            return Ok(None);
        }
        let runtime = self.runtime.get_or_try_init(|| self.build_runtime()).await?;

        if !self.recovery_started.swap(true, Ordering::SeqCst) {
            let this = self.clone();
            tokio::spawn(async move {
                match this.resume_in_progress().await {
                    Ok(0) => {}
                    Ok(resumed) => tracing::info!(resumed, "in-progress payouts resumed"),
                    Err(e) => tracing::error!(error = %error_chain(&e), "payout recovery failed"),
                }
            });
        }
        Ok(Some(runtime))
    }

    async fn build_runtime(&self) -> Result<Runtime, EngineError> {
        let platforms = self.home.platforms().await?;
        let mut watchers: HashMap<String, Arc<dyn ChainWatcher>> = HashMap::new();
        let mut payouts: HashMap<String, Arc<dyn PayoutRoutine>> = HashMap::new();

        for backend in self.backends.values() {
            let info = platforms
                .iter()
                .find(|p| p.name.eq_ignore_ascii_case(&backend.name))
                .ok_or_else(|| {
                    EngineError::Config(format!(
                        "platform {} is not registered on the home chain",
                        backend.name
                    ))
                })?;

            let settings = WatcherSettings {
                platform: backend.name.clone(),
                chain: backend.chain.clone(),
                confirmations: backend.confirmations,
                blocks_per_update: self.config.blocks_per_update,
                start_height: backend.start_height,
            };
            let home = self.config.home_platform.as_str();
            let setup = |e: xswap_watcher::WatcherError| EngineError::Config(e.to_string());

            let (watcher, payout): (Arc<dyn ChainWatcher>, Arc<dyn PayoutRoutine>) =
                match &backend.chain_backend {
                    ChainBackend::Evm(client) => {
                        let watcher = EvmWatcher::new(
                            settings,
                            home,
                            &backend.key,
                            info,
                            backend.assets.clone(),
                            client.clone(),
                            self.oracle.clone(),
                        )
                        .map_err(setup)?;
                        let payout = EvmPayout::new(
                            &backend.name,
                            backend.key.clone(),
                            client.clone(),
                            backend.assets.clone(),
                            backend.verify.clone(),
                        );
                        (
                            Arc::new(watcher) as Arc<dyn ChainWatcher>,
                            Arc::new(payout) as Arc<dyn PayoutRoutine>,
                        )
                    }
                    ChainBackend::Neo(pool) => {
                        let watcher = NeoWatcher::new(
                            settings,
                            home,
                            &backend.key,
                            info,
                            backend.assets.clone(),
                            pool.clone(),
                            self.oracle.clone(),
                        )
                        .map_err(setup)?;
                        let payout = NeoPayout::new(
                            &backend.name,
                            backend.key.clone(),
                            pool.clone(),
                            backend.assets.clone(),
                            backend.verify.clone(),
                        );
                        (
                            Arc::new(watcher) as Arc<dyn ChainWatcher>,
                            Arc::new(payout) as Arc<dyn PayoutRoutine>,
                        )
                    }
                };

            tracing::info!(
                platform = %backend.name,
                kind = backend.chain_backend.kind(),
                address = %watcher.available_address(&backend.key),
                "platform initialised"
            );
            watchers.insert(backend.name.clone(), watcher);
            payouts.insert(backend.name.clone(), payout);
        }

        Ok(Runtime { watchers, payouts })
    }

    fn chain_of<'a>(&'a self, platform: &'a str) -> &'a str {
        self.backends
            .get(platform)
            .map(|b| b.chain.as_str())
            .unwrap_or(platform)
    }

    /// One scheduling cycle: advance fee settlements, collect finished
    /// polling tasks, and start a new task for every idle platform.
    ///
    /// Only configuration errors are returned; everything else is logged
    /// and retried on the next cycle.
    pub async fn update(self: &Arc<Self>) -> Result<(), EngineError> {
        let runtime = match self.runtime().await {
            Ok(Some(runtime)) => runtime,
            Ok(None) => {
                tracing::debug!("home chain has no genesis yet");
                return Ok(());
            }
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => {
                tracing::warn!(error = %error_chain(&e), "swapper initialisation deferred");
                return Ok(());
            }
        };

        if let Err(e) = self.update_pending_settle().await {
            tracing::error!(error = %error_chain(&e), "fee settlement pass failed");
        }

        let mut scheduler = self.scheduler.lock().await;
        self.harvest(&mut scheduler);
        self.schedule(runtime, &mut scheduler);
        Ok(())
    }

    fn harvest(&self, scheduler: &mut Scheduler) {
        while let Ok(result) = scheduler.results.try_recv() {
            scheduler.in_flight.remove(&result.platform);
            match result.outcome {
                Ok(swaps) => {
                    for swap in swaps {
                        self.record_swap(swap);
                    }
                }
                Err(panic) => {
                    tracing::error!(platform = %result.platform, %panic, "polling task faulted");
                }
            }
        }
    }

    fn record_swap(&self, swap: PendingSwap) {
        match self.state.settled().contains(&swap.hash) {
            Ok(false) => {}
            Ok(true) => return,
            Err(e) => {
                tracing::error!(hash = %swap.hash, error = %e, "settled lookup failed");
                return;
            }
        }
        let (platform, hash, destination) = (swap.platform.clone(), swap.hash, swap.destination);
        if self.index.insert(swap) {
            tracing::info!(%platform, %hash, %destination, "swap discovered");
        }
    }

    fn schedule(&self, runtime: &Runtime, scheduler: &mut Scheduler) {
        let mut started = Vec::new();
        for (platform, watcher) in &runtime.watchers {
            if scheduler.in_flight.insert(platform.clone()) {
                started.push((platform.clone(), watcher.clone()));
            }
        }

        for (platform, watcher) in started {
            let results = self.results_tx.clone();
            tokio::spawn(async move {
                let outcome = AssertUnwindSafe(watcher.update())
                    .catch_unwind()
                    .await
                    .map_err(panic_message);
                if results.send(PollResult { platform, outcome }).is_err() {
                    tracing::debug!("swapper gone, dropping poll result");
                }
            });
        }
    }

    async fn update_pending_settle(&self) -> Result<(), EngineError> {
        let _guard = self.state_lock.lock().await;
        let pending = self.state.pending();

        let mut index = 0;
        while index < pending.count()? {
            let fee = pending.get(index)?;
            let chain = self.chain_of(&fee.platform);
            let step = advance_fee(
                self.home.as_ref(),
                &self.swapper_key,
                &fee,
                chain,
                unix_now(),
                self.config.settle_delay,
            )
            .await;

            match step {
                FeeStep::Unchanged => index += 1,
                FeeStep::Updated(next) => {
                    tracing::debug!(source = %next.source_hash, from = %fee.status, to = %next.status, "fee state changed");
                    pending.replace(index, &next)?;
                    index += 1;
                }
                FeeStep::Finished(done) => {
                    self.state.finish(&done.source_hash, &done.destination_hash)?;
                    pending.remove_at(index)?;
                    self.index.remove(&done.source_hash);
                    tracing::info!(
                        source = %done.source_hash,
                        destination = %done.destination_hash,
                        platform = %done.platform,
                        "swap finished"
                    );
                }
            }
        }
        Ok(())
    }

    /// Settle the swap with source transaction `hash`.
    ///
    /// Returns the destination hash when the swap is already settled or
    /// settles on the home chain. Payouts to an external platform run in
    /// the background and return `None`, as does a swap already being
    /// processed.
    pub async fn settle_swap(
        self: &Arc<Self>,
        source_platform: &str,
        destination_platform: &str,
        hash: Hash,
    ) -> Result<Option<Hash>, EngineError> {
        let runtime = self.runtime().await?.ok_or(EngineError::NotReady)?;
        let to_home = destination_platform.eq_ignore_ascii_case(&self.config.home_platform);
        if !to_home && !runtime.payouts.contains_key(destination_platform) {
            return Err(EngineError::UnknownPlatform(destination_platform.to_string()));
        }

        {
            let _guard = self.state_lock.lock().await;
            if self.state.in_progress().contains(&hash)? {
                tracing::debug!(%hash, "swap already in progress");
                return Ok(None);
            }
            if let Some(settled) = self.state.known_settlement(&hash)? {
                self.state.settled().set(&hash, &settled)?;
                return Ok(Some(settled));
            }
            if let Some(settled) = self.home.get_settlement(source_platform, &hash).await? {
                self.state.settled().set(&hash, &settled)?;
                self.index.remove(&hash);
                return Ok(Some(settled));
            }
            self.state.in_progress().set(&hash, &None)?;
        }

        if to_home {
            return self.settle_to_home(source_platform, hash).await.map(Some);
        }

        let this = self.clone();
        let destination = destination_platform.to_string();
        tokio::spawn(async move {
            if let Err(e) = this.settle_swap_to_external(hash, &destination).await {
                tracing::error!(%hash, platform = %destination, error = %error_chain(&e), "payout failed");
            }
        });
        Ok(None)
    }

    async fn settle_to_home(&self, source_platform: &str, hash: Hash) -> Result<Hash, EngineError> {
        let chain = self.chain_of(source_platform);
        let result = self
            .home
            .settle_transaction(&self.swapper_key, source_platform, chain, &hash)
            .await;

        let _guard = self.state_lock.lock().await;
        match result {
            Ok(settlement) => {
                self.state.finish(&hash, &settlement)?;
                self.index.remove(&hash);
                tracing::info!(platform = source_platform, %hash, %settlement, "swap settled on home chain");
                Ok(settlement)
            }
            Err(e) => {
                // The claim stays until a settlement is recorded.
                tracing::warn!(platform = source_platform, %hash, error = %e, "home settlement failed, swap needs manual resolution");
                Err(e)
            }
        }
    }

    async fn prepare_payout(
        &self,
        payout: &dyn PayoutRoutine,
        source_hash: &Hash,
    ) -> Result<Option<PreparedPayout>, EngineError> {
        let mut transfers = self.home.interop_transfers(source_hash).await?;
        if transfers.len() != 1 {
            tracing::warn!(%source_hash, count = transfers.len(), "expected exactly one interop transfer");
            return Ok(None);
        }
        let transfer = transfers.remove(0);
        let asset = payout
            .asset(&transfer.symbol)
            .cloned()
            .ok_or_else(|| EngineError::UnsupportedAsset {
                platform: payout.platform().to_string(),
                symbol: transfer.symbol.clone(),
            })?;
        let amount = convert_decimals(transfer.amount, asset.home_decimals, asset.decimals)?;
        Ok(Some(PreparedPayout {
            transfer,
            asset,
            amount,
        }))
    }

    /// Pay out the home-chain swap `source_hash` on `destination_platform`,
    /// wait for inclusion, then queue its fee settlement.
    ///
    /// Resumes verification without broadcasting when a transaction id is
    /// already recorded for the swap.
    pub async fn settle_swap_to_external(
        &self,
        source_hash: Hash,
        destination_platform: &str,
    ) -> Result<Option<Hash>, EngineError> {
        let runtime = self.runtime.get().ok_or(EngineError::NotReady)?;
        let payout = runtime
            .payouts
            .get(destination_platform)
            .cloned()
            .ok_or_else(|| EngineError::UnknownPlatform(destination_platform.to_string()))?;

        let sent = {
            let _guard = self.state_lock.lock().await;
            if let Some(done) = self.state.known_settlement(&source_hash)? {
                return Ok(Some(done));
            }

            match self.state.in_progress().get(&source_hash)? {
                Some(Some(txid)) => {
                    let hash: Hash = txid.parse()?;
                    let endpoint = self.state.used_rpc().get(&source_hash)?;
                    tracing::info!(%source_hash, payout = %hash, "payout already broadcast, verifying");
                    Broadcast { hash, endpoint }
                }
                claim => {
                    if claim.is_none() {
                        self.state.in_progress().set(&source_hash, &None)?;
                    }

                    // A claim without a transaction id is kept for manual resolution.
                    let prepared = match self.prepare_payout(payout.as_ref(), &source_hash).await {
                        Ok(Some(prepared)) => prepared,
                        Ok(None) => {
                            tracing::warn!(%source_hash, "swap left unsettled");
                            return Ok(None);
                        }
                        Err(e) => {
                            tracing::warn!(%source_hash, error = %e, "payout not prepared, claim kept");
                            return Err(e);
                        }
                    };

                    let sent = payout
                        .broadcast(
                            &prepared.transfer.destination_address,
                            &prepared.asset,
                            prepared.amount,
                        )
                        .await?;
                    self.state
                        .in_progress()
                        .set(&source_hash, &Some(sent.hash.to_string()))?;
                    if let Some(endpoint) = &sent.endpoint {
                        self.state.used_rpc().set(&source_hash, endpoint)?;
                    }
                    tracing::info!(
                        %source_hash,
                        platform = destination_platform,
                        payout = %sent.hash,
                        to = %prepared.transfer.destination_address,
                        symbol = %prepared.asset.symbol,
                        amount = prepared.amount,
                        "payout broadcast"
                    );
                    sent
                }
            }
        };

        payout
            .verify(&sent.hash, sent.endpoint.as_deref())
            .await?;

        let _guard = self.state_lock.lock().await;
        if self.state.known_settlement(&source_hash)?.is_none() {
            self.state.pending().push(&PendingFee::new(
                source_hash,
                sent.hash,
                destination_platform,
                unix_now(),
            ))?;
            tracing::info!(%source_hash, payout = %sent.hash, "payout confirmed, fee settlement queued");
        }
        Ok(Some(sent.hash))
    }

    /// Re-verify payouts that were broadcast before a restart. Claims
    /// without a transaction id are left for manual resolution.
    pub async fn resume_in_progress(&self) -> Result<usize, EngineError> {
        let claims = {
            let _guard = self.state_lock.lock().await;
            self.state.in_progress().entries()?
        };

        let mut resumed = 0;
        for (source_hash, txid) in claims {
            let Some(txid) = txid else {
                tracing::warn!(%source_hash, "swap claimed without a broadcast, needs manual resolution");
                continue;
            };
            if self.state.find_pending(&source_hash)?.is_some() {
                continue;
            }

            let transfers = match self.home.interop_transfers(&source_hash).await {
                Ok(transfers) => transfers,
                Err(e) => {
                    tracing::error!(%source_hash, error = %e, "cannot resume payout");
                    continue;
                }
            };
            let [transfer] = transfers.as_slice() else {
                tracing::warn!(%source_hash, count = transfers.len(), "cannot resume payout without a single transfer");
                continue;
            };

            tracing::info!(%source_hash, %txid, platform = %transfer.destination_platform, "resuming payout verification");
            match self
                .settle_swap_to_external(source_hash, &transfer.destination_platform)
                .await
            {
                Ok(_) => resumed += 1,
                Err(e) => {
                    tracing::error!(%source_hash, error = %error_chain(&e), "payout verification failed");
                }
            }
        }
        Ok(resumed)
    }

    /// Unsettled swaps destined to `address`, from the local index and the
    /// home chain.
    pub async fn get_pending_swaps(&self, address: &Address) -> Result<Vec<ChainSwap>, EngineError> {
        let mut seen = HashSet::new();
        let mut swaps = Vec::new();

        for swap in self.index.for_address(address) {
            if self.state.settled().contains(&swap.hash)? || !seen.insert(swap.hash) {
                continue;
            }
            swaps.push(ChainSwap {
                source_platform: swap.platform,
                source_hash: swap.hash,
                destination_platform: self.config.home_platform.clone(),
                destination_hash: None,
            });
        }

        for swap in self.home.swaps_for_address(address).await? {
            if swap.destination_hash.is_some()
                || self.state.settled().contains(&swap.source_hash)?
                || !seen.insert(swap.source_hash)
            {
                continue;
            }
            swaps.push(swap);
        }
        Ok(swaps)
    }

    /// Re-process one block of `platform` on its next polling pass.
    pub fn resync_block(&self, platform: &str, height: u64) -> Result<(), EngineError> {
        let runtime = self.runtime.get().ok_or(EngineError::NotReady)?;
        let watcher = runtime
            .watchers
            .get(platform)
            .ok_or_else(|| EngineError::UnknownPlatform(platform.to_string()))?;
        watcher.resync_block(height);
        tracing::info!(platform, height, "block queued for resync");
        Ok(())
    }

    pub async fn status(&self) -> Result<SwapperStatus, EngineError> {
        let mut platforms = BTreeMap::new();
        if let Some(runtime) = self.runtime.get() {
            for (name, watcher) in &runtime.watchers {
                if let Some(backend) = self.backends.get(name) {
                    platforms.insert(name.clone(), watcher.available_address(&backend.key));
                }
            }
        }
        let mut polling: Vec<String> = self
            .scheduler
            .lock()
            .await
            .in_flight
            .iter()
            .cloned()
            .collect();
        polling.sort();

        let _guard = self.state_lock.lock().await;
        Ok(SwapperStatus {
            ready: self.is_ready(),
            home_platform: self.config.home_platform.clone(),
            platforms,
            polling,
            discovered: self.index.len(),
            in_progress: self.state.in_progress().entries()?.len(),
            pending_fees: self.state.pending().count()?,
        })
    }
}
