//! Startup reconstruction of pool state: scan both factories' creation
//! history from the registry watermark, then materialize reserves on-chain.

use alloy::rpc::types::Filter;
use alloy_primitives::Address;
use alloy_sol_types::SolEvent;
use arb_core::constants::{
    BOOTSTRAP_WINDOW_BLOCKS, BOOTSTRAP_WINDOW_CONCURRENCY, RESERVE_BATCH_SIZE, POOL_FACTORIES,
};
use arb_core::contracts::ReserveParams;
use arb_core::events::{decode_pool_event, PairCreated, PoolCreated, PoolEvent};
use arb_core::types::{Pool, PoolKind};
use arb_core::{BotError, Result};
use arb_registry::PoolRegistry;
use futures::{stream, StreamExt};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::executor::ExecutorClient;
use crate::provider::ProviderManager;

const WINDOW_RETRY_ATTEMPTS: u32 = 3;
const WINDOW_RETRY_DELAY: Duration = Duration::from_millis(500);

pub struct BootstrapLoader {
    provider: Arc<ProviderManager>,
    executor: Arc<ExecutorClient>,
    registry: Arc<PoolRegistry>,
    shutdown: Arc<AtomicBool>,
    state_path: PathBuf,
}

impl BootstrapLoader {
    pub fn new(
        provider: Arc<ProviderManager>,
        executor: Arc<ExecutorClient>,
        registry: Arc<PoolRegistry>,
        shutdown: Arc<AtomicBool>,
        state_path: PathBuf,
    ) -> Self {
        Self { provider, executor, registry, shutdown, state_path }
    }

    /// Scan factory history since the watermark, refresh reserves for every
    /// known pool, read reserves for each discovery, persist.
    pub async fn run(&self) -> Result<()> {
        let started = Instant::now();
        let from = self.registry.watermark().await;
        let head = self.provider.block_number().await?;

        info!(from, head, known_pools = self.registry.len(), "bootstrap started");

        let discovered =
            if head > from { self.scan_factories(from, head).await? } else { Vec::new() };
        let fresh: Vec<Pool> =
            discovered.into_iter().filter(|p| !self.registry.contains(&p.address)).collect();
        info!(
            discovered = fresh.len(),
            scan_ms = started.elapsed().as_millis() as u64,
            "factory scan complete"
        );

        if self.is_shutdown() {
            return Ok(());
        }

        self.refresh_known_reserves().await?;
        self.materialize_new_pools(fresh).await;

        self.registry.advance_watermark(head).await;
        self.registry.snapshot(&self.state_path).await?;

        info!(
            pools = self.registry.len(),
            head,
            total_ms = started.elapsed().as_millis() as u64,
            "bootstrap complete"
        );
        Ok(())
    }

    fn is_shutdown(&self) -> bool {
        self.shutdown.load(Ordering::Relaxed)
    }

    /// One task per factory; inside each, 10,000-block windows fetched
    /// concurrently with a fixed cap. Window order is irrelevant: creation
    /// events are idempotent and keyed by pool address.
    async fn scan_factories(&self, from: u64, to: u64) -> Result<Vec<Pool>> {
        let mut handles = Vec::new();
        for (kind, factory) in POOL_FACTORIES {
            let provider = Arc::clone(&self.provider);
            let shutdown = Arc::clone(&self.shutdown);
            handles.push(tokio::spawn(scan_factory(provider, kind, factory, from, to, shutdown)));
        }

        let mut by_address: HashMap<Address, Pool> = HashMap::new();
        for handle in handles {
            let pools = handle.await.map_err(|e| BotError::Rpc(format!("scan task: {e}")))??;
            for pool in pools {
                by_address.entry(pool.address).or_insert(pool);
            }
        }
        Ok(by_address.into_values().collect())
    }

    /// Refresh every tracked pool's reserves in one batched read per 2,000
    /// pools. A batch failure is fatal; stale reserves would poison every
    /// quote downstream.
    async fn refresh_known_reserves(&self) -> Result<()> {
        let known = self.registry.all_pools();
        if known.is_empty() {
            return Ok(());
        }
        info!(pools = known.len(), "refreshing reserves for known pools");

        for (batch_index, batch) in known.chunks(RESERVE_BATCH_SIZE).enumerate() {
            if self.is_shutdown() {
                return Ok(());
            }
            let params: Vec<ReserveParams> = batch
                .iter()
                .map(|p| ReserveParams { token0: p.token0, token1: p.token1, pool: p.address })
                .collect();
            let reserves = self.executor.multi_get_reserves(params).await?;
            for (pool, [reserve0, reserve1]) in batch.iter().zip(reserves) {
                let _ = self.registry.set_reserves(&pool.address, reserve0, reserve1);
            }
            debug!(batch = batch_index + 1, size = batch.len(), "reserve batch applied");
        }
        Ok(())
    }

    /// Newly discovered pools get individual reserve reads; a pool whose
    /// read fails is skipped, not fatal.
    async fn materialize_new_pools(&self, fresh: Vec<Pool>) {
        let total = fresh.len();
        let mut skipped = 0usize;
        for (index, mut pool) in fresh.into_iter().enumerate() {
            if self.is_shutdown() {
                return;
            }
            if index % 250 == 0 && index > 0 {
                info!(index, total, "reserve progress");
            }
            let params =
                ReserveParams { token0: pool.token0, token1: pool.token1, pool: pool.address };
            match self.executor.get_reserves(params).await {
                Ok([reserve0, reserve1]) => {
                    pool.reserve0 = reserve0;
                    pool.reserve1 = reserve1;
                    self.registry.upsert(pool);
                }
                Err(e) => {
                    skipped += 1;
                    debug!(pool = %pool.address, error = %e, "reserve read failed, pool skipped");
                }
            }
        }
        if skipped > 0 {
            warn!(skipped, total, "some new pools skipped during reserve materialization");
        }
    }
}

async fn scan_factory(
    provider: Arc<ProviderManager>,
    kind: PoolKind,
    factory: Address,
    from: u64,
    to: u64,
    shutdown: Arc<AtomicBool>,
) -> Result<Vec<Pool>> {
    let mut windows = Vec::new();
    let mut start = from;
    while start < to {
        let end = (start + BOOTSTRAP_WINDOW_BLOCKS - 1).min(to);
        windows.push((start, end));
        start = end + 1;
    }
    info!(factory = %factory, kind = %kind, windows = windows.len(), "scanning factory history");

    let results: Vec<Result<Vec<Pool>>> = stream::iter(windows)
        .map(|(window_from, window_to)| {
            let provider = Arc::clone(&provider);
            let shutdown = Arc::clone(&shutdown);
            async move {
                if shutdown.load(Ordering::Relaxed) {
                    return Ok(Vec::new());
                }
                fetch_window(&provider, kind, factory, window_from, window_to).await
            }
        })
        .buffer_unordered(BOOTSTRAP_WINDOW_CONCURRENCY)
        .collect()
        .await;

    let mut pools = Vec::new();
    for result in results {
        pools.extend(result?);
    }
    info!(factory = %factory, kind = %kind, pools = pools.len(), "factory scan finished");
    Ok(pools)
}

async fn fetch_window(
    provider: &ProviderManager,
    kind: PoolKind,
    factory: Address,
    from: u64,
    to: u64,
) -> Result<Vec<Pool>> {
    let signature = match kind {
        PoolKind::V2 => PairCreated::SIGNATURE_HASH,
        PoolKind::V3 => PoolCreated::SIGNATURE_HASH,
    };
    let filter =
        Filter::new().address(factory).event_signature(signature).from_block(from).to_block(to);

    let mut attempts = 0u32;
    let mut delay = WINDOW_RETRY_DELAY;
    let logs = loop {
        attempts += 1;
        match provider.get_logs_history(&filter).await {
            Ok(logs) => break logs,
            Err(e) if attempts < WINDOW_RETRY_ATTEMPTS => {
                warn!(from, to, attempt = attempts, error = %e, "window fetch failed, retrying");
                tokio::time::sleep(delay).await;
                delay *= 2;
            }
            Err(e) => return Err(e),
        }
    };

    let mut pools = Vec::new();
    for log in &logs {
        match decode_pool_event(&log.inner) {
            Some(PoolEvent::PairCreated { token0, token1, pair }) => {
                pools.push(Pool::new_v2(pair, token0, token1));
            }
            Some(PoolEvent::PoolCreated { token0, token1, fee, pool }) => {
                pools.push(Pool::new_v3(pool, token0, token1, fee));
            }
            _ => {}
        }
    }
    Ok(pools)
}
