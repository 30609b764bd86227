//! Per-block arbitrage orchestration: enumerate cycles opened by the
//! affected set, price them, and submit everything that clears the floor.

use alloy_primitives::Address;
use arb_core::types::{display_path, ArbitrageCandidate, Pool};
use arb_core::{BotError, Result};
use arb_registry::PoolRegistry;
use futures::{stream, StreamExt};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

use arb_sync::{BlockOutcome, ExecutorClient, TelegramNotifier};

use crate::paths::find_paths;
use crate::quote::sweep_path;
use crate::submit::{parse_malicious_pool, TxSubmitter};

/// Quote calls in flight at once. The sweep is RPC-bound; past this the
/// endpoint throttles before we gain anything.
const QUOTE_CONCURRENCY: usize = 32;

pub struct ArbEngine {
    registry: Arc<PoolRegistry>,
    executor: Arc<ExecutorClient>,
    submitter: TxSubmitter,
    notifier: Option<TelegramNotifier>,
}

impl ArbEngine {
    pub fn new(
        registry: Arc<PoolRegistry>,
        executor: Arc<ExecutorClient>,
        submitter: TxSubmitter,
        notifier: Option<TelegramNotifier>,
    ) -> Self {
        Self { registry, executor, submitter, notifier }
    }

    /// Run the full search/price/submit cycle for one processed block. The
    /// block handler has finished mutating the registry by the time this
    /// runs; everything here reads a cloned snapshot.
    pub async fn run_block(&self, outcome: &BlockOutcome) -> Result<()> {
        if outcome.affected.is_empty() {
            return Ok(());
        }
        let started = Instant::now();

        let snapshot = self.registry.enabled_pools();
        let mut pools_by_address: HashMap<Address, Pool> =
            snapshot.iter().map(|p| (p.address, p.clone())).collect();
        for pool in &outcome.affected {
            pools_by_address.entry(pool.address).or_insert_with(|| pool.clone());
        }

        let paths = find_paths(snapshot, outcome.affected.clone()).await;
        let paths_ms = started.elapsed().as_millis() as u64;
        info!(block = outcome.block, total_paths = paths.len(), paths_ms, "path summary");
        if paths.is_empty() {
            return Ok(());
        }

        let executor = Arc::clone(&self.executor);
        let candidates: Vec<ArbitrageCandidate> = stream::iter(paths)
            .map(|path| {
                let executor = Arc::clone(&executor);
                let pools_by_address = &pools_by_address;
                async move { sweep_path(&executor, pools_by_address, path).await }
            })
            .buffer_unordered(QUOTE_CONCURRENCY)
            .collect()
            .await;
        let quote_ms = started.elapsed().as_millis() as u64 - paths_ms;

        let mut submitted = 0usize;
        for candidate in candidates.iter().filter(|c| c.valid) {
            if self.handle_candidate(candidate).await? {
                submitted += 1;
            }
        }

        info!(
            block = outcome.block,
            candidates = candidates.iter().filter(|c| c.valid).count(),
            submitted,
            paths_ms,
            quote_ms,
            total_ms = started.elapsed().as_millis() as u64,
            "block search complete"
        );
        Ok(())
    }

    /// Submit one candidate. Returns whether a transaction went out;
    /// rejections are handled here and never abort the block.
    async fn handle_candidate(&self, candidate: &ArbitrageCandidate) -> Result<bool> {
        let path = candidate.display_path();
        info!(
            path = %path,
            borrow = %candidate.borrow_amount,
            profit = %candidate.profit,
            ratio = candidate.ratio,
            "possible trade"
        );

        match self.submitter.submit(candidate).await {
            Ok(submitted) => {
                info!(
                    path = %path,
                    tx = %submitted.hash,
                    gas_cost = %submitted.gas_cost,
                    bribe = %submitted.bribe,
                    "arbitrage submitted"
                );
                self.notify_trade(candidate, &submitted.hash.to_string(), &submitted.gas_cost.to_string())
                    .await;
                Ok(true)
            }
            Err(BotError::GasTooHigh) => {
                info!(path = %path, "gas cost exceeds profit, skipping");
                Ok(false)
            }
            Err(BotError::Submission(message)) => {
                if let Some(address) = parse_malicious_pool(&message) {
                    warn!(pool = %address, "executor reported malicious pool, disabling");
                    self.registry.disable(&address);
                } else {
                    warn!(path = %path, error = %message, "submission rejected");
                }
                Ok(false)
            }
            Err(e) => {
                warn!(path = %path, error = %e, "submission failed");
                Ok(false)
            }
        }
    }

    async fn notify_trade(&self, candidate: &ArbitrageCandidate, hash: &str, gas_cost: &str) {
        let Some(notifier) = &self.notifier else { return };
        let message = format!(
            "Profitable Trade\n\
             Pools: {}\n\
             Profit Ratio: %{:.2}\n\
             Loan Amount: {}\n\
             Loan Payment: {}\n\
             Amount Out: {}\n\
             Gas Cost: {}\n\
             Profit: {}\n\
             Url: https://etherscan.io/tx/{}",
            display_path(&candidate.path),
            candidate.ratio,
            candidate.borrow_amount,
            candidate.borrow_amount,
            candidate.amount_out,
            gas_cost,
            candidate.profit,
            hash,
        );
        notifier.send_message(&message).await;
    }
}
