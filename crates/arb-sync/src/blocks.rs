//! Per-block pipeline: head subscription, log fetch over every enabled pool,
//! coalesced registry mutation, affected-set emission.

use alloy::rpc::types::{Filter, Log};
use alloy_primitives::{Address, I256, U256};
use arb_core::constants::{factory_addresses, is_factory, LOG_ADDRESS_BATCH};
use arb_core::contracts::ReserveParams;
use arb_core::events::{decode_pool_event, PoolEvent};
use arb_core::types::Pool;
use arb_core::{BotError, Result};
use arb_registry::PoolRegistry;
use futures_util::{SinkExt, StreamExt};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};

use crate::executor::ExecutorClient;
use crate::provider::ProviderManager;

const SUBSCRIBE_TIMEOUT: Duration = Duration::from_secs(10);

/// A live `newHeads` subscription. Errors out of [`HeadStream::next`] carry
/// the recoverable/fatal split the run loop keys off: connection resets and
/// i/o timeouts restart the whole loop, anything else aborts.
pub struct HeadStream {
    ws: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

impl HeadStream {
    pub async fn connect(ws_url: &str) -> Result<Self> {
        let (mut ws, _) = connect_async(ws_url).await.map_err(ws_error)?;

        let subscribe = serde_json::json!({
            "jsonrpc": "2.0",
            "method": "eth_subscribe",
            "params": ["newHeads"],
            "id": 1,
        });
        ws.send(Message::Text(subscribe.to_string())).await.map_err(ws_error)?;

        let subscription_id = tokio::time::timeout(SUBSCRIBE_TIMEOUT, async {
            while let Some(msg) = ws.next().await {
                if let Message::Text(text) = msg.map_err(ws_error)? {
                    let parsed: serde_json::Value = serde_json::from_str(&text)
                        .map_err(|e| BotError::WebSocket(format!("subscribe response: {e}")))?;
                    if parsed.get("id") == Some(&serde_json::json!(1)) {
                        if let Some(err) = parsed.get("error") {
                            return Err(BotError::WebSocket(format!("subscribe rejected: {err}")));
                        }
                        if let Some(id) = parsed.get("result").and_then(|v| v.as_str()) {
                            return Ok(id.to_string());
                        }
                    }
                }
            }
            Err(BotError::SubscriptionClosed)
        })
        .await
        .map_err(|_| BotError::WebSocket("subscribe: timed out".into()))??;

        info!(subscription_id = %subscription_id, "subscribed to new block headers");
        Ok(Self { ws })
    }

    /// Wait for the next header notification. Pings are answered inline.
    pub async fn next(&mut self) -> Result<HeadEvent> {
        loop {
            let msg = match self.ws.next().await {
                Some(msg) => msg.map_err(ws_error)?,
                None => return Err(BotError::SubscriptionClosed),
            };
            match msg {
                Message::Text(text) => {
                    let parsed: serde_json::Value = match serde_json::from_str(&text) {
                        Ok(value) => value,
                        Err(e) => {
                            debug!(error = %e, "ignoring unparseable subscription frame");
                            continue;
                        }
                    };
                    if parsed.get("method") != Some(&serde_json::json!("eth_subscription")) {
                        continue;
                    }
                    let result = parsed.pointer("/params/result");
                    let hash = result
                        .and_then(|r| r.get("hash"))
                        .and_then(|h| h.as_str())
                        .unwrap_or_default()
                        .to_string();
                    let number = result
                        .and_then(|r| r.get("number"))
                        .and_then(|n| n.as_str())
                        .and_then(|n| u64::from_str_radix(n.trim_start_matches("0x"), 16).ok());
                    return Ok(HeadEvent { hash, number });
                }
                Message::Ping(data) => {
                    self.ws.send(Message::Pong(data)).await.map_err(ws_error)?;
                }
                Message::Close(frame) => {
                    warn!(frame = ?frame, "head subscription closed by server");
                    return Err(BotError::SubscriptionClosed);
                }
                _ => {}
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct HeadEvent {
    pub hash: String,
    pub number: Option<u64>,
}

fn ws_error(e: tokio_tungstenite::tungstenite::Error) -> BotError {
    use tokio_tungstenite::tungstenite::Error as E;
    match e {
        E::ConnectionClosed | E::AlreadyClosed => BotError::SubscriptionClosed,
        other => BotError::WebSocket(other.to_string()),
    }
}

/// What one block's processing produced.
#[derive(Debug)]
pub struct BlockOutcome {
    pub block: u64,
    pub total_logs: usize,
    /// Pools whose reserves changed this block, post-mutation.
    pub affected: Vec<Pool>,
}

pub struct BlockHandler {
    provider: Arc<ProviderManager>,
    executor: Arc<ExecutorClient>,
    registry: Arc<PoolRegistry>,
    state_path: PathBuf,
}

impl BlockHandler {
    pub fn new(
        provider: Arc<ProviderManager>,
        executor: Arc<ExecutorClient>,
        registry: Arc<PoolRegistry>,
        state_path: PathBuf,
    ) -> Self {
        Self { provider, executor, registry, state_path }
    }

    /// Run the full per-header pipeline: fetch logs for all watched
    /// addresses since the watermark, mutate the registry, advance the
    /// watermark, and report which pools changed.
    pub async fn process_block(&self, head: &HeadEvent) -> Result<BlockOutcome> {
        let started = Instant::now();
        let block = self.provider.block_number().await?;
        let from = self.registry.watermark().await;

        let mut addresses = factory_addresses();
        addresses.extend(self.registry.enabled_addresses());

        let mut logs: Vec<Log> = Vec::new();
        for chunk in addresses.chunks(LOG_ADDRESS_BATCH) {
            let filter = Filter::new().address(chunk.to_vec()).from_block(from);
            logs.extend(self.provider.get_logs(&filter).await?);
        }
        let fetch_ms = started.elapsed().as_millis() as u64;

        let affected = self.resolve_logs(&logs).await;
        let resolve_ms = started.elapsed().as_millis() as u64 - fetch_ms;

        self.registry.advance_watermark(block).await;
        if let Err(e) = self.registry.snapshot(&self.state_path).await {
            if matches!(e, BotError::Persistence(_)) {
                return Err(e);
            }
            warn!(error = %e, "snapshot write failed, will retry next block");
        }

        info!(
            block,
            head = %head.hash,
            total_logs = logs.len(),
            affected = affected.len(),
            fetch_ms,
            resolve_ms,
            "block resolved"
        );
        Ok(BlockOutcome { block, total_logs: logs.len(), affected })
    }

    /// Apply a log batch to the registry. Factory logs are applied
    /// one-by-one; for every other address only the log with the highest
    /// `log_index` in the batch is applied. A pool hit by many swaps inside
    /// one block settles on its final event; intermediate states are never
    /// worth quoting.
    async fn resolve_logs(&self, logs: &[Log]) -> Vec<Pool> {
        let keys: Vec<(Address, u64)> =
            logs.iter().map(|log| (log.address(), log.log_index.unwrap_or_default())).collect();
        let survivors = coalesce_positions(&keys);

        // Creations first, so a pool created and traded in the same batch is
        // known before its trade log is applied.
        for &position in &survivors {
            let log = &logs[position];
            if is_factory(&log.address()) {
                self.handle_creation(log).await;
            }
        }

        let mut affected: HashMap<Address, Pool> = HashMap::new();
        for &position in &survivors {
            let log = &logs[position];
            let address = log.address();
            if is_factory(&address) {
                continue;
            }
            let Some(event) = decode_pool_event(&log.inner) else { continue };
            let updated = match event {
                PoolEvent::Swap { amount0, amount1 } => {
                    self.registry.apply_delta(&address, amount0, amount1)
                }
                PoolEvent::Mint { amount0, amount1 } => {
                    self.registry.apply_delta(&address, to_signed(amount0), to_signed(amount1))
                }
                PoolEvent::Burn { amount0, amount1 }
                | PoolEvent::CollectProtocol { amount0, amount1 } => {
                    self.registry.apply_delta(&address, -to_signed(amount0), -to_signed(amount1))
                }
                PoolEvent::Sync { reserve0, reserve1 } => {
                    self.registry.set_reserves(&address, reserve0, reserve1)
                }
                // Creation events from a non-factory address are noise.
                PoolEvent::PairCreated { .. } | PoolEvent::PoolCreated { .. } => None,
            };
            if let Some(pool) = updated {
                affected.insert(address, pool);
            }
        }
        affected.into_values().collect()
    }

    async fn handle_creation(&self, log: &Log) {
        let pool = match decode_pool_event(&log.inner) {
            Some(PoolEvent::PairCreated { token0, token1, pair }) => {
                Pool::new_v2(pair, token0, token1)
            }
            Some(PoolEvent::PoolCreated { token0, token1, fee, pool }) => {
                Pool::new_v3(pool, token0, token1, fee)
            }
            _ => return,
        };
        if self.registry.contains(&pool.address) {
            return;
        }
        self.insert_new_pool(pool).await;
    }

    async fn insert_new_pool(&self, mut pool: Pool) {
        let params = ReserveParams { token0: pool.token0, token1: pool.token1, pool: pool.address };
        match self.executor.get_reserves(params).await {
            Ok([reserve0, reserve1]) => {
                pool.reserve0 = reserve0;
                pool.reserve1 = reserve1;
                info!(pool = %pool.address, kind = %pool.kind, "new pool discovered");
                self.registry.upsert(pool);
            }
            Err(e) => {
                debug!(pool = %pool.address, error = %e, "reserve read failed, new pool skipped");
            }
        }
    }
}

fn to_signed(amount: U256) -> I256 {
    I256::try_from(amount).unwrap_or(I256::MAX)
}

/// Positions of the logs that survive per-address highest-index selection.
/// Factory logs all survive; every other address keeps exactly one log.
pub fn coalesce_positions(logs: &[(Address, u64)]) -> Vec<usize> {
    let mut best: HashMap<Address, (u64, usize)> = HashMap::new();
    let mut factories: Vec<usize> = Vec::new();
    for (position, (address, index)) in logs.iter().enumerate() {
        if is_factory(address) {
            factories.push(position);
            continue;
        }
        let keep = best.get(address).map(|(prev, _)| *prev < *index).unwrap_or(true);
        if keep {
            best.insert(*address, (*index, position));
        }
    }
    let mut positions: Vec<usize> = factories;
    positions.extend(best.values().map(|(_, position)| *position));
    positions.sort_unstable();
    positions
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::address;
    use arb_core::constants::UNISWAP_V2_FACTORY;

    #[test]
    fn highest_index_wins_per_pool() {
        let pool = address!("0000000000000000000000000000000000000001");
        // Swap at index 5, Mint at index 12: only the Mint survives.
        let logs = vec![(pool, 5u64), (pool, 12u64)];
        assert_eq!(coalesce_positions(&logs), vec![1]);
    }

    #[test]
    fn coalescing_spans_whole_batch_regardless_of_order() {
        let pool = address!("0000000000000000000000000000000000000002");
        let logs = vec![(pool, 12u64), (pool, 5u64), (pool, 9u64)];
        assert_eq!(coalesce_positions(&logs), vec![0]);
    }

    #[test]
    fn factory_logs_are_never_coalesced() {
        let pool = address!("0000000000000000000000000000000000000003");
        let logs = vec![
            (UNISWAP_V2_FACTORY, 1u64),
            (UNISWAP_V2_FACTORY, 2u64),
            (pool, 3u64),
            (pool, 4u64),
        ];
        assert_eq!(coalesce_positions(&logs), vec![0, 1, 3]);
    }

    #[test]
    fn independent_pools_each_keep_one_log() {
        let a = address!("0000000000000000000000000000000000000004");
        let b = address!("0000000000000000000000000000000000000005");
        let logs = vec![(a, 1u64), (b, 2u64), (a, 3u64)];
        assert_eq!(coalesce_positions(&logs), vec![1, 2]);
    }

    #[test]
    fn oversized_delta_saturates_instead_of_wrapping() {
        assert_eq!(to_signed(U256::MAX), I256::MAX);
        assert_eq!(to_signed(U256::from(7u64)), I256::try_from(7i64).unwrap());
    }
}
