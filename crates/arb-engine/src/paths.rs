//! Cycle enumeration over the pool graph. Five families, all starting and
//! ending in WETH, each seeded by the block's affected pools so only paths a
//! reserve change could have opened are considered.
//!
//! The inner scans run against `token -> pools` multimaps; the triangular
//! families would be cubic over flat lists and miss the per-block deadline at
//! mainnet pool counts.

use alloy_primitives::Address;
use arb_core::types::Pool;
use futures::future::join_all;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Instant;
use tracing::debug;

/// Outer loops are spread over a bounded pool of workers instead of one task
/// per pool; `|W|` alone can reach thousands.
fn worker_count() -> usize {
    std::thread::available_parallelism().map(|n| n.get()).unwrap_or(4) * 2
}

struct SearchIndex {
    /// Enabled-pool snapshot (`P`).
    pools: Vec<Pool>,
    /// Indices into `pools` of pools containing WETH (`W`).
    weth: Vec<usize>,
    /// Non-WETH token of a `W` pool -> indices into `pools`.
    weth_by_token: HashMap<Address, Vec<usize>>,
    /// Either token -> indices into `pools`.
    all_by_token: HashMap<Address, Vec<usize>>,
    /// This block's affected pools (`A`), as mutated.
    affected: Vec<Pool>,
    /// Either token -> indices into `affected`.
    affected_by_token: HashMap<Address, Vec<usize>>,
    /// Indices into `affected` of pools containing WETH.
    affected_weth: Vec<usize>,
    /// Non-WETH token of an affected WETH pool -> indices into `affected`.
    affected_weth_by_token: HashMap<Address, Vec<usize>>,
}

impl SearchIndex {
    fn build(pools: Vec<Pool>, affected: Vec<Pool>) -> Self {
        let mut weth = Vec::new();
        let mut weth_by_token: HashMap<Address, Vec<usize>> = HashMap::new();
        let mut all_by_token: HashMap<Address, Vec<usize>> = HashMap::new();
        for (i, pool) in pools.iter().enumerate() {
            all_by_token.entry(pool.token0).or_default().push(i);
            all_by_token.entry(pool.token1).or_default().push(i);
            if let Some(counter) = pool.weth_counter_token() {
                weth.push(i);
                weth_by_token.entry(counter).or_default().push(i);
            }
        }

        let mut affected_by_token: HashMap<Address, Vec<usize>> = HashMap::new();
        let mut affected_weth = Vec::new();
        let mut affected_weth_by_token: HashMap<Address, Vec<usize>> = HashMap::new();
        for (i, pool) in affected.iter().enumerate() {
            affected_by_token.entry(pool.token0).or_default().push(i);
            affected_by_token.entry(pool.token1).or_default().push(i);
            if let Some(counter) = pool.weth_counter_token() {
                affected_weth.push(i);
                affected_weth_by_token.entry(counter).or_default().push(i);
            }
        }

        Self {
            pools,
            weth,
            weth_by_token,
            all_by_token,
            affected,
            affected_by_token,
            affected_weth,
            affected_weth_by_token,
        }
    }

    /// WETH -> T -> WETH where the second hop is an affected pool.
    fn double_first(&self, w: usize) -> Vec<Vec<Address>> {
        let p1 = &self.pools[w];
        let Some(t1) = p1.weth_counter_token() else { return Vec::new() };
        let mut out = Vec::new();
        if let Some(candidates) = self.affected_weth_by_token.get(&t1) {
            for &a in candidates {
                let p2 = &self.affected[a];
                if p2.address != p1.address {
                    out.push(vec![p1.address, p2.address]);
                }
            }
        }
        out
    }

    /// WETH -> T -> WETH where the first hop is an affected pool.
    fn double_last(&self, a: usize) -> Vec<Vec<Address>> {
        let p1 = &self.affected[a];
        let Some(t1) = p1.weth_counter_token() else { return Vec::new() };
        let mut out = Vec::new();
        if let Some(candidates) = self.weth_by_token.get(&t1) {
            for &w in candidates {
                let p2 = &self.pools[w];
                if p2.address != p1.address {
                    out.push(vec![p1.address, p2.address]);
                }
            }
        }
        out
    }

    /// WETH -> T1 -> T2 -> WETH, affected pool first.
    fn triangular_first(&self, a: usize) -> Vec<Vec<Address>> {
        let p1 = &self.affected[a];
        let Some(t1) = p1.weth_counter_token() else { return Vec::new() };
        let mut out = Vec::new();
        let Some(mids) = self.all_by_token.get(&t1) else { return out };
        for &m in mids {
            let p2 = &self.pools[m];
            if p2.address == p1.address {
                continue;
            }
            let Some(t2) = p2.counter_token(t1) else { continue };
            if let Some(tails) = self.weth_by_token.get(&t2) {
                for &w in tails {
                    let p3 = &self.pools[w];
                    if p3.address != p1.address && p3.address != p2.address {
                        out.push(vec![p1.address, p2.address, p3.address]);
                    }
                }
            }
        }
        out
    }

    /// WETH -> T1 -> T2 -> WETH, affected pool in the middle.
    fn triangular_mid(&self, w: usize) -> Vec<Vec<Address>> {
        let p1 = &self.pools[w];
        let Some(t1) = p1.weth_counter_token() else { return Vec::new() };
        let mut out = Vec::new();
        let Some(mids) = self.affected_by_token.get(&t1) else { return out };
        for &a in mids {
            let p2 = &self.affected[a];
            if p2.address == p1.address {
                continue;
            }
            let Some(t2) = p2.counter_token(t1) else { continue };
            if let Some(tails) = self.weth_by_token.get(&t2) {
                for &tail in tails {
                    let p3 = &self.pools[tail];
                    if p3.address != p1.address && p3.address != p2.address {
                        out.push(vec![p1.address, p2.address, p3.address]);
                    }
                }
            }
        }
        out
    }

    /// WETH -> T1 -> T2 -> WETH, affected pool last.
    fn triangular_last(&self, w: usize) -> Vec<Vec<Address>> {
        let p1 = &self.pools[w];
        let Some(t1) = p1.weth_counter_token() else { return Vec::new() };
        let mut out = Vec::new();
        let Some(mids) = self.all_by_token.get(&t1) else { return out };
        for &m in mids {
            let p2 = &self.pools[m];
            if p2.address == p1.address {
                continue;
            }
            let Some(t2) = p2.counter_token(t1) else { continue };
            if let Some(tails) = self.affected_weth_by_token.get(&t2) {
                for &a in tails {
                    let p3 = &self.affected[a];
                    if p3.address != p1.address && p3.address != p2.address {
                        out.push(vec![p1.address, p2.address, p3.address]);
                    }
                }
            }
        }
        out
    }
}

/// Enumerate all five families in parallel and return the deduplicated union
/// of ordered paths.
pub async fn find_paths(enabled: Vec<Pool>, affected: Vec<Pool>) -> Vec<Vec<Address>> {
    let index = Arc::new(SearchIndex::build(enabled, affected));

    let families = tokio::join!(
        run_family("double_first", Arc::clone(&index), index.weth.clone(), SearchIndex::double_first),
        run_family("double_last", Arc::clone(&index), index.affected_weth.clone(), SearchIndex::double_last),
        run_family(
            "triangular_first",
            Arc::clone(&index),
            index.affected_weth.clone(),
            SearchIndex::triangular_first,
        ),
        run_family("triangular_mid", Arc::clone(&index), index.weth.clone(), SearchIndex::triangular_mid),
        run_family("triangular_last", Arc::clone(&index), index.weth.clone(), SearchIndex::triangular_last),
    );
    let (f1, f2, f3, f4, f5) = families;

    let mut seen: HashSet<Vec<Address>> = HashSet::new();
    let mut paths = Vec::new();
    for family in [f1, f2, f3, f4, f5] {
        for path in family {
            if seen.insert(path.clone()) {
                paths.push(path);
            }
        }
    }
    paths
}

/// Run one family's outer loop chunked across the worker pool.
async fn run_family(
    name: &'static str,
    index: Arc<SearchIndex>,
    outer: Vec<usize>,
    per_pool: fn(&SearchIndex, usize) -> Vec<Vec<Address>>,
) -> Vec<Vec<Address>> {
    let started = Instant::now();
    if outer.is_empty() {
        return Vec::new();
    }

    let workers = worker_count();
    let chunk_size = outer.len().div_ceil(workers);
    let mut handles = Vec::new();
    for chunk in outer.chunks(chunk_size) {
        let index = Arc::clone(&index);
        let chunk = chunk.to_vec();
        handles.push(tokio::spawn(async move {
            let mut found = Vec::new();
            for item in chunk {
                found.extend(per_pool(&index, item));
            }
            found
        }));
    }

    let mut paths = Vec::new();
    for result in join_all(handles).await {
        if let Ok(found) = result {
            paths.extend(found);
        }
    }
    debug!(family = name, paths = paths.len(), elapsed_ms = started.elapsed().as_millis() as u64, "family searched");
    paths
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::{address, U256};
    use arb_core::constants::{WETH_ADDRESS, WETH_LIQUIDITY_FLOOR};

    fn weth_pool(n: u8, token: Address) -> Pool {
        let mut pool = Pool::new_v2(pool_addr(n), WETH_ADDRESS, token);
        pool.reserve0 = WETH_LIQUIDITY_FLOOR;
        pool.reserve1 = U256::from(1_000_000u64);
        pool.recompute_enabled();
        pool
    }

    fn plain_pool(n: u8, token0: Address, token1: Address) -> Pool {
        let mut pool = Pool::new_v2(pool_addr(n), token0, token1);
        pool.reserve0 = U256::from(1_000u64);
        pool.reserve1 = U256::from(1_000u64);
        pool.recompute_enabled();
        pool
    }

    fn pool_addr(n: u8) -> Address {
        let mut bytes = [0u8; 20];
        bytes[19] = n;
        Address::from(bytes)
    }

    fn t1() -> Address {
        address!("00000000000000000000000000000000000000a1")
    }

    fn t2() -> Address {
        address!("00000000000000000000000000000000000000a2")
    }

    #[tokio::test]
    async fn triangular_mid_finds_the_cycle_exactly_once() {
        // W = {pool1(WETH,T1), pool3(WETH,T2)}, pool2(T1,T2) affected. The
        // cycle pool1->pool2->pool3 must come out exactly once; its reversal
        // is the same cycle walked the other way and is also legitimate.
        let pool1 = weth_pool(1, t1());
        let pool2 = plain_pool(2, t1(), t2());
        let pool3 = weth_pool(3, t2());
        let enabled = vec![pool1.clone(), pool2.clone(), pool3.clone()];

        let paths = find_paths(enabled, vec![pool2.clone()]).await;
        let forward = vec![pool1.address, pool2.address, pool3.address];
        let backward = vec![pool3.address, pool2.address, pool1.address];
        assert_eq!(paths.iter().filter(|p| **p == forward).count(), 1);
        assert!(paths.iter().all(|p| *p == forward || *p == backward));
    }

    #[tokio::test]
    async fn double_paths_come_out_in_both_orders() {
        // Two WETH/T1 pools, one affected: the cycle exists in both
        // directions and each ordered tuple appears exactly once.
        let pool1 = weth_pool(1, t1());
        let pool2 = weth_pool(2, t1());
        let enabled = vec![pool1.clone(), pool2.clone()];

        let mut paths = find_paths(enabled, vec![pool2.clone()]).await;
        paths.sort();
        assert_eq!(
            paths,
            vec![
                vec![pool1.address, pool2.address],
                vec![pool2.address, pool1.address],
            ]
        );
    }

    #[tokio::test]
    async fn every_path_touches_an_affected_pool_and_never_repeats() {
        let pool1 = weth_pool(1, t1());
        let pool2 = plain_pool(2, t1(), t2());
        let pool3 = weth_pool(3, t2());
        let pool4 = weth_pool(4, t1());
        let enabled = vec![pool1.clone(), pool2.clone(), pool3.clone(), pool4.clone()];
        let affected = vec![pool2.clone(), pool4.clone()];
        let affected_addrs: HashSet<Address> = affected.iter().map(|p| p.address).collect();

        let paths = find_paths(enabled.clone(), affected).await;
        assert!(!paths.is_empty());
        let by_addr: HashMap<Address, &Pool> = enabled.iter().map(|p| (p.address, p)).collect();
        for path in &paths {
            // P7: seeded by an affected pool.
            assert!(path.iter().any(|a| affected_addrs.contains(a)), "unseeded path {path:?}");
            // P6: no repeats.
            let unique: HashSet<_> = path.iter().collect();
            assert_eq!(unique.len(), path.len(), "repeated pool in {path:?}");
            // P5: starts and ends at WETH pools.
            assert!(by_addr[path.first().unwrap()].contains_weth());
            assert!(by_addr[path.last().unwrap()].contains_weth());
        }
    }

    #[tokio::test]
    async fn union_is_deduplicated() {
        let pool1 = weth_pool(1, t1());
        let pool2 = weth_pool(2, t1());
        // Both pools affected: double_first and double_last both produce the
        // same tuples, the union must carry each once.
        let enabled = vec![pool1.clone(), pool2.clone()];
        let paths = find_paths(enabled, vec![pool1.clone(), pool2.clone()]).await;

        let unique: HashSet<_> = paths.iter().cloned().collect();
        assert_eq!(unique.len(), paths.len());
        assert_eq!(paths.len(), 2);
    }

    #[tokio::test]
    async fn no_affected_pools_means_no_paths() {
        let enabled = vec![weth_pool(1, t1()), weth_pool(2, t1())];
        assert!(find_paths(enabled, Vec::new()).await.is_empty());
    }
}
