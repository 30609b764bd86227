//! Authoritative pool table. All reserve mutations flow through here so the
//! enable invariant is enforced in one place, never by callers.

use alloy_primitives::{Address, I256, U256};
use arb_core::constants::INITIAL_DEPLOYMENT_BLOCK;
use arb_core::types::Pool;
use arb_core::Result;
use dashmap::DashMap;
use std::collections::HashMap;
use std::path::Path;
use tokio::sync::RwLock;
use tracing::info;

use crate::snapshot::{self, SnapshotFile};

/// Thread-safe pool registry with a monotone block watermark.
#[derive(Debug)]
pub struct PoolRegistry {
    pools: DashMap<Address, Pool>,
    /// Highest block whose events have been applied; the bootstrap replay
    /// point on restart.
    last_seen_block: RwLock<u64>,
}

impl PoolRegistry {
    pub fn new() -> Self {
        Self {
            pools: DashMap::new(),
            last_seen_block: RwLock::new(INITIAL_DEPLOYMENT_BLOCK),
        }
    }

    /// Restore from a persisted snapshot, or start empty at the initial
    /// deployment block when none exists.
    pub fn load(path: &Path) -> Result<Self> {
        let (pools, last_seen_block) = match snapshot::read(path)? {
            Some(file) => (file.pools, file.last_seen_block),
            None => (HashMap::new(), INITIAL_DEPLOYMENT_BLOCK),
        };
        info!(pools = pools.len(), last_seen_block, "registry restored");
        let registry = Self {
            pools: DashMap::with_capacity(pools.len()),
            last_seen_block: RwLock::new(last_seen_block),
        };
        for (address, pool) in pools {
            registry.pools.insert(address, pool);
        }
        Ok(registry)
    }

    pub fn get(&self, address: &Address) -> Option<Pool> {
        self.pools.get(address).map(|p| p.clone())
    }

    pub fn contains(&self, address: &Address) -> bool {
        self.pools.contains_key(address)
    }

    pub fn len(&self) -> usize {
        self.pools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pools.is_empty()
    }

    /// Insert or replace a pool. Tokens must differ; a degenerate record is
    /// dropped rather than poisoning path search. An existing ban survives
    /// the replacement.
    pub fn upsert(&self, mut pool: Pool) {
        if pool.token0 == pool.token1 {
            return;
        }
        if let Some(existing) = self.pools.get(&pool.address) {
            pool.banned = pool.banned || existing.banned;
        }
        pool.recompute_enabled();
        self.pools.insert(pool.address, pool);
    }

    /// Apply signed reserve deltas. A delta that would drive a reserve below
    /// zero clamps to zero, which the enable predicate then turns off.
    /// Returns the updated pool, or `None` for an unknown address.
    pub fn apply_delta(&self, address: &Address, delta0: I256, delta1: I256) -> Option<Pool> {
        let mut entry = self.pools.get_mut(address)?;
        entry.reserve0 = apply_signed(entry.reserve0, delta0);
        entry.reserve1 = apply_signed(entry.reserve1, delta1);
        entry.recompute_enabled();
        Some(entry.clone())
    }

    /// Replace both reserves with absolute values (v2 `Sync` semantics).
    pub fn set_reserves(&self, address: &Address, reserve0: U256, reserve1: U256) -> Option<Pool> {
        let mut entry = self.pools.get_mut(address)?;
        entry.reserve0 = reserve0;
        entry.reserve1 = reserve1;
        entry.recompute_enabled();
        Some(entry.clone())
    }

    /// Force-disable a pool reported malicious by the executor. Sticky: no
    /// later reserve change re-enables it.
    pub fn disable(&self, address: &Address) -> bool {
        match self.pools.get_mut(address) {
            Some(mut entry) => {
                entry.banned = true;
                entry.enabled = false;
                true
            }
            None => false,
        }
    }

    /// Every tracked pool, cloned. The bootstrap refresh walks the full
    /// table, disabled pools included, so stale entries can come back.
    pub fn all_pools(&self) -> Vec<Pool> {
        self.pools.iter().map(|e| e.value().clone()).collect()
    }

    /// Every enabled pool, cloned. Path search runs over this snapshot while
    /// the block handler stays quiet, so readers never observe mid-block
    /// mutation.
    pub fn enabled_pools(&self) -> Vec<Pool> {
        self.pools.iter().filter(|e| e.enabled).map(|e| e.value().clone()).collect()
    }

    /// Addresses worth watching for logs.
    pub fn enabled_addresses(&self) -> Vec<Address> {
        self.pools.iter().filter(|e| e.enabled).map(|e| *e.key()).collect()
    }

    pub async fn watermark(&self) -> u64 {
        *self.last_seen_block.read().await
    }

    /// Advance the watermark; regressions are ignored so the replay point
    /// only ever moves forward.
    pub async fn advance_watermark(&self, block: u64) {
        let mut guard = self.last_seen_block.write().await;
        if block > *guard {
            *guard = block;
        }
    }

    /// Persist the full table plus watermark atomically.
    pub async fn snapshot(&self, path: &Path) -> Result<()> {
        let pools: HashMap<Address, Pool> =
            self.pools.iter().map(|e| (*e.key(), e.value().clone())).collect();
        let last_seen_block = *self.last_seen_block.read().await;
        snapshot::write_atomic(path, &SnapshotFile { pools, last_seen_block })?;
        info!(pools = self.pools.len(), last_seen_block, "snapshot written");
        Ok(())
    }
}

impl Default for PoolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn apply_signed(reserve: U256, delta: I256) -> U256 {
    if delta.is_negative() {
        reserve.saturating_sub(delta.unsigned_abs())
    } else {
        reserve.saturating_add(delta.unsigned_abs())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::address;
    use arb_core::constants::{WETH_ADDRESS, WETH_LIQUIDITY_FLOOR};

    fn registry_with(pool: Pool) -> PoolRegistry {
        let registry = PoolRegistry::new();
        registry.upsert(pool);
        registry
    }

    fn plain_pool(addr: Address, r0: u64, r1: u64) -> Pool {
        let mut pool = Pool::new_v2(
            addr,
            address!("00000000000000000000000000000000000000aa"),
            address!("00000000000000000000000000000000000000bb"),
        );
        pool.reserve0 = U256::from(r0);
        pool.reserve1 = U256::from(r1);
        pool
    }

    #[test]
    fn sync_replaces_reserves_absolutely() {
        let addr = address!("0000000000000000000000000000000000000001");
        let registry = registry_with(plain_pool(addr, 100, 200));

        let updated = registry.set_reserves(&addr, U256::from(500u64), U256::from(700u64)).unwrap();
        assert_eq!(updated.reserve0, U256::from(500u64));
        assert_eq!(updated.reserve1, U256::from(700u64));
        assert!(updated.enabled);
    }

    #[test]
    fn swap_below_weth_floor_disables() {
        let addr = address!("0000000000000000000000000000000000000002");
        let mut pool = Pool::new_v2(
            addr,
            WETH_ADDRESS,
            address!("00000000000000000000000000000000000000bb"),
        );
        pool.reserve0 = WETH_LIQUIDITY_FLOOR;
        pool.reserve1 = U256::from(1_000u64);
        let registry = registry_with(pool);
        assert!(registry.get(&addr).unwrap().enabled);

        // Pool pays out half its WETH side.
        let half = I256::try_from(5_000_000_000_000_000_000i128).unwrap();
        let updated = registry.apply_delta(&addr, -half, I256::try_from(7i64).unwrap()).unwrap();
        assert_eq!(updated.reserve0, WETH_LIQUIDITY_FLOOR - half.unsigned_abs());
        assert!(!updated.enabled);
    }

    #[test]
    fn negative_delta_clamps_to_zero_and_disables() {
        let addr = address!("0000000000000000000000000000000000000003");
        let registry = registry_with(plain_pool(addr, 10, 10));

        let updated = registry
            .apply_delta(&addr, I256::try_from(-100i64).unwrap(), I256::ZERO)
            .unwrap();
        assert_eq!(updated.reserve0, U256::ZERO);
        assert!(!updated.enabled);
    }

    #[test]
    fn reserves_recovering_re_enables() {
        let addr = address!("0000000000000000000000000000000000000004");
        let registry = registry_with(plain_pool(addr, 10, 10));
        let _ = registry.set_reserves(&addr, U256::ZERO, U256::from(10u64));
        assert!(!registry.get(&addr).unwrap().enabled);

        let _ = registry.set_reserves(&addr, U256::from(10u64), U256::from(10u64));
        assert!(registry.get(&addr).unwrap().enabled);
    }

    #[test]
    fn disable_is_sticky_across_mutations_and_upserts() {
        let addr = address!("0000000000000000000000000000000000000005");
        let registry = registry_with(plain_pool(addr, 10, 10));

        assert!(registry.disable(&addr));
        let _ = registry.set_reserves(&addr, U256::from(100u64), U256::from(100u64));
        assert!(!registry.get(&addr).unwrap().enabled);

        // A creation-event replay must not launder the ban away.
        registry.upsert(plain_pool(addr, 100, 100));
        assert!(!registry.get(&addr).unwrap().enabled);
        assert!(registry.get(&addr).unwrap().banned);
    }

    #[test]
    fn degenerate_pair_is_rejected() {
        let registry = PoolRegistry::new();
        let token = address!("00000000000000000000000000000000000000aa");
        let mut pool =
            Pool::new_v2(address!("0000000000000000000000000000000000000006"), token, token);
        pool.reserve0 = U256::from(1u64);
        pool.reserve1 = U256::from(1u64);
        registry.upsert(pool);
        assert!(registry.is_empty());
    }

    #[test]
    fn unknown_address_mutations_are_noops() {
        let registry = PoolRegistry::new();
        let addr = address!("0000000000000000000000000000000000000007");
        assert!(registry.apply_delta(&addr, I256::ZERO, I256::ZERO).is_none());
        assert!(registry.set_reserves(&addr, U256::ZERO, U256::ZERO).is_none());
        assert!(!registry.disable(&addr));
    }

    #[tokio::test]
    async fn watermark_is_monotone() {
        let registry = PoolRegistry::new();
        let start = registry.watermark().await;

        registry.advance_watermark(start + 10).await;
        assert_eq!(registry.watermark().await, start + 10);

        registry.advance_watermark(start + 5).await;
        assert_eq!(registry.watermark().await, start + 10);
    }
}
