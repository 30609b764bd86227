use alloy_primitives::{Address, U256};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::constants::{WETH_ADDRESS, WETH_LIQUIDITY_FLOOR};

/// Pool family: constant-product (v2) or concentrated-liquidity (v3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PoolKind {
    V2,
    V3,
}

impl PoolKind {
    /// Tag value the executor contract expects in `startArbitrage`.
    pub fn type_tag(&self) -> U256 {
        match self {
            PoolKind::V2 => U256::ZERO,
            PoolKind::V3 => U256::from(1u64),
        }
    }
}

impl fmt::Display for PoolKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PoolKind::V2 => write!(f, "v2"),
            PoolKind::V3 => write!(f, "v3"),
        }
    }
}

/// A tracked AMM pool. Reserves mirror on-chain state: exact for v2 (driven
/// by `Sync`), approximated by event deltas for v3.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pool {
    pub address: Address,
    pub token0: Address,
    pub token1: Address,
    pub reserve0: U256,
    pub reserve1: U256,
    /// v3 fee tier; absent for v2.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fee: Option<u32>,
    #[serde(rename = "type")]
    pub kind: PoolKind,
    pub enabled: bool,
    /// Set when an execution attempt reported the pool as malicious. A banned
    /// pool never re-enables, no matter what its reserves do.
    #[serde(default)]
    pub banned: bool,
}

impl Pool {
    pub fn new_v2(pair: Address, token0: Address, token1: Address) -> Self {
        Self {
            address: pair,
            token0,
            token1,
            reserve0: U256::ZERO,
            reserve1: U256::ZERO,
            fee: None,
            kind: PoolKind::V2,
            enabled: true,
            banned: false,
        }
    }

    pub fn new_v3(pool: Address, token0: Address, token1: Address, fee: u32) -> Self {
        Self {
            address: pool,
            token0,
            token1,
            reserve0: U256::ZERO,
            reserve1: U256::ZERO,
            fee: Some(fee),
            kind: PoolKind::V3,
            enabled: true,
            banned: false,
        }
    }

    /// Re-evaluate eligibility for path search: both reserves strictly
    /// positive, and any WETH side at or above the liquidity floor.
    pub fn recompute_enabled(&mut self) {
        self.enabled = !self.banned
            && self.reserve0 > U256::ZERO
            && self.reserve1 > U256::ZERO
            && (self.token0 != WETH_ADDRESS || self.reserve0 >= WETH_LIQUIDITY_FLOOR)
            && (self.token1 != WETH_ADDRESS || self.reserve1 >= WETH_LIQUIDITY_FLOOR);
    }

    pub fn contains_weth(&self) -> bool {
        self.token0 == WETH_ADDRESS || self.token1 == WETH_ADDRESS
    }

    /// The opposite side of `token`, if `token` is one of the pair.
    pub fn counter_token(&self, token: Address) -> Option<Address> {
        if self.token0 == token {
            Some(self.token1)
        } else if self.token1 == token {
            Some(self.token0)
        } else {
            None
        }
    }

    /// The non-WETH token of a WETH pool.
    pub fn weth_counter_token(&self) -> Option<Address> {
        self.counter_token(WETH_ADDRESS)
    }

    /// The WETH-side reserve of a WETH pool.
    pub fn weth_reserve(&self) -> Option<U256> {
        if self.token1 == WETH_ADDRESS {
            Some(self.reserve1)
        } else if self.token0 == WETH_ADDRESS {
            Some(self.reserve0)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::address;

    fn token_a() -> Address {
        address!("00000000000000000000000000000000000000aa")
    }

    fn token_b() -> Address {
        address!("00000000000000000000000000000000000000bb")
    }

    #[test]
    fn enable_requires_positive_reserves() {
        let mut pool =
            Pool::new_v2(address!("0000000000000000000000000000000000000001"), token_a(), token_b());
        pool.recompute_enabled();
        assert!(!pool.enabled);

        pool.reserve0 = U256::from(1u64);
        pool.reserve1 = U256::from(1u64);
        pool.recompute_enabled();
        assert!(pool.enabled);
    }

    #[test]
    fn weth_side_needs_the_floor() {
        let mut pool = Pool::new_v2(
            address!("0000000000000000000000000000000000000002"),
            WETH_ADDRESS,
            token_b(),
        );
        pool.reserve0 = WETH_LIQUIDITY_FLOOR - U256::from(1u64);
        pool.reserve1 = U256::from(1u64);
        pool.recompute_enabled();
        assert!(!pool.enabled);

        pool.reserve0 = WETH_LIQUIDITY_FLOOR;
        pool.recompute_enabled();
        assert!(pool.enabled);
    }

    #[test]
    fn banned_pool_never_re_enables() {
        let mut pool = Pool::new_v2(
            address!("0000000000000000000000000000000000000003"),
            token_a(),
            token_b(),
        );
        pool.reserve0 = U256::from(10u64);
        pool.reserve1 = U256::from(10u64);
        pool.banned = true;
        pool.recompute_enabled();
        assert!(!pool.enabled);
    }

    #[test]
    fn counter_token_and_weth_reserve() {
        let mut pool = Pool::new_v2(
            address!("0000000000000000000000000000000000000004"),
            token_a(),
            WETH_ADDRESS,
        );
        pool.reserve0 = U256::from(5u64);
        pool.reserve1 = U256::from(9u64);
        assert_eq!(pool.weth_counter_token(), Some(token_a()));
        assert_eq!(pool.weth_reserve(), Some(U256::from(9u64)));
        assert_eq!(pool.counter_token(token_b()), None);
    }

    #[test]
    fn serde_schema_matches_snapshot_document() {
        let pool = Pool::new_v3(
            address!("0000000000000000000000000000000000000005"),
            token_a(),
            token_b(),
            3000,
        );
        let json = serde_json::to_value(&pool).unwrap();
        assert_eq!(json["type"], "v3");
        assert_eq!(json["fee"], 3000);
        assert_eq!(json["enabled"], true);

        let v2 = Pool::new_v2(
            address!("0000000000000000000000000000000000000006"),
            token_a(),
            token_b(),
        );
        let json = serde_json::to_value(&v2).unwrap();
        assert_eq!(json["type"], "v2");
        assert!(json.get("fee").is_none());
    }
}
