//! Process-wide chain constants. These are fixed mainnet deployments, not
//! tunables; anything an operator may want to change lives in [`crate::config`].

use alloy_primitives::{address, Address, U256};

use crate::types::PoolKind;

/// Wrapped native asset, the reference currency every cycle starts and ends in.
pub const WETH_ADDRESS: Address = address!("C02aaA39b223FE8D0A0e5C4F27eAD9083C756Cc2");

/// Uniswap v2 factory.
pub const UNISWAP_V2_FACTORY: Address = address!("5C69bEe701ef814a2B6a3EDD4B1652CB9cc5aA6f");

/// Uniswap v3 factory.
pub const UNISWAP_V3_FACTORY: Address = address!("1F98431c8aD98523631AE4a59f267346ea31F984");

/// Uniswap v3 quoter, passed through to the executor contract for v3 hops.
pub const UNISWAP_V3_QUOTER: Address = address!("61fFE014bA17989E743c5F6cB21bF9697530B21e");

/// Deployment block of the v2 factory; the bootstrap scan never needs to look
/// further back than this.
pub const INITIAL_DEPLOYMENT_BLOCK: u64 = 10_000_835;

/// The factory set, tagged by pool family. Also serves as the membership
/// oracle when classifying logs (factory log vs pool log).
pub const POOL_FACTORIES: [(PoolKind, Address); 2] =
    [(PoolKind::V2, UNISWAP_V2_FACTORY), (PoolKind::V3, UNISWAP_V3_FACTORY)];

/// A pool with WETH on one side is only worth routing through if that side
/// holds at least 10 WETH (1e19 wei).
pub const WETH_LIQUIDITY_FLOOR: U256 = U256::from_limbs([10_000_000_000_000_000_000u64, 0, 0, 0]);

/// Share of profit paid to the block producer, in percent.
pub const BRIBE_PERCENT: u64 = 5;

/// Width of one factory-history scan window, in blocks.
pub const BOOTSTRAP_WINDOW_BLOCKS: u64 = 10_000;

/// How many scan windows are in flight at once per factory.
pub const BOOTSTRAP_WINDOW_CONCURRENCY: usize = 16;

/// Pools per `multiGetReserves` batch.
pub const RESERVE_BATCH_SIZE: usize = 2_000;

/// Addresses per `eth_getLogs` filter in the per-block pipeline.
pub const LOG_ADDRESS_BATCH: usize = 100_000;

/// Borrow sizes probed per candidate path: `reserve * i / 100` for i in 1..=20.
pub const PROBE_COUNT: u64 = 20;

pub fn is_factory(address: &Address) -> bool {
    POOL_FACTORIES.iter().any(|(_, f)| f == address)
}

pub fn factory_addresses() -> Vec<Address> {
    POOL_FACTORIES.iter().map(|(_, f)| *f).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn liquidity_floor_is_ten_weth() {
        let ten_pow_19 = U256::from(10u64).pow(U256::from(19u64));
        assert_eq!(WETH_LIQUIDITY_FLOOR, ten_pow_19);
    }

    #[test]
    fn factory_membership() {
        assert!(is_factory(&UNISWAP_V2_FACTORY));
        assert!(is_factory(&UNISWAP_V3_FACTORY));
        assert!(!is_factory(&WETH_ADDRESS));
    }
}
