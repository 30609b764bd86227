use alloy_primitives::{Address, U256};

use crate::constants::WETH_ADDRESS;
use crate::types::PoolKind;

/// Outcome of pricing one candidate cycle. Produced per block, never
/// persisted.
#[derive(Debug, Clone)]
pub struct ArbitrageCandidate {
    /// Ordered pool addresses, two or three of them.
    pub path: Vec<Address>,
    /// Pool family per hop, aligned with `path`.
    pub kinds: Vec<PoolKind>,
    pub borrow_token: Address,
    pub borrow_amount: U256,
    pub amount_out: U256,
    pub profit: U256,
    /// Profit over borrow, in percent.
    pub ratio: f64,
    pub valid: bool,
}

impl ArbitrageCandidate {
    /// A candidate with no profitable probe (or no probe at all).
    pub fn invalid(path: Vec<Address>, kinds: Vec<PoolKind>) -> Self {
        Self {
            path,
            kinds,
            borrow_token: WETH_ADDRESS,
            borrow_amount: U256::ZERO,
            amount_out: U256::ZERO,
            profit: U256::ZERO,
            ratio: 0.0,
            valid: false,
        }
    }

    /// "addr1->addr2[->addr3]" form used for dedup keys, logs and
    /// notifications.
    pub fn display_path(&self) -> String {
        display_path(&self.path)
    }

    /// Executor-contract tags per hop.
    pub fn type_tags(&self) -> Vec<U256> {
        self.kinds.iter().map(|k| k.type_tag()).collect()
    }
}

pub fn display_path(path: &[Address]) -> String {
    path.iter().map(|a| a.to_string()).collect::<Vec<_>>().join("->")
}

/// Percentage ratio of profit to borrow, carried at basis-point precision.
pub fn profit_ratio(profit: U256, borrow: U256) -> f64 {
    if borrow.is_zero() {
        return 0.0;
    }
    let bps = profit.saturating_mul(U256::from(10_000u64)) / borrow;
    let bps = if bps > U256::from(u64::MAX) { u64::MAX } else { bps.to::<u64>() };
    bps as f64 / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::address;

    #[test]
    fn ratio_is_percent_of_borrow() {
        assert_eq!(profit_ratio(U256::from(5u64), U256::from(100u64)), 5.0);
        assert_eq!(profit_ratio(U256::from(1u64), U256::from(400u64)), 0.25);
        assert_eq!(profit_ratio(U256::ZERO, U256::ZERO), 0.0);
    }

    #[test]
    fn path_renders_as_arrow_chain() {
        let a = address!("0000000000000000000000000000000000000001");
        let b = address!("0000000000000000000000000000000000000002");
        let rendered = display_path(&[a, b]);
        assert!(rendered.contains("->"));
        assert_eq!(rendered.split("->").count(), 2);
    }
}
