//! Per-path borrow-size sweep. Twenty probe sizes scale with the first
//! pool's WETH reserve; all twenty are priced in one `multiQuote` call and
//! the most profitable probe wins.

use alloy_primitives::{Address, U256};
use arb_core::constants::{PROBE_COUNT, UNISWAP_V3_QUOTER, WETH_ADDRESS};
use arb_core::contracts::QuoteParams;
use arb_core::types::{profit_ratio, ArbitrageCandidate, Pool, PoolKind};
use std::collections::HashMap;
use tracing::debug;

use arb_sync::ExecutorClient;

/// Borrow sizes for a path entered through `first`: `reserve * i / 100` for
/// i in 1..=20, where `reserve` is the WETH side.
pub fn probe_amounts(first: &Pool) -> Vec<U256> {
    let Some(reserve) = first.weth_reserve() else { return Vec::new() };
    (1..=PROBE_COUNT)
        .map(|i| reserve.saturating_mul(U256::from(i)) / U256::from(100u64))
        .collect()
}

/// The argmax-profit probe: `(amount, amount_out, profit)` with strictly
/// positive profit, or `None` when every probe loses money.
pub fn best_probe(amounts: &[U256], outcomes: &[Vec<U256>]) -> Option<(U256, U256, U256)> {
    let mut best: Option<(U256, U256, U256)> = None;
    for (amount, outcome) in amounts.iter().zip(outcomes) {
        let Some(&returned) = outcome.last() else { continue };
        let Some(profit) = returned.checked_sub(*amount) else { continue };
        if profit.is_zero() {
            continue;
        }
        if best.map(|(_, _, top)| profit > top).unwrap_or(true) {
            best = Some((*amount, returned, profit));
        }
    }
    best
}

/// Price one candidate path. Any failure (unknown pool, quote revert,
/// malformed response) yields an invalid candidate, never an error; a bad
/// path must not sink the rest of the block's work.
pub async fn sweep_path(
    executor: &ExecutorClient,
    pools_by_address: &HashMap<Address, Pool>,
    path: Vec<Address>,
) -> ArbitrageCandidate {
    let mut pools = Vec::with_capacity(path.len());
    for address in &path {
        match pools_by_address.get(address) {
            Some(pool) => pools.push(pool.clone()),
            None => return ArbitrageCandidate::invalid(path, Vec::new()),
        }
    }
    let kinds: Vec<PoolKind> = pools.iter().map(|p| p.kind).collect();

    let amounts = probe_amounts(&pools[0]);
    if amounts.is_empty() {
        return ArbitrageCandidate::invalid(path, kinds);
    }

    let quoters: Vec<Address> = kinds
        .iter()
        .map(|kind| match kind {
            PoolKind::V2 => Address::ZERO,
            PoolKind::V3 => UNISWAP_V3_QUOTER,
        })
        .collect();
    let params: Vec<QuoteParams> = amounts
        .iter()
        .map(|amount| QuoteParams {
            pools: path.clone(),
            quoters: quoters.clone(),
            amount: *amount,
            tokenIn: WETH_ADDRESS,
        })
        .collect();

    let outcomes = match executor.multi_quote(params).await {
        Ok(outcomes) => outcomes,
        Err(e) => {
            debug!(path = %arb_core::types::display_path(&path), error = %e, "quote failed");
            return ArbitrageCandidate::invalid(path, kinds);
        }
    };

    match best_probe(&amounts, &outcomes) {
        Some((borrow_amount, amount_out, profit)) => ArbitrageCandidate {
            ratio: profit_ratio(profit, borrow_amount),
            borrow_token: WETH_ADDRESS,
            borrow_amount,
            amount_out,
            profit,
            valid: true,
            path,
            kinds,
        },
        None => ArbitrageCandidate::invalid(path, kinds),
    }
}
