//! Transaction build and submission. Every candidate is dry-run first: the
//! gas estimate doubles as a simulation, and the gas + bribe floor decides
//! whether the trade is worth sending at all.

use alloy::eips::Encodable2718;
use alloy::network::{EthereumWallet, TransactionBuilder};
use alloy::rpc::types::TransactionRequest;
use alloy::signers::local::PrivateKeySigner;
use alloy_primitives::{Address, B256, U256};
use arb_core::constants::BRIBE_PERCENT;
use arb_core::types::ArbitrageCandidate;
use arb_core::{BotError, Result};
use std::sync::Arc;

use arb_sync::{ExecutorClient, ProviderManager};

const MALICIOUS_POOL_MARKER: &str = "Malicious Pool: ";

/// A dispatched arbitrage transaction.
#[derive(Debug, Clone)]
pub struct Submitted {
    pub hash: B256,
    /// Worst-case gas spend: `gas_fee_cap * gas_limit`.
    pub gas_cost: U256,
    pub bribe: U256,
}

pub struct TxSubmitter {
    provider: Arc<ProviderManager>,
    executor_address: Address,
    signer: PrivateKeySigner,
    chain_id: u64,
}

impl TxSubmitter {
    pub fn new(
        provider: Arc<ProviderManager>,
        executor_address: Address,
        signer: PrivateKeySigner,
        chain_id: u64,
    ) -> Self {
        Self { provider, executor_address, signer, chain_id }
    }

    /// Dry-run, floor-check, sign, and relay one candidate.
    pub async fn submit(&self, candidate: &ArbitrageCandidate) -> Result<Submitted> {
        let calldata = ExecutorClient::start_arbitrage_calldata(
            candidate.borrow_token,
            candidate.borrow_amount,
            candidate.path.clone(),
            candidate.type_tags(),
            candidate.amount_out,
            U256::from(BRIBE_PERCENT),
        );

        let (max_fee, priority_fee) = self.provider.estimate_fees().await?;
        let nonce = self.provider.nonce(self.signer.address()).await?;

        let mut tx = TransactionRequest::default()
            .with_to(self.executor_address)
            .with_input(calldata)
            .with_nonce(nonce)
            .with_chain_id(self.chain_id)
            .with_max_fee_per_gas(max_fee)
            .with_max_priority_fee_per_gas(priority_fee);

        // The estimate is the dry run: a reverting path fails here before any
        // value is at risk.
        let gas = self
            .provider
            .estimate_gas(tx.clone())
            .await
            .map_err(|e| BotError::Submission(format!("dry run: {e}")))?;
        tx.set_gas_limit(gas);

        let gas_cost = U256::from(max_fee).saturating_mul(U256::from(gas));
        let bribe = candidate.profit.saturating_mul(U256::from(BRIBE_PERCENT)) / U256::from(100u64);
        if !clears_gas_floor(candidate.profit, gas_cost, bribe) {
            return Err(BotError::GasTooHigh);
        }

        let wallet = EthereumWallet::from(self.signer.clone());
        let signed = tx
            .build(&wallet)
            .await
            .map_err(|e| BotError::Submission(format!("sign: {e}")))?;
        let hash = self
            .provider
            .send_private(&signed.encoded_2718())
            .await
            .map_err(|e| BotError::Submission(e.to_string()))?;

        Ok(Submitted { hash, gas_cost, bribe })
    }
}

/// The trade only goes out if profit strictly exceeds worst-case gas plus
/// the producer bribe.
pub fn clears_gas_floor(profit: U256, gas_cost: U256, bribe: U256) -> bool {
    profit > gas_cost.saturating_add(bribe)
}

/// Extract the pool address from an execution rejection of the form
/// `... Malicious Pool: 0x<40 hex chars> ...`.
pub fn parse_malicious_pool(message: &str) -> Option<Address> {
    let start = message.find(MALICIOUS_POOL_MARKER)? + MALICIOUS_POOL_MARKER.len();
    let raw = message.get(start..start + 42)?;
    raw.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::address;

    #[test]
    fn parses_malicious_pool_address() {
        let message =
            "execution reverted: Malicious Pool: 0x5C69bEe701ef814a2B6a3EDD4B1652CB9cc5aA6f";
        assert_eq!(
            parse_malicious_pool(message),
            Some(address!("5C69bEe701ef814a2B6a3EDD4B1652CB9cc5aA6f"))
        );
    }

    #[test]
    fn ignores_other_rejections() {
        assert_eq!(parse_malicious_pool("execution reverted: InsufficientProfit"), None);
        assert_eq!(parse_malicious_pool("Malicious Pool: 0x123"), None);
        assert_eq!(parse_malicious_pool(""), None);
    }

    #[test]
    fn gas_floor_requires_strict_profit() {
        let profit = U256::from(100u64);
        assert!(clears_gas_floor(profit, U256::from(50u64), U256::from(5u64)));
        // profit - gas - bribe == 0 is a rejection, not break-even trading.
        assert!(!clears_gas_floor(profit, U256::from(95u64), U256::from(5u64)));
        assert!(!clears_gas_floor(profit, U256::from(100u64), U256::from(5u64)));
    }
}
