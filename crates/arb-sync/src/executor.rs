//! Client for the deployed arbitrage executor contract. Reads are plain
//! `eth_call`s against the primary endpoint; the calldata for the one
//! state-changing method is built here and signed/submitted by the engine.

use alloy::network::{EthereumWallet, TransactionBuilder};
use alloy::rpc::types::TransactionRequest;
use alloy::signers::local::PrivateKeySigner;
use alloy_primitives::{Address, U256};
use alloy_sol_types::SolCall;
use arb_core::contracts::{
    getReservesCall, multiGetReservesCall, multiQuoteCall, startArbitrageCall, QuoteParams,
    ReserveParams,
};
use arb_core::{BotError, Result};
use std::sync::Arc;
use tracing::info;

use crate::provider::ProviderManager;

pub struct ExecutorClient {
    provider: Arc<ProviderManager>,
    address: Address,
}

impl ExecutorClient {
    pub fn new(provider: Arc<ProviderManager>, address: Address) -> Self {
        Self { provider, address }
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub async fn get_reserves(&self, params: ReserveParams) -> Result<[U256; 2]> {
        let data = getReservesCall { params }.abi_encode();
        let out = self.provider.call(self.address, data.into()).await?;
        getReservesCall::abi_decode_returns(&out)
            .map_err(|e| BotError::Rpc(format!("getReserves: {e}")))
    }

    pub async fn multi_get_reserves(&self, params: Vec<ReserveParams>) -> Result<Vec<[U256; 2]>> {
        let data = multiGetReservesCall { params }.abi_encode();
        let out = self.provider.call(self.address, data.into()).await?;
        multiGetReservesCall::abi_decode_returns(&out)
            .map_err(|e| BotError::Rpc(format!("multiGetReserves: {e}")))
    }

    /// Price a batch of probes. Each inner vector holds the hop-by-hop
    /// amounts out; the final element is the WETH returned.
    pub async fn multi_quote(&self, params: Vec<QuoteParams>) -> Result<Vec<Vec<U256>>> {
        let data = multiQuoteCall { params }.abi_encode();
        let out = self
            .provider
            .call(self.address, data.into())
            .await
            .map_err(|e| BotError::Quote(e.to_string()))?;
        multiQuoteCall::abi_decode_returns(&out).map_err(|e| BotError::Quote(e.to_string()))
    }

    pub fn start_arbitrage_calldata(
        token: Address,
        amount: U256,
        pools: Vec<Address>,
        pool_types: Vec<U256>,
        min_out: U256,
        bribe_pct: U256,
    ) -> Vec<u8> {
        startArbitrageCall { token, amount, pools, poolTypes: pool_types, minOut: min_out, bribePct: bribe_pct }
            .abi_encode()
    }

    /// Deploy a fresh executor from creation bytecode and bind to it. Used
    /// only when no `MEV_ADDRESS` is configured.
    pub async fn deploy(
        provider: Arc<ProviderManager>,
        signer: &PrivateKeySigner,
        chain_id: u64,
        bytecode: Vec<u8>,
    ) -> Result<Self> {
        let (max_fee, priority_fee) = provider.estimate_fees().await?;
        let nonce = provider.nonce(signer.address()).await?;

        let mut tx = TransactionRequest::default()
            .with_deploy_code(bytecode)
            .with_nonce(nonce)
            .with_chain_id(chain_id)
            .with_max_fee_per_gas(max_fee)
            .with_max_priority_fee_per_gas(priority_fee);
        let gas = provider.estimate_gas(tx.clone()).await?;
        tx.set_gas_limit(gas);

        let wallet = EthereumWallet::from(signer.clone());
        let signed = tx
            .build(&wallet)
            .await
            .map_err(|e| BotError::Submission(format!("sign deployment: {e}")))?;

        use alloy::eips::Encodable2718;
        let receipt = provider.send_deployment(&signed.encoded_2718()).await?;
        let address = receipt
            .contract_address
            .ok_or_else(|| BotError::Rpc("deployment receipt missing contract address".into()))?;
        info!(contract = %address, "executor contract deployed");
        Ok(Self { provider, address })
    }
}
