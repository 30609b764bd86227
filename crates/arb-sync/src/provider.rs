//! Typed façade over the four EVM endpoints: primary (reads, estimation,
//! deployment), history (archive log ranges), relay (final submission only)
//! and the websocket head subscription consumed by [`crate::blocks`].

use alloy::network::{Ethereum, TransactionBuilder};
use alloy::providers::{Provider, ProviderBuilder};
use alloy::rpc::types::{Filter, Log, TransactionReceipt, TransactionRequest};
use alloy_primitives::{Address, Bytes, B256};
use arb_core::{BotConfig, BotError, Result};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;

pub type BoxedProvider = Arc<dyn Provider<Ethereum> + Send + Sync>;

/// How long to wait for a deployment receipt before giving up.
const DEPLOY_RECEIPT_TIMEOUT: Duration = Duration::from_secs(180);

pub struct ProviderManager {
    primary: BoxedProvider,
    history: BoxedProvider,
    relay: BoxedProvider,
    ws_url: String,
    rpc_timeout: Duration,
}

impl ProviderManager {
    pub fn new(config: &BotConfig) -> Result<Self> {
        Ok(Self {
            primary: connect(&config.rpc_url)?,
            history: connect(&config.history_rpc_url)?,
            relay: connect(&config.relay_rpc_url)?,
            ws_url: config.ws_url.clone(),
            rpc_timeout: config.rpc_timeout,
        })
    }

    pub fn ws_url(&self) -> &str {
        &self.ws_url
    }

    pub async fn block_number(&self) -> Result<u64> {
        self.rpc("eth_blockNumber", self.primary.get_block_number()).await
    }

    pub async fn chain_id(&self) -> Result<u64> {
        self.rpc("eth_chainId", self.primary.get_chain_id()).await
    }

    pub async fn get_logs(&self, filter: &Filter) -> Result<Vec<Log>> {
        self.rpc("eth_getLogs", self.primary.get_logs(filter)).await
    }

    /// Log query against the archive endpoint; bootstrap ranges reach back
    /// further than most serving nodes retain.
    pub async fn get_logs_history(&self, filter: &Filter) -> Result<Vec<Log>> {
        self.rpc("eth_getLogs(history)", self.history.get_logs(filter)).await
    }

    pub async fn call(&self, to: Address, data: Bytes) -> Result<Bytes> {
        let tx = TransactionRequest::default().with_to(to).with_input(data);
        self.rpc("eth_call", self.primary.call(tx)).await
    }

    pub async fn estimate_gas(&self, tx: TransactionRequest) -> Result<u64> {
        self.rpc("eth_estimateGas", self.primary.estimate_gas(tx)).await
    }

    /// `(max_fee_per_gas, max_priority_fee_per_gas)`.
    pub async fn estimate_fees(&self) -> Result<(u128, u128)> {
        let estimate = self
            .rpc("eth_feeHistory", self.primary.estimate_eip1559_fees())
            .await?;
        Ok((estimate.max_fee_per_gas, estimate.max_priority_fee_per_gas))
    }

    pub async fn nonce(&self, address: Address) -> Result<u64> {
        self.rpc("eth_getTransactionCount", self.primary.get_transaction_count(address)).await
    }

    /// Submit a signed transaction through the private relay. Nothing but
    /// final submissions ever touches this endpoint.
    pub async fn send_private(&self, raw: &[u8]) -> Result<B256> {
        let pending = self
            .rpc("eth_sendRawTransaction(relay)", self.relay.send_raw_transaction(raw))
            .await?;
        Ok(*pending.tx_hash())
    }

    /// Submit a signed deployment through the primary endpoint and wait for
    /// its receipt.
    pub async fn send_deployment(&self, raw: &[u8]) -> Result<TransactionReceipt> {
        let pending = self
            .rpc("eth_sendRawTransaction", self.primary.send_raw_transaction(raw))
            .await?;
        match timeout(DEPLOY_RECEIPT_TIMEOUT, pending.get_receipt()).await {
            Err(_) => Err(BotError::Rpc("deployment receipt: timed out".into())),
            Ok(Err(e)) => Err(BotError::Rpc(format!("deployment receipt: {e}"))),
            Ok(Ok(receipt)) => Ok(receipt),
        }
    }

    /// Every outbound call shares one deadline; a hung endpoint surfaces as a
    /// plain RPC error instead of wedging the block loop.
    async fn rpc<T, E, F>(&self, what: &str, fut: F) -> Result<T>
    where
        F: std::future::IntoFuture<Output = std::result::Result<T, E>>,
        E: std::fmt::Display,
    {
        match timeout(self.rpc_timeout, fut.into_future()).await {
            Err(_) => Err(BotError::Rpc(format!("{what}: timed out"))),
            Ok(Err(e)) => Err(BotError::Rpc(format!("{what}: {e}"))),
            Ok(Ok(value)) => Ok(value),
        }
    }
}

fn connect(url: &str) -> Result<BoxedProvider> {
    let url: reqwest::Url =
        url.parse().map_err(|e| BotError::Config(format!("invalid RPC URL {url}: {e}")))?;
    Ok(Arc::new(ProviderBuilder::new().connect_http(url)))
}
