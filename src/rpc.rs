use alloy::network::{EthereumWallet, TransactionBuilder};
use alloy::providers::fillers::{
    BlobGasFiller, ChainIdFiller, FillProvider, GasFiller, JoinFill, NonceFiller, WalletFiller,
};
use alloy::providers::{Identity, Provider, ProviderBuilder, RootProvider};
use alloy::rpc::types::{TransactionReceipt, TransactionRequest};
use alloy::signers::local::PrivateKeySigner;
use alloy::sol_types::SolCall;
use alloy_primitives::{Address, Bytes, U256};
use anyhow::{Context, Result};
use std::time::Duration;
use tokio::time::timeout;
use tokio_retry::Retry;
use tokio_retry::strategy::{ExponentialBackoff, jitter};
use tracing::{debug, warn};

type WalletedProvider = FillProvider<
    JoinFill<
        JoinFill<
            Identity,
            JoinFill<GasFiller, JoinFill<BlobGasFiller, JoinFill<NonceFiller, ChainIdFiller>>>,
        >,
        WalletFiller<EthereumWallet>,
    >,
    RootProvider,
>;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(120); // 2 minutes timeout per request

/// Signing JSON-RPC client. Read calls are retried with exponential
/// backoff; state-changing sends are submitted exactly once so an
/// ambiguous timeout can never double-submit a transaction.
#[derive(Clone)]
pub struct ChainClient {
    provider: WalletedProvider,
    url: String,
    sender: Address,
    max_retries: usize,
}

impl ChainClient {
    pub fn new(rpc_url: &str, private_key: &str) -> Result<Self> {
        let signer: PrivateKeySigner = private_key
            .parse()
            .context("Invalid PRIVATE_KEY format")?;
        let sender = signer.address();
        let wallet = EthereumWallet::from(signer);

        let parsed_url = rpc_url
            .parse()
            .map_err(|_| anyhow::anyhow!("Invalid RPC URL: {}", rpc_url))?;
        let provider: WalletedProvider =
            ProviderBuilder::new().wallet(wallet).connect_http(parsed_url);

        Ok(ChainClient {
            provider,
            url: rpc_url.to_string(),
            sender,
            max_retries: 5,
        })
    }

    /// Address transactions are signed with.
    pub fn sender(&self) -> Address {
        self.sender
    }

    fn get_retry_strategy(&self) -> impl Iterator<Item = Duration> {
        ExponentialBackoff::from_millis(100)
            .factor(2)
            .max_delay(Duration::from_secs(10))
            .map(jitter)
            .take(self.max_retries)
    }

    fn handle_error(&self, error_str: &str) {
        warn!("RPC error on {}: {}", self.url, error_str);
    }

    fn handle_timeout(&self) -> anyhow::Error {
        warn!(
            "Request timeout after {} seconds on {}",
            REQUEST_TIMEOUT.as_secs(),
            self.url
        );
        anyhow::anyhow!(
            "Request timeout after {} seconds",
            REQUEST_TIMEOUT.as_secs()
        )
    }

    pub async fn get_latest_block(&self) -> Result<u64> {
        let client = self.clone();
        Retry::spawn(self.get_retry_strategy(), move || {
            let client = client.clone();
            async move {
                match timeout(REQUEST_TIMEOUT, client.provider.get_block_number()).await {
                    Ok(Ok(block_number)) => Ok(block_number),
                    Ok(Err(e)) => {
                        client.handle_error(&e.to_string());
                        Err(anyhow::anyhow!("{}", e))
                    }
                    Err(_) => Err(client.handle_timeout()),
                }
            }
        })
        .await
    }

    /// eth_call with the return data decoded through the call's sol! binding.
    pub async fn call<C: SolCall>(&self, to: Address, call: C) -> Result<C::Return> {
        let input = Bytes::from(call.abi_encode());
        let client = self.clone();
        Retry::spawn(self.get_retry_strategy(), move || {
            let client = client.clone();
            let input = input.clone();
            async move {
                let tx = TransactionRequest::default().with_to(to).with_input(input);
                match timeout(REQUEST_TIMEOUT, client.provider.call(tx)).await {
                    Ok(Ok(data)) => C::abi_decode_returns(&data)
                        .map_err(|e| anyhow::anyhow!("Failed to decode return data: {}", e)),
                    Ok(Err(e)) => {
                        client.handle_error(&e.to_string());
                        Err(anyhow::anyhow!("{}", e))
                    }
                    Err(_) => Err(client.handle_timeout()),
                }
            }
        })
        .await
    }

    /// Signs and submits a contract call, then waits for the requested
    /// number of confirmations. Not retried.
    pub async fn send<C: SolCall>(
        &self,
        to: Address,
        call: C,
        value: Option<U256>,
        confirmations: u64,
    ) -> Result<TransactionReceipt> {
        let mut tx = TransactionRequest::default()
            .with_to(to)
            .with_input(Bytes::from(call.abi_encode()));
        if let Some(value) = value {
            tx = tx.with_value(value);
        }
        self.submit(tx, confirmations).await
    }

    /// Submits a contract-creation transaction and returns the address of
    /// the deployed contract alongside the receipt.
    pub async fn deploy(
        &self,
        code: Bytes,
        confirmations: u64,
    ) -> Result<(Address, TransactionReceipt)> {
        let tx = TransactionRequest::default().with_deploy_code(code);
        let receipt = self.submit(tx, confirmations).await?;
        let address = receipt
            .contract_address
            .context("Deployment receipt carries no contract address")?;
        Ok((address, receipt))
    }

    async fn submit(
        &self,
        tx: TransactionRequest,
        confirmations: u64,
    ) -> Result<TransactionReceipt> {
        let pending = self
            .provider
            .send_transaction(tx)
            .await
            .context("Failed to submit transaction")?;
        debug!("Submitted transaction {}", pending.tx_hash());

        let receipt = pending
            .with_required_confirmations(confirmations)
            .get_receipt()
            .await
            .context("Failed waiting for transaction confirmations")?;

        if !receipt.status() {
            anyhow::bail!("Transaction {} reverted", receipt.transaction_hash);
        }
        Ok(receipt)
    }
}
