//! Settlement watcher: the handler behind the marketplace sentinel.
//!
//! A purchase notification names an (NFT address, token id) pair. The
//! watcher reads the marketplace's return window, sleeps it out so the
//! previous owner gets their chance to reclaim the token manually, then
//! re-reads the settlement record. Only if the record is still pending
//! does it submit the time-based transfer. The post-wait re-check is the
//! sole guard against acting on a stale trigger.

use crate::contracts::marketplace;
use crate::rpc::ChainClient;
use alloy_primitives::{Address, TxHash, U256};
use anyhow::{Context, Result};
use serde::Deserialize;
use serde_json::{Value, json};
use std::str::FromStr;
use std::time::Duration;
use tokio::time::sleep;
use tracing::info;

/// Event envelope the automation platform posts to the handler.
/// Only the fields the watcher consumes are modeled.
#[derive(Debug, Deserialize)]
pub struct TriggerPayload {
    pub request: TriggerRequest,
}

#[derive(Debug, Deserialize)]
pub struct TriggerRequest {
    pub body: TriggerBody,
}

#[derive(Debug, Deserialize)]
pub struct TriggerBody {
    pub events: Vec<SentinelEvent>,
}

#[derive(Debug, Deserialize)]
pub struct SentinelEvent {
    #[serde(rename = "matchReasons")]
    pub match_reasons: Vec<MatchReason>,
}

#[derive(Debug, Deserialize)]
pub struct MatchReason {
    #[serde(default)]
    pub signature: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub args: Vec<Value>,
}

/// The (marketplace, NFT, token) triple extracted from a trigger payload,
/// addresses checksum-normalized.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SettlementTrigger {
    pub marketplace: Address,
    pub nft_address: Address,
    pub token_id: U256,
}

impl SettlementTrigger {
    /// Pulls the monitored contract address and the decoded `buyItem`
    /// arguments out of the envelope. The function-condition match sits at
    /// index 1; index 0 is the event-condition match.
    pub fn from_payload(payload: &TriggerPayload) -> Result<Self> {
        let event = payload
            .request
            .body
            .events
            .first()
            .context("Trigger payload contains no events")?;
        let reason = event
            .match_reasons
            .get(1)
            .context("Trigger payload is missing the function match reason")?;

        let marketplace = parse_address(
            reason
                .address
                .as_deref()
                .context("Match reason carries no contract address")?,
        )?;
        let nft_address = parse_address(
            reason
                .args
                .first()
                .and_then(Value::as_str)
                .context("Match reason carries no NFT address argument")?,
        )?;
        let token_id = parse_token_id(
            reason
                .args
                .get(1)
                .context("Match reason carries no token id argument")?,
        )?;

        Ok(SettlementTrigger {
            marketplace,
            nft_address,
            token_id,
        })
    }

    /// Match descriptors echoed back to the host for deduplication/audit.
    pub fn matches(&self) -> Value {
        let id = u64::try_from(self.token_id)
            .map(Value::from)
            .unwrap_or_else(|_| Value::from(self.token_id.to_string()));
        json!({
            "matches": [
                { "nftAddr": self.nft_address.to_string() },
                { "id": id },
            ]
        })
    }
}

fn parse_address(raw: &str) -> Result<Address> {
    Address::from_str(raw).with_context(|| format!("Invalid address in trigger payload: {raw}"))
}

fn parse_token_id(value: &Value) -> Result<U256> {
    match value {
        Value::Number(n) => n
            .as_u64()
            .map(U256::from)
            .context("Token id is not an unsigned integer"),
        Value::String(s) => {
            let s = s.trim();
            let parsed = match s.strip_prefix("0x") {
                Some(hex) => U256::from_str_radix(hex, 16),
                None => U256::from_str_radix(s, 10),
            };
            parsed.with_context(|| format!("Invalid token id in trigger payload: {s}"))
        }
        other => anyhow::bail!("Unsupported token id value: {other}"),
    }
}

/// On-chain settlement record for an (NFT, token id) pair. A zero seller
/// means the pair was already resolved by another actor.
#[derive(Debug, Clone, Copy)]
pub struct SettlementRecord {
    pub seller: Address,
    pub buyer: Address,
}

impl SettlementRecord {
    pub fn is_resolved(&self) -> bool {
        self.seller == Address::ZERO
    }
}

/// Seam between the watcher's decision logic and the chain.
pub trait MarketplaceGateway {
    fn return_time(&self) -> impl Future<Output = Result<u64>>;
    fn settlement(
        &self,
        nft_address: Address,
        token_id: U256,
    ) -> impl Future<Output = Result<SettlementRecord>>;
    fn transfer_after_time(
        &self,
        nft_address: Address,
        token_id: U256,
    ) -> impl Future<Output = Result<TxHash>>;
}

/// What a watcher invocation did, reported explicitly so the host's retry
/// decision never hinges on an unhandled rejection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettlementOutcome {
    /// The seller slot was empty after the wait: someone already resolved
    /// the pair, nothing was submitted.
    AlreadyReturned,
    /// One settlement transaction was submitted and confirmed.
    Transferred { tx_hash: TxHash },
}

#[derive(Debug)]
pub struct WatchReport {
    pub trigger: SettlementTrigger,
    pub outcome: SettlementOutcome,
}

impl WatchReport {
    pub fn matches(&self) -> Value {
        self.trigger.matches()
    }
}

/// Runs one watcher invocation: zero or one state-changing transaction.
pub async fn run<G: MarketplaceGateway>(
    gateway: &G,
    trigger: SettlementTrigger,
) -> Result<WatchReport> {
    info!(
        "Watching settlement of token {} on NFT {}",
        trigger.token_id, trigger.nft_address
    );

    let return_time = gateway
        .return_time()
        .await
        .context("Failed to read the marketplace return time")?;
    info!("Return window is {} seconds, waiting it out", return_time);
    sleep(Duration::from_secs(return_time)).await;

    let record = gateway
        .settlement(trigger.nft_address, trigger.token_id)
        .await
        .context("Failed to read the settlement record")?;

    let outcome = if record.is_resolved() {
        info!("Token was returned in time: no action to take");
        SettlementOutcome::AlreadyReturned
    } else {
        info!("Return window expired: transferring token automatically");
        let tx_hash = gateway
            .transfer_after_time(trigger.nft_address, trigger.token_id)
            .await
            .context("Settlement transfer failed")?;
        info!("Settlement confirmed in {}", tx_hash);
        SettlementOutcome::Transferred { tx_hash }
    };

    Ok(WatchReport { trigger, outcome })
}

/// Gateway backed by the real marketplace contract.
pub struct OnChainMarketplace {
    client: ChainClient,
    address: Address,
    confirmations: u64,
}

impl OnChainMarketplace {
    pub fn new(client: ChainClient, address: Address, confirmations: u64) -> Self {
        OnChainMarketplace {
            client,
            address,
            confirmations,
        }
    }
}

impl MarketplaceGateway for OnChainMarketplace {
    async fn return_time(&self) -> Result<u64> {
        let seconds = self
            .client
            .call(self.address, marketplace::getReturnTimeCall {})
            .await?;
        u64::try_from(seconds).map_err(|_| anyhow::anyhow!("Return time does not fit in u64"))
    }

    async fn settlement(&self, nft_address: Address, token_id: U256) -> Result<SettlementRecord> {
        let record = self
            .client
            .call(
                self.address,
                marketplace::getTransactionCall {
                    nftAddress: nft_address,
                    tokenId: token_id,
                },
            )
            .await?;
        Ok(SettlementRecord {
            seller: record.seller,
            buyer: record.buyer,
        })
    }

    async fn transfer_after_time(&self, nft_address: Address, token_id: U256) -> Result<TxHash> {
        let receipt = self
            .client
            .send(
                self.address,
                marketplace::transferTokenAfterTimeCall {
                    nftAddress: nft_address,
                    tokenId: token_id,
                },
                None,
                self.confirmations,
            )
            .await?;
        Ok(receipt.transaction_hash)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::{address, b256};
    use std::sync::Mutex;
    use tokio::time::Instant;

    const MARKETPLACE: Address = address!("5aAeb6053F3E94C9b9A09f33669435E7Ef1BeAed");
    const NFT: Address = address!("fB6916095ca1df60bB79Ce92cE3Ea74c37c5d359");
    const SELLER: Address = address!("dbF03B407c01E7cD3CBea99509d93f8DDDC8C6FB");

    struct MockMarketplace {
        return_time: u64,
        seller: Address,
        started: Instant,
        settlement_reads: Mutex<Vec<(Address, U256, Duration)>>,
        transfers: Mutex<Vec<(Address, U256)>>,
    }

    impl MockMarketplace {
        fn new(return_time: u64, seller: Address) -> Self {
            MockMarketplace {
                return_time,
                seller,
                started: Instant::now(),
                settlement_reads: Mutex::new(Vec::new()),
                transfers: Mutex::new(Vec::new()),
            }
        }
    }

    impl MarketplaceGateway for MockMarketplace {
        async fn return_time(&self) -> Result<u64> {
            Ok(self.return_time)
        }

        async fn settlement(&self, nft: Address, token_id: U256) -> Result<SettlementRecord> {
            self.settlement_reads.lock().unwrap().push((
                nft,
                token_id,
                self.started.elapsed(),
            ));
            Ok(SettlementRecord {
                seller: self.seller,
                buyer: Address::ZERO,
            })
        }

        async fn transfer_after_time(&self, nft: Address, token_id: U256) -> Result<TxHash> {
            self.transfers.lock().unwrap().push((nft, token_id));
            Ok(b256!(
                "00000000000000000000000000000000000000000000000000000000000000aa"
            ))
        }
    }

    fn trigger(token_id: u64) -> SettlementTrigger {
        SettlementTrigger {
            marketplace: MARKETPLACE,
            nft_address: NFT,
            token_id: U256::from(token_id),
        }
    }

    fn payload(marketplace: &str, nft: &str, token_id: Value) -> TriggerPayload {
        let raw = json!({
            "request": {
                "body": {
                    "events": [{
                        "sentinel": { "abi": "[]" },
                        "matchReasons": [
                            { "type": "event", "signature": "ItemBought(address,address,uint256)" },
                            {
                                "type": "function",
                                "signature": "buyItem(address,uint256)",
                                "address": marketplace,
                                "args": [nft, token_id],
                            },
                        ],
                    }],
                }
            }
        });
        serde_json::from_value(raw).unwrap()
    }

    // Resolved record after the wait: no transaction, matches echoed.
    #[tokio::test(start_paused = true)]
    async fn resolved_record_submits_no_transaction() {
        let mock = MockMarketplace::new(120, Address::ZERO);
        let report = run(&mock, trigger(7)).await.unwrap();

        assert_eq!(report.outcome, SettlementOutcome::AlreadyReturned);
        assert!(mock.transfers.lock().unwrap().is_empty());
        assert_eq!(
            report.matches(),
            json!({ "matches": [ { "nftAddr": NFT.to_string() }, { "id": 7 } ] })
        );
    }

    // Unresolved record: exactly one settlement transaction for the pair.
    #[tokio::test(start_paused = true)]
    async fn pending_record_submits_exactly_one_transaction() {
        let mock = MockMarketplace::new(120, SELLER);
        let report = run(&mock, trigger(7)).await.unwrap();

        assert!(matches!(
            report.outcome,
            SettlementOutcome::Transferred { .. }
        ));
        let transfers = mock.transfers.lock().unwrap();
        assert_eq!(transfers.as_slice(), &[(NFT, U256::from(7))]);
        assert_eq!(
            report.matches(),
            json!({ "matches": [ { "nftAddr": NFT.to_string() }, { "id": 7 } ] })
        );
    }

    // The record re-check must not happen before the return window elapsed.
    #[tokio::test(start_paused = true)]
    async fn waits_out_the_return_window_before_rechecking() {
        let mock = MockMarketplace::new(5, Address::ZERO);
        run(&mock, trigger(1)).await.unwrap();

        let reads = mock.settlement_reads.lock().unwrap();
        assert_eq!(reads.len(), 1);
        let (nft, token_id, elapsed) = reads[0];
        assert_eq!(nft, NFT);
        assert_eq!(token_id, U256::from(1));
        assert!(elapsed >= Duration::from_secs(5), "re-check after {elapsed:?}");
    }

    // Addresses must come out checksum-normalized whatever the input casing.
    #[test]
    fn trigger_addresses_are_checksum_normalized() {
        let payload = payload(
            "0x5aaeb6053f3e94c9b9a09f33669435e7ef1beaed",
            "0xFB6916095CA1DF60BB79CE92CE3EA74C37C5D359",
            json!(7),
        );
        let trigger = SettlementTrigger::from_payload(&payload).unwrap();

        assert_eq!(
            trigger.marketplace.to_string(),
            "0x5aAeb6053F3E94C9b9A09f33669435E7Ef1BeAed"
        );
        assert_eq!(
            trigger.nft_address.to_string(),
            "0xfB6916095ca1df60bB79Ce92cE3Ea74c37c5d359"
        );
    }

    #[test]
    fn token_id_accepts_string_and_number_forms() {
        for id in [json!(7), json!("7"), json!("0x7")] {
            let payload = payload(
                "0x5aaeb6053f3e94c9b9a09f33669435e7ef1beaed",
                "0xfb6916095ca1df60bb79ce92ce3ea74c37c5d359",
                id,
            );
            let trigger = SettlementTrigger::from_payload(&payload).unwrap();
            assert_eq!(trigger.token_id, U256::from(7));
        }
    }

    #[test]
    fn rejects_payload_without_function_match() {
        let raw = json!({
            "request": { "body": { "events": [{ "matchReasons": [
                { "type": "event", "signature": "ItemBought(address,address,uint256)" }
            ] }] } }
        });
        let payload: TriggerPayload = serde_json::from_value(raw).unwrap();
        assert!(SettlementTrigger::from_payload(&payload).is_err());
    }

    // End-to-end scenario from the handler's point of view: grace period
    // read as 120, seller zeroed after the delay.
    #[tokio::test(start_paused = true)]
    async fn full_scenario_with_returned_token() {
        let payload = payload(
            "0x5aaeb6053f3e94c9b9a09f33669435e7ef1beaed",
            "0xfb6916095ca1df60bb79ce92ce3ea74c37c5d359",
            json!("7"),
        );
        let trigger = SettlementTrigger::from_payload(&payload).unwrap();
        let mock = MockMarketplace::new(120, Address::ZERO);

        let report = run(&mock, trigger).await.unwrap();

        assert_eq!(report.outcome, SettlementOutcome::AlreadyReturned);
        assert!(mock.transfers.lock().unwrap().is_empty());
        let reads = mock.settlement_reads.lock().unwrap();
        assert!(reads[0].2 >= Duration::from_secs(120));
        assert_eq!(
            report.matches(),
            json!({ "matches": [
                { "nftAddr": "0xfB6916095ca1df60bB79Ce92cE3Ea74c37c5d359" },
                { "id": 7 },
            ] })
        );
    }
}
