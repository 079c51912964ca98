use anyhow::{Context, Result};
use clap::Parser;
use marketplace_ops::config::Config;
use marketplace_ops::rpc::ChainClient;
use marketplace_ops::watcher::{self, OnChainMarketplace, SettlementTrigger, TriggerPayload};
use std::path::PathBuf;
use tracing::info;

#[derive(Parser)]
#[command(name = "watcher")]
#[command(about = "Run the settlement watcher on a sentinel trigger payload", long_about = None)]
struct Cli {
    /// Trigger payload JSON; reads stdin when omitted.
    #[arg(long)]
    payload: Option<PathBuf>,

    /// Confirmations to wait on the settlement transaction.
    #[arg(long, default_value_t = 1)]
    confirmations: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt().init();
    let cli = Cli::parse();

    let raw = match &cli.payload {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read payload {}", path.display()))?,
        None => std::io::read_to_string(std::io::stdin())
            .context("Failed to read payload from stdin")?,
    };
    let payload: TriggerPayload =
        serde_json::from_str(&raw).context("Malformed trigger payload")?;
    let trigger = SettlementTrigger::from_payload(&payload)?;
    info!(
        "Triggered for NFT {} token {} on marketplace {}",
        trigger.nft_address, trigger.token_id, trigger.marketplace
    );

    let config = Config::from_env()?;
    let client = ChainClient::new(&config.json_rpc_url, &config.private_key)?;
    info!("Chain head at trigger time: {}", client.get_latest_block().await?);
    let gateway = OnChainMarketplace::new(client, trigger.marketplace, cli.confirmations);

    let report = watcher::run(&gateway, trigger).await?;
    info!("Watcher outcome: {:?}", report.outcome);
    println!("{}", report.matches());

    Ok(())
}
