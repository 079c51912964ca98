use anyhow::Result;
use clap::{Parser, Subcommand};
use marketplace_ops::config::Config;
use marketplace_ops::contracts::ContractArtifact;
use marketplace_ops::defender::{
    AutotaskParams, AutotaskTrigger, DefenderClient, SentinelParams, encoded_zipped_code,
};
use std::path::PathBuf;
use tracing::info;

#[derive(Parser)]
#[command(name = "defender")]
#[command(about = "Wire up sentinel and autotask jobs on the automation platform", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the relayers available to these credentials.
    ListRelayers,
    /// Create an email notification channel.
    CreateNotification {
        #[arg(long, default_value = "MyEmailNotification")]
        name: String,
        #[arg(long, required = true)]
        email: Vec<String>,
    },
    /// Upload the settlement autotask from a prebuilt code bundle.
    CreateAutotask {
        #[arg(long, default_value = "Autotask Marketplace")]
        name: String,
        /// Zip bundle with the autotask code.
        #[arg(long)]
        code_bundle: PathBuf,
        #[arg(long)]
        relayer_id: String,
    },
    /// Create the block sentinel watching buyItem on the marketplace.
    CreateSentinel {
        #[arg(long, default_value = "sepolia")]
        network: String,
        /// Autotask to trigger on a match.
        #[arg(long)]
        autotask_id: Option<String>,
        /// Notification channels to alert.
        #[arg(long)]
        notification_id: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt().init();
    let cli = Cli::parse();

    let config = Config::from_env()?;
    let (api_key, api_secret) = config.defender_credentials()?;
    let client = DefenderClient::new(api_key, api_secret);

    match cli.command {
        Commands::ListRelayers => {
            let relayers = client.list_relayers().await?;
            println!("{}", serde_json::to_string_pretty(&relayers)?);
        }
        Commands::CreateNotification { name, email } => {
            let notification_id = client.create_notification_channel(&name, &email).await?;
            println!("{notification_id}");
        }
        Commands::CreateAutotask {
            name,
            code_bundle,
            relayer_id,
        } => {
            let params = AutotaskParams {
                name,
                encoded_zipped_code: encoded_zipped_code(&code_bundle)?,
                trigger: AutotaskTrigger {
                    trigger_type: "sentinel".to_string(),
                },
                paused: false,
                relayer_id,
            };
            let autotask_id = client.create_autotask(&params).await?;
            println!("{autotask_id}");
        }
        Commands::CreateSentinel {
            network,
            autotask_id,
            notification_id,
        } => {
            let address = config.marketplace_address()?;
            let abi = ContractArtifact::load(&config.artifacts_dir, "NftMarketplace")?
                .abi_string()?;
            info!("Creating sentinel for marketplace {}", address);

            let params = SentinelParams::marketplace(
                &network,
                &address.to_string(),
                abi,
                autotask_id,
                notification_id,
            );
            let subscriber_id = client.create_sentinel(&params).await?;
            println!("{subscriber_id}");
        }
    }

    Ok(())
}
