use alloy::sol_types::SolValue;
use alloy_primitives::{Address, Bytes, U256, hex};
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use marketplace_ops::config::Config;
use marketplace_ops::contracts::ContractArtifact;
use marketplace_ops::frontend::{FrontendPaths, update_frontend};
use marketplace_ops::networks;
use marketplace_ops::pinning::{PinataClient, upload_token_uris};
use marketplace_ops::rpc::ChainClient;
use marketplace_ops::verify::EtherscanVerifier;
use std::path::Path;
use tracing::{info, warn};

const MARKETPLACE_ARTIFACT: &str = "NftMarketplace";
const PRODUCT_NFT_ARTIFACT: &str = "ProductNft";
const DEFAULT_TOKEN_URI: &str = "ipfs://QmW3jKFwvnDwpN5BFQFif2vUWMARkfn4hAGV9qTNeBDmLY";

#[derive(Parser)]
#[command(name = "deploy")]
#[command(about = "Deploy the marketplace contracts and mirror their constants", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Deploy the marketplace contract.
    Marketplace {
        /// Return window in seconds passed to the constructor.
        #[arg(long, default_value_t = 120)]
        return_time: u64,
    },
    /// Deploy the product NFT contract.
    ProductNft {
        /// Token URI for the constructor; overrides any upload.
        #[arg(long)]
        token_uri: Option<String>,
    },
    /// Deploy both contracts and update the front end if configured.
    All {
        #[arg(long, default_value_t = 120)]
        return_time: u64,
        #[arg(long)]
        token_uri: Option<String>,
    },
    /// Mirror the configured addresses and ABIs into the front end.
    UpdateFrontend,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt().init();
    let cli = Cli::parse();

    let config = Config::from_env()?;
    info!("Configuration loaded for chain {}", config.chain_id);

    match cli.command {
        Commands::Marketplace { return_time } => {
            let client = ChainClient::new(&config.json_rpc_url, &config.private_key)?;
            deploy_marketplace(&config, &client, return_time).await?;
        }
        Commands::ProductNft { token_uri } => {
            let client = ChainClient::new(&config.json_rpc_url, &config.private_key)?;
            deploy_product_nft(&config, &client, token_uri).await?;
        }
        Commands::All {
            return_time,
            token_uri,
        } => {
            let client = ChainClient::new(&config.json_rpc_url, &config.private_key)?;
            let marketplace = deploy_marketplace(&config, &client, return_time).await?;
            let product_nft = deploy_product_nft(&config, &client, token_uri).await?;
            if config.frontend_dir.is_some() {
                mirror_frontend(&config, marketplace, product_nft)?;
            }
        }
        Commands::UpdateFrontend => {
            let marketplace = config.marketplace_address()?;
            let product_nft = config.product_nft_address()?;
            mirror_frontend(&config, marketplace, product_nft)?;
        }
    }

    Ok(())
}

async fn deploy_marketplace(
    config: &Config,
    client: &ChainClient,
    return_time: u64,
) -> Result<Address> {
    info!("------------------------");
    let artifact = ContractArtifact::load(&config.artifacts_dir, MARKETPLACE_ARTIFACT)?;
    let args = (U256::from(return_time),).abi_encode_params();
    let address = deploy_contract(config, client, &artifact, args, "marketplace").await?;
    info!("Marketplace deployed at {}", address);
    Ok(address)
}

async fn deploy_product_nft(
    config: &Config,
    client: &ChainClient,
    token_uri: Option<String>,
) -> Result<Address> {
    info!("------------------------");
    let token_uri = match token_uri {
        Some(uri) => uri,
        None => resolve_token_uri(config).await?,
    };
    info!("Product NFT token URI: {}", token_uri);

    let artifact = ContractArtifact::load(&config.artifacts_dir, PRODUCT_NFT_ARTIFACT)?;
    let args = (token_uri,).abi_encode_params();
    let address = deploy_contract(config, client, &artifact, args, "product NFT").await?;
    info!("Product NFT deployed at {}", address);
    Ok(address)
}

async fn deploy_contract(
    config: &Config,
    client: &ChainClient,
    artifact: &ContractArtifact,
    constructor_args: Vec<u8>,
    label: &str,
) -> Result<Address> {
    let confirmations = networks::block_confirmations(config.chain_id);
    let mut code = artifact.bytecode()?.to_vec();
    code.extend_from_slice(&constructor_args);

    info!(
        "Deploying {} from {} ({} confirmation(s))",
        label,
        client.sender(),
        confirmations
    );
    let (address, receipt) = client.deploy(Bytes::from(code), confirmations).await?;
    info!(
        "Deployed {} at {} in block {:?}",
        label, address, receipt.block_number
    );

    // Explorer verification only makes sense off the development chains.
    if !networks::is_development(config.chain_id) {
        if let Some(api_key) = &config.etherscan_api_key {
            let name = artifact.contract_name.as_deref().unwrap_or(label);
            let verifier = EtherscanVerifier::new(api_key.clone());
            verifier
                .verify(address, name, &hex::encode(&constructor_args))
                .await;
        }
    }
    info!("-------------------------");

    Ok(address)
}

async fn resolve_token_uri(config: &Config) -> Result<String> {
    if !config.upload_to_pinata {
        return Ok(DEFAULT_TOKEN_URI.to_string());
    }

    let (api_key, api_secret) = config.pinata_credentials()?;
    let pinner = PinataClient::new(api_key, api_secret);
    let uris = upload_token_uris(&pinner, Path::new(&config.images_dir)).await?;
    match uris.into_iter().next() {
        Some(uri) => Ok(uri),
        None => {
            warn!("No metadata made it to the pinning service, using the default token URI");
            Ok(DEFAULT_TOKEN_URI.to_string())
        }
    }
}

fn mirror_frontend(config: &Config, marketplace: Address, product_nft: Address) -> Result<()> {
    let frontend_dir = config
        .frontend_dir
        .as_ref()
        .context("FRONT_END_DIR must be set in .env")?;
    let marketplace_abi = ContractArtifact::load(&config.artifacts_dir, MARKETPLACE_ARTIFACT)?.abi;
    let product_abi = ContractArtifact::load(&config.artifacts_dir, PRODUCT_NFT_ARTIFACT)?.abi;

    update_frontend(
        &FrontendPaths::new(frontend_dir),
        config.chain_id,
        marketplace,
        product_nft,
        &marketplace_abi,
        &product_abi,
    )
}
