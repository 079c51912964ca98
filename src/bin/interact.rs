use alloy_primitives::{Address, U256, utils::format_ether, utils::parse_ether};
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use marketplace_ops::config::Config;
use marketplace_ops::contracts::{find_log, marketplace, product_nft};
use marketplace_ops::networks;
use marketplace_ops::rpc::ChainClient;
use tracing::info;

#[derive(Parser)]
#[command(name = "interact")]
#[command(about = "Manual marketplace interaction scripts", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Mint a product NFT and log its token id and first owner.
    Mint,
    /// Approve the marketplace to move a token.
    Approve { token_id: u64 },
    /// List a token for sale, price in ether.
    List { token_id: u64, price: String },
    /// Buy a listed token, paying its asking price.
    Buy { token_id: u64 },
    /// Print the listing details for a token.
    Listing { token_id: u64 },
    /// Print the current owner of a token.
    OwnerOf { token_id: u64 },
    /// Print the proceeds withdrawable by the signing account.
    Proceeds,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt().init();
    let cli = Cli::parse();

    let config = Config::from_env()?;
    let client = ChainClient::new(&config.json_rpc_url, &config.private_key)?;
    let confirmations = networks::block_confirmations(config.chain_id);

    match cli.command {
        Commands::Mint => {
            let nft = config.product_nft_address()?;
            info!("Minting NFT...");
            let receipt = client
                .send(nft, product_nft::mintNftCall {}, None, confirmations)
                .await?;

            let minted = find_log::<product_nft::NftMinted>(receipt.inner.logs())
                .context("Mint receipt carries no NftMinted event")?;
            info!("Minted product NFT with id: {}", minted.tokenId);
            info!("First owner: {}", minted.firstOwner);

            let token_uri = client.call(nft, product_nft::getTokenUriCall {}).await?;
            info!("Product NFT has tokenURI: {}", token_uri);
        }
        Commands::Approve { token_id } => {
            let nft = config.product_nft_address()?;
            let marketplace_address = config.marketplace_address()?;
            client
                .send(
                    nft,
                    product_nft::approveCall {
                        to: marketplace_address,
                        tokenId: U256::from(token_id),
                    },
                    None,
                    confirmations,
                )
                .await?;
            info!(
                "Approved marketplace {} for token {}",
                marketplace_address, token_id
            );
        }
        Commands::List { token_id, price } => {
            let nft = config.product_nft_address()?;
            let marketplace_address = config.marketplace_address()?;
            let price = parse_ether(&price).context("Invalid ether amount")?;

            info!("Publishing sale listing...");
            client
                .send(
                    marketplace_address,
                    marketplace::listItemCall {
                        nftAddress: nft,
                        tokenId: U256::from(token_id),
                        price,
                    },
                    None,
                    confirmations,
                )
                .await?;
            print_listing(&client, marketplace_address, nft, token_id).await?;
        }
        Commands::Buy { token_id } => {
            let nft = config.product_nft_address()?;
            let marketplace_address = config.marketplace_address()?;

            let listing = client
                .call(
                    marketplace_address,
                    marketplace::getListingCall {
                        nftAddress: nft,
                        tokenId: U256::from(token_id),
                    },
                )
                .await?;
            info!(
                "Buying token {} for {} ETH...",
                token_id,
                format_ether(listing.price)
            );

            client
                .send(
                    marketplace_address,
                    marketplace::buyItemCall {
                        nftAddress: nft,
                        tokenId: U256::from(token_id),
                    },
                    Some(listing.price),
                    confirmations,
                )
                .await?;

            let owner = client
                .call(
                    nft,
                    product_nft::ownerOfCall {
                        tokenId: U256::from(token_id),
                    },
                )
                .await?;
            info!("New owner: {}", owner);
        }
        Commands::Listing { token_id } => {
            let nft = config.product_nft_address()?;
            let marketplace_address = config.marketplace_address()?;
            print_listing(&client, marketplace_address, nft, token_id).await?;
        }
        Commands::OwnerOf { token_id } => {
            let nft = config.product_nft_address()?;
            let owner = client
                .call(
                    nft,
                    product_nft::ownerOfCall {
                        tokenId: U256::from(token_id),
                    },
                )
                .await?;
            info!("Owner of token {}: {}", token_id, owner);
        }
        Commands::Proceeds => {
            let marketplace_address = config.marketplace_address()?;
            let proceeds = client
                .call(
                    marketplace_address,
                    marketplace::getProceedsCall {
                        seller: client.sender(),
                    },
                )
                .await?;
            info!(
                "Proceeds of {}: {} ETH",
                client.sender(),
                format_ether(proceeds)
            );
        }
    }

    Ok(())
}

async fn print_listing(
    client: &ChainClient,
    marketplace_address: Address,
    nft: Address,
    token_id: u64,
) -> Result<()> {
    let listing = client
        .call(
            marketplace_address,
            marketplace::getListingCall {
                nftAddress: nft,
                tokenId: U256::from(token_id),
            },
        )
        .await?;
    info!("Listing details:");
    info!("Price: {} ETH", format_ether(listing.price));
    info!("Seller: {}", listing.seller);
    Ok(())
}
