use alloy_primitives::Address;
use anyhow::{Context, Result};
use std::str::FromStr;

/// Process configuration, read once at startup and handed to every client
/// explicitly. Credentials never live in module-level state.
#[derive(Debug, Clone)]
pub struct Config {
    pub json_rpc_url: String,
    pub chain_id: u64,
    pub private_key: String,
    pub marketplace_address: Option<Address>,
    pub product_nft_address: Option<Address>,
    pub etherscan_api_key: Option<String>,
    pub pinata_api_key: Option<String>,
    pub pinata_api_secret: Option<String>,
    pub defender_api_key: Option<String>,
    pub defender_api_secret: Option<String>,
    pub artifacts_dir: String,
    pub images_dir: String,
    pub frontend_dir: Option<String>,
    pub upload_to_pinata: bool,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenv::dotenv().ok();

        let json_rpc_url = std::env::var("JSON_RPC_URL")
            .context("JSON_RPC_URL must be set in .env")?;

        let chain_id = std::env::var("CHAIN_ID")
            .unwrap_or_else(|_| "31337".to_string())
            .parse::<u64>()
            .context("CHAIN_ID must be a decimal chain id")?;

        let private_key = std::env::var("PRIVATE_KEY")
            .context("PRIVATE_KEY must be set in .env")?;

        let marketplace_address = parse_optional_address("MARKETPLACE_ADDRESS")?;
        let product_nft_address = parse_optional_address("PRODUCT_NFT_ADDRESS")?;

        let artifacts_dir = std::env::var("ARTIFACTS_DIR")
            .unwrap_or_else(|_| "./artifacts".to_string());

        let images_dir = std::env::var("IMAGES_DIR")
            .unwrap_or_else(|_| "./images".to_string());

        let upload_to_pinata = std::env::var("UPLOAD_TO_PINATA")
            .map(|v| v == "true")
            .unwrap_or(false);

        Ok(Config {
            json_rpc_url,
            chain_id,
            private_key,
            marketplace_address,
            product_nft_address,
            etherscan_api_key: std::env::var("ETHERSCAN_API_KEY").ok(),
            pinata_api_key: std::env::var("PINATA_API_KEY").ok(),
            pinata_api_secret: std::env::var("PINATA_API_SECRET").ok(),
            defender_api_key: std::env::var("DEFENDER_API_KEY").ok(),
            defender_api_secret: std::env::var("DEFENDER_API_SECRET").ok(),
            artifacts_dir,
            images_dir,
            frontend_dir: std::env::var("FRONT_END_DIR").ok(),
            upload_to_pinata,
        })
    }

    pub fn marketplace_address(&self) -> Result<Address> {
        self.marketplace_address
            .context("MARKETPLACE_ADDRESS must be set in .env")
    }

    pub fn product_nft_address(&self) -> Result<Address> {
        self.product_nft_address
            .context("PRODUCT_NFT_ADDRESS must be set in .env")
    }

    pub fn pinata_credentials(&self) -> Result<(String, String)> {
        let key = self
            .pinata_api_key
            .clone()
            .context("PINATA_API_KEY must be set in .env")?;
        let secret = self
            .pinata_api_secret
            .clone()
            .context("PINATA_API_SECRET must be set in .env")?;
        Ok((key, secret))
    }

    pub fn defender_credentials(&self) -> Result<(String, String)> {
        let key = self
            .defender_api_key
            .clone()
            .context("DEFENDER_API_KEY must be set in .env")?;
        let secret = self
            .defender_api_secret
            .clone()
            .context("DEFENDER_API_SECRET must be set in .env")?;
        Ok((key, secret))
    }
}

fn parse_optional_address(var: &str) -> Result<Option<Address>> {
    match std::env::var(var) {
        Ok(raw) => {
            let address = Address::from_str(&raw)
                .with_context(|| format!("Invalid {var} format"))?;
            Ok(Some(address))
        }
        Err(_) => Ok(None),
    }
}
