//! Explorer source verification. An "already verified" answer counts as
//! success; any other failure is logged and tolerated so a deploy run
//! never dies on the verification step.

use alloy_primitives::Address;
use anyhow::{Context, Result};
use serde_json::Value;
use tracing::{info, warn};

const ETHERSCAN_API: &str = "https://api.etherscan.io/api";

pub struct EtherscanVerifier {
    http: reqwest::Client,
    api_key: String,
    api_url: String,
}

impl EtherscanVerifier {
    pub fn new(api_key: String) -> Self {
        EtherscanVerifier {
            http: reqwest::Client::new(),
            api_key,
            api_url: ETHERSCAN_API.to_string(),
        }
    }

    /// Submits the contract for verification. `constructor_args` is the
    /// ABI-encoded argument blob without the 0x prefix.
    pub async fn verify(&self, contract_address: Address, contract_name: &str, constructor_args: &str) {
        info!("Verifying contract...");
        match self
            .submit(contract_address, contract_name, constructor_args)
            .await
        {
            Ok(guid) => info!("Verification submitted: {}", guid),
            Err(e) if is_already_verified(&e.to_string()) => info!("Already verified!"),
            Err(e) => warn!("Contract verification failed: {}", e),
        }
    }

    async fn submit(
        &self,
        contract_address: Address,
        contract_name: &str,
        constructor_args: &str,
    ) -> Result<String> {
        let address = contract_address.to_string();
        // "constructorArguements" is the field name the API actually expects.
        let params = [
            ("module", "contract"),
            ("action", "verifysourcecode"),
            ("apikey", self.api_key.as_str()),
            ("contractaddress", address.as_str()),
            ("contractname", contract_name),
            ("constructorArguements", constructor_args),
        ];

        let response: Value = self
            .http
            .post(&self.api_url)
            .form(&params)
            .send()
            .await
            .context("Failed to reach the explorer API")?
            .error_for_status()
            .context("Explorer API rejected the request")?
            .json()
            .await
            .context("Malformed explorer response")?;

        let status = response
            .get("status")
            .and_then(Value::as_str)
            .unwrap_or_default();
        let result = response
            .get("result")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();

        if status == "1" {
            Ok(result)
        } else {
            anyhow::bail!("{}", result)
        }
    }
}

fn is_already_verified(message: &str) -> bool {
    message.to_lowercase().contains("already verified")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn already_verified_is_tolerated_regardless_of_casing() {
        assert!(is_already_verified("Contract source code already verified"));
        assert!(is_already_verified("ALREADY VERIFIED"));
        assert!(!is_already_verified("Unable to locate ContractCode"));
    }
}
