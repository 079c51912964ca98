//! Client for the automation platform: relayers, autotasks, sentinels and
//! notification channels. Only the surface the deploy scripts drive is
//! modeled.

use anyhow::{Context, Result};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde::Serialize;
use serde_json::Value;
use std::path::Path;
use tracing::info;

const DEFENDER_API: &str = "https://defender-api.openzeppelin.com";

pub struct DefenderClient {
    http: reqwest::Client,
    api_key: String,
    api_secret: String,
    base_url: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AutotaskParams {
    pub name: String,
    pub encoded_zipped_code: String,
    pub trigger: AutotaskTrigger,
    pub paused: bool,
    pub relayer_id: String,
}

#[derive(Debug, Serialize)]
pub struct AutotaskTrigger {
    #[serde(rename = "type")]
    pub trigger_type: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FunctionCondition {
    pub function_signature: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertThreshold {
    pub amount: u32,
    pub window_seconds: u64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SentinelParams {
    #[serde(rename = "type")]
    pub subscriber_type: String,
    pub network: String,
    pub confirm_level: u64,
    pub name: String,
    pub address: String,
    pub abi: String,
    pub paused: bool,
    pub event_conditions: Vec<Value>,
    pub function_conditions: Vec<FunctionCondition>,
    pub tx_condition: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub autotask_condition: Option<String>,
    pub alert_threshold: AlertThreshold,
    pub notification_channels: Vec<String>,
}

impl SentinelParams {
    /// Block sentinel watching successful `buyItem` calls on the
    /// marketplace, wired to the settlement autotask.
    pub fn marketplace(
        network: &str,
        address: &str,
        abi: String,
        autotask_id: Option<String>,
        notification_channels: Vec<String>,
    ) -> Self {
        SentinelParams {
            subscriber_type: "BLOCK".to_string(),
            network: network.to_string(),
            confirm_level: 1,
            name: "NftMarketplace".to_string(),
            address: address.to_string(),
            abi,
            paused: false,
            event_conditions: Vec::new(),
            function_conditions: vec![FunctionCondition {
                function_signature: "buyItem(address, uint256)".to_string(),
            }],
            tx_condition: "status=='success'".to_string(),
            autotask_condition: autotask_id,
            alert_threshold: AlertThreshold {
                amount: 2,
                window_seconds: 3600,
            },
            notification_channels,
        }
    }
}

/// Reads a prebuilt autotask bundle (zip) and encodes it the way the
/// platform expects.
pub fn encoded_zipped_code(bundle: &Path) -> Result<String> {
    let bytes = std::fs::read(bundle)
        .with_context(|| format!("Failed to read autotask bundle {}", bundle.display()))?;
    Ok(BASE64.encode(bytes))
}

impl DefenderClient {
    pub fn new(api_key: String, api_secret: String) -> Self {
        DefenderClient {
            http: reqwest::Client::new(),
            api_key,
            api_secret,
            base_url: DEFENDER_API.to_string(),
        }
    }

    async fn post(&self, path: &str, body: &impl Serialize) -> Result<Value> {
        let response = self
            .http
            .post(format!("{}{}", self.base_url, path))
            .header("X-Api-Key", &self.api_key)
            .header("X-Api-Secret", &self.api_secret)
            .json(body)
            .send()
            .await
            .context("Failed to reach the automation platform")?
            .error_for_status()
            .context("Automation platform rejected the request")?;
        response.json().await.context("Malformed platform response")
    }

    pub async fn create_autotask(&self, params: &AutotaskParams) -> Result<String> {
        let response = self.post("/autotasks", params).await?;
        let autotask_id = response
            .get("autotaskId")
            .and_then(Value::as_str)
            .context("Platform response carries no autotaskId")?
            .to_string();
        info!("Created Autotask with ID: {}", autotask_id);
        Ok(autotask_id)
    }

    pub async fn create_sentinel(&self, params: &SentinelParams) -> Result<String> {
        let response = self.post("/subscribers", params).await?;
        let subscriber_id = response
            .get("subscriberId")
            .and_then(Value::as_str)
            .context("Platform response carries no subscriberId")?
            .to_string();
        info!("Created Sentinel with ID: {}", subscriber_id);
        Ok(subscriber_id)
    }

    pub async fn create_notification_channel(
        &self,
        name: &str,
        emails: &[String],
    ) -> Result<String> {
        let body = serde_json::json!({
            "type": "email",
            "name": name,
            "config": { "emails": emails },
            "paused": false,
        });
        let response = self.post("/notifications", &body).await?;
        let notification_id = response
            .get("notificationId")
            .and_then(Value::as_str)
            .context("Platform response carries no notificationId")?
            .to_string();
        info!("Created notification channel {}", notification_id);
        Ok(notification_id)
    }

    pub async fn list_relayers(&self) -> Result<Value> {
        let response = self
            .http
            .get(format!("{}/relayers", self.base_url))
            .header("X-Api-Key", &self.api_key)
            .header("X-Api-Secret", &self.api_secret)
            .send()
            .await
            .context("Failed to reach the automation platform")?
            .error_for_status()
            .context("Automation platform rejected the request")?;
        response.json().await.context("Malformed platform response")
    }
}
