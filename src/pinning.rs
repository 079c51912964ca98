//! Media and metadata uploads to the pinning service.
//!
//! The image loop is best-effort: a file that fails to pin is logged and
//! skipped, the rest of the batch still goes through.

use anyhow::{Context, Result};
use reqwest::multipart;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

const PINATA_API: &str = "https://api.pinata.cloud";

/// Response of a pin operation; `IpfsHash` is the content address.
#[derive(Debug, Clone, Deserialize)]
pub struct PinResponse {
    #[serde(rename = "IpfsHash")]
    pub ipfs_hash: String,
    #[serde(rename = "PinSize", default)]
    pub pin_size: u64,
    #[serde(rename = "Timestamp", default)]
    pub timestamp: String,
}

/// Seam over the pinning service.
pub trait Pinner {
    fn pin_file(&self, name: &str, bytes: Vec<u8>) -> impl Future<Output = Result<PinResponse>>;
    fn pin_json(&self, document: &Value) -> impl Future<Output = Result<PinResponse>>;
}

/// Pinata-style HTTP client. Credentials come in through the constructor,
/// scoped to the calling process.
pub struct PinataClient {
    http: reqwest::Client,
    api_key: String,
    api_secret: String,
    base_url: String,
}

impl PinataClient {
    pub fn new(api_key: String, api_secret: String) -> Self {
        PinataClient {
            http: reqwest::Client::new(),
            api_key,
            api_secret,
            base_url: PINATA_API.to_string(),
        }
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

impl Pinner for PinataClient {
    async fn pin_file(&self, name: &str, bytes: Vec<u8>) -> Result<PinResponse> {
        // The service rejects unnamed uploads, hence the metadata part.
        let form = multipart::Form::new()
            .part(
                "file",
                multipart::Part::bytes(bytes).file_name(name.to_string()),
            )
            .text(
                "pinataMetadata",
                serde_json::json!({ "name": name }).to_string(),
            );

        let response = self
            .http
            .post(self.endpoint("/pinning/pinFileToIPFS"))
            .header("pinata_api_key", &self.api_key)
            .header("pinata_secret_api_key", &self.api_secret)
            .multipart(form)
            .send()
            .await
            .context("Failed to reach the pinning service")?
            .error_for_status()
            .context("Pin file request rejected")?;

        response
            .json::<PinResponse>()
            .await
            .context("Malformed pin response")
    }

    async fn pin_json(&self, document: &Value) -> Result<PinResponse> {
        let response = self
            .http
            .post(self.endpoint("/pinning/pinJSONToIPFS"))
            .header("pinata_api_key", &self.api_key)
            .header("pinata_secret_api_key", &self.api_secret)
            .json(document)
            .send()
            .await
            .context("Failed to reach the pinning service")?
            .error_for_status()
            .context("Pin JSON request rejected")?;

        response
            .json::<PinResponse>()
            .await
            .context("Malformed pin response")
    }
}

/// Metadata document referenced by a token URI.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenMetadata {
    pub name: String,
    pub description: String,
    pub image: String,
    pub attributes: Vec<ProductAttributes>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductAttributes {
    pub material: String,
    pub colour: Vec<String>,
    pub weight: String,
    pub pureness: u32,
}

impl TokenMetadata {
    /// Shared template; `image` gets filled in per upload.
    pub fn template() -> Self {
        TokenMetadata {
            name: "Diamond".to_string(),
            description: "An authentic luxury product".to_string(),
            image: String::new(),
            attributes: vec![ProductAttributes {
                material: "diamond".to_string(),
                colour: vec!["grey".to_string(), "blue".to_string()],
                weight: "50g".to_string(),
                pureness: 100,
            }],
        }
    }
}

/// Pins every regular file in `dir`. Failures are logged and skipped; the
/// result holds one response per successful pin, in directory order.
pub async fn store_images<P: Pinner>(pinner: &P, dir: &Path) -> Result<Vec<PinResponse>> {
    let mut files: Vec<PathBuf> = std::fs::read_dir(dir)
        .with_context(|| format!("Failed to read images directory {}", dir.display()))?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.is_file())
        .collect();
    files.sort();

    info!("Uploading {} file(s) to the pinning service", files.len());

    let mut responses = Vec::new();
    for path in files {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        let bytes = match std::fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!("Skipping {}: {}", path.display(), e);
                continue;
            }
        };

        info!("Pinning {}", name);
        match pinner.pin_file(&name, bytes).await {
            Ok(response) => responses.push(response),
            Err(e) => warn!("Failed to pin {}: {}", name, e),
        }
    }

    Ok(responses)
}

/// Builds and pins one metadata document per pinned image, returning every
/// resulting `ipfs://` token URI in order.
pub async fn build_token_uris<P: Pinner>(
    pinner: &P,
    images: &[PinResponse],
) -> Result<Vec<String>> {
    let mut token_uris = Vec::new();

    for image in images {
        let mut metadata = TokenMetadata::template();
        metadata.image = format!("ipfs://{}", image.ipfs_hash);
        info!("Uploading metadata for {}...", metadata.name);

        let document =
            serde_json::to_value(&metadata).context("Token metadata is not serializable")?;
        match pinner.pin_json(&document).await {
            Ok(response) => token_uris.push(format!("ipfs://{}", response.ipfs_hash)),
            Err(e) => warn!("Failed to pin metadata for {}: {}", image.ipfs_hash, e),
        }
    }

    info!("Token URIs uploaded: {:?}", token_uris);
    Ok(token_uris)
}

/// Full media pipeline: pin the images directory, then pin one metadata
/// document per image.
pub async fn upload_token_uris<P: Pinner>(pinner: &P, images_dir: &Path) -> Result<Vec<String>> {
    let images = store_images(pinner, images_dir).await?;
    build_token_uris(pinner, &images).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct MockPinner {
        fail_on: Option<String>,
        file_calls: Mutex<Vec<String>>,
        json_calls: Mutex<Vec<Value>>,
    }

    impl MockPinner {
        fn new() -> Self {
            MockPinner {
                fail_on: None,
                file_calls: Mutex::new(Vec::new()),
                json_calls: Mutex::new(Vec::new()),
            }
        }

        fn failing_on(name: &str) -> Self {
            MockPinner {
                fail_on: Some(name.to_string()),
                ..Self::new()
            }
        }
    }

    impl Pinner for MockPinner {
        async fn pin_file(&self, name: &str, _bytes: Vec<u8>) -> Result<PinResponse> {
            self.file_calls.lock().unwrap().push(name.to_string());
            if self.fail_on.as_deref() == Some(name) {
                anyhow::bail!("pin rejected");
            }
            Ok(PinResponse {
                ipfs_hash: format!("Qm{name}"),
                pin_size: 1,
                timestamp: String::new(),
            })
        }

        async fn pin_json(&self, document: &Value) -> Result<PinResponse> {
            self.json_calls.lock().unwrap().push(document.clone());
            Ok(PinResponse {
                ipfs_hash: "QmMetadata".to_string(),
                pin_size: 1,
                timestamp: String::new(),
            })
        }
    }

    fn image_dir(names: &[&str]) -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        for name in names {
            std::fs::write(dir.path().join(name), b"png bytes").unwrap();
        }
        dir
    }

    #[tokio::test]
    async fn pins_every_file_in_the_directory() {
        let dir = image_dir(&["a.png", "b.png", "c.png"]);
        let pinner = MockPinner::new();

        let responses = store_images(&pinner, dir.path()).await.unwrap();

        assert_eq!(pinner.file_calls.lock().unwrap().len(), 3);
        assert_eq!(responses.len(), 3);
    }

    #[tokio::test]
    async fn one_rejection_still_pins_the_rest() {
        let dir = image_dir(&["a.png", "b.png", "c.png"]);
        let pinner = MockPinner::failing_on("b.png");

        let responses = store_images(&pinner, dir.path()).await.unwrap();

        // All three are attempted, only two make it.
        assert_eq!(pinner.file_calls.lock().unwrap().len(), 3);
        assert_eq!(responses.len(), 2);
        assert_eq!(responses[0].ipfs_hash, "Qma.png");
        assert_eq!(responses[1].ipfs_hash, "Qmc.png");
    }

    #[tokio::test]
    async fn returns_one_token_uri_per_image() {
        let pinner = MockPinner::new();
        let images = vec![
            PinResponse {
                ipfs_hash: "QmOne".to_string(),
                pin_size: 1,
                timestamp: String::new(),
            },
            PinResponse {
                ipfs_hash: "QmTwo".to_string(),
                pin_size: 1,
                timestamp: String::new(),
            },
        ];

        let uris = build_token_uris(&pinner, &images).await.unwrap();

        assert_eq!(uris, vec!["ipfs://QmMetadata", "ipfs://QmMetadata"]);
        let documents = pinner.json_calls.lock().unwrap();
        assert_eq!(documents.len(), 2);
        assert_eq!(documents[0]["image"], "ipfs://QmOne");
        assert_eq!(documents[1]["image"], "ipfs://QmTwo");
    }

    #[test]
    fn metadata_template_matches_the_product_line() {
        let metadata = TokenMetadata::template();
        let value = serde_json::to_value(&metadata).unwrap();
        assert_eq!(value["name"], "Diamond");
        assert_eq!(value["attributes"][0]["pureness"], 100);
        assert_eq!(value["attributes"][0]["colour"][1], "blue");
    }
}
