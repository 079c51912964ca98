//! Mirrors deployed addresses and ABIs into the front-end's constants
//! directory. The documents are keyed by chain id; merges are idempotent
//! so re-running a deploy never duplicates an address.

use alloy_primitives::Address;
use anyhow::{Context, Result};
use serde_json::{Value, json};
use std::path::{Path, PathBuf};
use tracing::info;

pub struct FrontendPaths {
    root: PathBuf,
}

impl FrontendPaths {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        FrontendPaths { root: root.into() }
    }

    pub fn marketplace_addresses(&self) -> PathBuf {
        self.root.join("marketplaceAddresses.json")
    }

    pub fn product_addresses(&self) -> PathBuf {
        self.root.join("productAddresses.json")
    }

    pub fn network_mapping(&self) -> PathBuf {
        self.root.join("networkMapping.json")
    }

    pub fn marketplace_abi(&self) -> PathBuf {
        self.root.join("marketplaceAbi.json")
    }

    pub fn product_abi(&self) -> PathBuf {
        self.root.join("productAbi.json")
    }
}

/// Appends `address` to the chain's address list unless already present.
/// Returns whether the document changed.
pub fn record_address(doc: &mut Value, chain_id: u64, address: &str) -> bool {
    if !doc.is_object() {
        *doc = json!({});
    }
    let entry = doc
        .as_object_mut()
        .expect("document was just made an object")
        .entry(chain_id.to_string())
        .or_insert_with(|| json!([]));
    if !entry.is_array() {
        *entry = json!([]);
    }
    let list = entry.as_array_mut().expect("entry was just made an array");

    if list.iter().any(|v| v.as_str() == Some(address)) {
        return false;
    }
    list.push(Value::from(address));
    true
}

/// Same merge against the per-network `{ chainId: { name: [addresses] } }`
/// mapping document.
pub fn record_named_address(doc: &mut Value, chain_id: u64, name: &str, address: &str) -> bool {
    if !doc.is_object() {
        *doc = json!({});
    }
    let network = doc
        .as_object_mut()
        .expect("document was just made an object")
        .entry(chain_id.to_string())
        .or_insert_with(|| json!({}));
    if !network.is_object() {
        *network = json!({});
    }
    let entry = network
        .as_object_mut()
        .expect("network was just made an object")
        .entry(name.to_string())
        .or_insert_with(|| json!([]));
    if !entry.is_array() {
        *entry = json!([]);
    }
    let list = entry.as_array_mut().expect("entry was just made an array");

    if list.iter().any(|v| v.as_str() == Some(address)) {
        return false;
    }
    list.push(Value::from(address));
    true
}

fn read_document(path: &Path) -> Result<Value> {
    match std::fs::read_to_string(path) {
        Ok(raw) => serde_json::from_str(&raw)
            .with_context(|| format!("Malformed JSON in {}", path.display())),
        // Fresh front-end checkout: start from an empty document.
        Err(_) => Ok(json!({})),
    }
}

fn write_document(path: &Path, doc: &Value) -> Result<()> {
    let raw = serde_json::to_string(doc).context("Document is not serializable")?;
    std::fs::write(path, raw).with_context(|| format!("Failed to write {}", path.display()))
}

/// Read-modify-write of the front-end constants for one deployment.
pub fn update_frontend(
    paths: &FrontendPaths,
    chain_id: u64,
    marketplace: Address,
    product_nft: Address,
    marketplace_abi: &Value,
    product_abi: &Value,
) -> Result<()> {
    info!("Updating front end constants...");
    let marketplace = marketplace.to_string();
    let product_nft = product_nft.to_string();

    let mut marketplace_addresses = read_document(&paths.marketplace_addresses())?;
    record_address(&mut marketplace_addresses, chain_id, &marketplace);
    write_document(&paths.marketplace_addresses(), &marketplace_addresses)?;

    let mut product_addresses = read_document(&paths.product_addresses())?;
    record_address(&mut product_addresses, chain_id, &product_nft);
    write_document(&paths.product_addresses(), &product_addresses)?;

    let mut mapping = read_document(&paths.network_mapping())?;
    record_named_address(&mut mapping, chain_id, "NftMarketplace", &marketplace);
    record_named_address(&mut mapping, chain_id, "ProductNft", &product_nft);
    write_document(&paths.network_mapping(), &mapping)?;

    write_document(&paths.marketplace_abi(), marketplace_abi)?;
    write_document(&paths.product_abi(), product_abi)?;

    info!("Front end constants updated");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const ADDR: &str = "0x5aAeb6053F3E94C9b9A09f33669435E7Ef1BeAed";
    const OTHER: &str = "0xfB6916095ca1df60bB79Ce92cE3Ea74c37c5d359";

    #[test]
    fn creates_the_chain_entry_when_missing() {
        let mut doc = json!({});
        assert!(record_address(&mut doc, 31337, ADDR));
        assert_eq!(doc, json!({ "31337": [ADDR] }));
    }

    #[test]
    fn recording_the_same_address_twice_is_a_no_op() {
        let mut doc = json!({ "31337": [ADDR] });
        assert!(!record_address(&mut doc, 31337, ADDR));
        assert_eq!(doc, json!({ "31337": [ADDR] }));
    }

    #[test]
    fn appends_a_second_address_on_the_same_chain() {
        let mut doc = json!({ "31337": [ADDR] });
        assert!(record_address(&mut doc, 31337, OTHER));
        assert_eq!(doc, json!({ "31337": [ADDR, OTHER] }));
    }

    #[test]
    fn keeps_other_chains_untouched() {
        let mut doc = json!({ "11155111": [ADDR] });
        assert!(record_address(&mut doc, 31337, OTHER));
        assert_eq!(doc, json!({ "11155111": [ADDR], "31337": [OTHER] }));
    }

    #[test]
    fn network_mapping_merge_is_idempotent_per_contract() {
        let mut doc = json!({});
        assert!(record_named_address(&mut doc, 31337, "NftMarketplace", ADDR));
        assert!(record_named_address(&mut doc, 31337, "ProductNft", OTHER));
        assert!(!record_named_address(&mut doc, 31337, "NftMarketplace", ADDR));
        assert_eq!(
            doc,
            json!({ "31337": { "NftMarketplace": [ADDR], "ProductNft": [OTHER] } })
        );
    }

    #[test]
    fn update_frontend_writes_all_documents() {
        let dir = tempfile::tempdir().unwrap();
        let paths = FrontendPaths::new(dir.path());
        let marketplace: Address = ADDR.parse().unwrap();
        let product: Address = OTHER.parse().unwrap();

        update_frontend(
            &paths,
            31337,
            marketplace,
            product,
            &json!([{ "name": "buyItem" }]),
            &json!([{ "name": "mintNft" }]),
        )
        .unwrap();

        let mapping: Value =
            serde_json::from_str(&std::fs::read_to_string(paths.network_mapping()).unwrap())
                .unwrap();
        assert_eq!(mapping["31337"]["NftMarketplace"][0], ADDR);
        assert_eq!(mapping["31337"]["ProductNft"][0], OTHER);

        let abi: Value =
            serde_json::from_str(&std::fs::read_to_string(paths.marketplace_abi()).unwrap())
                .unwrap();
        assert_eq!(abi[0]["name"], "buyItem");
    }
}
