use alloy::rpc::types::Log;
use alloy::sol_types::SolEvent;
use alloy_primitives::Bytes;
use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;
use std::str::FromStr;

/// ABI surface of the marketplace contract. `getTransaction` is the
/// settlement record read: seller stays set while the return window is
/// open and is zeroed once the token went back to its previous owner.
pub mod marketplace {
    use alloy::sol;

    sol! {
        function getReturnTime() external view returns (uint256);
        function getTransaction(address nftAddress, uint256 tokenId) external view returns (address seller, address buyer);
        function transferTokenAfterTime(address nftAddress, uint256 tokenId) external;
        function listItem(address nftAddress, uint256 tokenId, uint256 price) external;
        function buyItem(address nftAddress, uint256 tokenId) external payable;
        function cancelListing(address nftAddress, uint256 tokenId) external;
        function getListing(address nftAddress, uint256 tokenId) external view returns (uint256 price, address seller);
        function getProceeds(address seller) external view returns (uint256);

        event ItemListed(address indexed seller, address indexed nftAddress, uint256 indexed tokenId);
        event ItemBought(address indexed buyer, address indexed nftAddress, uint256 indexed tokenId);
        event ItemCancelled(address indexed seller, address indexed nftAddress, uint256 indexed tokenId);
        event TokenGetBack(address indexed nftAddress, uint256 indexed tokenId, address owner);
    }
}

/// ABI surface of the product NFT.
pub mod product_nft {
    use alloy::sol;

    sol! {
        function mintNft() external;
        function getTokenUri() external view returns (string);
        function approve(address to, uint256 tokenId) external;
        function ownerOf(uint256 tokenId) external view returns (address);

        event Transfer(address indexed from, address indexed to, uint256 indexed tokenId);
        event NftMinted(uint256 indexed tokenId, address firstOwner);
    }
}

/// Finds and decodes the first occurrence of event `E` in a receipt's logs.
pub fn find_log<E: SolEvent>(logs: &[Log]) -> Option<E> {
    logs.iter().find_map(|log| {
        if log.topics().first() != Some(&E::SIGNATURE_HASH) {
            return None;
        }
        E::decode_raw_log(log.topics(), &log.data().data).ok()
    })
}

/// Compiled contract artifact as emitted by the build pipeline:
/// `{ "contractName": …, "abi": […], "bytecode": "0x…" }`.
#[derive(Debug, Clone, Deserialize)]
pub struct ContractArtifact {
    #[serde(rename = "contractName", default)]
    pub contract_name: Option<String>,
    pub abi: serde_json::Value,
    bytecode: String,
}

impl ContractArtifact {
    pub fn load(artifacts_dir: &str, name: &str) -> Result<Self> {
        let path = Path::new(artifacts_dir).join(format!("{name}.json"));
        let raw = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read artifact {}", path.display()))?;
        let artifact: ContractArtifact = serde_json::from_str(&raw)
            .with_context(|| format!("Malformed artifact {}", path.display()))?;
        Ok(artifact)
    }

    /// Contract creation code; constructor arguments get appended to this.
    pub fn bytecode(&self) -> Result<Bytes> {
        Bytes::from_str(&self.bytecode).context("Artifact bytecode is not valid hex")
    }

    pub fn abi_string(&self) -> Result<String> {
        serde_json::to_string(&self.abi).context("Artifact ABI is not serializable")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_artifact_document() {
        let raw = json!({
            "contractName": "NftMarketplace",
            "abi": [{"type": "function", "name": "getReturnTime"}],
            "bytecode": "0x6080604052"
        })
        .to_string();

        let artifact: ContractArtifact = serde_json::from_str(&raw).unwrap();
        assert_eq!(artifact.contract_name.as_deref(), Some("NftMarketplace"));
        assert_eq!(
            artifact.bytecode().unwrap(),
            Bytes::from_str("0x6080604052").unwrap()
        );
        assert!(artifact.abi_string().unwrap().contains("getReturnTime"));
    }

    #[test]
    fn rejects_non_hex_bytecode() {
        let artifact: ContractArtifact = serde_json::from_str(
            &json!({"abi": [], "bytecode": "not-hex"}).to_string(),
        )
        .unwrap();
        assert!(artifact.bytecode().is_err());
    }
}
