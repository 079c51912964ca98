/// Per-chain deployment parameters, mirroring the networks we actually
/// deploy to (Sepolia plus the local development chains).
#[derive(Debug, Clone, Copy)]
pub struct NetworkConfig {
    pub name: &'static str,
    pub chain_id: u64,
    pub block_confirmations: u64,
}

pub const SEPOLIA: NetworkConfig = NetworkConfig {
    name: "sepolia",
    chain_id: 11_155_111,
    block_confirmations: 6,
};

pub const HARDHAT: NetworkConfig = NetworkConfig {
    name: "hardhat",
    chain_id: 31_337,
    block_confirmations: 1,
};

pub const GANACHE: NetworkConfig = NetworkConfig {
    name: "ganache",
    chain_id: 1_337,
    block_confirmations: 1,
};

const NETWORKS: &[NetworkConfig] = &[SEPOLIA, HARDHAT, GANACHE];

// Chains on which we skip explorer verification.
const DEVELOPMENT_CHAIN_IDS: &[u64] = &[HARDHAT.chain_id, GANACHE.chain_id];

pub fn network_config(chain_id: u64) -> Option<NetworkConfig> {
    NETWORKS.iter().copied().find(|n| n.chain_id == chain_id)
}

pub fn is_development(chain_id: u64) -> bool {
    DEVELOPMENT_CHAIN_IDS.contains(&chain_id)
}

/// Confirmations to wait on the given chain, defaulting to 1 for chains we
/// have no entry for.
pub fn block_confirmations(chain_id: u64) -> u64 {
    network_config(chain_id)
        .map(|n| n.block_confirmations)
        .unwrap_or(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sepolia_waits_six_confirmations() {
        assert_eq!(block_confirmations(11_155_111), 6);
        assert!(!is_development(11_155_111));
    }

    #[test]
    fn local_chains_are_development() {
        assert!(is_development(31_337));
        assert!(is_development(1_337));
        assert_eq!(block_confirmations(31_337), 1);
    }

    #[test]
    fn unknown_chain_defaults_to_one_confirmation() {
        assert_eq!(block_confirmations(5), 1);
        assert!(network_config(5).is_none());
    }
}
