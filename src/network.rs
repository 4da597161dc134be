//! Payment networks.
//!
//! This module defines the closed set of networks a payment option can name.
//! Passthrough networks map one-to-one onto a concrete chain; the `hosted`
//! network stands for an account held at the hosted accounts service, which
//! fans out to per-chain deposit addresses at resolution time.

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use std::str::FromStr;

use crate::chain::ChainId;

/// Networks a payment option can be denominated on.
///
/// The set is closed on purpose: destination resolution maps every variant to
/// exactly one resolution strategy, and adding a variant without extending
/// that mapping is a compile error.
#[derive(Debug, Hash, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Network {
    /// Base mainnet (chain ID 8453).
    #[serde(rename = "base")]
    Base,
    /// Base Sepolia testnet (chain ID 84532).
    #[serde(rename = "base-sepolia")]
    BaseSepolia,
    /// Polygon mainnet (chain ID 137).
    #[serde(rename = "polygon")]
    Polygon,
    /// Solana mainnet.
    #[serde(rename = "solana")]
    Solana,
    /// Solana devnet.
    #[serde(rename = "solana-devnet")]
    SolanaDevnet,
    /// An account handle at the hosted accounts service rather than a chain.
    #[serde(rename = "hosted")]
    Hosted,
}

impl Display for Network {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Network::Base => write!(f, "base"),
            Network::BaseSepolia => write!(f, "base-sepolia"),
            Network::Polygon => write!(f, "polygon"),
            Network::Solana => write!(f, "solana"),
            Network::SolanaDevnet => write!(f, "solana-devnet"),
            Network::Hosted => write!(f, "hosted"),
        }
    }
}

impl From<Network> for String {
    fn from(value: Network) -> Self {
        value.to_string()
    }
}

#[derive(Debug, thiserror::Error)]
#[error("unknown network: {0}")]
pub struct NetworkParseError(String);

impl FromStr for Network {
    type Err = NetworkParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "base" => Ok(Network::Base),
            "base-sepolia" => Ok(Network::BaseSepolia),
            "polygon" => Ok(Network::Polygon),
            "solana" => Ok(Network::Solana),
            "solana-devnet" => Ok(Network::SolanaDevnet),
            "hosted" => Ok(Network::Hosted),
            other => Err(NetworkParseError(other.to_string())),
        }
    }
}

impl Network {
    /// Return all known [`Network`] variants.
    pub fn variants() -> &'static [Network] {
        &[
            Network::Base,
            Network::BaseSepolia,
            Network::Polygon,
            Network::Solana,
            Network::SolanaDevnet,
            Network::Hosted,
        ]
    }

    /// The CAIP-2 chain identifier behind a passthrough network.
    ///
    /// The hosted network has no single chain of its own, so it yields `None`.
    pub fn chain_id(&self) -> Option<ChainId> {
        match self {
            Network::Base => Some(ChainId::new("eip155", "8453")),
            Network::BaseSepolia => Some(ChainId::new("eip155", "84532")),
            Network::Polygon => Some(ChainId::new("eip155", "137")),
            Network::Solana => Some(ChainId::new("solana", "5eykt4UsFv8P8NJdTREpY1vzqKqZKvdp")),
            Network::SolanaDevnet => {
                Some(ChainId::new("solana", "EtWTRABZaYq6iMfeYKouRu166VU2xqa1"))
            }
            Network::Hosted => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serde_kebab_names() {
        assert_eq!(
            serde_json::to_string(&Network::BaseSepolia).unwrap(),
            "\"base-sepolia\""
        );
        let network: Network = serde_json::from_str("\"hosted\"").unwrap();
        assert_eq!(network, Network::Hosted);
    }

    #[test]
    fn test_display_matches_serde() {
        for network in Network::variants() {
            let json = serde_json::to_string(network).unwrap();
            assert_eq!(json, format!("\"{network}\""));
        }
    }

    #[test]
    fn test_from_str_roundtrip() {
        for network in Network::variants() {
            let parsed: Network = network.to_string().parse().unwrap();
            assert_eq!(parsed, *network);
        }
        assert!("mordor".parse::<Network>().is_err());
    }

    #[test]
    fn test_chain_id_for_hosted_is_none() {
        assert!(Network::Hosted.chain_id().is_none());
        assert_eq!(
            Network::Base.chain_id().unwrap().to_string(),
            "eip155:8453"
        );
    }
}
