//! CAIP-2 chain identifiers.
//!
//! Payment destinations are addressed by chain in
//! [CAIP-2](https://chainagnostic.org/CAIPs/caip-2) form, a colon-joined
//! `namespace:reference` pair such as `eip155:8453` (Base) or
//! `solana:5eykt4UsFv8P8NJdTREpY1vzqKqZKvdp` (Solana mainnet). The hosted
//! accounts service replies in the same vocabulary.

use serde::{Deserialize, Deserializer, Serialize, Serializer, de};
use std::fmt;
use std::str::FromStr;

/// A CAIP-2 chain identifier.
///
/// # Example
///
/// ```
/// use tollgate::chain::ChainId;
///
/// let chain = ChainId::new("eip155", "8453");
/// assert_eq!(chain.to_string(), "eip155:8453");
/// assert_eq!(chain.namespace(), "eip155");
/// assert_eq!(chain.reference(), "8453");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ChainId {
    namespace: String,
    reference: String,
}

impl ChainId {
    pub fn new<N: Into<String>, R: Into<String>>(namespace: N, reference: R) -> Self {
        Self {
            namespace: namespace.into(),
            reference: reference.into(),
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn reference(&self) -> &str {
        &self.reference
    }
}

impl fmt::Display for ChainId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.namespace, self.reference)
    }
}

impl From<ChainId> for String {
    fn from(value: ChainId) -> Self {
        value.to_string()
    }
}

#[derive(Debug, thiserror::Error)]
#[error("invalid chain id format {0}")]
pub struct ChainIdError(String);

impl FromStr for ChainId {
    type Err = ChainIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let Some((namespace, reference)) = s.split_once(':') else {
            return Err(ChainIdError(s.to_string()));
        };
        if namespace.is_empty() || reference.is_empty() {
            return Err(ChainIdError(s.to_string()));
        }
        Ok(ChainId::new(namespace, reference))
    }
}

impl Serialize for ChainId {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for ChainId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        ChainId::from_str(&s).map_err(de::Error::custom)
    }
}
