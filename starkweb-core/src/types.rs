//! Primitive identifiers shared by every layer of the connector core.

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A chain identifier in its hex form, e.g. `0x534e5f4d41494e` for `SN_MAIN`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChainId(String);

impl ChainId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Builds a chain id from a human readable network name by hex-encoding it.
    pub fn from_name(name: &str) -> Self {
        Self(string_to_hex(name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ChainId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ChainId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for ChainId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// An account address as reported by a wallet provider.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Address(String);

impl Address {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Address {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// A chain the application is configured to talk to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Chain {
    pub chain_id: ChainId,
    pub name: String,
    #[serde(default)]
    pub network: String,
    #[serde(default)]
    pub rpc_urls: Vec<String>,
}

impl Chain {
    pub fn new(chain_id: impl Into<ChainId>, name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            chain_id: chain_id.into(),
            network: name.to_lowercase(),
            name,
            rpc_urls: Vec::new(),
        }
    }

    pub fn with_rpc_url(mut self, url: impl Into<String>) -> Self {
        self.rpc_urls.push(url.into());
        self
    }
}

/// Hex-encodes the UTF-8 bytes of `value` with a `0x` prefix.
pub fn string_to_hex(value: &str) -> String {
    format!("0x{}", hex::encode(value.as_bytes()))
}

const UID_LENGTH: usize = 11;

/// Returns a fresh, session-scoped random identifier.
pub fn uid() -> String {
    let mut rng = rand::thread_rng();
    (0..UID_LENGTH)
        .map(|_| char::from_digit(rng.gen_range(0..16), 16).unwrap_or('0'))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn string_to_hex_encodes_ascii_names() {
        assert_eq!(string_to_hex("SN_MAIN"), "0x534e5f4d41494e");
        assert_eq!(ChainId::from_name("SN_SEPOLIA").as_str(), "0x534e5f5345504f4c4941");
    }

    #[test]
    fn uid_is_short_hex_and_unique() {
        let a = uid();
        let b = uid();
        assert_eq!(a.len(), UID_LENGTH);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(a, b);
    }
}
