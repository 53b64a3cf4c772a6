//! Fixed-size chain primitives: account addresses and 32-byte words.

use anyhow::{Context, Result};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

fn decode_fixed<const N: usize>(s: &str, what: &str) -> Result<[u8; N]> {
    let stripped = s
        .strip_prefix("0x")
        .or_else(|| s.strip_prefix("0X"))
        .unwrap_or(s);
    let bytes = hex::decode(stripped).with_context(|| format!("Invalid hex {}: '{}'", what, s))?;
    bytes
        .try_into()
        .map_err(|b: Vec<u8>| anyhow::anyhow!("{} must be {} bytes, got {}", what, N, b.len()))
}

/// 20-byte account or contract address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Address(pub [u8; 20]);

impl Address {
    pub const ZERO: Address = Address([0u8; 20]);

    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }

    /// True for strings shaped like `0x` followed by 40 hex digits.
    pub fn looks_like_address(s: &str) -> bool {
        s.len() == 42
            && (s.starts_with("0x") || s.starts_with("0X"))
            && s[2..].chars().all(|c| c.is_ascii_hexdigit())
    }
}

impl FromStr for Address {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        decode_fixed::<20>(s.trim(), "address").map(Address)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

/// 32-byte word: transaction hashes, permission ids, event topics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct H256(pub [u8; 32]);

/// Transactions are identified by their 32-byte hash.
pub type TxHash = H256;

impl H256 {
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl From<[u8; 32]> for H256 {
    fn from(bytes: [u8; 32]) -> Self {
        H256(bytes)
    }
}

impl FromStr for H256 {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        decode_fixed::<32>(s.trim(), "32-byte hash").map(H256)
    }
}

impl fmt::Display for H256 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

macro_rules! string_serde {
    ($ty:ty) => {
        impl Serialize for $ty {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_str(&self.to_string())
            }
        }

        impl<'de> Deserialize<'de> for $ty {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let s = String::deserialize(deserializer)?;
                s.parse().map_err(serde::de::Error::custom)
            }
        }
    };
}

string_serde!(Address);
string_serde!(H256);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn address_parses_mixed_case_and_displays_lowercase() {
        let addr: Address = "0xAbCdEf0000000000000000000000000000000001".parse().unwrap();
        assert_eq!(
            addr.to_string(),
            "0xabcdef0000000000000000000000000000000001"
        );
    }

    #[test]
    fn address_rejects_wrong_length() {
        let err = "0x1234".parse::<Address>().unwrap_err();
        assert!(err.to_string().contains("20 bytes"));
    }

    #[test]
    fn address_rejects_non_hex() {
        assert!("0xzz00000000000000000000000000000000000000".parse::<Address>().is_err());
    }

    #[test]
    fn looks_like_address_distinguishes_names() {
        assert!(Address::looks_like_address(
            "0x0000000000000000000000000000000000000001"
        ));
        assert!(!Address::looks_like_address("child.dao.eth"));
        assert!(!Address::looks_like_address("0x1234"));
    }

    #[test]
    fn hash_deserializes_from_json_string() {
        let json = format!("\"0x{}\"", "ab".repeat(32));
        let hash: H256 = serde_json::from_str(&json).unwrap();
        assert_eq!(hash.0, [0xab; 32]);
    }
}
