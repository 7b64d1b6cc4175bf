//! Fixed-width hash and big-integer wrappers shared across the mining core.
//!
//! Mirrors the reference workspace's `helpers` module: `construct_uint!` for the
//! linear-difficulty 256-bit integer, `construct_fixed_hash!` for the hash types,
//! and a `Base64` wrapper for Arweave's base64url-encoded wire fields.

use fixed_hash::construct_fixed_hash;
use serde::{de, de::Error as _, Deserialize, Deserializer, Serialize, Serializer};
use std::str::FromStr;
use uint::construct_uint;

construct_uint! {
    /// 256-bit unsigned integer used for the linear difficulty target and
    /// cumulative difficulty.
    pub struct U256(4);
}

construct_fixed_hash! {
    /// A 32-byte hash: block indep_hash components, H0, solution hashes, tx/wallet roots.
    pub struct H256(32);
}

construct_fixed_hash! {
    /// A 48-byte hash: Arweave's `indep_hash` / `previous_block` width.
    pub struct H384(48);
}

impl Serialize for H256 {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(base64_url::encode(self.as_bytes()).as_str())
    }
}

impl<'de> Deserialize<'de> for H256 {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s: String = Deserialize::deserialize(deserializer)?;
        DecodeHash::from(&s).map_err(D::Error::custom)
    }
}

impl Serialize for H384 {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(base64_url::encode(self.as_bytes()).as_str())
    }
}

impl<'de> Deserialize<'de> for H384 {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s: String = Deserialize::deserialize(deserializer)?;
        DecodeHash::from(&s).map_err(D::Error::custom)
    }
}

impl Serialize for U256 {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(self.to_string().as_str())
    }
}

impl<'de> Deserialize<'de> for U256 {
    fn deserialize<D>(deserializer: D) -> Result<U256, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s: String = Deserialize::deserialize(deserializer)?;
        U256::from_dec_str(&s).map_err(serde::de::Error::custom)
    }
}

/// A [`Vec<u8>`] wrapper that (de)serializes as a base64url string, used for
/// Arweave's address, signature and chunk fields.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Base64(pub Vec<u8>);

impl std::fmt::Display for Base64 {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}", base64_url::encode(&self.0))
    }
}

impl FromStr for Base64 {
    type Err = base64_url::base64::DecodeError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(base64_url::decode(s)?))
    }
}

impl Base64 {
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_slice(&self) -> &[u8] {
        self.0.as_slice()
    }
}

impl Serialize for Base64 {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(&format!("{self}"))
    }
}

impl<'de> Deserialize<'de> for Base64 {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct Vis;
        impl serde::de::Visitor<'_> for Vis {
            type Value = Base64;

            fn expecting(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
                f.write_str("a base64url string")
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<Self::Value, E> {
                base64_url::decode(v)
                    .map(Base64)
                    .map_err(|_| de::Error::custom("failed to decode base64url string"))
            }
        }
        deserializer.deserialize_str(Vis)
    }
}

/// Decodes a base64url encoded hash into its corresponding fixed-size bytes.
pub trait DecodeHash: Sized {
    fn from(base64_url_string: &str) -> Result<Self, String>;
    fn empty() -> Self;
}

impl DecodeHash for H256 {
    fn from(base64_url_string: &str) -> Result<Self, String> {
        base64_url::decode(base64_url_string)
            .map_err(|e| e.to_string())
            .and_then(|bytes| {
                if bytes.len() != 32 {
                    return Err(format!("Length mismatch: expected 32 - {base64_url_string}"));
                }
                Ok(H256::from_slice(&bytes))
            })
    }

    fn empty() -> Self {
        H256::zero()
    }
}

impl DecodeHash for H384 {
    fn from(base64_url_string: &str) -> Result<Self, String> {
        base64_url::decode(base64_url_string)
            .map_err(|e| e.to_string())
            .and_then(|bytes| {
                if bytes.len() != 48 {
                    return Err(format!("Length mismatch: expected 48 - {base64_url_string}"));
                }
                Ok(H384::from_slice(&bytes))
            })
    }

    fn empty() -> Self {
        H384::zero()
    }
}

impl DecodeHash for [u8; 32] {
    fn from(base64_url_string: &str) -> Result<Self, String> {
        base64_url::decode(base64_url_string)
            .map_err(|e| e.to_string())
            .and_then(|bytes| {
                bytes
                    .try_into()
                    .map_err(|_| format!("Length mismatch: expected 32 - {base64_url_string}"))
            })
    }

    fn empty() -> Self {
        [0u8; 32]
    }
}
