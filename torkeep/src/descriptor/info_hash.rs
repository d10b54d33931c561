//! Content identity of a transfer.

use std::fmt;

use data_encoding::BASE32;
use sha1::{Digest, Sha1};

use super::error::DescriptorError;

/// BitTorrent v1 info-hash: SHA-1 over the bencoded `info` dictionary.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InfoHash([u8; 20]);

impl InfoHash {
    /// Length of the hash in bytes.
    pub const LEN: usize = 20;

    pub const fn new(bytes: [u8; 20]) -> Self {
        Self(bytes)
    }

    /// Build from a slice, `None` unless it is exactly 20 bytes.
    pub fn from_slice(bytes: &[u8]) -> Option<Self> {
        <[u8; 20]>::try_from(bytes).ok().map(Self)
    }

    /// Hash the raw bytes of an `info` dictionary.
    pub fn of_info_dict(raw: &[u8]) -> Self {
        let digest = Sha1::digest(raw);
        let mut bytes = [0u8; 20];
        bytes.copy_from_slice(&digest);
        Self(bytes)
    }

    /// Parse the `btih` form used in magnet links: 40 hex or 32 base32 chars.
    pub fn parse(s: &str) -> Result<Self, DescriptorError> {
        let decoded = match s.len() {
            40 => hex::decode(s).map_err(|e| DescriptorError::InvalidInfoHash(e.to_string()))?,
            32 => BASE32
                .decode(s.to_uppercase().as_bytes())
                .map_err(|e| DescriptorError::InvalidInfoHash(e.to_string()))?,
            n => {
                return Err(DescriptorError::InvalidInfoHash(format!(
                    "expected 40 hex or 32 base32 characters, got {}",
                    n
                )))
            }
        };
        Self::from_slice(&decoded)
            .ok_or_else(|| DescriptorError::InvalidInfoHash("wrong decoded length".to_string()))
    }

    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Display for InfoHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for InfoHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "InfoHash({})", self.to_hex())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEX: &str = "c12fe1c06bba254a9dc9f519b335aa7c1367a88a";

    #[test]
    fn test_parse_hex_and_base32_agree() {
        let from_hex = InfoHash::parse(HEX).unwrap();
        let base32 = BASE32.encode(from_hex.as_bytes());
        let from_base32 = InfoHash::parse(&base32.to_lowercase()).unwrap();
        assert_eq!(from_hex, from_base32);
        assert_eq!(from_hex.to_string(), HEX);
    }

    #[test]
    fn test_parse_rejects_wrong_length() {
        let err = InfoHash::parse("abcd").unwrap_err();
        assert!(err.to_string().contains("got 4"));
    }

    #[test]
    fn test_of_info_dict_is_sha1() {
        // SHA-1 of the empty string
        assert_eq!(
            InfoHash::of_info_dict(b"").to_hex(),
            "da39a3ee5e6b4b0d3255bfef95601890afd80709"
        );
    }
}
