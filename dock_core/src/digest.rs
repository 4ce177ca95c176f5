//! Content digests using SHA3-256.

use crate::error::{Error, Result};
use serde::de::{self, Deserializer, Visitor};
use serde::{Deserialize, Serialize, Serializer};
use sha3::{Digest as _, Sha3_256};
use std::fmt;
use std::io::Read;
use std::path::{Path, PathBuf};

/// Digest size in bytes (SHA3-256 produces 256-bit digests).
pub const DIGEST_SIZE: usize = 32;

/// Length of a digest in lowercase hex characters.
pub const DIGEST_HEX_LEN: usize = DIGEST_SIZE * 2;

/// Number of leading hex characters used as the shard directory name.
pub const SHARD_WIDTH: usize = 2;

/// A 32-byte SHA3-256 digest.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Digest([u8; DIGEST_SIZE]);

impl Digest {
    /// Create a Digest from raw bytes.
    pub fn from_bytes(bytes: [u8; DIGEST_SIZE]) -> Self {
        Digest(bytes)
    }

    /// Create a Digest from a hex string (64 hex characters).
    pub fn from_hex(hex_str: &str) -> Result<Self> {
        if hex_str.len() != DIGEST_HEX_LEN {
            return Err(Error::invalid_digest(format!(
                "Expected {} hex characters, got {}",
                DIGEST_HEX_LEN,
                hex_str.len()
            )));
        }

        let bytes = hex::decode(hex_str)
            .map_err(|e| Error::invalid_digest(format!("Invalid hex: {}", e)))?;

        let mut digest = [0u8; DIGEST_SIZE];
        digest.copy_from_slice(&bytes);
        Ok(Digest(digest))
    }

    /// Convert to lowercase hex string (64 characters).
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// The shard directory name: the first `SHARD_WIDTH` hex characters.
    pub fn prefix(&self) -> String {
        self.to_hex()[..SHARD_WIDTH].to_string()
    }

    /// The object file name: the remaining hex characters.
    pub fn suffix(&self) -> String {
        self.to_hex()[SHARD_WIDTH..].to_string()
    }

    /// Derive the sharded location of this digest under `base`.
    ///
    /// Returns: `{base}/{prefix}/{suffix}`
    pub fn shard_path(&self, base: &Path) -> PathBuf {
        base.join(self.prefix()).join(self.suffix())
    }

    /// Get the raw bytes.
    pub fn as_bytes(&self) -> &[u8; DIGEST_SIZE] {
        &self.0
    }

    /// Digest raw bytes.
    pub fn of_bytes(data: &[u8]) -> Self {
        Digest(Sha3_256::digest(data).into())
    }

    /// Digest data from a reader.
    pub fn of_reader<R: Read>(mut reader: R) -> Result<Self> {
        let mut hasher = Sha3_256::new();
        std::io::copy(&mut reader, &mut hasher)?;
        Ok(Digest(hasher.finalize().into()))
    }

    /// Digest a file's content.
    pub fn of_file(path: &Path) -> Result<Self> {
        let file = std::fs::File::open(path)?;
        Self::of_reader(file)
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl fmt::Debug for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Digest({})", self.to_hex())
    }
}

impl Serialize for Digest {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Digest {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        struct HexVisitor;

        impl Visitor<'_> for HexVisitor {
            type Value = Digest;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "a {}-character hex digest", DIGEST_HEX_LEN)
            }

            fn visit_str<E: de::Error>(self, v: &str) -> std::result::Result<Digest, E> {
                Digest::from_hex(v).map_err(E::custom)
            }
        }

        deserializer.deserialize_str(HexVisitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_digest_empty() {
        let digest = Digest::of_bytes(b"");
        assert_eq!(
            digest.to_hex(),
            "a7ffc6f8bf1ed76651c14756a061d662f580ff4de43b49fa82d80a4b80f8434a"
        );
    }

    #[test]
    fn test_digest_hello() {
        let digest = Digest::of_bytes(b"hello");
        assert_eq!(
            digest.to_hex(),
            "3338be694f50c5f338814986cdf0686453a888b84f424d792af4b9202398f392"
        );
    }

    #[test]
    fn test_digest_reader_matches_bytes() {
        let data = b"the quick brown fox".to_vec();
        let from_reader = Digest::of_reader(&data[..]).unwrap();
        assert_eq!(from_reader, Digest::of_bytes(&data));
    }

    #[test]
    fn test_digest_from_hex_invalid_length() {
        assert!(Digest::from_hex("abcd").is_err());
        assert!(Digest::from_hex("").is_err());
    }

    #[test]
    fn test_digest_from_hex_invalid_chars() {
        let invalid = "z".repeat(DIGEST_HEX_LEN);
        assert!(Digest::from_hex(&invalid).is_err());
    }

    #[test]
    fn test_shard_path() {
        let digest = Digest::of_bytes(b"test");
        let path = digest.shard_path(Path::new("objects"));
        let hex = digest.to_hex();
        assert_eq!(
            path,
            Path::new("objects").join(&hex[..2]).join(&hex[2..])
        );
    }

    #[test]
    fn test_serde_as_hex_string() {
        let digest = Digest::of_bytes(b"serde");
        let json = serde_json::to_string(&digest).unwrap();
        assert_eq!(json, format!("\"{}\"", digest.to_hex()));

        let parsed: Digest = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, digest);

        assert!(serde_json::from_str::<Digest>("\"abc\"").is_err());
    }

    // Property-based tests
    use proptest::prelude::*;

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 256,
            max_shrink_iters: 10000,
            ..ProptestConfig::default()
        })]

        /// Digesting the same data always produces the same digest
        #[test]
        fn prop_digest_deterministic(data: Vec<u8>) {
            prop_assert_eq!(Digest::of_bytes(&data), Digest::of_bytes(&data));
        }

        /// Prefix + suffix reconstruction equals full hex
        #[test]
        fn prop_prefix_suffix_concat(bytes in prop::array::uniform32(any::<u8>())) {
            let digest = Digest::from_bytes(bytes);
            let reconstructed = format!("{}{}", digest.prefix(), digest.suffix());
            prop_assert_eq!(digest.to_hex(), reconstructed);
            prop_assert_eq!(digest.prefix().len(), SHARD_WIDTH);
        }

        /// Invalid hex length always fails
        #[test]
        fn prop_invalid_hex_length_fails(
            s in "[0-9a-f]{0,63}|[0-9a-f]{65,128}"
        ) {
            prop_assert!(Digest::from_hex(&s).is_err());
        }
    }
}
