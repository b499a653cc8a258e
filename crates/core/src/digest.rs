//! Content digests and incremental hashing.
//!
//! A digest is the lowercase hex encoding of a hash over the *decompressed*
//! content. The hash function is chosen per namespace.

use serde::{Deserialize, Serialize};
use sha1::Sha1;
use sha2::{Digest, Sha256};
use std::fmt;
use std::str::FromStr;

/// Hash algorithm identifiers as they appear on the wire.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HashAlgo {
    #[serde(rename = "sha-1")]
    Sha1,
    #[serde(rename = "sha-256")]
    Sha256,
}

impl HashAlgo {
    /// Wire identifier of this algorithm.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Sha1 => "sha-1",
            Self::Sha256 => "sha-256",
        }
    }

    /// Length of a hex-encoded digest produced by this algorithm.
    pub fn hex_len(self) -> usize {
        match self {
            Self::Sha1 => 40,
            Self::Sha256 => 64,
        }
    }

    /// Create an incremental hasher.
    pub fn hasher(self) -> DigestHasher {
        match self {
            Self::Sha1 => DigestHasher::Sha1(Sha1::new()),
            Self::Sha256 => DigestHasher::Sha256(Sha256::new()),
        }
    }

    /// Hash a complete buffer.
    pub fn compute(self, data: &[u8]) -> HexDigest {
        let mut hasher = self.hasher();
        hasher.update(data);
        hasher.finalize()
    }
}

impl fmt::Display for HashAlgo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HashAlgo {
    type Err = crate::Error;

    fn from_str(s: &str) -> crate::Result<Self> {
        match s {
            "sha-1" => Ok(Self::Sha1),
            "sha-256" => Ok(Self::Sha256),
            other => Err(crate::Error::UnknownHashAlgo(other.to_string())),
        }
    }
}

/// Incremental hasher over one of the supported algorithms.
#[derive(Clone)]
pub enum DigestHasher {
    Sha1(Sha1),
    Sha256(Sha256),
}

impl DigestHasher {
    /// Update the hasher with data.
    pub fn update(&mut self, data: &[u8]) {
        match self {
            Self::Sha1(h) => h.update(data),
            Self::Sha256(h) => h.update(data),
        }
    }

    /// Finalize and return the hex digest.
    pub fn finalize(self) -> HexDigest {
        let hex = match self {
            Self::Sha1(h) => hex::encode(h.finalize()),
            Self::Sha256(h) => hex::encode(h.finalize()),
        };
        HexDigest(hex)
    }
}

impl fmt::Debug for DigestHasher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sha1(_) => f.write_str("DigestHasher(sha-1)"),
            Self::Sha256(_) => f.write_str("DigestHasher(sha-256)"),
        }
    }
}

/// A lowercase hex content digest.
///
/// Deserialization only checks the character set; the length check depends
/// on the namespace and is done by [`HexDigest::validate`].
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct HexDigest(String);

impl HexDigest {
    /// Parse and validate a digest for the given algorithm.
    pub fn parse(s: &str, algo: HashAlgo) -> crate::Result<Self> {
        let digest = Self::from_str(s)?;
        digest.validate(algo)?;
        Ok(digest)
    }

    /// Check that the digest has the length produced by `algo`.
    pub fn validate(&self, algo: HashAlgo) -> crate::Result<()> {
        if self.0.len() != algo.hex_len() {
            return Err(crate::Error::InvalidDigest(format!(
                "expected {} hex chars for {}, got {}",
                algo.hex_len(),
                algo,
                self.0.len()
            )));
        }
        Ok(())
    }

    /// Check validity without building an error.
    pub fn is_valid(&self, algo: HashAlgo) -> bool {
        self.validate(algo).is_ok()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Two-level shard prefix (`aa/bb`) used to bound directory fan-out.
    ///
    /// Returns `None` for digests shorter than four characters.
    pub fn shard(&self) -> Option<(&str, &str)> {
        if self.0.len() < 4 {
            return None;
        }
        Some((&self.0[..2], &self.0[2..4]))
    }
}

impl FromStr for HexDigest {
    type Err = crate::Error;

    fn from_str(s: &str) -> crate::Result<Self> {
        if s.is_empty() {
            return Err(crate::Error::InvalidDigest("empty digest".to_string()));
        }
        if let Some(c) = s
            .chars()
            .find(|c| !matches!(c, '0'..='9' | 'a'..='f'))
        {
            return Err(crate::Error::InvalidDigest(format!(
                "unexpected character {c:?} in {s:?}"
            )));
        }
        Ok(Self(s.to_string()))
    }
}

impl<'de> Deserialize<'de> for HexDigest {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Self::from_str(&s).map_err(serde::de::Error::custom)
    }
}

impl AsRef<str> for HexDigest {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for HexDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let end = self.0.len().min(16);
        write!(f, "HexDigest({})", &self.0[..end])
    }
}

impl fmt::Display for HexDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One item to look up on the server.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DigestItem {
    pub digest: HexDigest,
    #[serde(default)]
    pub is_isolated: bool,
    pub size: i64,
}

impl DigestItem {
    pub fn new(digest: HexDigest, size: i64) -> Self {
        Self {
            digest,
            is_isolated: false,
            size,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sha1_known_vectors() {
        assert_eq!(
            HashAlgo::Sha1.compute(b"foo").as_str(),
            "0beec7b5ea3f0fdbc95d0dd47f3c5bc275da8a33"
        );
        assert_eq!(
            HashAlgo::Sha1.compute(b"bar").as_str(),
            "62cdb7020ff920e5aa642c3d4066950dd1f01f4d"
        );
    }

    #[test]
    fn incremental_matches_oneshot() {
        let mut hasher = HashAlgo::Sha256.hasher();
        hasher.update(b"hello ");
        hasher.update(b"world");
        assert_eq!(hasher.finalize(), HashAlgo::Sha256.compute(b"hello world"));
        assert_eq!(
            HashAlgo::Sha256.compute(b"hello world").as_str(),
            "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9"
        );
    }

    #[test]
    fn parse_checks_length_and_charset() {
        let ok = "0beec7b5ea3f0fdbc95d0dd47f3c5bc275da8a33";
        assert!(HexDigest::parse(ok, HashAlgo::Sha1).is_ok());
        assert!(HexDigest::parse(ok, HashAlgo::Sha256).is_err());
        assert!(HexDigest::parse(&ok.to_uppercase(), HashAlgo::Sha1).is_err());
        assert!(HexDigest::parse("zz", HashAlgo::Sha1).is_err());
        assert!(HexDigest::parse("", HashAlgo::Sha1).is_err());
        assert!(HexDigest::parse("../../etc/passwd", HashAlgo::Sha1).is_err());
    }

    #[test]
    fn shard_uses_leading_chars() {
        let d = HashAlgo::Sha1.compute(b"foo");
        assert_eq!(d.shard(), Some(("0b", "ee")));
    }

    #[test]
    fn algo_wire_names() {
        assert_eq!("sha-1".parse::<HashAlgo>().unwrap(), HashAlgo::Sha1);
        assert_eq!(
            serde_json::to_string(&HashAlgo::Sha256).unwrap(),
            "\"sha-256\""
        );
        assert!("md5".parse::<HashAlgo>().is_err());
    }

    #[test]
    fn digest_item_serializes_wire_fields() {
        let item = DigestItem::new(HashAlgo::Sha1.compute(b"foo"), 3);
        let json = serde_json::to_value(&item).unwrap();
        assert_eq!(json["digest"], "0beec7b5ea3f0fdbc95d0dd47f3c5bc275da8a33");
        assert_eq!(json["is_isolated"], false);
        assert_eq!(json["size"], 3);
    }
}
