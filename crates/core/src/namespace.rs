//! Namespace specifications.
//!
//! A namespace scopes a storage area and fixes the hash function and the
//! compression used for every entry stored in it.

use crate::digest::HashAlgo;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Maximum length of a namespace name.
pub const MAX_NAMESPACE_LEN: usize = 128;

/// Compression applied to content on the wire and at rest.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Compression {
    /// No compression (`""`).
    Identity,
    /// zlib (RFC 1950) wrapped deflate, named `"flate"` or `"zlib"`.
    #[default]
    Zlib,
}

impl Compression {
    /// Canonical wire identifier.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Identity => "",
            Self::Zlib => "flate",
        }
    }
}

impl FromStr for Compression {
    type Err = crate::Error;

    fn from_str(s: &str) -> crate::Result<Self> {
        match s {
            "" => Ok(Self::Identity),
            "flate" | "zlib" => Ok(Self::Zlib),
            other => Err(crate::Error::UnknownCompression(other.to_string())),
        }
    }
}

impl fmt::Display for Compression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Identity => f.write_str("identity"),
            Self::Zlib => f.write_str("zlib"),
        }
    }
}

impl Serialize for Compression {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Compression {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// A (name, hash algorithm, compression) triple.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NamespaceSpec {
    pub namespace: String,
    pub digest_hash: HashAlgo,
    #[serde(default)]
    pub compression: Compression,
}

impl NamespaceSpec {
    pub fn new(namespace: impl Into<String>, digest_hash: HashAlgo, compression: Compression) -> Self {
        Self {
            namespace: namespace.into(),
            digest_hash,
            compression,
        }
    }

    /// Check that the name is safe to use as a single path component.
    pub fn validate(&self) -> crate::Result<()> {
        validate_namespace_name(&self.namespace)
    }
}

impl Default for NamespaceSpec {
    fn default() -> Self {
        Self::new("default-gzip", HashAlgo::Sha1, Compression::Zlib)
    }
}

impl fmt::Display for NamespaceSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({}, {})",
            self.namespace, self.digest_hash, self.compression
        )
    }
}

/// Validate a namespace name: `[A-Za-z0-9._-]`, not starting with a dot.
pub fn validate_namespace_name(name: &str) -> crate::Result<()> {
    if name.is_empty() {
        return Err(crate::Error::InvalidNamespace("empty name".to_string()));
    }
    if name.len() > MAX_NAMESPACE_LEN {
        return Err(crate::Error::InvalidNamespace(format!(
            "name longer than {MAX_NAMESPACE_LEN} characters"
        )));
    }
    if name.starts_with('.') {
        return Err(crate::Error::InvalidNamespace(format!(
            "name must not start with '.': {name}"
        )));
    }
    if !name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
    {
        return Err(crate::Error::InvalidNamespace(format!(
            "invalid characters in name: {name}"
        )));
    }
    Ok(())
}
