//! Wire types for the isolate JSON-over-HTTP protocol.
//!
//! Every endpoint is a POST under [`API_PREFIX`] exchanging JSON bodies with
//! content-type [`JSON_CONTENT_TYPE`]. Content is retrieved with a plain GET
//! under [`RETRIEVE_PREFIX`].

use crate::digest::{DigestItem, HexDigest};
use crate::namespace::{NamespaceSpec, validate_namespace_name};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Path prefix of the JSON endpoints.
pub const API_PREFIX: &str = "/_ah/api/isolateservice/v1";

/// Path prefix of the content retrieval endpoint.
pub const RETRIEVE_PREFIX: &str = "/content-gs/retrieve";

/// Content type used for every JSON request and response.
pub const JSON_CONTENT_TYPE: &str = "application/json; charset=utf-8";

/// Request body of `server_details`: must be the empty object.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServerDetailsRequest {}

/// Server details as exposed by the server.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerDetails {
    pub server_version: String,
}

/// Request body of `preupload`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DigestCollection {
    pub items: Vec<DigestItem>,
    pub namespace: NamespaceSpec,
}

/// One missing item in a `preupload` response.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreuploadStatus {
    /// External destination for the bytes; absent for inline storage.
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "empty_as_none"
    )]
    pub gs_upload_url: Option<String>,
    pub upload_ticket: String,
    /// Position of the item in the request.
    #[serde(with = "index_string")]
    pub index: usize,
}

/// Response body of `preupload`. Present items are omitted.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UrlCollection {
    #[serde(default)]
    pub items: Vec<PreuploadStatus>,
}

/// Request body of `finalize_gs_upload`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FinalizeRequest {
    pub upload_ticket: String,
}

/// Request body of `store_inline`.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageRequest {
    pub upload_ticket: String,
    /// Compressed content, base64 on the wire.
    #[serde(with = "base64_bytes")]
    pub content: Vec<u8>,
}

impl fmt::Debug for StorageRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StorageRequest")
            .field("upload_ticket", &self.upload_ticket)
            .field("content_len", &self.content.len())
            .finish()
    }
}

/// Acknowledgement returned by the push endpoints.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OkResponse {
    pub ok: String,
}

impl Default for OkResponse {
    fn default() -> Self {
        Self {
            ok: "true".to_string(),
        }
    }
}

/// Ticket handed out by `preupload` for each missing item.
///
/// Encoded as `ticket:<namespace>/<digest>` so the push endpoints can route
/// the content without server-side session state.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct UploadTicket {
    pub namespace: String,
    pub digest: HexDigest,
}

const TICKET_PREFIX: &str = "ticket:";

impl UploadTicket {
    pub fn new(namespace: impl Into<String>, digest: HexDigest) -> Self {
        Self {
            namespace: namespace.into(),
            digest,
        }
    }
}

impl fmt::Display for UploadTicket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{TICKET_PREFIX}{}/{}", self.namespace, self.digest)
    }
}

impl FromStr for UploadTicket {
    type Err = crate::Error;

    fn from_str(s: &str) -> crate::Result<Self> {
        let rest = s
            .strip_prefix(TICKET_PREFIX)
            .ok_or_else(|| crate::Error::InvalidTicket(format!("missing prefix: {s:?}")))?;
        let (namespace, digest) = rest
            .split_once('/')
            .ok_or_else(|| crate::Error::InvalidTicket(format!("missing digest: {s:?}")))?;
        validate_namespace_name(namespace)
            .map_err(|e| crate::Error::InvalidTicket(e.to_string()))?;
        let digest = digest
            .parse()
            .map_err(|e: crate::Error| crate::Error::InvalidTicket(e.to_string()))?;
        Ok(Self::new(namespace, digest))
    }
}

/// Build the retrieval path for a digest.
pub fn retrieve_path(namespace: &str, digest: &HexDigest) -> String {
    format!("{RETRIEVE_PREFIX}/{namespace}/{digest}")
}

fn empty_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value = Option::<String>::deserialize(deserializer)?;
    Ok(value.filter(|s| !s.is_empty()))
}

mod index_string {
    use serde::{Deserialize, Deserializer, Serializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Number(u64),
        Text(String),
    }

    pub fn serialize<S: Serializer>(index: &usize, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&index.to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<usize, D::Error> {
        let value = match Raw::deserialize(deserializer)? {
            Raw::Number(n) => n,
            Raw::Text(s) => s.parse().map_err(serde::de::Error::custom)?,
        };
        usize::try_from(value).map_err(serde::de::Error::custom)
    }
}

mod base64_bytes {
    use base64::Engine;
    use base64::engine::general_purpose::STANDARD;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(deserializer)?;
        STANDARD.decode(s).map_err(serde::de::Error::custom)
    }
}
