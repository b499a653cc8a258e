//! Isolate server client over JSON/HTTP.

use crate::error::{ClientError, ClientResult};
use crate::server::{ContentSource, IsolateServer, PushState, align_statuses, unpack_entry};
use async_trait::async_trait;
use bytes::Bytes;
use hoard_core::config::ClientConfig;
use hoard_core::protocol::{
    API_PREFIX, DigestCollection, FinalizeRequest, JSON_CONTENT_TYPE, ServerDetails,
    ServerDetailsRequest, StorageRequest, UrlCollection, retrieve_path,
};
use hoard_core::{DigestItem, HexDigest, NamespaceSpec, compress_reader};
use reqwest::header::CONTENT_TYPE;
use reqwest::{RequestBuilder, Url};
use serde::Serialize;
use serde::de::{DeserializeOwned, IgnoredAny};
use tokio::io::AsyncReadExt;
use tokio_util::io::ReaderStream;

/// Talks to a remote isolate server.
#[derive(Clone)]
pub struct HttpIsolateServer {
    http: reqwest::Client,
    base_url: Url,
    namespace: NamespaceSpec,
    token: Option<String>,
}

impl HttpIsolateServer {
    pub fn new(base_url: &str, namespace: NamespaceSpec) -> ClientResult<Self> {
        Self::with_client(reqwest::Client::new(), base_url, namespace)
    }

    /// Use a preconfigured HTTP client.
    pub fn with_client(
        http: reqwest::Client,
        base_url: &str,
        namespace: NamespaceSpec,
    ) -> ClientResult<Self> {
        namespace.validate()?;
        let base_url = Url::parse(base_url)?;
        Ok(Self {
            http,
            base_url,
            namespace,
            token: None,
        })
    }

    /// Build a client from configuration. Requires `server` to be set.
    pub fn from_config(config: &ClientConfig) -> ClientResult<Self> {
        let server = config
            .server
            .as_deref()
            .ok_or_else(|| ClientError::Config("no server URL configured".to_string()))?;
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = config.connect_timeout() {
            builder = builder.connect_timeout(timeout);
        }
        let client = Self::with_client(builder.build()?, server, config.namespace.clone())?;
        Ok(match &config.token {
            Some(token) => client.with_token(token),
            None => client,
        })
    }

    /// Send `Authorization: Bearer <token>` with every request to the server.
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    fn url(&self, path: &str) -> ClientResult<Url> {
        Ok(self.base_url.join(path)?)
    }

    fn authorize(&self, req: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => req.bearer_auth(token),
            None => req,
        }
    }

    async fn send_checked(req: RequestBuilder) -> ClientResult<reqwest::Response> {
        let response = req.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ClientError::Api {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }

    async fn post_json<I, O>(&self, endpoint: &str, body: &I) -> ClientResult<O>
    where
        I: Serialize + ?Sized,
        O: DeserializeOwned,
    {
        let url = self.url(&format!("{API_PREFIX}/{endpoint}"))?;
        let req = self
            .http
            .post(url)
            .header(CONTENT_TYPE, JSON_CONTENT_TYPE)
            .body(serde_json::to_vec(body)?);
        let response = Self::send_checked(self.authorize(req)).await?;
        let body = response.bytes().await?;
        Ok(serde_json::from_slice(&body)?)
    }

    /// Notify the server that an external upload completed.
    pub async fn finalize(&self, ticket: &str) -> ClientResult<()> {
        let req = FinalizeRequest {
            upload_ticket: ticket.to_string(),
        };
        let _: IgnoredAny = self.post_json("finalize_gs_upload", &req).await?;
        Ok(())
    }

    /// Fetch the stored (compressed) bytes of an entry.
    pub async fn retrieve(&self, digest: &HexDigest) -> ClientResult<Bytes> {
        let url = self.url(&retrieve_path(&self.namespace.namespace, digest))?;
        let response = Self::send_checked(self.authorize(self.http.get(url))).await?;
        Ok(response.bytes().await?)
    }

    /// Fetch an entry, decompress it and check it hashes to `digest`.
    pub async fn fetch(&self, digest: &HexDigest) -> ClientResult<Vec<u8>> {
        digest.validate(self.namespace.digest_hash)?;
        let stored = self.retrieve(digest).await?;
        unpack_entry(&self.namespace, digest, &stored)
    }

    async fn upload(&self, state: &PushState, source: ContentSource) -> ClientResult<()> {
        let mut compressed = compress_reader(self.namespace.compression, source);

        let Some(upload_url) = state.upload_url() else {
            let mut content = Vec::new();
            compressed.read_to_end(&mut content).await?;
            let req = StorageRequest {
                upload_ticket: state.ticket().to_string(),
                content,
            };
            let _: IgnoredAny = self.post_json("store_inline", &req).await?;
            return Ok(());
        };

        // External destinations get the raw compressed stream and no token.
        let url = Url::parse(upload_url)?;
        let body = reqwest::Body::wrap_stream(ReaderStream::new(compressed));
        let req = self
            .http
            .put(url)
            .header(CONTENT_TYPE, "application/octet-stream")
            .body(body);
        Self::send_checked(req).await?;
        Ok(())
    }
}

#[async_trait]
impl IsolateServer for HttpIsolateServer {
    fn namespace(&self) -> &NamespaceSpec {
        &self.namespace
    }

    async fn server_capabilities(&self) -> ClientResult<ServerDetails> {
        self.post_json("server_details", &ServerDetailsRequest {})
            .await
    }

    async fn contains(&self, items: &[DigestItem]) -> ClientResult<Vec<Option<PushState>>> {
        let req = DigestCollection {
            items: items.to_vec(),
            namespace: self.namespace.clone(),
        };
        let response: UrlCollection = self.post_json("preupload", &req).await?;
        align_statuses(items.len(), response.items)
    }

    async fn push(&self, state: &mut PushState, source: ContentSource) -> ClientResult<()> {
        // A retry after a failed finalize must not resend the content.
        if !state.is_uploaded() {
            self.upload(state, source).await?;
            state.mark_uploaded();
        }
        if state.upload_url().is_some() {
            self.finalize(state.ticket()).await?;
        }
        state.mark_finalized();
        tracing::debug!(ticket = state.ticket(), "pushed");
        Ok(())
    }
}
