use async_trait::async_trait;
use hoard_client::{
    ClientError, ClientResult, ContentSource, FileHasher, IsolateServer, PushState, StreamingHasher,
};
use hoard_core::protocol::ServerDetails;
use hoard_core::{DigestItem, HashAlgo, NamespaceSpec};
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

/// Tracks how many calls are in flight at once.
#[allow(dead_code)]
#[derive(Default)]
pub struct Gauge {
    current: AtomicUsize,
    peak: AtomicUsize,
}

#[allow(dead_code)]
impl Gauge {
    pub fn enter(&self) -> GaugeGuard<'_> {
        let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        GaugeGuard(self)
    }

    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

pub struct GaugeGuard<'a>(&'a Gauge);

impl Drop for GaugeGuard<'_> {
    fn drop(&mut self) {
        self.0.current.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Wraps a server, recording batch sizes and push concurrency.
#[allow(dead_code)]
pub struct Instrumented {
    pub inner: Arc<dyn IsolateServer>,
    pub batches: Mutex<Vec<usize>>,
    pub pushes: Gauge,
    pub push_delay: Duration,
}

#[allow(dead_code)]
impl Instrumented {
    pub fn new(inner: Arc<dyn IsolateServer>, push_delay: Duration) -> Self {
        Self {
            inner,
            batches: Mutex::new(Vec::new()),
            pushes: Gauge::default(),
            push_delay,
        }
    }

    pub fn batches(&self) -> Vec<usize> {
        self.batches.lock().unwrap().clone()
    }
}

#[async_trait]
impl IsolateServer for Instrumented {
    fn namespace(&self) -> &NamespaceSpec {
        self.inner.namespace()
    }

    async fn server_capabilities(&self) -> ClientResult<ServerDetails> {
        self.inner.server_capabilities().await
    }

    async fn contains(&self, items: &[DigestItem]) -> ClientResult<Vec<Option<PushState>>> {
        self.batches.lock().unwrap().push(items.len());
        self.inner.contains(items).await
    }

    async fn push(&self, state: &mut PushState, source: ContentSource) -> ClientResult<()> {
        let _guard = self.pushes.enter();
        tokio::time::sleep(self.push_delay).await;
        self.inner.push(state, source).await
    }
}

/// A server whose existence check or push always fails.
#[allow(dead_code)]
pub struct Broken {
    pub namespace: NamespaceSpec,
    pub fail_contains: bool,
}

#[async_trait]
impl IsolateServer for Broken {
    fn namespace(&self) -> &NamespaceSpec {
        &self.namespace
    }

    async fn server_capabilities(&self) -> ClientResult<ServerDetails> {
        Ok(ServerDetails {
            server_version: "broken".to_string(),
        })
    }

    async fn contains(&self, items: &[DigestItem]) -> ClientResult<Vec<Option<PushState>>> {
        if self.fail_contains {
            return Err(ClientError::Protocol("contains unavailable".to_string()));
        }
        Ok(items
            .iter()
            .enumerate()
            .map(|(index, _)| {
                Some(PushState::new(hoard_core::protocol::PreuploadStatus {
                    gs_upload_url: None,
                    upload_ticket: format!("broken-{index}"),
                    index,
                }))
            })
            .collect())
    }

    async fn push(&self, _state: &mut PushState, _source: ContentSource) -> ClientResult<()> {
        Err(ClientError::Api {
            status: 503,
            body: "push unavailable".to_string(),
        })
    }
}

/// Hashes like [`StreamingHasher`] after a delay, recording concurrency.
#[allow(dead_code)]
pub struct SlowHasher {
    pub inner: StreamingHasher,
    pub active: Gauge,
    pub delay: Duration,
}

#[allow(dead_code)]
impl SlowHasher {
    pub fn new(delay: Duration) -> Self {
        Self {
            inner: StreamingHasher::new(HashAlgo::Sha1),
            active: Gauge::default(),
            delay,
        }
    }
}

#[async_trait]
impl FileHasher for SlowHasher {
    async fn hash_file(&self, path: &Path) -> ClientResult<DigestItem> {
        let _guard = self.active.enter();
        tokio::time::sleep(self.delay).await;
        self.inner.hash_file(path).await
    }
}
