//! The archiver pipeline: hash, batched existence check, bounded upload.
//!
//! Paths pushed into an [`Archiver`] flow through three long-lived stage
//! tasks connected by bounded channels. Each stage fans work out to
//! short-lived workers capped by a semaphore. Per-item errors never stop the
//! pipeline; they are collected as [`ItemFailure`]s and returned by
//! [`Archiver::close`].

use crate::error::{ClientError, ClientResult};
use crate::hasher::{FileHasher, StreamingHasher};
use crate::server::{IsolateServer, PushState};
use crate::stats::{Stats, UploadStat};
use futures::FutureExt;
use hoard_core::DigestItem;
use hoard_core::config::ArchiverConfig;
use std::any::Any;
use std::fmt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};
use tokio::sync::{OwnedSemaphorePermit, Semaphore, mpsc};
use tokio::task::{JoinHandle, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Pipeline stage in which an item failed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Stage {
    Hash,
    Contains,
    Upload,
}

impl Stage {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Hash => "hash",
            Self::Contains => "contains",
            Self::Upload => "upload",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An unrecoverable error for one pushed path.
#[derive(Clone, Debug)]
pub struct ItemFailure {
    pub path: PathBuf,
    pub stage: Stage,
    /// Shared because one failed batch fails all of its items.
    pub error: Arc<ClientError>,
}

impl fmt::Display for ItemFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}): {}", self.path.display(), self.stage, self.error)
    }
}

/// State shared by all stages.
#[derive(Default)]
struct Shared {
    stats: Mutex<Stats>,
    failures: Mutex<Vec<ItemFailure>>,
}

impl Shared {
    fn stats(&self) -> MutexGuard<'_, Stats> {
        self.stats.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn failures(&self) -> MutexGuard<'_, Vec<ItemFailure>> {
        self.failures.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn fail(&self, path: PathBuf, stage: Stage, error: impl Into<Arc<ClientError>>) {
        let failure = ItemFailure {
            path,
            stage,
            error: error.into(),
        };
        warn!(path = %failure.path.display(), stage = %stage, error = %failure.error, "Item failed");
        self.failures().push(failure);
    }
}

/// A file whose digest is known.
struct Hashed {
    path: PathBuf,
    item: DigestItem,
}

/// A file the server is missing.
struct Pending {
    path: PathBuf,
    size: i64,
    state: PushState,
}

/// Builder for [`Archiver`].
pub struct ArchiverBuilder {
    server: Arc<dyn IsolateServer>,
    config: ArchiverConfig,
    hasher: Option<Arc<dyn FileHasher>>,
    cancel: CancellationToken,
}

impl ArchiverBuilder {
    pub fn config(mut self, config: ArchiverConfig) -> Self {
        self.config = config;
        self
    }

    /// Replace the default streaming hasher, e.g. with a caching one.
    pub fn hasher(mut self, hasher: Arc<dyn FileHasher>) -> Self {
        self.hasher = Some(hasher);
        self
    }

    pub fn cancellation_token(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Spawn the stage tasks. Must be called within a tokio runtime.
    pub fn start(self) -> ClientResult<Archiver> {
        let config = self.config;
        config.validate().map_err(ClientError::Config)?;

        let hasher = self.hasher.unwrap_or_else(|| {
            Arc::new(StreamingHasher::new(self.server.namespace().digest_hash))
        });
        let shared = Arc::new(Shared::default());
        let cancel = self.cancel;

        let (input_tx, input_rx) = mpsc::channel(config.queue_capacity);
        let (hashed_tx, hashed_rx) = mpsc::channel(config.queue_capacity);
        let (pending_tx, pending_rx) = mpsc::channel(config.queue_capacity);

        let tasks = vec![
            tokio::spawn(hash_stage(
                input_rx,
                hashed_tx,
                hasher,
                Arc::new(Semaphore::new(config.hash_concurrency)),
                shared.clone(),
                cancel.clone(),
            )),
            tokio::spawn(contains_stage(
                hashed_rx,
                pending_tx,
                self.server.clone(),
                Arc::new(Semaphore::new(config.contains_concurrency)),
                config.batch_delay(),
                shared.clone(),
                cancel.clone(),
            )),
            tokio::spawn(upload_stage(
                pending_rx,
                self.server,
                Arc::new(Semaphore::new(config.upload_concurrency)),
                shared.clone(),
                cancel.clone(),
            )),
        ];

        debug!(
            hash = config.hash_concurrency,
            contains = config.contains_concurrency,
            upload = config.upload_concurrency,
            "Archiver started"
        );

        Ok(Archiver {
            input: Some(input_tx),
            tasks,
            shared,
            cancel,
        })
    }
}

/// Handle to a running archiver pipeline.
pub struct Archiver {
    input: Option<mpsc::Sender<PathBuf>>,
    tasks: Vec<JoinHandle<()>>,
    shared: Arc<Shared>,
    cancel: CancellationToken,
}

impl Archiver {
    pub fn builder(server: Arc<dyn IsolateServer>) -> ArchiverBuilder {
        ArchiverBuilder {
            server,
            config: ArchiverConfig::default(),
            hasher: None,
            cancel: CancellationToken::new(),
        }
    }

    /// Start an archiver with the default hasher.
    pub fn new(server: Arc<dyn IsolateServer>, config: ArchiverConfig) -> ClientResult<Self> {
        Self::builder(server).config(config).start()
    }

    /// Queue a file for archival. Waits only while the input queue is full.
    pub async fn push_file(&self, path: impl Into<PathBuf>) -> ClientResult<()> {
        let input = self.input.as_ref().ok_or(ClientError::Closed)?;
        input
            .send(path.into())
            .await
            .map_err(|_| ClientError::Closed)
    }

    /// Stop accepting paths, drain the pipeline and return every failure.
    ///
    /// Calling `close` again returns the same failures.
    pub async fn close(&mut self) -> Vec<ItemFailure> {
        drop(self.input.take());
        for task in self.tasks.drain(..) {
            if let Err(e) = task.await {
                self.shared
                    .fail(PathBuf::new(), Stage::Hash, ClientError::Worker(e.to_string()));
            }
        }
        let failures = self.failures();
        info!(stats = %self.stats(), failures = failures.len(), "Archiver closed");
        failures
    }

    /// Snapshot of the statistics so far.
    pub fn stats(&self) -> Stats {
        self.shared.stats().clone()
    }

    /// Snapshot of the failures so far.
    pub fn failures(&self) -> Vec<ItemFailure> {
        self.shared.failures().clone()
    }

    /// True iff at least one item failed.
    pub fn has_failed(&self) -> bool {
        !self.shared.failures().is_empty()
    }

    /// Stop starting new work. Items not yet started fail as cancelled.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_closed(&self) -> bool {
        self.input.is_none()
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "worker panicked".to_string()
    }
}

/// Run `work` on `workers`, turning a panic into a failure for `path`.
fn spawn_worker<F>(
    workers: &mut JoinSet<()>,
    permit: OwnedSemaphorePermit,
    shared: &Arc<Shared>,
    path: &Path,
    stage: Stage,
    work: F,
) where
    F: Future<Output = ()> + Send + 'static,
{
    let shared = shared.clone();
    let path = path.to_path_buf();
    workers.spawn(async move {
        let _permit = permit;
        if let Err(panic) = AssertUnwindSafe(work).catch_unwind().await {
            shared.fail(path, stage, ClientError::Worker(panic_message(&*panic)));
        }
    });
    while let Some(joined) = workers.try_join_next() {
        if let Err(e) = joined {
            warn!(error = %e, stage = %stage, "Worker did not complete");
        }
    }
}

async fn drain(workers: &mut JoinSet<()>, stage: Stage) {
    while let Some(joined) = workers.join_next().await {
        if let Err(e) = joined {
            warn!(error = %e, stage = %stage, "Worker did not complete");
        }
    }
}

async fn hash_stage(
    mut input: mpsc::Receiver<PathBuf>,
    output: mpsc::Sender<Hashed>,
    hasher: Arc<dyn FileHasher>,
    limit: Arc<Semaphore>,
    shared: Arc<Shared>,
    cancel: CancellationToken,
) {
    let mut workers = JoinSet::new();
    while let Some(path) = input.recv().await {
        if cancel.is_cancelled() {
            shared.fail(path, Stage::Hash, ClientError::Cancelled);
            continue;
        }
        let Ok(permit) = limit.clone().acquire_owned().await else {
            shared.fail(path, Stage::Hash, ClientError::Closed);
            continue;
        };

        let hasher = hasher.clone();
        let output = output.clone();
        let worker_shared = shared.clone();
        let worker_path = path.clone();
        spawn_worker(&mut workers, permit, &shared, &path, Stage::Hash, async move {
            match hasher.hash_file(&worker_path).await {
                Ok(item) => {
                    let hashed = Hashed {
                        path: worker_path,
                        item,
                    };
                    if let Err(mpsc::error::SendError(hashed)) = output.send(hashed).await {
                        worker_shared.fail(hashed.path, Stage::Hash, ClientError::Closed);
                    }
                }
                Err(e) => worker_shared.fail(worker_path, Stage::Hash, e),
            }
        });
    }
    drain(&mut workers, Stage::Hash).await;
}

async fn contains_stage(
    mut input: mpsc::Receiver<Hashed>,
    output: mpsc::Sender<Pending>,
    server: Arc<dyn IsolateServer>,
    limit: Arc<Semaphore>,
    delay: Duration,
    shared: Arc<Shared>,
    cancel: CancellationToken,
) {
    let mut flushes = JoinSet::new();
    let mut batch: Vec<Hashed> = Vec::new();
    let timer = tokio::time::sleep(delay);
    tokio::pin!(timer);
    let mut armed = false;

    loop {
        tokio::select! {
            received = input.recv() => {
                let Some(hashed) = received else { break };
                if batch.is_empty() {
                    timer.as_mut().reset(tokio::time::Instant::now() + delay);
                    armed = true;
                }
                batch.push(hashed);
            }
            () = &mut timer, if armed => {
                armed = false;
                let items = std::mem::take(&mut batch);
                flush(&mut flushes, items, &server, &limit, &output, &shared, &cancel).await;
            }
        }
    }

    if !batch.is_empty() {
        flush(&mut flushes, batch, &server, &limit, &output, &shared, &cancel).await;
    }
    drain(&mut flushes, Stage::Contains).await;
}

async fn flush(
    flushes: &mut JoinSet<()>,
    batch: Vec<Hashed>,
    server: &Arc<dyn IsolateServer>,
    limit: &Arc<Semaphore>,
    output: &mpsc::Sender<Pending>,
    shared: &Arc<Shared>,
    cancel: &CancellationToken,
) {
    if cancel.is_cancelled() {
        let error = Arc::new(ClientError::Cancelled);
        for hashed in batch {
            shared.fail(hashed.path, Stage::Contains, error.clone());
        }
        return;
    }
    let Ok(permit) = limit.clone().acquire_owned().await else {
        return;
    };

    let server = server.clone();
    let output = output.clone();
    let worker_shared = shared.clone();
    let Some(first) = batch.first().map(|h| h.path.clone()) else {
        return;
    };
    spawn_worker(flushes, permit, shared, &first, Stage::Contains, async move {
        check_batch(batch, server, output, worker_shared).await;
    });
}

async fn check_batch(
    batch: Vec<Hashed>,
    server: Arc<dyn IsolateServer>,
    output: mpsc::Sender<Pending>,
    shared: Arc<Shared>,
) {
    let items: Vec<DigestItem> = batch.iter().map(|h| h.item.clone()).collect();
    debug!(items = items.len(), "Checking batch");

    let result = server.contains(&items).await.and_then(|states| {
        if states.len() == batch.len() {
            Ok(states)
        } else {
            Err(ClientError::Protocol(format!(
                "expected {} results, got {}",
                batch.len(),
                states.len()
            )))
        }
    });
    let states = match result {
        Ok(states) => states,
        Err(e) => {
            let error = Arc::new(e);
            for hashed in batch {
                shared.fail(hashed.path, Stage::Contains, error.clone());
            }
            return;
        }
    };

    let mut misses = Vec::new();
    {
        let mut stats = shared.stats();
        for (hashed, state) in batch.into_iter().zip(states) {
            match state {
                None => stats.hits.push(hashed.item.size),
                Some(state) => {
                    stats.misses.push(hashed.item.size);
                    misses.push(Pending {
                        path: hashed.path,
                        size: hashed.item.size,
                        state,
                    });
                }
            }
        }
    }

    for pending in misses {
        if let Err(mpsc::error::SendError(pending)) = output.send(pending).await {
            shared.fail(pending.path, Stage::Contains, ClientError::Closed);
        }
    }
}

async fn upload_stage(
    mut input: mpsc::Receiver<Pending>,
    server: Arc<dyn IsolateServer>,
    limit: Arc<Semaphore>,
    shared: Arc<Shared>,
    cancel: CancellationToken,
) {
    let mut workers = JoinSet::new();
    while let Some(pending) = input.recv().await {
        if cancel.is_cancelled() {
            shared.fail(pending.path, Stage::Upload, ClientError::Cancelled);
            continue;
        }
        let Ok(permit) = limit.clone().acquire_owned().await else {
            shared.fail(pending.path, Stage::Upload, ClientError::Closed);
            continue;
        };

        let server = server.clone();
        let worker_shared = shared.clone();
        let path = pending.path.clone();
        spawn_worker(&mut workers, permit, &shared, &path, Stage::Upload, async move {
            upload(pending, server, worker_shared).await;
        });
    }
    drain(&mut workers, Stage::Upload).await;
}

async fn upload(mut pending: Pending, server: Arc<dyn IsolateServer>, shared: Arc<Shared>) {
    let start = Instant::now();
    let result = match tokio::fs::File::open(&pending.path).await {
        Ok(file) => server.push(&mut pending.state, Box::new(file)).await,
        Err(e) => Err(e.into()),
    };
    shared.stats().pushed.push(UploadStat {
        duration: start.elapsed(),
        size: pending.size,
    });
    match result {
        Ok(()) => debug!(path = %pending.path.display(), size = pending.size, "Pushed"),
        Err(e) => shared.fail(pending.path, Stage::Upload, e),
    }
}
