//! Stream Engine
//!
//! The facade that wires the shared pieces together: one [`MemoryBudget`],
//! one [`BufferPool`], one [`StreamRegistry`], and a [`RemoteClient`]
//! binding. Consumers ask it to start, seek, or cancel streams and receive
//! a [`StreamHandle`] per request; the plumbing operations (listing,
//! metadata, whole-file reads, writes) are thin async wrappers that push the
//! synchronous collaborator call onto a blocking worker.
//!
//! A successful `start_stream`/`seek_stream` return is the acknowledgment;
//! everything after that arrives as [`StreamEvent`]s on the handle's
//! channel, terminated by exactly one end-of-stream or error event.

use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_stream::wrappers::ReceiverStream;
use tracing::debug;

use crate::config::{ConfigError, EngineConfig};
use crate::error::StreamError;
use crate::memory::{BufferPool, MemoryBudget};
use crate::remote::path;
use crate::remote::traits::{EntryInfo, RemoteClient};
use crate::streaming::events::{StreamEvent, StreamKey, StreamSessionId};
use crate::streaming::registry::StreamRegistry;
use crate::streaming::session::{SessionReport, StreamSession};

/// Handle to one requested stream
///
/// Dropping the receiver detaches the consumer: the session observes the
/// closed channel at its next emission and stops without an error event.
pub struct StreamHandle {
    /// Key identifying the logical stream
    pub key: StreamKey,
    /// Identity of the session serving this request
    pub session_id: StreamSessionId,
    /// Ordered event sequence; capacity 1, so the session never reads ahead
    /// past one undelivered chunk
    pub events: mpsc::Receiver<StreamEvent>,
    /// Resolves to the session's terminal report
    pub completion: JoinHandle<SessionReport>,
}

impl StreamHandle {
    /// Convert the event receiver into a `futures`-style stream
    #[must_use]
    pub fn into_stream(self) -> (ReceiverStream<StreamEvent>, JoinHandle<SessionReport>) {
        (ReceiverStream::new(self.events), self.completion)
    }
}

/// The adaptive streaming engine
///
/// Cheap to share behind an `Arc`; all mutable state lives in the shared
/// budget, pool, and registry.
pub struct StreamEngine {
    client: Arc<dyn RemoteClient>,
    config: EngineConfig,
    budget: Arc<MemoryBudget>,
    pool: Arc<BufferPool>,
    registry: StreamRegistry,
}

impl StreamEngine {
    /// Create an engine over a connected client
    ///
    /// Fails only on inconsistent configuration.
    pub fn new(client: Arc<dyn RemoteClient>, config: EngineConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let budget = Arc::new(MemoryBudget::new(
            config.budget_capacity,
            config.relief_cooldown(),
        ));
        let pool = Arc::new(BufferPool::new(
            config.pool_capacity,
            config.pool_max_buffer,
            config.pool_relief_low_water,
        ));
        Ok(Self {
            client,
            config,
            budget,
            pool,
            registry: StreamRegistry::new(),
        })
    }

    /// Begin streaming a file from its start
    ///
    /// Supersedes any active stream for the same path. Resolution failures
    /// (`NOT_FOUND`, `INVALID_TARGET`, ...) are delivered as an error event
    /// on the returned handle, not as an `Err` here.
    pub fn start_stream(&self, raw_path: &str) -> StreamHandle {
        self.launch(raw_path, 0, None)
    }

    /// Begin streaming a file from `offset` with a caller-chosen starting
    /// chunk size
    ///
    /// Supersedes any active stream for the same path; the superseded
    /// session stops without emitting further events. An offset at or past
    /// the end of the file produces a `SEEK_OUT_OF_RANGE` error event and
    /// no chunks.
    pub fn seek_stream(&self, raw_path: &str, offset: u64, chunk_size: usize) -> StreamHandle {
        self.launch(raw_path, offset, Some(chunk_size))
    }

    /// Cancel the active stream for a path (consumer detach)
    ///
    /// Returns whether a stream was active. Idempotent: cancelling twice is
    /// a no-op the second time.
    pub fn cancel_stream(&self, raw_path: &str) -> bool {
        self.registry.cancel(&StreamKey::from_path(raw_path))
    }

    /// Number of streams currently registered
    #[must_use]
    pub fn active_streams(&self) -> usize {
        self.registry.active_count()
    }

    /// The shared memory budget (observability and tests)
    #[must_use]
    pub fn budget(&self) -> &Arc<MemoryBudget> {
        &self.budget
    }

    /// The shared buffer pool (observability and tests)
    #[must_use]
    pub fn pool(&self) -> &Arc<BufferPool> {
        &self.pool
    }

    fn launch(&self, raw_path: &str, offset: u64, initial_chunk: Option<usize>) -> StreamHandle {
        let key = StreamKey::from_path(raw_path);
        let session_id = StreamSessionId::next();
        let cancel = Arc::new(AtomicBool::new(false));
        let (sink, events) = mpsc::channel(1);

        let superseded = self
            .registry
            .register(key.clone(), session_id, sink, Arc::clone(&cancel));
        debug!(
            key = %key,
            session = %session_id,
            offset,
            superseded,
            "stream registered"
        );

        let session = StreamSession::new(
            key.clone(),
            session_id,
            path::normalize(raw_path),
            offset,
            initial_chunk,
            cancel,
            self.registry.clone(),
            Arc::clone(&self.budget),
            Arc::clone(&self.pool),
            self.config.clone(),
        );
        let client = Arc::clone(&self.client);
        let completion = tokio::task::spawn_blocking(move || session.run(client.as_ref()));

        StreamHandle {
            key,
            session_id,
            events,
            completion,
        }
    }

    // ========================================================================
    // Plumbing operations (request/response delegation to the collaborator)
    // ========================================================================

    /// List the entries of a remote directory
    pub async fn list_directory(&self, raw_path: &str) -> Result<Vec<EntryInfo>, StreamError> {
        let client = Arc::clone(&self.client);
        let path = path::normalize(raw_path);
        run_blocking(move || client.list(&path)).await
    }

    /// Metadata for a single remote path, `None` if it does not exist
    pub async fn file_info(&self, raw_path: &str) -> Result<Option<EntryInfo>, StreamError> {
        let client = Arc::clone(&self.client);
        let path = path::normalize(raw_path);
        run_blocking(move || client.stat(&path)).await
    }

    /// Read an entire remote file into memory
    ///
    /// Reading zero bytes from an existing file is reported as a transport
    /// failure rather than silently returning nothing.
    pub async fn read_file(&self, raw_path: &str) -> Result<Vec<u8>, StreamError> {
        let client = Arc::clone(&self.client);
        let path = path::normalize(raw_path);
        let data = run_blocking(move || client.read_all(&path)).await?;
        if data.is_empty() {
            return Err(StreamError::Transport(format!(
                "read 0 bytes from file: {raw_path}"
            )));
        }
        Ok(data)
    }

    /// Write a remote file, replacing existing content
    pub async fn write_file(&self, raw_path: &str, data: Vec<u8>) -> Result<(), StreamError> {
        let client = Arc::clone(&self.client);
        let path = path::normalize(raw_path);
        run_blocking(move || client.write(&path, &data)).await
    }

    /// Delete a remote file or empty directory
    pub async fn delete(&self, raw_path: &str) -> Result<(), StreamError> {
        let client = Arc::clone(&self.client);
        let path = path::normalize(raw_path);
        run_blocking(move || client.delete(&path)).await
    }

    /// Create a remote directory, including missing parents
    pub async fn create_directory(&self, raw_path: &str) -> Result<(), StreamError> {
        let client = Arc::clone(&self.client);
        let path = path::normalize(raw_path);
        run_blocking(move || client.create_dir(&path)).await
    }

    /// Human-readable description of the connected endpoint
    #[must_use]
    pub fn connection_info(&self) -> String {
        self.client.endpoint()
    }
}

async fn run_blocking<T, F>(call: F) -> Result<T, StreamError>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, StreamError> + Send + 'static,
{
    match tokio::task::spawn_blocking(call).await {
        Ok(result) => result,
        Err(join_err) => Err(StreamError::Transport(format!(
            "collaborator worker failed: {join_err}"
        ))),
    }
}
