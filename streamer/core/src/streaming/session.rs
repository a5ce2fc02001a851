//! Stream Session
//!
//! The per-request state machine that turns one remote file into an ordered
//! sequence of bounded chunks. A session runs to a terminal state on a
//! dedicated blocking worker:
//!
//! ```text
//! Starting ──► Streaming ──► Completed
//!     │            │────────► Failed
//!     │            └──► Draining ──► Cancelled
//!     └──────────────────────────► Failed
//! ```
//!
//! Every iteration of the streaming loop checks out a pool buffer sized to
//! the controller's current granularity, reserves that many budget bytes
//! (with one relief-and-retry cycle on failure), reads, and emits exactly
//! the bytes read. Delivery is a blocking send on a capacity-1 channel, so
//! the loop never reads ahead past one undelivered chunk. Buffer and
//! reservation are RAII guards: whatever path the loop exits through, they
//! are released exactly once.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info, warn};

use crate::config::EngineConfig;
use crate::error::StreamError;
use crate::memory::{BudgetReservation, BufferPool, MemoryBudget};
use crate::remote::traits::RemoteClient;
use crate::streaming::chunking::ChunkPolicy;
use crate::streaming::events::{StreamEvent, StreamEventKind, StreamKey, StreamSessionId};
use crate::streaming::registry::{EmitOutcome, StreamRegistry};

/// Lifecycle state of a streaming session
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionState {
    /// Resolving the handle and applying the start offset
    Starting,
    /// In the read/emit loop
    Streaming,
    /// Cancellation observed mid-iteration; releasing the in-flight buffer
    Draining,
    /// All bytes delivered and end-of-stream emitted
    Completed,
    /// Terminal error emitted to the sink
    Failed,
    /// Superseded or detached; no error surfaced
    Cancelled,
}

/// Terminal summary of one session, returned by [`StreamSession::run`]
#[derive(Clone, Debug)]
pub struct SessionReport {
    /// The state the session ended in (always terminal)
    pub state: SessionState,
    /// Bytes delivered to the consumer
    pub bytes_delivered: u64,
    /// Chunks delivered to the consumer
    pub chunks_emitted: u64,
    /// Pressure events observed
    pub pressure_events: u64,
    /// Relief actions this session triggered
    pub relief_actions: u64,
    /// Chunk size when the session ended
    pub final_chunk_size: usize,
}

/// The per-request streaming state machine
pub struct StreamSession {
    key: StreamKey,
    id: StreamSessionId,
    path: String,
    start_offset: u64,
    state: SessionState,
    bytes_delivered: u64,
    chunks_emitted: u64,
    relief_actions: u64,
    policy: ChunkPolicy,
    cancel: Arc<AtomicBool>,
    registry: StreamRegistry,
    budget: Arc<MemoryBudget>,
    pool: Arc<BufferPool>,
    config: EngineConfig,
}

impl StreamSession {
    /// Create a session; `initial_chunk` overrides the configured starting
    /// granularity (seek requests carry one)
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        key: StreamKey,
        id: StreamSessionId,
        path: String,
        start_offset: u64,
        initial_chunk: Option<usize>,
        cancel: Arc<AtomicBool>,
        registry: StreamRegistry,
        budget: Arc<MemoryBudget>,
        pool: Arc<BufferPool>,
        config: EngineConfig,
    ) -> Self {
        let policy = match initial_chunk {
            Some(size) => ChunkPolicy::with_initial(&config, size),
            None => ChunkPolicy::new(&config),
        };
        Self {
            key,
            id,
            path,
            start_offset,
            state: SessionState::Starting,
            bytes_delivered: 0,
            chunks_emitted: 0,
            relief_actions: 0,
            policy,
            cancel,
            registry,
            budget,
            pool,
            config,
        }
    }

    /// Drive the session to a terminal state
    ///
    /// Blocking; the engine runs this on `spawn_blocking`. The handle, any
    /// checked-out buffer, and any budget reservation are released exactly
    /// once regardless of the exit path, and the registry entry is removed
    /// if this session still owns it.
    pub fn run(mut self, client: &dyn RemoteClient) -> SessionReport {
        info!(
            key = %self.key,
            session = %self.id,
            path = %self.path,
            offset = self.start_offset,
            chunk_size = self.policy.current_size(),
            "stream starting"
        );

        if let Err(err) = self.stream(client) {
            match err {
                StreamError::Cancelled => self.state = SessionState::Cancelled,
                err => {
                    self.state = SessionState::Failed;
                    warn!(key = %self.key, session = %self.id, error = %err, "stream failed");
                    if !self.cancelled() {
                        self.emit(StreamEventKind::Failed {
                            kind: err.kind(),
                            message: err.to_string(),
                        });
                    }
                }
            }
        }

        self.registry.unregister(&self.key, self.id);
        debug!(
            key = %self.key,
            session = %self.id,
            state = ?self.state,
            delivered = self.bytes_delivered,
            chunks = self.chunks_emitted,
            pressure = self.policy.pressure_events(),
            budget_used = self.budget.used(),
            pool_idle = self.pool.idle_count(),
            "stream finished"
        );

        SessionReport {
            state: self.state,
            bytes_delivered: self.bytes_delivered,
            chunks_emitted: self.chunks_emitted,
            pressure_events: self.policy.pressure_events(),
            relief_actions: self.relief_actions,
            final_chunk_size: self.policy.current_size(),
        }
    }

    fn cancelled(&self) -> bool {
        self.cancel.load(Ordering::SeqCst)
    }

    /// Emit an event if this session still owns its key and was not
    /// cancelled; returns the outcome so callers can observe detach
    fn emit(&self, kind: StreamEventKind) -> EmitOutcome {
        if self.cancelled() {
            return EmitOutcome::NoSink;
        }
        self.registry.emit_blocking(
            &self.key,
            self.id,
            StreamEvent {
                key: self.key.clone(),
                kind,
            },
        )
    }

    fn stream(&mut self, client: &dyn RemoteClient) -> Result<(), StreamError> {
        // Starting: resolve and position the handle
        let mut handle = client.open(&self.path)?;
        let length = handle.length();
        let mut position = 0u64;

        if self.start_offset > 0 {
            if self.start_offset >= length {
                return Err(StreamError::SeekOutOfRange {
                    offset: self.start_offset,
                    length,
                });
            }
            let skipped = handle.skip(self.start_offset)?;
            if skipped < self.start_offset {
                warn!(
                    key = %self.key,
                    requested = self.start_offset,
                    skipped,
                    "short skip; streaming from the position actually reached"
                );
            }
            position = skipped;
        }

        self.state = SessionState::Streaming;
        let mut last_log = Instant::now();
        let mut last_log_bytes = 0u64;

        loop {
            if self.cancelled() {
                self.state = SessionState::Cancelled;
                return Ok(());
            }

            let chunk_size = self.policy.current_size();
            let mut buffer = self.pool.checkout(chunk_size);
            let reservation = self.reserve(chunk_size as u64)?;

            let bytes_read = handle.read(&mut buffer[..])?;
            if bytes_read == 0 {
                drop(reservation);
                drop(buffer);
                let delivered = self.emit(StreamEventKind::EndOfStream {
                    bytes_delivered: self.bytes_delivered,
                });
                self.state = if delivered == EmitOutcome::Delivered {
                    SessionState::Completed
                } else {
                    // Superseded or detached between the final read and the
                    // end-of-stream signal.
                    SessionState::Cancelled
                };
                return Ok(());
            }

            if self.cancelled() {
                // Cancellation arrived during the read; release the
                // in-flight buffer before stopping, with no emission.
                self.state = SessionState::Draining;
                drop(reservation);
                drop(buffer);
                self.state = SessionState::Cancelled;
                return Ok(());
            }

            // Only the bytes actually read leave the session; a partial
            // read never hands out the full buffer.
            let data = buffer[..bytes_read].to_vec();
            match self.emit(StreamEventKind::Chunk {
                offset: position,
                data,
            }) {
                EmitOutcome::Delivered => {
                    self.bytes_delivered += bytes_read as u64;
                    self.chunks_emitted += 1;
                    position += bytes_read as u64;
                }
                EmitOutcome::NoSink | EmitOutcome::Disconnected => {
                    self.state = SessionState::Draining;
                    drop(reservation);
                    drop(buffer);
                    self.state = SessionState::Cancelled;
                    return Ok(());
                }
            }

            drop(reservation);
            drop(buffer);

            if self.policy.should_throttle() {
                std::thread::sleep(self.config.throttle_delay());
            }

            self.log_progress(&mut last_log, &mut last_log_bytes);
        }
    }

    /// Reserve budget for one chunk, applying the relief-and-retry policy
    fn reserve(&mut self, bytes: u64) -> Result<BudgetReservation, StreamError> {
        if let Some(reservation) = self.budget.try_reserve(bytes) {
            self.policy
                .note_clean_iteration(self.budget.used(), self.budget.capacity());
            return Ok(reservation);
        }

        self.policy.record_pressure();
        debug!(
            key = %self.key,
            requested = bytes,
            used = self.budget.used(),
            capacity = self.budget.capacity(),
            pool_idle = self.pool.idle_count(),
            chunk_size = self.policy.current_size(),
            "memory pressure; running relief and retrying"
        );
        if self.budget.try_relief(&self.pool) {
            self.relief_actions += 1;
            self.policy.note_relief_fired();
        }
        std::thread::sleep(self.config.relief_retry_wait());

        self.budget
            .try_reserve(bytes)
            .ok_or_else(|| StreamError::ResourceExhausted {
                requested: bytes,
                used: self.budget.used(),
                capacity: self.budget.capacity(),
            })
    }

    fn log_progress(&self, last_log: &mut Instant, last_log_bytes: &mut u64) {
        let now = Instant::now();
        let elapsed = now.duration_since(*last_log);
        let delta = self.bytes_delivered - *last_log_bytes;
        if elapsed < self.config.progress_log_interval() && delta < self.config.progress_log_bytes
        {
            return;
        }
        let rate_mb = if elapsed.as_secs_f64() > 0.0 {
            delta as f64 / (1024.0 * 1024.0) / elapsed.as_secs_f64()
        } else {
            0.0
        };
        debug!(
            key = %self.key,
            chunks = self.chunks_emitted,
            delivered = self.bytes_delivered,
            rate_mb_per_s = format_args!("{rate_mb:.2}"),
            chunk_size = self.policy.current_size(),
            budget_used = self.budget.used(),
            pool_idle = self.pool.idle_count(),
            "stream progress"
        );
        *last_log = now;
        *last_log_bytes = self.bytes_delivered;
    }
}
