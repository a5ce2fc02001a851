//! Adaptive Streaming Infrastructure
//!
//! Turns one remote-file read into an ordered sequence of bounded chunks
//! while staying inside the process-wide memory budget. Each active stream
//! is an independent session with its own chunk-size controller; the only
//! cross-stream coupling is the shared budget and buffer pool.
//!
//! # Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────────┐
//! │                        StreamRegistry                          │
//! │   StreamKey ──► { session id, consumer sink, cancel flag }     │
//! └───────────────┬───────────────────────────────┬───────────────┘
//!                 │                               │
//!        ┌────────▼────────┐             ┌────────▼────────┐
//!        │  StreamSession  │             │  StreamSession  │   ...
//!        │  ChunkPolicy    │             │  ChunkPolicy    │
//!        └───┬─────────┬───┘             └───┬─────────┬───┘
//!            │         │                     │         │
//!     ┌──────▼───┐ ┌───▼──────────┐   (shared, lock-guarded)
//!     │BufferPool│ │ MemoryBudget │
//!     └──────────┘ └──────────────┘
//! ```
//!
//! # Ordering
//!
//! Chunks for a single stream are delivered in strictly increasing offset
//! order, each exactly once, with no gaps or overlaps except on an explicit
//! seek, which starts a fresh ordered sequence from the new offset. No
//! ordering guarantee exists across different keys.

pub mod chunking;
pub mod events;
pub mod registry;
pub mod session;

pub use chunking::ChunkPolicy;
pub use events::{StreamEvent, StreamEventKind, StreamKey, StreamSessionId};
pub use registry::{EmitOutcome, StreamRegistry};
pub use session::{SessionReport, SessionState, StreamSession};
