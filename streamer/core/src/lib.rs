//! smbstream core - Adaptive Remote-File Streaming
//!
//! This crate turns single remote-file reads into bounded, backpressure-
//! aware chunk sequences while keeping client-side memory inside a fixed
//! ceiling. The SMB protocol itself lives behind the [`remote`] traits; the
//! value here is everything between a file handle and the consumer:
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                          Consumers                                │
//! │      (players, host-platform channels, test harnesses)           │
//! └───────────────┬────────────────────────────────▲─────────────────┘
//!                 │ start / seek / cancel          │ StreamEvent
//! ┌───────────────▼────────────────────────────────┴─────────────────┐
//! │                         StreamEngine                              │
//! │  ┌──────────────┐  ┌─────────────┐  ┌──────────┐  ┌────────────┐ │
//! │  │StreamRegistry│  │StreamSession│  │BufferPool│  │MemoryBudget│ │
//! │  │ key → sink   │  │ + ChunkPolicy│ │ (shared) │  │  (shared)  │ │
//! │  └──────────────┘  └──────┬──────┘  └──────────┘  └────────────┘ │
//! └───────────────────────────┼──────────────────────────────────────┘
//!                             │ synchronous reads
//!                   ┌─────────▼──────────┐
//!                   │ RemoteClient/File  │  (SMB binding, local dir, ...)
//!                   └────────────────────┘
//! ```
//!
//! # Key Types
//!
//! - [`StreamEngine`]: the facade; one per connected share
//! - [`StreamHandle`]: per-request event channel plus terminal report
//! - [`EngineConfig`]: every tunable, fixed at engine construction
//! - [`RemoteClient`] / [`RemoteFile`]: the collaborator boundary
//!
//! # Quick Start
//!
//! ```ignore
//! use std::sync::Arc;
//! use smbstream_core::{EngineConfig, LocalDirClient, StreamEngine, StreamEventKind};
//!
//! #[tokio::main]
//! async fn main() {
//!     let client = Arc::new(LocalDirClient::new("/mnt/share"));
//!     let engine = StreamEngine::new(client, EngineConfig::from_env()).unwrap();
//!
//!     let mut handle = engine.start_stream("media/movie.mkv");
//!     while let Some(event) = handle.events.recv().await {
//!         match event.kind {
//!             StreamEventKind::Chunk { offset, data } => { /* play */ }
//!             StreamEventKind::EndOfStream { .. } => break,
//!             StreamEventKind::Failed { kind, message } => { /* report */ }
//!         }
//!     }
//! }
//! ```
//!
//! # Module Overview
//!
//! - [`config`]: tunables, TOML loading, environment overrides
//! - [`engine`]: the facade wiring shared state and workers
//! - [`error`]: the terminal error taxonomy and wire codes
//! - [`memory`]: budget tracker and buffer pool
//! - [`remote`]: collaborator traits, path normalization, directory client
//! - [`streaming`]: sessions, chunk controller, registry, events

#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod engine;
pub mod error;
pub mod memory;
pub mod remote;
pub mod streaming;

// Re-exports for convenience
pub use config::{load_config, ConfigError, EngineConfig};
pub use engine::{StreamEngine, StreamHandle};
pub use error::{ErrorKind, StreamError};
pub use memory::{BudgetReservation, BufferPool, MemoryBudget, PooledBuffer};
pub use remote::{EntryInfo, LocalDirClient, RemoteClient, RemoteFile};
pub use streaming::{
    ChunkPolicy, EmitOutcome, SessionReport, SessionState, StreamEvent, StreamEventKind,
    StreamKey, StreamRegistry, StreamSession, StreamSessionId,
};
