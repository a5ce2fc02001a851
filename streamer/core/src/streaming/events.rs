//! Stream Identity and Consumer Events
//!
//! Everything a consumer sees from a stream is a [`StreamEvent`]: an
//! ordered sequence of chunks terminated by exactly one end-of-stream or
//! error event. Streams are addressed by a [`StreamKey`] derived from the
//! request path, so a later seek on the same path can find and supersede
//! the active session.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

use crate::error::ErrorKind;

/// Identifier of a logical stream, derived deterministically from a path
///
/// Every byte outside `[A-Za-z0-9]` maps to `_`, so two requests with the
/// same raw path always map to the same key and the key is safe to embed in
/// host-platform channel names.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StreamKey(String);

impl StreamKey {
    /// Derive the key for a raw request path
    #[must_use]
    pub fn from_path(path: &str) -> Self {
        let sanitized = path
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
            .collect();
        Self(sanitized)
    }

    /// The sanitized key text
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StreamKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Unique identity of one streaming session
///
/// Two sessions for the same key never share an id; the registry uses the
/// id to tell a live owner from a superseded one.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct StreamSessionId(u64);

impl StreamSessionId {
    /// Allocate the next session id
    #[must_use]
    pub fn next() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(1);
        Self(COUNTER.fetch_add(1, Ordering::SeqCst))
    }

    /// Raw numeric value
    #[must_use]
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for StreamSessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "stream-{}", self.0)
    }
}

/// An event delivered to the consumer sink
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StreamEvent {
    /// The stream this event belongs to
    pub key: StreamKey,
    /// What happened
    pub kind: StreamEventKind,
}

/// Kind of stream event
#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum StreamEventKind {
    /// One bounded unit of file bytes
    Chunk {
        /// Absolute file offset of the first byte
        offset: u64,
        /// The bytes; never empty and never padded past what was read
        data: Vec<u8>,
    },
    /// The stream finished cleanly
    EndOfStream {
        /// Total bytes delivered by this session (excludes skipped prefix)
        bytes_delivered: u64,
    },
    /// The stream failed; no further events follow
    Failed {
        /// Machine-readable classification
        kind: ErrorKind,
        /// Human-readable description
        message: String,
    },
}
