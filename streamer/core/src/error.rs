//! Streaming Error Taxonomy
//!
//! Every terminal failure a stream can hit maps to one [`StreamError`]
//! variant, and every variant except `Cancelled` is surfaced to the consumer
//! as a single error event carrying the machine-readable [`ErrorKind`] code
//! plus a human-readable message. `Cancelled` is not a user-visible failure:
//! a superseded or detached session simply stops.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Terminal error for a streaming session or a plumbing operation
#[derive(Clone, Debug, Error)]
pub enum StreamError {
    /// Target path does not resolve to an existing remote object
    #[error("remote path not found: {path}")]
    NotFound {
        /// The path as requested
        path: String,
    },

    /// Target resolves but is a directory where a file was expected
    #[error("expected a file but found a directory: {path}")]
    InvalidTarget {
        /// The path as requested
        path: String,
    },

    /// Requested start offset is at or past the end of the file
    #[error("seek offset {offset} is beyond end of file ({length} bytes)")]
    SeekOutOfRange {
        /// Offset the consumer asked for
        offset: u64,
        /// Total file length
        length: u64,
    },

    /// Memory budget could not be satisfied even after a relief-and-retry cycle
    #[error("memory budget exhausted ({requested} bytes requested, {used}/{capacity} in use)")]
    ResourceExhausted {
        /// Bytes the failing reservation asked for
        requested: u64,
        /// Budget bytes in use at the time of failure
        used: u64,
        /// Budget ceiling
        capacity: u64,
    },

    /// The underlying read or handle operation failed
    #[error("transport failure: {0}")]
    Transport(String),

    /// Session superseded or consumer detached; never surfaced as an error event
    #[error("stream cancelled")]
    Cancelled,
}

impl StreamError {
    /// The machine-readable kind for this error
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::InvalidTarget { .. } => ErrorKind::InvalidTarget,
            Self::SeekOutOfRange { .. } => ErrorKind::SeekOutOfRange,
            Self::ResourceExhausted { .. } => ErrorKind::ResourceExhausted,
            Self::Transport(_) => ErrorKind::TransportFailure,
            Self::Cancelled => ErrorKind::Cancelled,
        }
    }
}

impl From<std::io::Error> for StreamError {
    fn from(err: std::io::Error) -> Self {
        Self::Transport(err.to_string())
    }
}

/// Machine-readable error classification delivered to consumers
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    /// Path does not exist on the remote
    NotFound,
    /// Path is a directory, not a file
    InvalidTarget,
    /// Seek offset at or past end of file
    SeekOutOfRange,
    /// Budget exhausted after relief and retry
    ResourceExhausted,
    /// Remote read/handle failure
    TransportFailure,
    /// Session superseded or detached
    Cancelled,
}

impl ErrorKind {
    /// Stable wire code for host-platform dispatch
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotFound => "NOT_FOUND",
            Self::InvalidTarget => "INVALID_TARGET",
            Self::SeekOutOfRange => "SEEK_OUT_OF_RANGE",
            Self::ResourceExhausted => "RESOURCE_EXHAUSTED",
            Self::TransportFailure => "TRANSPORT_FAILURE",
            Self::Cancelled => "CANCELLED",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.code())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_mapping() {
        assert_eq!(
            StreamError::NotFound {
                path: "a/b".to_string()
            }
            .kind(),
            ErrorKind::NotFound
        );
        assert_eq!(
            StreamError::SeekOutOfRange {
                offset: 10,
                length: 5
            }
            .kind(),
            ErrorKind::SeekOutOfRange
        );
        assert_eq!(StreamError::Cancelled.kind(), ErrorKind::Cancelled);
    }

    #[test]
    fn test_codes_are_stable() {
        assert_eq!(ErrorKind::NotFound.code(), "NOT_FOUND");
        assert_eq!(ErrorKind::InvalidTarget.code(), "INVALID_TARGET");
        assert_eq!(ErrorKind::SeekOutOfRange.code(), "SEEK_OUT_OF_RANGE");
        assert_eq!(ErrorKind::ResourceExhausted.code(), "RESOURCE_EXHAUSTED");
        assert_eq!(ErrorKind::TransportFailure.code(), "TRANSPORT_FAILURE");
        assert_eq!(ErrorKind::Cancelled.code(), "CANCELLED");
        assert_eq!(ErrorKind::NotFound.to_string(), "NOT_FOUND");
    }

    #[test]
    fn test_io_error_becomes_transport() {
        let io = std::io::Error::new(std::io::ErrorKind::ConnectionReset, "peer reset");
        let err: StreamError = io.into();
        assert_eq!(err.kind(), ErrorKind::TransportFailure);
        assert!(err.to_string().contains("peer reset"));
    }
}
