//! Remote Collaborator Traits
//!
//! Trait definitions for the external file-sharing client. The streaming
//! engine drives these from dedicated blocking workers, so the contract is
//! deliberately synchronous: a `read` may block for as long as the
//! underlying transport needs and is not interruptible mid-call.
//!
//! # Design Philosophy
//!
//! The engine owns chunking, memory accounting, and delivery; the
//! collaborator owns bytes. Resolution errors are reported through the
//! shared [`StreamError`] taxonomy so a session's `Starting` state can
//! surface `NotFound` / `InvalidTarget` without knowing which binding
//! produced them.

use serde::{Deserialize, Serialize};

use crate::error::StreamError;

/// Metadata for one remote directory entry
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryInfo {
    /// Entry name without any trailing separator
    pub name: String,
    /// Share-relative path of the entry
    pub path: String,
    /// Whether the entry is a directory
    pub is_directory: bool,
    /// Size in bytes (0 for directories)
    pub size: u64,
    /// Last-modified time as Unix milliseconds (0 if unknown)
    pub modified_ms: u64,
    /// Whether the entry is hidden by remote convention
    pub hidden: bool,
}

/// Handle to an open remote file
///
/// Reads advance an internal cursor. A return of 0 bytes signals end of
/// data, never a transient condition.
pub trait RemoteFile: Send {
    /// Total file length in bytes
    fn length(&self) -> u64;

    /// Read into `buf` from the current position, returning bytes read
    ///
    /// 0 signals end of data.
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, StreamError>;

    /// Skip forward `n` bytes, returning the number actually skipped
    ///
    /// May skip fewer bytes than requested; callers decide whether a short
    /// skip is fatal.
    fn skip(&mut self, n: u64) -> Result<u64, StreamError>;
}

/// A connected file-sharing client
///
/// Implementations must be safe to share across the engine's blocking
/// workers; every method may be called concurrently.
pub trait RemoteClient: Send + Sync {
    /// Open a share-relative path for reading
    ///
    /// Fails with `NotFound` if the path does not resolve, `InvalidTarget`
    /// if it resolves to a directory, `Transport` for session-level errors.
    fn open(&self, path: &str) -> Result<Box<dyn RemoteFile>, StreamError>;

    /// Metadata for a single path, `None` if it does not exist
    fn stat(&self, path: &str) -> Result<Option<EntryInfo>, StreamError>;

    /// List the entries of a directory
    fn list(&self, path: &str) -> Result<Vec<EntryInfo>, StreamError>;

    /// Write `data` to a path, replacing any existing content
    fn write(&self, path: &str, data: &[u8]) -> Result<(), StreamError>;

    /// Delete a file or empty directory
    fn delete(&self, path: &str) -> Result<(), StreamError>;

    /// Create a directory, including missing parents
    fn create_dir(&self, path: &str) -> Result<(), StreamError>;

    /// Human-readable description of the connected endpoint
    fn endpoint(&self) -> String;

    /// Read an entire file into memory
    ///
    /// Convenience for the small-file plumbing path; streaming callers use
    /// [`RemoteClient::open`] instead.
    fn read_all(&self, path: &str) -> Result<Vec<u8>, StreamError> {
        let mut handle = self.open(path)?;
        let mut out = Vec::with_capacity(usize::try_from(handle.length()).unwrap_or(0));
        let mut buf = vec![0u8; 64 * 1024];
        loop {
            let n = handle.read(&mut buf)?;
            if n == 0 {
                break;
            }
            out.extend_from_slice(&buf[..n]);
        }
        Ok(out)
    }
}
