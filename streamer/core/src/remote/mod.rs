//! Remote File Access Boundary
//!
//! The SMB wire protocol is not implemented here. Everything the engine
//! needs from a share is expressed as the two synchronous traits in
//! [`traits`]; a protocol binding (jCIFS-style client, kernel mount, test
//! double) implements them and the engine never learns the difference.
//!
//! # Modules
//!
//! - [`traits`]: the [`RemoteClient`] / [`RemoteFile`] collaborator contract
//! - [`path`]: percent-decoding and normalization of host-supplied paths
//! - [`local_dir`]: a directory-backed implementation over `std::fs`, used
//!   by the demo binary and as a stand-in for a mounted share

pub mod local_dir;
pub mod path;
pub mod traits;

pub use local_dir::LocalDirClient;
pub use traits::{EntryInfo, RemoteClient, RemoteFile};
