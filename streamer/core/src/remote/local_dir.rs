//! Directory-Backed Remote Client
//!
//! Serves a local directory tree through the [`RemoteClient`] contract, the
//! way a share mounted by the host OS appears to this process. The demo
//! binary runs against it, and tests use it whenever they need real file
//! I/O semantics (short reads, metadata, deletion) without a server.

use std::fs;
use std::io::{Read, Seek, SeekFrom};
use std::path::{Component, Path, PathBuf};
use std::time::UNIX_EPOCH;

use tracing::debug;

use crate::error::StreamError;
use crate::remote::traits::{EntryInfo, RemoteClient, RemoteFile};

/// A [`RemoteClient`] over a root directory on the local filesystem
pub struct LocalDirClient {
    root: PathBuf,
}

impl LocalDirClient {
    /// Create a client rooted at `root`
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Resolve a share-relative path under the root
    ///
    /// Parent components are rejected so a crafted path cannot escape the
    /// share; such a path simply does not resolve.
    fn resolve(&self, path: &str) -> Result<PathBuf, StreamError> {
        let relative = Path::new(path.trim_start_matches('/'));
        for component in relative.components() {
            match component {
                Component::Normal(_) | Component::CurDir => {}
                _ => {
                    debug!(path, "rejecting path that escapes the share root");
                    return Err(StreamError::NotFound {
                        path: path.to_string(),
                    });
                }
            }
        }
        Ok(self.root.join(relative))
    }

    fn entry_info(&self, full: &Path, share_path: &str) -> Result<EntryInfo, StreamError> {
        let meta = fs::metadata(full)?;
        let name = full
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let modified_ms = meta
            .modified()
            .ok()
            .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0);
        Ok(EntryInfo {
            hidden: name.starts_with('.'),
            is_directory: meta.is_dir(),
            size: if meta.is_dir() { 0 } else { meta.len() },
            path: share_path.trim_start_matches('/').to_string(),
            modified_ms,
            name,
        })
    }
}

impl RemoteClient for LocalDirClient {
    fn open(&self, path: &str) -> Result<Box<dyn RemoteFile>, StreamError> {
        let full = self.resolve(path)?;
        let meta = match fs::metadata(&full) {
            Ok(meta) => meta,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Err(StreamError::NotFound {
                    path: path.to_string(),
                });
            }
            Err(err) => return Err(err.into()),
        };
        if meta.is_dir() {
            return Err(StreamError::InvalidTarget {
                path: path.to_string(),
            });
        }
        let file = fs::File::open(&full)?;
        Ok(Box::new(LocalFile {
            length: meta.len(),
            position: 0,
            file,
        }))
    }

    fn stat(&self, path: &str) -> Result<Option<EntryInfo>, StreamError> {
        let full = self.resolve(path)?;
        if !full.exists() {
            return Ok(None);
        }
        self.entry_info(&full, path).map(Some)
    }

    fn list(&self, path: &str) -> Result<Vec<EntryInfo>, StreamError> {
        let full = self.resolve(path)?;
        if !full.exists() {
            return Err(StreamError::NotFound {
                path: path.to_string(),
            });
        }
        if !full.is_dir() {
            return Err(StreamError::Transport(format!(
                "cannot list a file: {path}"
            )));
        }
        let mut entries = Vec::new();
        let prefix = path.trim_start_matches('/').trim_end_matches('/');
        for entry in fs::read_dir(&full)? {
            let entry = entry?;
            let name = entry.file_name().to_string_lossy().into_owned();
            let share_path = if prefix.is_empty() {
                name
            } else {
                format!("{prefix}/{name}")
            };
            entries.push(self.entry_info(&entry.path(), &share_path)?);
        }
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(entries)
    }

    fn write(&self, path: &str, data: &[u8]) -> Result<(), StreamError> {
        let full = self.resolve(path)?;
        if let Some(parent) = full.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(full, data)?;
        Ok(())
    }

    fn delete(&self, path: &str) -> Result<(), StreamError> {
        let full = self.resolve(path)?;
        let meta = match fs::metadata(&full) {
            Ok(meta) => meta,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Err(StreamError::NotFound {
                    path: path.to_string(),
                });
            }
            Err(err) => return Err(err.into()),
        };
        if meta.is_dir() {
            fs::remove_dir(full)?;
        } else {
            fs::remove_file(full)?;
        }
        Ok(())
    }

    fn create_dir(&self, path: &str) -> Result<(), StreamError> {
        let full = self.resolve(path)?;
        fs::create_dir_all(full)?;
        Ok(())
    }

    fn endpoint(&self) -> String {
        format!("dir://{}", self.root.display())
    }
}

/// An open file under a [`LocalDirClient`] root
struct LocalFile {
    file: fs::File,
    length: u64,
    position: u64,
}

impl RemoteFile for LocalFile {
    fn length(&self) -> u64 {
        self.length
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize, StreamError> {
        let n = self.file.read(buf)?;
        self.position += n as u64;
        Ok(n)
    }

    fn skip(&mut self, n: u64) -> Result<u64, StreamError> {
        let target = (self.position + n).min(self.length);
        let reached = self.file.seek(SeekFrom::Start(target))?;
        let skipped = reached - self.position;
        self.position = reached;
        Ok(skipped)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn fixture() -> (tempfile::TempDir, LocalDirClient) {
        let dir = tempfile::tempdir().expect("tempdir");
        fs::write(dir.path().join("song.mp3"), b"0123456789").expect("write fixture");
        fs::create_dir(dir.path().join("album")).expect("mkdir fixture");
        fs::write(dir.path().join("album").join("track.flac"), vec![7u8; 64])
            .expect("write fixture");
        let client = LocalDirClient::new(dir.path());
        (dir, client)
    }

    #[test]
    fn test_open_read_and_length() {
        let (_dir, client) = fixture();
        let mut handle = client.open("song.mp3").expect("open");
        assert_eq!(handle.length(), 10);

        let mut buf = [0u8; 4];
        assert_eq!(handle.read(&mut buf).expect("read"), 4);
        assert_eq!(&buf, b"0123");
        assert_eq!(handle.read(&mut buf).expect("read"), 4);
        assert_eq!(&buf, b"4567");
        assert_eq!(handle.read(&mut buf).expect("read"), 2);
        assert_eq!(handle.read(&mut buf).expect("read"), 0);
    }

    #[test]
    fn test_open_missing_is_not_found() {
        let (_dir, client) = fixture();
        let err = client.open("nope.bin").err().expect("must fail");
        assert!(matches!(err, StreamError::NotFound { .. }));
    }

    #[test]
    fn test_open_directory_is_invalid_target() {
        let (_dir, client) = fixture();
        let err = client.open("album").err().expect("must fail");
        assert!(matches!(err, StreamError::InvalidTarget { .. }));
    }

    #[test]
    fn test_parent_components_do_not_resolve() {
        let (_dir, client) = fixture();
        let err = client.open("../etc/passwd").err().expect("must fail");
        assert!(matches!(err, StreamError::NotFound { .. }));
    }

    #[test]
    fn test_skip_clamps_at_length() {
        let (_dir, client) = fixture();
        let mut handle = client.open("song.mp3").expect("open");
        assert_eq!(handle.skip(6).expect("skip"), 6);
        let mut buf = [0u8; 16];
        assert_eq!(handle.read(&mut buf).expect("read"), 4);
        assert_eq!(&buf[..4], b"6789");

        let mut handle = client.open("song.mp3").expect("open");
        assert_eq!(handle.skip(1000).expect("skip"), 10);
        assert_eq!(handle.read(&mut buf).expect("read"), 0);
    }

    #[test]
    fn test_list_and_stat() {
        let (_dir, client) = fixture();
        let entries = client.list("").expect("list");
        let names: Vec<_> = entries.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["album", "song.mp3"]);
        assert!(entries[0].is_directory);
        assert_eq!(entries[1].size, 10);

        let info = client
            .stat("album/track.flac")
            .expect("stat")
            .expect("exists");
        assert_eq!(info.size, 64);
        assert_eq!(info.path, "album/track.flac");
        assert!(client.stat("ghost").expect("stat").is_none());
    }

    #[test]
    fn test_write_delete_roundtrip() {
        let (_dir, client) = fixture();
        client
            .write("new/nested/data.bin", b"payload")
            .expect("write");
        assert_eq!(client.read_all("new/nested/data.bin").expect("read"), b"payload");

        client.delete("new/nested/data.bin").expect("delete");
        assert!(matches!(
            client.delete("new/nested/data.bin"),
            Err(StreamError::NotFound { .. })
        ));
    }

    #[test]
    fn test_create_dir() {
        let (_dir, client) = fixture();
        client.create_dir("fresh/depth").expect("create_dir");
        let info = client.stat("fresh/depth").expect("stat").expect("exists");
        assert!(info.is_directory);
    }
}
