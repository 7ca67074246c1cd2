//! Readable source trees.
//!
//! A [`SourceTree`] maps normalized source paths to text plus a
//! modification time in unix milliseconds. The resolver only ever reads
//! through this trait.

use crate::path::normalize;
use crate::SourceError;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::UNIX_EPOCH;

/// One loaded file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    pub text: String,
    /// Unix milliseconds.
    pub modified: u64,
}

/// Read access to script sources.
pub trait SourceTree: Send + Sync {
    /// Loads `path` (already normalized).
    ///
    /// # Errors
    ///
    /// [`SourceError::NotFound`] when the file does not exist.
    fn load(&self, path: &str) -> Result<SourceFile, SourceError>;
}

/// Sources on local disk under a root directory.
#[derive(Debug, Clone)]
pub struct FsSourceTree {
    root: PathBuf,
}

impl FsSourceTree {
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn host_path(&self, path: &str) -> Result<PathBuf, SourceError> {
        let normalized = normalize(path)?;
        Ok(self.root.join(normalized.trim_start_matches('/')))
    }
}

impl SourceTree for FsSourceTree {
    fn load(&self, path: &str) -> Result<SourceFile, SourceError> {
        let host = self.host_path(path)?;
        let text = match std::fs::read_to_string(&host) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(SourceError::not_found(path));
            }
            Err(e) => return Err(SourceError::io(path, e)),
        };
        let modified = std::fs::metadata(&host)
            .and_then(|m| m.modified())
            .map_err(|e| SourceError::io(path, e))?
            .duration_since(UNIX_EPOCH)
            .map_or(0, |d| d.as_millis() as u64);
        Ok(SourceFile { text, modified })
    }
}

/// In-memory sources, used by tests and embedded worlds.
///
/// Every write advances a logical clock, so a rewritten file always has
/// a newer modification time than before.
#[derive(Debug, Default)]
pub struct MemorySourceTree {
    files: RwLock<HashMap<String, SourceFile>>,
    clock: AtomicU64,
}

impl MemorySourceTree {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a file and returns the tree, for fixture building.
    ///
    /// # Panics
    ///
    /// Panics if `path` cannot be normalized.
    #[must_use]
    pub fn with_file(self, path: &str, text: &str) -> Self {
        if let Err(e) = self.write(path, text) {
            panic!("invalid fixture path {path}: {e}");
        }
        self
    }

    /// Writes a file, bumping its modification time.
    pub fn write(&self, path: &str, text: &str) -> Result<u64, SourceError> {
        let modified = self.clock.fetch_add(1, Ordering::SeqCst) + 1;
        self.write_at(path, text, modified)?;
        Ok(modified)
    }

    /// Writes a file with an explicit modification time.
    pub fn write_at(&self, path: &str, text: &str, modified: u64) -> Result<(), SourceError> {
        let path = normalize(path)?;
        self.files.write().insert(
            path,
            SourceFile {
                text: text.to_string(),
                modified,
            },
        );
        Ok(())
    }

    pub fn remove(&self, path: &str) -> bool {
        normalize(path).is_ok_and(|p| self.files.write().remove(&p).is_some())
    }
}

impl SourceTree for MemorySourceTree {
    fn load(&self, path: &str) -> Result<SourceFile, SourceError> {
        let path = normalize(path)?;
        self.files
            .read()
            .get(&path)
            .cloned()
            .ok_or_else(|| SourceError::not_found(path))
    }
}
