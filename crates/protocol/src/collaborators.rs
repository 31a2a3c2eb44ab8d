//! Traits for the engine's external collaborators. Concrete file-format
//! parsers, embedding backends, and OS filesystem access are explicitly out
//! of scope (see the crate-level docs on each consuming crate) — only the
//! contracts live here.

use async_trait::async_trait;

use crate::Result;

/// Supplies wall-clock time, injected so lifecycle and retry logic are
/// deterministically testable.
pub trait Clock: Send + Sync {
    fn now_ms(&self) -> u64;
}

/// A [`Clock`] backed by `SystemTime::now()`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> u64 {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or_default()
    }
}

/// One file as reported by a directory enumeration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    pub path: String,
    pub size: u64,
    pub mtime_ms: u64,
}

/// Filesystem access, abstracted so lifecycle scanning can be tested without
/// touching disk and so non-local backends (e.g. a virtual folder) can be
/// plugged in later.
#[async_trait]
pub trait FileSystem: Send + Sync {
    /// Recursively lists files under `root`, already filtered to whatever
    /// extensions the caller cares about.
    async fn list_files(&self, root: &str) -> Result<Vec<DirEntry>>;

    /// Reads one file's full contents.
    async fn read_file(&self, path: &str) -> Result<Vec<u8>>;
}
