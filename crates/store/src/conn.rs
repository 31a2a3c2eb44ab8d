use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use folder_mcp_protocol::EngineError;
use rusqlite::Connection;

/// Async-safe handle onto one SQLite connection.
///
/// `rusqlite::Connection` is not `Send`/`Sync` across an `.await`, so every
/// operation runs on a blocking thread via `spawn_blocking` while the mutex
/// guards the connection against concurrent access from the same handle.
#[derive(Clone)]
pub struct Conn {
    inner: Arc<Mutex<Connection>>,
    path: Arc<PathBuf>,
}

impl Conn {
    pub fn new(connection: Connection, path: PathBuf) -> Self {
        Self {
            inner: Arc::new(Mutex::new(connection)),
            path: Arc::new(path),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn recover(path: &Path, poisoned: std::sync::PoisonError<std::sync::MutexGuard<'_, Connection>>) -> Connection {
        log::warn!("sqlite connection mutex poisoned for {}, recovering", path.display());
        let inner = poisoned.into_inner();
        if !inner.is_autocommit() {
            log::warn!(
                "connection for {} not in autocommit after poisoning recovery, attempting rollback",
                path.display()
            );
            match inner.execute("ROLLBACK", []) {
                Ok(_) => log::info!("rolled back pending transaction for {}", path.display()),
                Err(e) => log::error!(
                    "ROLLBACK failed for {} after mutex poisoning recovery: {e}",
                    path.display()
                ),
            }
        }
        inner
    }

    /// Run a read/write closure on the blocking pool.
    pub async fn query<F, T>(&self, f: F) -> folder_mcp_protocol::Result<T>
    where
        F: FnOnce(&Connection) -> folder_mcp_protocol::Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = self.inner.clone();
        let path = self.path.clone();
        tokio::task::spawn_blocking(move || {
            let guard = conn.lock().unwrap_or_else(|p| Self::recover(&path, p));
            f(&guard)
        })
        .await
        .map_err(|e| EngineError::Other(format!("blocking task join failed: {e}")))?
    }

    /// Run a closure inside a single SQLite transaction, committing on `Ok`.
    pub async fn transaction<F, T>(&self, f: F) -> folder_mcp_protocol::Result<T>
    where
        F: FnOnce(&rusqlite::Transaction<'_>) -> folder_mcp_protocol::Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = self.inner.clone();
        let path = self.path.clone();
        tokio::task::spawn_blocking(move || {
            let mut guard = conn.lock().unwrap_or_else(|p| Self::recover(&path, p));
            let tx = guard
                .transaction()
                .map_err(|e| EngineError::Other(format!("transaction start failed: {e}")))?;
            let result = f(&tx)?;
            tx.commit()
                .map_err(|e| EngineError::Other(format!("transaction commit failed: {e}")))?;
            Ok(result)
        })
        .await
        .map_err(|e| EngineError::Other(format!("blocking task join failed: {e}")))?
    }
}

/// Converts `QueryReturnedNoRows` into `None`, leaving every other error as-is.
pub trait OptionalExt<T> {
    fn optional(self) -> rusqlite::Result<Option<T>>;
}

impl<T> OptionalExt<T> for rusqlite::Result<T> {
    fn optional(self) -> rusqlite::Result<Option<T>> {
        match self {
            Ok(v) => Ok(Some(v)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e),
        }
    }
}
