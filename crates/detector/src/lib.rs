//! Hash-based change detection between a folder's current files and its
//! persisted `FileState`s.

mod hash;

pub use hash::content_hash;

use folder_mcp_protocol::{ChangeType, FileChange, Result};
use folder_mcp_store::{Decision, FileStateStore};

/// One file as observed on disk during a scan, before it is compared against
/// stored state.
#[derive(Debug, Clone)]
pub struct ObservedFile {
    pub path: String,
    pub bytes: Vec<u8>,
    pub size: u64,
    pub mtime_ms: u64,
}

/// Outcome of a full scan pass: the changes to act on, plus the files that
/// were unreadable and simply marked skipped (step 5).
#[derive(Debug, Default)]
pub struct ScanOutcome {
    pub changes: Vec<FileChange>,
    pub unreadable: Vec<String>,
}

/// Compares a folder's currently-present files against its `FileStateStore`
/// and produces the set of changes the task queue should act on.
pub struct ChangeDetector<'a> {
    state_store: &'a FileStateStore,
}

impl<'a> ChangeDetector<'a> {
    #[must_use]
    pub fn new(state_store: &'a FileStateStore) -> Self {
        Self { state_store }
    }

    /// Runs the full detection pass: per-file add/modify decisions for every
    /// successfully-read file, then removals for paths no longer present.
    /// `reads` pairs each current path with either its bytes or a read
    /// error; `now` timestamps any resulting skip records.
    pub async fn detect(
        &self,
        reads: Vec<(String, std::result::Result<ObservedFile, String>)>,
        now: u64,
    ) -> Result<ScanOutcome> {
        let mut outcome = ScanOutcome::default();
        let mut current_paths = Vec::with_capacity(reads.len());

        for (path, read) in reads {
            current_paths.push(path.clone());
            match read {
                Ok(file) => {
                    if let Some(change) = self.observe_file(&file).await? {
                        outcome.changes.push(change);
                    }
                }
                Err(_) => {
                    self.state_store
                        .mark_file_skipped(&path, "", "Cannot read file", now)
                        .await?;
                    outcome.unreadable.push(path);
                }
            }
        }

        outcome.changes.extend(self.detect_removals(&current_paths).await?);
        Ok(outcome)
    }

    /// Processes one successfully-read file: hashes it, asks the state store
    /// for a decision, and emits a `FileChange` for `process`/`retry`.
    pub async fn observe_file(&self, file: &ObservedFile) -> Result<Option<FileChange>> {
        let hash = content_hash(&file.path, &file.bytes, file.size, file.mtime_ms);
        let had_prior_state = self.state_store.get_file_state(&file.path).await?.is_some();
        let decision = self.state_store.make_processing_decision(&file.path, &hash).await?;

        match decision.decision {
            Decision::Skip => {
                log::debug!("{}: skipped ({})", file.path, decision.reason);
                Ok(None)
            }
            Decision::Process | Decision::Retry => {
                let change_type = if had_prior_state { ChangeType::Modified } else { ChangeType::Added };
                log::debug!("{}: {change_type:?} ({})", file.path, decision.reason);
                Ok(Some(FileChange {
                    path: file.path.clone(),
                    change_type,
                    last_modified: file.mtime_ms,
                    size: file.size,
                    hash: Some(hash),
                }))
            }
        }
    }

    /// Emits a `removed` change for every stored path that did not appear in
    /// `current_paths`, then prunes those rows.
    async fn detect_removals(&self, current_paths: &[String]) -> Result<Vec<FileChange>> {
        let current: std::collections::HashSet<&str> = current_paths.iter().map(String::as_str).collect();
        let known = self.state_store.list_known_paths().await?;
        let removed: Vec<FileChange> = known
            .into_iter()
            .filter(|p| !current.contains(p.as_str()))
            .map(|path| FileChange {
                path,
                change_type: ChangeType::Removed,
                last_modified: 0,
                size: 0,
                hash: None,
            })
            .collect();
        if !removed.is_empty() {
            self.state_store.cleanup_missing_files(current_paths.to_vec()).await?;
        }
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use folder_mcp_store::Conn;

    fn state_store() -> FileStateStore {
        let conn = rusqlite::Connection::open_in_memory().unwrap();
        conn.execute_batch(&folder_mcp_store::schema_ddl(4)).unwrap();
        FileStateStore::new(Conn::new(conn, std::path::PathBuf::from(":memory:")))
    }

    fn file(path: &str, bytes: &[u8], mtime_ms: u64) -> ObservedFile {
        ObservedFile {
            path: path.to_string(),
            bytes: bytes.to_vec(),
            size: bytes.len() as u64,
            mtime_ms,
        }
    }

    #[tokio::test]
    async fn new_file_emits_added_change() {
        let store = state_store();
        let detector = ChangeDetector::new(&store);
        let change = detector.observe_file(&file("a.md", b"hello", 1)).await.unwrap().unwrap();
        assert_eq!(change.change_type, ChangeType::Added);
    }

    #[tokio::test]
    async fn unchanged_indexed_file_emits_no_change() {
        let store = state_store();
        let detector = ChangeDetector::new(&store);
        let observed = file("a.md", b"hello", 1);
        let hash = content_hash(&observed.path, &observed.bytes, observed.size, observed.mtime_ms);
        store.start_processing("a.md", &hash, 0).await.unwrap();
        store.mark_file_processed("a.md", 2, 1).await.unwrap();

        let change = detector.observe_file(&observed).await.unwrap();
        assert!(change.is_none());
    }

    #[tokio::test]
    async fn modified_file_emits_modified_change() {
        let store = state_store();
        store.start_processing("a.md", "old-hash", 0).await.unwrap();
        store.mark_file_processed("a.md", 2, 1).await.unwrap();
        let detector = ChangeDetector::new(&store);
        let change = detector
            .observe_file(&file("a.md", b"new content", 2))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(change.change_type, ChangeType::Modified);
    }

    #[tokio::test]
    async fn missing_file_emits_removed_change() {
        let store = state_store();
        store.start_processing("gone.md", "h", 0).await.unwrap();
        store.mark_file_processed("gone.md", 1, 1).await.unwrap();
        let detector = ChangeDetector::new(&store);

        let outcome = detector.detect(vec![], 10).await.unwrap();
        assert_eq!(outcome.changes.len(), 1);
        assert_eq!(outcome.changes[0].change_type, ChangeType::Removed);
        assert!(store.get_file_state("gone.md").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn unreadable_file_is_marked_skipped_and_excluded() {
        let store = state_store();
        let detector = ChangeDetector::new(&store);
        let outcome = detector
            .detect(vec![("broken.md".to_string(), Err("permission denied".to_string()))], 5)
            .await
            .unwrap();
        assert!(outcome.changes.is_empty());
        assert_eq!(outcome.unreadable, vec!["broken.md".to_string()]);
        let state = store.get_file_state("broken.md").await.unwrap().unwrap();
        assert_eq!(state.processing_state, folder_mcp_protocol::ProcessingState::Skipped);
    }
}
