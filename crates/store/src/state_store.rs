use folder_mcp_protocol::{EngineError, FileState, ProcessingState, Result};

use crate::conn::Conn;

const DEFAULT_MAX_RETRIES: u32 = 3;

/// What the caller should do about one file, returned by
/// [`FileStateStore::make_processing_decision`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Skip,
    Retry,
    Process,
}

/// A decision plus the human-readable reason logged alongside it.
#[derive(Debug, Clone)]
pub struct DecisionWithReason {
    pub decision: Decision,
    pub reason: String,
}

/// Thin typed wrapper around the `file_states` table, sharing its
/// [`Conn`] with the owning `FolderDatabase`.
pub struct FileStateStore {
    conn: Conn,
}

impl FileStateStore {
    #[must_use]
    pub fn new(conn: Conn) -> Self {
        Self { conn }
    }

    pub async fn get_file_state(&self, file_path: &str) -> Result<Option<FileState>> {
        let file_path = file_path.to_string();
        self.conn
            .query(move |conn| {
                let row = conn
                    .query_row(
                        "SELECT file_path, content_hash, processing_state, last_attempt,
                                success_timestamp, failure_reason, attempt_count, chunk_count
                         FROM file_states WHERE file_path = ?1",
                        [&file_path],
                        |r| {
                            Ok((
                                r.get::<_, String>(0)?,
                                r.get::<_, String>(1)?,
                                r.get::<_, String>(2)?,
                                r.get::<_, i64>(3)?,
                                r.get::<_, Option<i64>>(4)?,
                                r.get::<_, Option<String>>(5)?,
                                r.get::<_, i64>(6)?,
                                r.get::<_, Option<i64>>(7)?,
                            ))
                        },
                    )
                    .map_err(|e| match e {
                        rusqlite::Error::QueryReturnedNoRows => None,
                        other => Some(other),
                    });
                match row {
                    Err(None) => Ok(None),
                    Err(Some(e)) => Err(EngineError::Other(e.to_string())),
                    Ok((file_path, content_hash, state, last_attempt, success_ts, failure_reason, attempts, chunk_count)) => {
                        Ok(Some(FileState {
                            file_path,
                            content_hash,
                            processing_state: state.parse()?,
                            last_attempt: last_attempt as u64,
                            success_timestamp: success_ts.map(|v| v as u64),
                            failure_reason,
                            attempt_count: attempts as u32,
                            chunk_count: chunk_count.map(|v| v as u32),
                        }))
                    }
                }
            })
            .await
    }

    pub async fn set_file_state(&self, state: FileState) -> Result<()> {
        self.conn
            .query(move |conn| {
                conn.execute(
                    "INSERT INTO file_states
                        (file_path, content_hash, processing_state, last_attempt, success_timestamp, failure_reason, attempt_count, chunk_count)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                     ON CONFLICT(file_path) DO UPDATE SET
                        content_hash = excluded.content_hash,
                        processing_state = excluded.processing_state,
                        last_attempt = excluded.last_attempt,
                        success_timestamp = excluded.success_timestamp,
                        failure_reason = excluded.failure_reason,
                        attempt_count = excluded.attempt_count,
                        chunk_count = excluded.chunk_count",
                    rusqlite::params![
                        state.file_path,
                        state.content_hash,
                        state.processing_state.as_str(),
                        state.last_attempt as i64,
                        state.success_timestamp.map(|v| v as i64),
                        state.failure_reason,
                        state.attempt_count as i64,
                        state.chunk_count.map(|v| v as i64),
                    ],
                )
                .map_err(|e| EngineError::Other(e.to_string()))?;
                Ok(())
            })
            .await
    }

    /// Decides whether a file should be skipped, retried, or (re)processed,
    /// based on its stored state and the hash observed during this scan.
    pub async fn make_processing_decision(&self, file_path: &str, current_hash: &str) -> Result<DecisionWithReason> {
        let existing = self.get_file_state(file_path).await?;
        Ok(match existing {
            None => DecisionWithReason {
                decision: Decision::Process,
                reason: "new file".to_string(),
            },
            Some(state) if state.processing_state == ProcessingState::Indexed && state.content_hash == current_hash => {
                DecisionWithReason {
                    decision: Decision::Skip,
                    reason: "unchanged and already indexed".to_string(),
                }
            }
            Some(state)
                if state.processing_state == ProcessingState::Failed
                    && state.content_hash == current_hash
                    && state.attempt_count < DEFAULT_MAX_RETRIES =>
            {
                DecisionWithReason {
                    decision: Decision::Retry,
                    reason: format!("previous attempt failed ({}/{DEFAULT_MAX_RETRIES})", state.attempt_count),
                }
            }
            Some(state) if state.content_hash != current_hash => DecisionWithReason {
                decision: Decision::Process,
                reason: "content hash changed".to_string(),
            },
            Some(_) => DecisionWithReason {
                decision: Decision::Process,
                reason: "pending, processing, or skipped previously".to_string(),
            },
        })
    }

    pub async fn start_processing(&self, file_path: &str, content_hash: &str, now: u64) -> Result<()> {
        let previous_attempts = self
            .get_file_state(file_path)
            .await?
            .map(|s| s.attempt_count)
            .unwrap_or(0);
        self.set_file_state(FileState {
            file_path: file_path.to_string(),
            content_hash: content_hash.to_string(),
            processing_state: ProcessingState::Processing,
            last_attempt: now,
            success_timestamp: None,
            failure_reason: None,
            attempt_count: previous_attempts + 1,
            chunk_count: None,
        })
        .await
    }

    pub async fn mark_file_processed(&self, file_path: &str, chunk_count: u32, now: u64) -> Result<()> {
        let mut state = self
            .get_file_state(file_path)
            .await?
            .ok_or_else(|| EngineError::Other(format!("no file_state for {file_path}")))?;
        state.processing_state = ProcessingState::Indexed;
        state.success_timestamp = Some(now);
        state.chunk_count = Some(chunk_count);
        state.failure_reason = None;
        self.set_file_state(state).await
    }

    pub async fn mark_file_failed(&self, file_path: &str, reason: &str) -> Result<()> {
        let mut state = self
            .get_file_state(file_path)
            .await?
            .ok_or_else(|| EngineError::Other(format!("no file_state for {file_path}")))?;
        state.processing_state = ProcessingState::Failed;
        state.failure_reason = Some(reason.to_string());
        self.set_file_state(state).await
    }

    pub async fn mark_file_skipped(&self, file_path: &str, hash: &str, reason: &str, now: u64) -> Result<()> {
        self.set_file_state(FileState {
            file_path: file_path.to_string(),
            content_hash: hash.to_string(),
            processing_state: ProcessingState::Skipped,
            last_attempt: now,
            success_timestamp: None,
            failure_reason: Some(reason.to_string()),
            attempt_count: 0,
            chunk_count: None,
        })
        .await
    }

    /// Every `file_path` currently tracked in `file_states`, independent of
    /// processing state. Used to compute `removed` changes before cleanup.
    pub async fn list_known_paths(&self) -> Result<Vec<String>> {
        self.conn
            .query(|conn| {
                let mut stmt = conn
                    .prepare("SELECT file_path FROM file_states")
                    .map_err(|e| EngineError::Other(e.to_string()))?;
                let rows = stmt
                    .query_map([], |r| r.get(0))
                    .map_err(|e| EngineError::Other(e.to_string()))?;
                rows.collect::<std::result::Result<_, _>>()
                    .map_err(|e| EngineError::Other(e.to_string()))
            })
            .await
    }

    /// Deletes `file_states` rows for files no longer present in the folder.
    pub async fn cleanup_missing_files(&self, existing_paths: Vec<String>) -> Result<u64> {
        self.conn
            .query(move |conn| {
                let mut stmt = conn
                    .prepare("SELECT file_path FROM file_states")
                    .map_err(|e| EngineError::Other(e.to_string()))?;
                let known: Vec<String> = stmt
                    .query_map([], |r| r.get(0))
                    .map_err(|e| EngineError::Other(e.to_string()))?
                    .collect::<std::result::Result<_, _>>()
                    .map_err(|e| EngineError::Other(e.to_string()))?;
                let existing: std::collections::HashSet<&str> = existing_paths.iter().map(String::as_str).collect();
                let mut removed = 0u64;
                for path in known {
                    if !existing.contains(path.as_str()) {
                        conn.execute("DELETE FROM file_states WHERE file_path = ?1", [&path])
                            .map_err(|e| EngineError::Other(e.to_string()))?;
                        removed += 1;
                    }
                }
                Ok(removed)
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conn::Conn;
    use pretty_assertions::assert_eq;

    fn store() -> FileStateStore {
        let conn = rusqlite::Connection::open_in_memory().unwrap();
        conn.execute_batch(&crate::schema::schema_ddl(4)).unwrap();
        FileStateStore::new(Conn::new(conn, std::path::PathBuf::from(":memory:")))
    }

    #[tokio::test]
    async fn new_file_is_processed() {
        let store = store();
        let decision = store.make_processing_decision("a.md", "hash1").await.unwrap();
        assert_eq!(decision.decision, Decision::Process);
    }

    #[tokio::test]
    async fn unchanged_indexed_file_is_skipped() {
        let store = store();
        store.start_processing("a.md", "hash1", 1).await.unwrap();
        store.mark_file_processed("a.md", 3, 2).await.unwrap();
        let decision = store.make_processing_decision("a.md", "hash1").await.unwrap();
        assert_eq!(decision.decision, Decision::Skip);
    }

    #[tokio::test]
    async fn changed_hash_triggers_reprocessing() {
        let store = store();
        store.start_processing("a.md", "hash1", 1).await.unwrap();
        store.mark_file_processed("a.md", 3, 2).await.unwrap();
        let decision = store.make_processing_decision("a.md", "hash2").await.unwrap();
        assert_eq!(decision.decision, Decision::Process);
    }

    #[tokio::test]
    async fn failed_file_under_retry_budget_is_retried() {
        let store = store();
        store.start_processing("a.md", "hash1", 1).await.unwrap();
        store.mark_file_failed("a.md", "boom").await.unwrap();
        let decision = store.make_processing_decision("a.md", "hash1").await.unwrap();
        assert_eq!(decision.decision, Decision::Retry);
    }

    #[tokio::test]
    async fn failed_file_over_retry_budget_is_reprocessed_fresh() {
        let store = store();
        for _ in 0..DEFAULT_MAX_RETRIES {
            store.start_processing("a.md", "hash1", 1).await.unwrap();
            store.mark_file_failed("a.md", "boom").await.unwrap();
        }
        let decision = store.make_processing_decision("a.md", "hash1").await.unwrap();
        assert_eq!(decision.decision, Decision::Process);
    }

    #[tokio::test]
    async fn cleanup_removes_only_missing_files() {
        let store = store();
        store.start_processing("a.md", "h", 1).await.unwrap();
        store.start_processing("b.md", "h", 1).await.unwrap();
        let removed = store.cleanup_missing_files(vec!["a.md".to_string()]).await.unwrap();
        assert_eq!(removed, 1);
        assert!(store.get_file_state("a.md").await.unwrap().is_some());
        assert!(store.get_file_state("b.md").await.unwrap().is_none());
    }
}
