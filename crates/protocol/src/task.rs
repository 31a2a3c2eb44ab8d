use serde::{Deserialize, Serialize};

/// Default retry budget for a single `FileEmbeddingTask`.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TaskKind {
    CreateEmbeddings,
    UpdateEmbeddings,
    RemoveEmbeddings,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    InProgress,
    Success,
    Error,
}

/// A unit of embedding work for one file, queued by `TaskQueue` and tracked
/// in a folder's `FolderLifecycleState` until it reaches a terminal status.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FileEmbeddingTask {
    pub id: String,
    pub file_path: String,
    /// Content hash observed for this file during the scan that created the
    /// task; empty for removals, which have no content to hash. Carried
    /// through to `FileStateStore::start_processing` so the next scan can
    /// compare against it.
    pub content_hash: String,
    pub task: TaskKind,
    pub status: TaskStatus,
    pub retry_count: u32,
    pub max_retries: u32,
    pub created_at: u64,
    pub started_at: Option<u64>,
    pub completed_at: Option<u64>,
    pub error_message: Option<String>,
}

impl FileEmbeddingTask {
    #[must_use]
    pub fn new(
        id: impl Into<String>,
        file_path: impl Into<String>,
        content_hash: impl Into<String>,
        task: TaskKind,
        created_at: u64,
    ) -> Self {
        Self {
            id: id.into(),
            file_path: file_path.into(),
            content_hash: content_hash.into(),
            task,
            status: TaskStatus::Pending,
            retry_count: 0,
            max_retries: DEFAULT_MAX_RETRIES,
            created_at,
            started_at: None,
            completed_at: None,
            error_message: None,
        }
    }

    /// Whether another attempt is permitted after a failure.
    #[must_use]
    pub fn can_retry(&self) -> bool {
        self.retry_count < self.max_retries
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_task_can_retry_up_to_max() {
        let mut task = FileEmbeddingTask::new("t1", "a.md", "hash1", TaskKind::CreateEmbeddings, 0);
        assert!(task.can_retry());
        task.retry_count = task.max_retries;
        assert!(!task.can_retry());
    }
}
