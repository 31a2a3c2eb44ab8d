//! # Folder MCP Protocol
//!
//! Shared data model for the folder indexing and vector search engine:
//! the entities, enums, and error types every other crate in the workspace
//! builds on.
//!
//! Nothing in this crate talks to disk, SQLite, or an embedding backend —
//! it only describes the shapes those crates pass around.

mod collaborators;
mod config;
mod error;
mod ids;
mod lifecycle;
mod task;
mod vector;

pub use collaborators::{Clock, DirEntry, FileSystem, SystemClock};
pub use config::{CoordinatorConfig, EngineConfig, IndexingConfig, SearchConfig, StorageConfig, TaskConfig};
pub use error::{EngineError, Result};
pub use ids::FolderId;
pub use lifecycle::{FolderLifecycleState, FolderStatus, Progress};
pub use task::{FileEmbeddingTask, TaskKind, TaskStatus};
pub use vector::{decode_embedding, encode_embedding};

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// A folder registered with the engine.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Folder {
    pub folder_id: FolderId,
    pub folder_path: PathBuf,
    /// Identifies the embedding backend + model variant, e.g. `"local:bge-small"`.
    pub model: String,
}

impl Folder {
    #[must_use]
    pub fn new(folder_id: impl Into<FolderId>, folder_path: PathBuf, model: impl Into<String>) -> Self {
        Self {
            folder_id: folder_id.into(),
            folder_path,
            model: model.into(),
        }
    }

    /// The folder's private database directory, `<folderPath>/.folder-mcp`.
    #[must_use]
    pub fn data_dir(&self) -> PathBuf {
        self.folder_path.join(".folder-mcp")
    }

    /// The folder's SQLite database path.
    #[must_use]
    pub fn db_path(&self) -> PathBuf {
        self.data_dir().join("embeddings.db")
    }
}

/// Per-file processing state, persisted in `file_states`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FileState {
    pub file_path: String,
    pub content_hash: String,
    pub processing_state: ProcessingState,
    /// Unix millis of the last processing attempt.
    pub last_attempt: u64,
    pub success_timestamp: Option<u64>,
    pub failure_reason: Option<String>,
    pub attempt_count: u32,
    pub chunk_count: Option<u32>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ProcessingState {
    Pending,
    Processing,
    Indexed,
    Failed,
    Skipped,
    Corrupted,
    Deleted,
}

impl ProcessingState {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Indexed => "indexed",
            Self::Failed => "failed",
            Self::Skipped => "skipped",
            Self::Corrupted => "corrupted",
            Self::Deleted => "deleted",
        }
    }
}

impl std::str::FromStr for ProcessingState {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "pending" => Ok(Self::Pending),
            "processing" => Ok(Self::Processing),
            "indexed" => Ok(Self::Indexed),
            "failed" => Ok(Self::Failed),
            "skipped" => Ok(Self::Skipped),
            "corrupted" => Ok(Self::Corrupted),
            "deleted" => Ok(Self::Deleted),
            other => Err(EngineError::Other(format!("unknown processing state: {other}"))),
        }
    }
}

/// A change detected between the current file list and stored `FileState`s.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FileChange {
    pub path: String,
    pub change_type: ChangeType,
    pub last_modified: u64,
    pub size: u64,
    /// Absent for removals.
    pub hash: Option<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ChangeType {
    Added,
    Modified,
    Removed,
}

/// A document row: at most one per `file_path` per folder database.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Document {
    pub file_path: String,
    pub mime_type: String,
    pub document_embedding: Option<Vec<f32>>,
    pub document_keywords: Option<serde_json::Value>,
    pub document_processing_ms: u64,
}

/// A chunk of text produced by the chunker, addressable by `(document_id, chunk_index)`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Chunk {
    pub id: i64,
    pub document_id: i64,
    pub chunk_index: usize,
    pub content: String,
    pub start_position: usize,
    pub end_position: usize,
    pub key_phrases: Option<serde_json::Value>,
    pub readability_score: Option<f32>,
}

/// A chunk embedding, 1:1 with a `Chunk`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Embedding {
    pub chunk_id: i64,
    pub vector: Vec<f32>,
}

/// The singleton `embedding_config` row in a folder database. Immutable for
/// the life of the database: a mismatch between the configured model and
/// the row already on disk is a fatal error (§4.1).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EmbeddingConfig {
    pub model_name: String,
    pub model_dimension: usize,
    pub schema_version: u32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn folder_paths_are_rooted_under_dot_folder_mcp() {
        let folder = Folder::new("f1", PathBuf::from("/tmp/project"), "local:bge-small");
        assert_eq!(folder.data_dir(), PathBuf::from("/tmp/project/.folder-mcp"));
        assert_eq!(
            folder.db_path(),
            PathBuf::from("/tmp/project/.folder-mcp/embeddings.db")
        );
    }

    #[test]
    fn processing_state_round_trips_through_str() {
        for state in [
            ProcessingState::Pending,
            ProcessingState::Processing,
            ProcessingState::Indexed,
            ProcessingState::Failed,
            ProcessingState::Skipped,
            ProcessingState::Corrupted,
            ProcessingState::Deleted,
        ] {
            let parsed: ProcessingState = state.as_str().parse().unwrap();
            assert_eq!(parsed, state);
        }
    }
}
