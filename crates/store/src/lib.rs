//! Per-folder vector-enabled SQLite store.
//!
//! [`FolderDatabase`] owns one folder's `.folder-mcp/embeddings.db`: schema
//! application, version checks, corruption recovery, and backups.
//! [`FileStateStore`] is a thin wrapper over the same connection for the
//! `file_states` table, handed out by `FolderDatabase::file_states()`.

mod conn;
mod corruption;
mod db;
mod schema;
mod state_store;

pub use conn::Conn;
pub use corruption::Severity;
pub use db::{EmbeddingRow, FolderDatabase, DEFAULT_BACKUP_COUNT};
pub use schema::{schema_ddl, SCHEMA_VERSION, DEFAULT_MAX_BACKUPS};
pub use state_store::{Decision, DecisionWithReason, FileStateStore};
