//! Deserializable tunables for the ambient pieces of the engine (task
//! concurrency/retry, batch sizing, database caching, search defaults).
//! Each sub-struct's defaults mirror the `DEFAULT_*`/`MAX_*` constants the
//! owning crate (`folder-mcp-queue`, `folder-mcp-lifecycle`,
//! `folder-mcp-index`, `folder-mcp-store`, `folder-mcp-coordinator`,
//! `folder-mcp-search`) already defines and uses when no config is supplied
//! — this crate can't depend on those downstream crates, so the numbers are
//! restated here rather than imported.

use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, rename_all = "camelCase")]
pub struct TaskConfig {
    pub max_concurrent_tasks: usize,
    pub max_retries: u32,
    pub retry_delay_ms: u64,
}

impl Default for TaskConfig {
    fn default() -> Self {
        Self { max_concurrent_tasks: 2, max_retries: 3, retry_delay_ms: 1000 }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, rename_all = "camelCase")]
pub struct IndexingConfig {
    pub max_files_per_batch: usize,
    pub batch_size: usize,
}

impl Default for IndexingConfig {
    fn default() -> Self {
        Self { max_files_per_batch: 50, batch_size: 10 }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, rename_all = "camelCase")]
pub struct StorageConfig {
    pub max_open_databases: usize,
    pub max_backups: usize,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self { max_open_databases: 10, max_backups: 3 }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, rename_all = "camelCase")]
pub struct CoordinatorConfig {
    pub max_concurrent_folders: usize,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self { max_concurrent_folders: 3 }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct SearchConfig {
    pub top_k: usize,
    pub threshold: f32,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self { top_k: 10, threshold: 0.3 }
    }
}

/// Top-level tunables tree for one engine instance. Every field has a
/// working default, so a caller may deserialize a partial document (or
/// none at all) and still get a valid config — use [`EngineConfig::validate`]
/// before wiring it into the lifecycle/queue/index/store/search crates.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Default)]
#[serde(default, rename_all = "camelCase")]
pub struct EngineConfig {
    pub tasks: TaskConfig,
    pub indexing: IndexingConfig,
    pub storage: StorageConfig,
    pub coordinator: CoordinatorConfig,
    pub search: SearchConfig,
}

impl EngineConfig {
    /// Rejects tunables that would make the engine unable to make progress
    /// or that fall outside their meaningful range. Zero retries and zero
    /// retry delay are legitimate (retry disabled / immediate retry) so
    /// those two are not bounded below by 1.
    pub fn validate(&self) -> Result<()> {
        let positive = [
            ("tasks.maxConcurrentTasks", self.tasks.max_concurrent_tasks),
            ("indexing.maxFilesPerBatch", self.indexing.max_files_per_batch),
            ("indexing.batchSize", self.indexing.batch_size),
            ("storage.maxOpenDatabases", self.storage.max_open_databases),
            ("storage.maxBackups", self.storage.max_backups),
            ("coordinator.maxConcurrentFolders", self.coordinator.max_concurrent_folders),
            ("search.topK", self.search.top_k),
        ];
        for (name, value) in positive {
            if value == 0 {
                return Err(EngineError::Other(format!("{name} must be greater than zero")));
            }
        }
        if !(-1.0..=1.0).contains(&self.search.threshold) {
            return Err(EngineError::Other(format!(
                "search.threshold must be within [-1.0, 1.0], got {}",
                self.search.threshold
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn default_config_validates() {
        assert!(EngineConfig::default().validate().is_ok());
    }

    #[test]
    fn zero_concurrency_is_rejected() {
        let mut config = EngineConfig::default();
        config.tasks.max_concurrent_tasks = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn out_of_range_threshold_is_rejected() {
        let mut config = EngineConfig::default();
        config.search.threshold = 1.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn zero_retries_and_zero_delay_are_allowed() {
        let mut config = EngineConfig::default();
        config.tasks.max_retries = 0;
        config.tasks.retry_delay_ms = 0;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn deserializes_from_partial_json() {
        let config: EngineConfig = serde_json::from_str(r#"{"search":{"topK":25}}"#).unwrap();
        assert_eq!(config.search.top_k, 25);
        assert_eq!(config.tasks.max_concurrent_tasks, 2);
    }
}
