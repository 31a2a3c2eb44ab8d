use std::collections::HashMap;

use folder_mcp_protocol::{FolderId, FolderLifecycleState};

pub const DEFAULT_MAX_CONCURRENT_FOLDERS: usize = 3;

#[derive(Debug, Clone)]
pub struct IndexAllOptions {
    pub continue_on_error: bool,
    pub max_concurrent_folders: usize,
}

impl Default for IndexAllOptions {
    fn default() -> Self {
        Self {
            continue_on_error: true,
            max_concurrent_folders: DEFAULT_MAX_CONCURRENT_FOLDERS,
        }
    }
}

/// Per-folder result of one `index_all`/`index_folder` run.
#[derive(Debug, Clone)]
pub struct FolderIndexOutcome {
    pub folder_id: FolderId,
    pub error: Option<String>,
}

impl FolderIndexOutcome {
    #[must_use]
    pub const fn ok(folder_id: FolderId) -> Self {
        Self { folder_id, error: None }
    }

    #[must_use]
    pub const fn failed(folder_id: FolderId, error: String) -> Self {
        Self { folder_id, error: Some(error) }
    }

    #[must_use]
    pub const fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

/// Folder progress rolled up across every registered folder.
#[derive(Debug, Clone, Default)]
pub struct AggregateStatus {
    pub total_tasks: u32,
    pub completed_tasks: u32,
    pub failed_tasks: u32,
    pub earliest_started_at: Option<u64>,
    pub per_folder: HashMap<FolderId, FolderLifecycleState>,
}

impl AggregateStatus {
    /// `sum(processed) / sum(total)`, `completed` meaning terminal
    /// (succeeded or failed), as a percentage.
    #[must_use]
    #[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation)]
    pub fn overall_percentage(&self) -> u32 {
        if self.total_tasks == 0 {
            return 100;
        }
        let processed = self.completed_tasks + self.failed_tasks;
        ((processed as f64 / self.total_tasks as f64) * 100.0).round() as u32
    }
}
