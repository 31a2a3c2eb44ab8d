use serde::{Deserialize, Serialize};

use crate::task::FileEmbeddingTask;

/// The folder status FSM's states.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FolderStatus {
    Pending,
    Scanning,
    Ready,
    Indexing,
    Active,
    Error,
}

impl FolderStatus {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Scanning => "scanning",
            Self::Ready => "ready",
            Self::Indexing => "indexing",
            Self::Active => "active",
            Self::Error => "error",
        }
    }
}

/// Progress snapshot for the current scan/index cycle.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct Progress {
    pub total_tasks: u32,
    pub completed_tasks: u32,
    pub failed_tasks: u32,
    pub in_progress_tasks: u32,
}

impl Progress {
    /// `percentage = round((completed + 0.5 * in_progress) / total * 100)`,
    /// clamped so pending/in-progress work can never report 100.
    #[must_use]
    #[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation)]
    pub fn percentage(self) -> u32 {
        if self.total_tasks == 0 {
            return 100;
        }
        let numerator = self.completed_tasks as f64 + 0.5 * self.in_progress_tasks as f64;
        let pct = (numerator / self.total_tasks as f64 * 100.0).round() as u32;
        let all_terminal = self.in_progress_tasks == 0
            && (self.completed_tasks + self.failed_tasks) >= self.total_tasks;
        if all_terminal {
            100
        } else {
            pct.min(99)
        }
    }
}

/// Snapshot of a folder's lifecycle state.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FolderLifecycleState {
    pub status: FolderStatus,
    pub progress: Progress,
    pub last_scan_started: Option<u64>,
    pub last_scan_completed: Option<u64>,
    pub last_index_started: Option<u64>,
    pub last_index_completed: Option<u64>,
    pub consecutive_errors: u32,
    pub error_message: Option<String>,
    /// Cleared when the folder transitions to `active`.
    pub file_embedding_tasks: Vec<FileEmbeddingTask>,
}

impl Default for FolderLifecycleState {
    fn default() -> Self {
        Self {
            status: FolderStatus::Pending,
            progress: Progress::default(),
            last_scan_started: None,
            last_scan_completed: None,
            last_index_started: None,
            last_index_completed: None,
            consecutive_errors: 0,
            error_message: None,
            file_embedding_tasks: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn percentage_is_100_for_empty_task_list() {
        let p = Progress::default();
        assert_eq!(p.percentage(), 100);
    }

    #[test]
    fn percentage_is_clamped_below_100_while_work_remains() {
        let p = Progress {
            total_tasks: 4,
            completed_tasks: 4,
            failed_tasks: 0,
            in_progress_tasks: 1,
        };
        // completed == total but in_progress > 0: not all terminal yet.
        assert!(p.percentage() < 100);
    }

    #[test]
    fn percentage_is_100_once_all_tasks_are_terminal() {
        let p = Progress {
            total_tasks: 4,
            completed_tasks: 3,
            failed_tasks: 1,
            in_progress_tasks: 0,
        };
        assert_eq!(p.percentage(), 100);
    }

    #[test]
    fn percentage_counts_in_progress_as_half() {
        let p = Progress {
            total_tasks: 2,
            completed_tasks: 0,
            failed_tasks: 0,
            in_progress_tasks: 1,
        };
        assert_eq!(p.percentage(), 25);
    }
}
