//! In-memory queue of `FileEmbeddingTask`s with bounded concurrency and
//! retry-with-delay semantics.

use std::collections::{HashMap, VecDeque};

use folder_mcp_protocol::{FileEmbeddingTask, TaskStatus};
use tokio::sync::RwLock;

pub const DEFAULT_MAX_CONCURRENT_TASKS: usize = 2;
pub const DEFAULT_RETRY_DELAY_MS: u64 = 1000;

/// Aggregate counts exposed to lifecycle/progress reporting.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Statistics {
    pub total_tasks: usize,
    pub pending_tasks: usize,
    pub in_progress_tasks: usize,
    pub completed_tasks: usize,
    pub failed_tasks: usize,
    pub retrying_tasks: usize,
}

struct Entry {
    task: FileEmbeddingTask,
    /// Unix millis before which a retried task is not eligible for dispatch.
    retry_after_ms: Option<u64>,
}

struct Inner {
    order: VecDeque<String>,
    entries: HashMap<String, Entry>,
}

/// FIFO queue of embedding tasks, shared across the manager's dispatch loop.
pub struct TaskQueue {
    inner: RwLock<Inner>,
    retry_delay_ms: u64,
}

impl Default for TaskQueue {
    fn default() -> Self {
        Self::new(DEFAULT_RETRY_DELAY_MS)
    }
}

impl TaskQueue {
    #[must_use]
    pub fn new(retry_delay_ms: u64) -> Self {
        Self {
            inner: RwLock::new(Inner {
                order: VecDeque::new(),
                entries: HashMap::new(),
            }),
            retry_delay_ms,
        }
    }

    /// Appends a task, preserving insertion order.
    pub async fn enqueue(&self, task: FileEmbeddingTask) {
        let mut inner = self.inner.write().await;
        let id = task.id.clone();
        inner.order.push_back(id.clone());
        inner.entries.insert(id, Entry { task, retry_after_ms: None });
    }

    /// The oldest `pending` task that isn't retry-delayed, provided fewer
    /// than `max_concurrent` tasks are currently `in-progress`. Does not
    /// mutate state — pair with [`TaskQueue::mark_in_progress`].
    pub async fn get_next_task(&self, now_ms: u64, max_concurrent: usize) -> Option<FileEmbeddingTask> {
        let inner = self.inner.read().await;
        let in_progress = inner
            .entries
            .values()
            .filter(|e| e.task.status == TaskStatus::InProgress)
            .count();
        if in_progress >= max_concurrent {
            return None;
        }
        for id in &inner.order {
            let Some(entry) = inner.entries.get(id) else { continue };
            if entry.task.status != TaskStatus::Pending {
                continue;
            }
            if let Some(retry_after) = entry.retry_after_ms {
                if now_ms < retry_after {
                    continue;
                }
            }
            return Some(entry.task.clone());
        }
        None
    }

    pub async fn mark_in_progress(&self, id: &str, started_at: u64) {
        let mut inner = self.inner.write().await;
        if let Some(entry) = inner.entries.get_mut(id) {
            entry.task.status = TaskStatus::InProgress;
            entry.task.started_at = Some(started_at);
        }
    }

    /// Records the outcome of one dispatched task. On error, if the task
    /// still has retry budget it is flipped back to `pending` behind
    /// `retry_delay_ms`; otherwise it becomes terminally `error`.
    pub async fn update_task_status(&self, id: &str, outcome: Result<(), String>, now_ms: u64) {
        let mut inner = self.inner.write().await;
        let Some(entry) = inner.entries.get_mut(id) else {
            log::warn!("update_task_status: unknown task {id}");
            return;
        };
        match outcome {
            Ok(()) => {
                entry.task.status = TaskStatus::Success;
                entry.task.completed_at = Some(now_ms);
                entry.retry_after_ms = None;
            }
            Err(message) => {
                if entry.task.can_retry() {
                    entry.task.retry_count += 1;
                    entry.task.status = TaskStatus::Pending;
                    entry.task.error_message = Some(message);
                    entry.retry_after_ms = Some(now_ms + self.retry_delay_ms);
                } else {
                    entry.task.status = TaskStatus::Error;
                    entry.task.completed_at = Some(now_ms);
                    entry.task.error_message = Some(message);
                    entry.retry_after_ms = None;
                }
            }
        }
    }

    pub async fn statistics(&self) -> Statistics {
        let inner = self.inner.read().await;
        let mut stats = Statistics::default();
        for entry in inner.entries.values() {
            stats.total_tasks += 1;
            match entry.task.status {
                TaskStatus::Pending if entry.task.retry_count > 0 => stats.retrying_tasks += 1,
                TaskStatus::Pending => stats.pending_tasks += 1,
                TaskStatus::InProgress => stats.in_progress_tasks += 1,
                TaskStatus::Success => stats.completed_tasks += 1,
                TaskStatus::Error => stats.failed_tasks += 1,
            }
        }
        stats
    }

    /// True once every task is in a terminal status (`success` or `error`).
    pub async fn is_all_tasks_complete(&self) -> bool {
        let inner = self.inner.read().await;
        inner
            .entries
            .values()
            .all(|e| matches!(e.task.status, TaskStatus::Success | TaskStatus::Error))
    }

    pub async fn snapshot(&self) -> Vec<FileEmbeddingTask> {
        let inner = self.inner.read().await;
        inner.order.iter().filter_map(|id| inner.entries.get(id)).map(|e| e.task.clone()).collect()
    }

    pub async fn clear_all(&self) {
        let mut inner = self.inner.write().await;
        inner.order.clear();
        inner.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use folder_mcp_protocol::TaskKind;
    use pretty_assertions::assert_eq;

    fn task(id: &str) -> FileEmbeddingTask {
        FileEmbeddingTask::new(id, format!("{id}.md"), "hash", TaskKind::CreateEmbeddings, 0)
    }

    #[tokio::test]
    async fn returns_oldest_pending_task_first() {
        let queue = TaskQueue::default();
        queue.enqueue(task("t1")).await;
        queue.enqueue(task("t2")).await;
        let next = queue.get_next_task(0, 2).await.unwrap();
        assert_eq!(next.id, "t1");
    }

    #[tokio::test]
    async fn respects_max_concurrent_tasks() {
        let queue = TaskQueue::default();
        queue.enqueue(task("t1")).await;
        queue.enqueue(task("t2")).await;
        queue.mark_in_progress("t1", 0).await;
        assert!(queue.get_next_task(0, 1).await.is_none());
        assert!(queue.get_next_task(0, 2).await.is_some());
    }

    #[tokio::test]
    async fn failed_task_is_retried_until_budget_exhausted() {
        let queue = TaskQueue::default();
        queue.enqueue(task("t1")).await;
        for _ in 0..3 {
            queue.mark_in_progress("t1", 0).await;
            queue.update_task_status("t1", Err("boom".to_string()), 0).await;
        }
        let stats = queue.statistics().await;
        assert_eq!(stats.failed_tasks, 1);
        assert_eq!(stats.pending_tasks, 0);
    }

    #[tokio::test]
    async fn retried_task_is_not_dispatched_before_delay_elapses() {
        let queue = TaskQueue::new(1000);
        queue.enqueue(task("t1")).await;
        queue.mark_in_progress("t1", 0).await;
        queue.update_task_status("t1", Err("boom".to_string()), 500).await;
        assert!(queue.get_next_task(600, 2).await.is_none());
        assert!(queue.get_next_task(1500, 2).await.is_some());
    }

    #[tokio::test]
    async fn completion_transitions_all_tasks_complete() {
        let queue = TaskQueue::default();
        queue.enqueue(task("t1")).await;
        assert!(!queue.is_all_tasks_complete().await);
        queue.mark_in_progress("t1", 0).await;
        queue.update_task_status("t1", Ok(()), 1).await;
        assert!(queue.is_all_tasks_complete().await);
    }

    #[tokio::test]
    async fn clear_all_drops_everything() {
        let queue = TaskQueue::default();
        queue.enqueue(task("t1")).await;
        queue.clear_all().await;
        assert_eq!(queue.statistics().await.total_tasks, 0);
    }
}
