use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use folder_mcp_lifecycle::FolderLifecycleManager;
use folder_mcp_protocol::{FolderId, FolderLifecycleState, FolderStatus};
use tokio::sync::{Mutex, RwLock};

use crate::config::ResolvedFolderConfig;
use crate::status::{AggregateStatus, FolderIndexOutcome, IndexAllOptions};

const CANCELLED: &str = "cancelled";

struct FolderEntry {
    #[allow(dead_code)]
    config: ResolvedFolderConfig,
    manager: Arc<FolderLifecycleManager>,
}

/// Owns every `FolderLifecycleManager` in the process, bounds cross-folder
/// concurrency, and exposes an aggregate view.
///
/// Exclusively owns the `folderId -> FolderLifecycleManager` mapping; each
/// manager still exclusively owns its own `TaskQueue`/`FileStateStore`.
pub struct MultiFolderCoordinator {
    folders: RwLock<HashMap<FolderId, FolderEntry>>,
    cancel_all: AtomicBool,
    cancelled_folders: Mutex<HashSet<FolderId>>,
}

impl MultiFolderCoordinator {
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            folders: RwLock::new(HashMap::new()),
            cancel_all: AtomicBool::new(false),
            cancelled_folders: Mutex::new(HashSet::new()),
        })
    }

    pub async fn register_folder(&self, config: ResolvedFolderConfig, manager: Arc<FolderLifecycleManager>) {
        let folder_id = config.folder.folder_id.clone();
        self.folders.write().await.insert(folder_id.clone(), FolderEntry { config, manager });
        self.cancelled_folders.lock().await.remove(&folder_id);
    }

    pub async fn unregister_folder(&self, folder_id: &FolderId) {
        self.folders.write().await.remove(folder_id);
    }

    pub async fn folder_ids(&self) -> Vec<FolderId> {
        self.folders.read().await.keys().cloned().collect()
    }

    async fn manager_for(&self, folder_id: &FolderId) -> Option<Arc<FolderLifecycleManager>> {
        self.folders.read().await.get(folder_id).map(|e| e.manager.clone())
    }

    async fn is_cancelled(&self, folder_id: &FolderId) -> bool {
        self.cancel_all.load(Ordering::SeqCst) || self.cancelled_folders.lock().await.contains(folder_id)
    }

    /// Drives one folder's manager through a full scan + index cycle,
    /// returning once it reaches a terminal status.
    pub async fn index_folder(&self, folder_id: &FolderId) -> FolderIndexOutcome {
        let Some(manager) = self.manager_for(folder_id).await else {
            return FolderIndexOutcome::failed(folder_id.clone(), "unknown folder".to_string());
        };

        if self.is_cancelled(folder_id).await {
            return FolderIndexOutcome::failed(folder_id.clone(), CANCELLED.to_string());
        }

        if let Err(e) = manager.start_scanning().await {
            return FolderIndexOutcome::failed(folder_id.clone(), e.to_string());
        }

        loop {
            match manager.status().await {
                FolderStatus::Active => return FolderIndexOutcome::ok(folder_id.clone()),
                FolderStatus::Error => {
                    let snapshot = manager.state_snapshot().await;
                    return FolderIndexOutcome::failed(
                        folder_id.clone(),
                        snapshot.error_message.unwrap_or_else(|| "unknown error".to_string()),
                    );
                }
                FolderStatus::Ready => {
                    if self.is_cancelled(folder_id).await {
                        manager.stop().await;
                        return FolderIndexOutcome::failed(folder_id.clone(), CANCELLED.to_string());
                    }
                    if let Err(e) = manager.start_indexing().await {
                        return FolderIndexOutcome::failed(folder_id.clone(), e.to_string());
                    }
                }
                FolderStatus::Pending | FolderStatus::Scanning | FolderStatus::Indexing => {
                    if self.is_cancelled(folder_id).await {
                        manager.stop().await;
                        return FolderIndexOutcome::failed(folder_id.clone(), CANCELLED.to_string());
                    }
                    tokio::time::sleep(std::time::Duration::from_millis(20)).await;
                }
            }
        }
    }

    /// Processes every registered folder in batches of
    /// `options.max_concurrent_folders`, honoring `continueOnError`.
    /// Per-folder errors are captured in the result rather than aborting the
    /// run when `continueOnError = true`.
    pub async fn index_all(self: &Arc<Self>, options: IndexAllOptions) -> Vec<FolderIndexOutcome> {
        let folder_ids = self.folder_ids().await;
        let batch_size = options.max_concurrent_folders.max(1);
        let mut outcomes = Vec::with_capacity(folder_ids.len());

        for batch in folder_ids.chunks(batch_size) {
            if self.cancel_all.load(Ordering::SeqCst) {
                break;
            }

            let mut tasks = tokio::task::JoinSet::new();
            for folder_id in batch {
                let this = Arc::clone(self);
                let folder_id = folder_id.clone();
                tasks.spawn(async move { this.index_folder(&folder_id).await });
            }

            let mut had_error = false;
            while let Some(result) = tasks.join_next().await {
                match result {
                    Ok(outcome) => {
                        had_error |= !outcome.is_ok();
                        outcomes.push(outcome);
                    }
                    Err(e) => {
                        log::error!("index_folder task panicked: {e}");
                        had_error = true;
                    }
                }
            }

            if had_error && !options.continue_on_error {
                break;
            }
        }
        outcomes
    }

    pub async fn get_folder_status(&self, folder_id: &FolderId) -> Option<FolderLifecycleState> {
        let manager = self.manager_for(folder_id).await?;
        Some(manager.state_snapshot().await)
    }

    /// Rolls up every registered folder's progress into one aggregate.
    pub async fn get_all_folders_status(&self) -> AggregateStatus {
        let folders = self.folders.read().await;
        let mut aggregate = AggregateStatus::default();
        for (folder_id, entry) in folders.iter() {
            let snapshot = entry.manager.state_snapshot().await;
            aggregate.total_tasks += snapshot.progress.total_tasks;
            aggregate.completed_tasks += snapshot.progress.completed_tasks;
            aggregate.failed_tasks += snapshot.progress.failed_tasks;
            if let Some(started) = snapshot.last_scan_started {
                aggregate.earliest_started_at = Some(match aggregate.earliest_started_at {
                    Some(earliest) => earliest.min(started),
                    None => started,
                });
            }
            aggregate.per_folder.insert(folder_id.clone(), snapshot);
        }
        aggregate
    }

    /// Sets a cooperative cancellation flag observed between tasks/batches;
    /// in-flight work resolves and is discarded rather than being forcibly
    /// interrupted.
    pub async fn cancel_all(&self) {
        self.cancel_all.store(true, Ordering::SeqCst);
        let folders = self.folders.read().await;
        for entry in folders.values() {
            entry.manager.stop().await;
        }
    }

    pub async fn cancel_folder(&self, folder_id: &FolderId) {
        self.cancelled_folders.lock().await.insert(folder_id.clone());
        if let Some(manager) = self.manager_for(folder_id).await {
            manager.stop().await;
        }
    }

    /// Clears every cancellation flag, re-enabling `indexAll`/`indexFolder`.
    pub async fn reset_cancellation(&self) {
        self.cancel_all.store(false, Ordering::SeqCst);
        self.cancelled_folders.lock().await.clear();
    }
}
