use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use folder_mcp_detector::{ChangeDetector, ObservedFile};
use folder_mcp_index::{is_supported_extension, DocumentEmbeddingAggregator, IndexingOrchestrator};
use folder_mcp_protocol::{
    ChangeType, Chunk, Clock, EngineError, FileChange, FileEmbeddingTask, FileSystem, Folder, FolderLifecycleState,
    FolderStatus, Progress, Result, TaskKind,
};
use folder_mcp_queue::{TaskQueue, DEFAULT_MAX_CONCURRENT_TASKS};
use folder_mcp_store::FolderDatabase;
use tokio::sync::{broadcast, Mutex as AsyncMutex, RwLock};
use tokio::task::JoinHandle;

use crate::events::{LifecycleEvent, EVENT_CHANNEL_CAPACITY};
use crate::fsm;

/// Changes beyond this count in one scan are deferred to the next scan.
pub const MAX_FILES_PER_BATCH: usize = 50;

/// Point-in-time health snapshot for one folder. `last_*_duration_ms` is
/// `None` until that phase has completed at least once.
#[derive(Debug, Clone, PartialEq)]
pub struct HealthSnapshot {
    pub status: FolderStatus,
    pub consecutive_errors: u32,
    pub last_error: Option<String>,
    pub last_scan_duration_ms: Option<u64>,
    pub last_index_duration_ms: Option<u64>,
}

fn duration_ms(started: Option<u64>, completed: Option<u64>) -> Option<u64> {
    match (started, completed) {
        (Some(start), Some(end)) if end >= start => Some(end - start),
        _ => None,
    }
}

fn task_kind_for_change(change_type: ChangeType) -> TaskKind {
    match change_type {
        ChangeType::Added => TaskKind::CreateEmbeddings,
        ChangeType::Modified => TaskKind::UpdateEmbeddings,
        ChangeType::Removed => TaskKind::RemoveEmbeddings,
    }
}

/// Orchestrates scanning, change detection, the task queue, and storage for
/// one folder; emits lifecycle events to any subscriber.
///
/// Exclusively owns its `TaskQueue` and `FileStateStore`; shares its
/// `FolderDatabase` handle with `VectorSearchPool` for reads.
pub struct FolderLifecycleManager {
    folder: Folder,
    clock: Arc<dyn Clock>,
    fs: Arc<dyn FileSystem>,
    db: Arc<FolderDatabase>,
    state_store: folder_mcp_store::FileStateStore,
    queue: TaskQueue,
    orchestrator: Arc<IndexingOrchestrator>,
    state: RwLock<FolderLifecycleState>,
    events_tx: broadcast::Sender<LifecycleEvent>,
    active: AtomicBool,
    max_files_per_batch: usize,
    max_concurrent_tasks: usize,
    dispatch_handle: AsyncMutex<Option<JoinHandle<()>>>,
}

impl FolderLifecycleManager {
    #[must_use]
    pub fn new(
        folder: Folder,
        db: Arc<FolderDatabase>,
        orchestrator: Arc<IndexingOrchestrator>,
        fs: Arc<dyn FileSystem>,
        clock: Arc<dyn Clock>,
    ) -> Arc<Self> {
        let (events_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let state_store = db.file_states();
        Arc::new(Self {
            folder,
            clock,
            fs,
            db,
            state_store,
            queue: TaskQueue::default(),
            orchestrator,
            state: RwLock::new(FolderLifecycleState::default()),
            events_tx,
            active: AtomicBool::new(true),
            max_files_per_batch: MAX_FILES_PER_BATCH,
            max_concurrent_tasks: DEFAULT_MAX_CONCURRENT_TASKS,
            dispatch_handle: AsyncMutex::new(None),
        })
    }

    #[must_use]
    pub fn folder(&self) -> &Folder {
        &self.folder
    }

    pub fn subscribe(&self) -> broadcast::Receiver<LifecycleEvent> {
        self.events_tx.subscribe()
    }

    pub async fn status(&self) -> FolderStatus {
        self.state.read().await.status
    }

    pub async fn state_snapshot(&self) -> FolderLifecycleState {
        self.snapshot().await
    }

    /// A cheap observability snapshot for dashboards/healthchecks, separate
    /// from [`FolderLifecycleManager::state_snapshot`] so callers that only
    /// want liveness info don't pull the (larger, task-list-carrying) full
    /// state.
    pub async fn health(&self) -> HealthSnapshot {
        let state = self.state.read().await;
        HealthSnapshot {
            status: state.status,
            consecutive_errors: state.consecutive_errors,
            last_error: state.error_message.clone(),
            last_scan_duration_ms: duration_ms(state.last_scan_started, state.last_scan_completed),
            last_index_duration_ms: duration_ms(state.last_index_started, state.last_index_completed),
        }
    }

    async fn snapshot(&self) -> FolderLifecycleState {
        self.state.read().await.clone()
    }

    fn emit(&self, event: LifecycleEvent) {
        let _ = self.events_tx.send(event);
    }

    /// Allowed from `pending` or `active`. Scans the folder, runs change
    /// detection, and hands off to `process_scan_results`.
    pub async fn start_scanning(self: &Arc<Self>) -> Result<()> {
        {
            let mut state = self.state.write().await;
            if !fsm::can_transition(state.status, FolderStatus::Scanning) {
                return Err(EngineError::IllegalTransition {
                    from: state.status.as_str().to_string(),
                    to: "scanning".to_string(),
                });
            }
            state.status = FolderStatus::Scanning;
            state.last_scan_started = Some(self.clock.now_ms());
        }
        self.emit(LifecycleEvent::StateChange(self.snapshot().await));

        if let Err(e) = self.run_scan().await {
            self.handle_error(e, "startScanning").await;
        }
        Ok(())
    }

    async fn run_scan(self: &Arc<Self>) -> Result<()> {
        let root = self.folder.folder_path.to_string_lossy().into_owned();
        let entries = self.fs.list_files(&root).await?;

        let mut reads = Vec::new();
        for entry in entries.into_iter().filter(|e| is_supported_extension(&e.path)) {
            match self.fs.read_file(&entry.path).await {
                Ok(bytes) => reads.push((
                    entry.path.clone(),
                    Ok(ObservedFile {
                        path: entry.path,
                        bytes,
                        size: entry.size,
                        mtime_ms: entry.mtime_ms,
                    }),
                )),
                Err(e) => reads.push((entry.path, Err(e.to_string()))),
            }
        }

        let now = self.clock.now_ms();
        let detector = ChangeDetector::new(&self.state_store);
        let outcome = detector.detect(reads, now).await?;

        {
            let mut state = self.state.write().await;
            state.last_scan_completed = Some(now);
        }

        self.process_scan_results(outcome.changes).await
    }

    async fn process_scan_results(self: &Arc<Self>, mut changes: Vec<FileChange>) -> Result<()> {
        if changes.is_empty() {
            {
                let mut state = self.state.write().await;
                state.status = FolderStatus::Active;
                state.progress = Progress::default();
                state.file_embedding_tasks.clear();
            }
            self.emit(LifecycleEvent::ScanComplete(self.snapshot().await));
            return Ok(());
        }

        if changes.len() > self.max_files_per_batch {
            log::warn!(
                "{}: {} changes exceed maxFilesPerBatch={}, {} deferred to next scan",
                self.folder.folder_id,
                changes.len(),
                self.max_files_per_batch,
                changes.len() - self.max_files_per_batch
            );
            changes.truncate(self.max_files_per_batch);
        }

        let now = self.clock.now_ms();
        for (i, change) in changes.iter().enumerate() {
            let id = format!("{}-{now}-{i}", self.folder.folder_id);
            let task = FileEmbeddingTask::new(
                id,
                change.path.clone(),
                change.hash.clone().unwrap_or_default(),
                task_kind_for_change(change.change_type),
                now,
            );
            self.queue.enqueue(task).await;
        }

        let queue_snapshot = self.queue.snapshot().await;
        {
            let mut state = self.state.write().await;
            state.status = FolderStatus::Ready;
            state.file_embedding_tasks = queue_snapshot;
        }
        self.emit(LifecycleEvent::ScanComplete(self.snapshot().await));
        Ok(())
    }

    /// Allowed only from `ready`. Spawns the dispatch loop and returns
    /// immediately; indexing completion is observed via `subscribe()` or by
    /// polling `status()`.
    pub async fn start_indexing(self: &Arc<Self>) -> Result<()> {
        {
            let mut state = self.state.write().await;
            if state.status != FolderStatus::Ready {
                return Err(EngineError::IllegalTransition {
                    from: state.status.as_str().to_string(),
                    to: "indexing".to_string(),
                });
            }
            state.status = FolderStatus::Indexing;
            state.last_index_started = Some(self.clock.now_ms());
        }
        self.emit(LifecycleEvent::StateChange(self.snapshot().await));

        let this = self.clone();
        let handle = tokio::spawn(async move { this.dispatch_loop().await });
        *self.dispatch_handle.lock().await = Some(handle);
        Ok(())
    }

    async fn dispatch_loop(self: Arc<Self>) {
        loop {
            if !self.active.load(Ordering::SeqCst) {
                return;
            }
            if self.queue.is_all_tasks_complete().await {
                self.complete_indexing().await;
                return;
            }
            let now = self.clock.now_ms();
            match self.queue.get_next_task(now, self.max_concurrent_tasks).await {
                Some(task) => self.dispatch_task(task).await,
                None => tokio::time::sleep(std::time::Duration::from_millis(20)).await,
            }
        }
    }

    async fn complete_indexing(&self) {
        let snap = {
            let mut state = self.state.write().await;
            state.status = FolderStatus::Active;
            state.progress.in_progress_tasks = 0;
            state.progress.completed_tasks = state.progress.total_tasks - state.progress.failed_tasks;
            state.file_embedding_tasks.clear();
            state.consecutive_errors = 0;
            state.last_index_completed = Some(self.clock.now_ms());
            state.clone()
        };
        self.emit(LifecycleEvent::IndexComplete(snap));
    }

    /// Transitions one task to `in-progress` and launches its processing
    /// without blocking the dispatch loop.
    async fn dispatch_task(self: &Arc<Self>, task: FileEmbeddingTask) {
        let now = self.clock.now_ms();
        self.queue.mark_in_progress(&task.id, now).await;
        self.refresh_progress().await;

        let this = self.clone();
        tokio::spawn(async move {
            let result = this.process_task(&task).await;
            this.on_task_complete(&task.id, result).await;
        });
    }

    async fn process_task(&self, task: &FileEmbeddingTask) -> std::result::Result<(), String> {
        match task.task {
            TaskKind::CreateEmbeddings | TaskKind::UpdateEmbeddings => self.process_embedding_task(task).await,
            TaskKind::RemoveEmbeddings => {
                self.orchestrator.remove_file(&task.file_path).await.map_err(|e| e.to_string())?;
                self.db.remove_document(task.file_path.clone()).await.map_err(|e| e.to_string())?;
                Ok(())
            }
        }
    }

    async fn process_embedding_task(&self, task: &FileEmbeddingTask) -> std::result::Result<(), String> {
        let now = self.clock.now_ms();
        self.state_store
            .start_processing(&task.file_path, &task.content_hash, now)
            .await
            .map_err(|e| e.to_string())?;

        let filesystem_hash = (!task.content_hash.is_empty()).then(|| task.content_hash.clone());
        let outcome = match self.orchestrator.process_file(&task.file_path, &self.folder.model, filesystem_hash).await {
            Ok(outcome) => outcome,
            Err(e) => {
                self.state_store.mark_file_failed(&task.file_path, &e.to_string()).await.ok();
                return Err(e.to_string());
            }
        };

        if outcome.embeddings.is_empty() {
            log::info!("{}: no embeddings produced, nothing to persist", task.file_path);
            self.state_store
                .mark_file_processed(&task.file_path, 0, now)
                .await
                .map_err(|e| e.to_string())?;
            return Ok(());
        }

        let dimension = outcome.embeddings[0].len();
        let mut aggregator = DocumentEmbeddingAggregator::new(dimension);
        for vector in &outcome.embeddings {
            if let Err(e) = aggregator.add(vector) {
                self.state_store.mark_file_failed(&task.file_path, &e.to_string()).await.ok();
                return Err(e.to_string());
            }
        }
        let document_embedding = aggregator.finish();

        let chunks: Vec<Chunk> = outcome
            .metadata
            .iter()
            .map(|m| Chunk {
                id: 0,
                document_id: 0,
                chunk_index: m.chunk_index,
                content: m.content.clone(),
                start_position: m.start_position,
                end_position: m.end_position,
                key_phrases: None,
                readability_score: None,
            })
            .collect();
        let embeddings_with_ids: Vec<(i64, Vec<f32>)> = outcome.embeddings.into_iter().map(|v| (0, v)).collect();

        self.db
            .add_embeddings(task.file_path.clone(), "text/plain".to_string(), chunks, embeddings_with_ids, document_embedding, 0)
            .await
            .map_err(|e| e.to_string())?;
        self.state_store
            .mark_file_processed(&task.file_path, outcome.chunk_count as u32, now)
            .await
            .map_err(|e| e.to_string())
    }

    /// Mirrors a finished task's outcome into the queue and lifecycle state;
    /// transitions to `active` once every task has reached a terminal
    /// status.
    async fn on_task_complete(&self, id: &str, result: std::result::Result<(), String>) {
        if let Err(ref e) = result {
            log::warn!("task {id} failed: {e}");
        }
        let now = self.clock.now_ms();
        self.queue.update_task_status(id, result, now).await;
        self.refresh_progress().await;

        if self.queue.is_all_tasks_complete().await {
            self.complete_indexing().await;
        }
    }

    async fn refresh_progress(&self) {
        let stats = self.queue.statistics().await;
        let queue_snapshot = self.queue.snapshot().await;
        let progress = Progress {
            total_tasks: stats.total_tasks as u32,
            completed_tasks: stats.completed_tasks as u32,
            failed_tasks: stats.failed_tasks as u32,
            in_progress_tasks: stats.in_progress_tasks as u32,
        };
        {
            let mut state = self.state.write().await;
            state.progress = progress;
            state.file_embedding_tasks = queue_snapshot;
        }
        self.emit(LifecycleEvent::ProgressUpdate(progress));
    }

    /// Stops processing: in-flight tasks resolve and are discarded, the
    /// queue is cleared, and a final `stateChange` is emitted.
    pub async fn stop(&self) {
        self.active.store(false, Ordering::SeqCst);
        self.queue.clear_all().await;
        self.emit(LifecycleEvent::StateChange(self.snapshot().await));
    }

    /// Returns to `pending` and clears derived state, re-enabling processing.
    pub async fn reset(&self) {
        self.queue.clear_all().await;
        {
            let mut state = self.state.write().await;
            *state = FolderLifecycleState::default();
        }
        self.active.store(true, Ordering::SeqCst);
        self.emit(LifecycleEvent::StateChange(self.snapshot().await));
    }

    async fn handle_error(&self, err: EngineError, context: &str) {
        log::error!("{} failed during {context}: {err}", self.folder.folder_id);
        {
            let mut state = self.state.write().await;
            state.status = FolderStatus::Error;
            state.consecutive_errors += 1;
            state.error_message = Some(err.to_string());
        }
        self.emit(LifecycleEvent::Error(err.to_string()));
    }
}
