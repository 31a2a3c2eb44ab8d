use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use folder_mcp_index::{Chunker, EmbeddingBackend, EmbeddingBackendFactory, FileParser, IndexingOrchestrator, ParsedContent, RawChunk};
use folder_mcp_lifecycle::FolderLifecycleManager;
use folder_mcp_protocol::{Clock, DirEntry, EmbeddingConfig, FileSystem, Folder, FolderStatus, Result};
use folder_mcp_store::FolderDatabase;

struct FakeClock(AtomicU64);
impl Clock for FakeClock {
    fn now_ms(&self) -> u64 {
        self.0.fetch_add(1, Ordering::SeqCst)
    }
}

struct FakeFileSystem {
    files: Mutex<HashMap<String, Vec<u8>>>,
}

#[async_trait]
impl FileSystem for FakeFileSystem {
    async fn list_files(&self, _root: &str) -> Result<Vec<DirEntry>> {
        let files = self.files.lock().unwrap();
        Ok(files
            .iter()
            .map(|(path, bytes)| DirEntry {
                path: path.clone(),
                size: bytes.len() as u64,
                mtime_ms: 1,
            })
            .collect())
    }

    async fn read_file(&self, path: &str) -> Result<Vec<u8>> {
        self.files
            .lock()
            .unwrap()
            .get(path)
            .cloned()
            .ok_or_else(|| folder_mcp_protocol::EngineError::ReadFailed(path.to_string()))
    }
}

struct FakeParser;
#[async_trait]
impl FileParser for FakeParser {
    async fn parse(&self, file_path: &str) -> Result<ParsedContent> {
        Ok(ParsedContent {
            content: format!("contents of {file_path} with enough words to chunk nicely"),
            metadata: serde_json::json!({}),
        })
    }
}

struct FakeChunker;
#[async_trait]
impl Chunker for FakeChunker {
    async fn chunk(&self, parsed: &ParsedContent) -> Result<Vec<RawChunk>> {
        Ok(parsed
            .content
            .split_whitespace()
            .enumerate()
            .map(|(i, w)| RawChunk {
                content: w.to_string(),
                start_position: i,
                end_position: i + w.len(),
            })
            .collect())
    }
}

struct FakeBackend;
#[async_trait]
impl EmbeddingBackend for FakeBackend {
    async fn embed(&self, batch: &[String]) -> Result<Vec<Option<Vec<f32>>>> {
        Ok(batch.iter().map(|t| Some(vec![t.len() as f32, 1.0, 0.0])).collect())
    }
    fn dimension(&self) -> usize {
        3
    }
}

struct FakeFactory;
#[async_trait]
impl EmbeddingBackendFactory for FakeFactory {
    async fn create(&self, _model_id: &str) -> Result<Arc<dyn EmbeddingBackend>> {
        Ok(Arc::new(FakeBackend))
    }
}

async fn wait_for_status(manager: &Arc<FolderLifecycleManager>, target: FolderStatus) {
    for _ in 0..200 {
        if manager.status().await == target {
            return;
        }
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }
    panic!("timed out waiting for status {target:?}, last seen {:?}", manager.status().await);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn scan_then_index_brings_folder_to_active() {
    let dir = tempfile::tempdir().unwrap();
    let folder = Folder::new("f1", dir.path().to_path_buf(), "local:fake");

    let fs: Arc<dyn FileSystem> = Arc::new(FakeFileSystem {
        files: Mutex::new(HashMap::from([
            ("a.md".to_string(), b"hello".to_vec()),
            ("b.txt".to_string(), b"world".to_vec()),
        ])),
    });
    let clock: Arc<dyn Clock> = Arc::new(FakeClock(AtomicU64::new(1)));

    let config = EmbeddingConfig {
        model_name: "fake".to_string(),
        model_dimension: 3,
        schema_version: 1,
    };
    let db = Arc::new(FolderDatabase::open(&folder, &config, 3).await.unwrap());
    let orchestrator = Arc::new(IndexingOrchestrator::new(Arc::new(FakeParser), Arc::new(FakeChunker), Arc::new(FakeFactory)));

    let manager = FolderLifecycleManager::new(folder, db.clone(), orchestrator, fs, clock);
    assert_eq!(manager.status().await, FolderStatus::Pending);

    manager.start_scanning().await.unwrap();
    wait_for_status(&manager, FolderStatus::Ready).await;

    manager.start_indexing().await.unwrap();
    wait_for_status(&manager, FolderStatus::Active).await;

    let fingerprints = db.document_fingerprints().await.unwrap();
    assert_eq!(fingerprints.len(), 2);
    let state = manager.state_snapshot().await;
    assert_eq!(state.progress.percentage(), 100);
    assert!(state.file_embedding_tasks.is_empty());

    let health = manager.health().await;
    assert_eq!(health.status, FolderStatus::Active);
    assert_eq!(health.consecutive_errors, 0);
    assert!(health.last_error.is_none());
    assert!(health.last_scan_duration_ms.is_some());
    assert!(health.last_index_duration_ms.is_some());

    // Rescanning with no filesystem changes must be a no-op: every file's
    // hash still matches what was recorded during indexing, so the detector
    // reports zero changes and the folder goes straight back to `active`
    // without ever visiting `ready`.
    manager.start_scanning().await.unwrap();
    wait_for_status(&manager, FolderStatus::Active).await;
    let state = manager.state_snapshot().await;
    assert_eq!(state.progress.total_tasks, 0);
    assert!(state.file_embedding_tasks.is_empty());
    let fingerprints = db.document_fingerprints().await.unwrap();
    assert_eq!(fingerprints.len(), 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn empty_folder_scans_straight_to_active() {
    let dir = tempfile::tempdir().unwrap();
    let folder = Folder::new("f2", dir.path().to_path_buf(), "local:fake");
    let fs: Arc<dyn FileSystem> = Arc::new(FakeFileSystem { files: Mutex::new(HashMap::new()) });
    let clock: Arc<dyn Clock> = Arc::new(FakeClock(AtomicU64::new(1)));
    let config = EmbeddingConfig {
        model_name: "fake".to_string(),
        model_dimension: 3,
        schema_version: 1,
    };
    let db = Arc::new(FolderDatabase::open(&folder, &config, 3).await.unwrap());
    let orchestrator = Arc::new(IndexingOrchestrator::new(Arc::new(FakeParser), Arc::new(FakeChunker), Arc::new(FakeFactory)));
    let manager = FolderLifecycleManager::new(folder, db, orchestrator, fs, clock);

    manager.start_scanning().await.unwrap();
    wait_for_status(&manager, FolderStatus::Active).await;
}

struct FailingFileSystem;
#[async_trait]
impl FileSystem for FailingFileSystem {
    async fn list_files(&self, _root: &str) -> Result<Vec<DirEntry>> {
        Err(folder_mcp_protocol::EngineError::Other("disk unavailable".to_string()))
    }
    async fn read_file(&self, path: &str) -> Result<Vec<u8>> {
        Err(folder_mcp_protocol::EngineError::ReadFailed(path.to_string()))
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn health_reports_the_error_after_a_failed_scan() {
    let dir = tempfile::tempdir().unwrap();
    let folder = Folder::new("f4", dir.path().to_path_buf(), "local:fake");
    let fs: Arc<dyn FileSystem> = Arc::new(FailingFileSystem);
    let clock: Arc<dyn Clock> = Arc::new(FakeClock(AtomicU64::new(1)));
    let config = EmbeddingConfig {
        model_name: "fake".to_string(),
        model_dimension: 3,
        schema_version: 1,
    };
    let db = Arc::new(FolderDatabase::open(&folder, &config, 3).await.unwrap());
    let orchestrator = Arc::new(IndexingOrchestrator::new(Arc::new(FakeParser), Arc::new(FakeChunker), Arc::new(FakeFactory)));
    let manager = FolderLifecycleManager::new(folder, db, orchestrator, fs, clock);

    manager.start_scanning().await.unwrap();
    wait_for_status(&manager, FolderStatus::Error).await;

    let health = manager.health().await;
    assert_eq!(health.status, FolderStatus::Error);
    assert_eq!(health.consecutive_errors, 1);
    assert!(health.last_error.as_deref().unwrap().contains("disk unavailable"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn stop_then_reset_returns_to_pending() {
    let dir = tempfile::tempdir().unwrap();
    let folder = Folder::new("f3", dir.path().to_path_buf(), "local:fake");
    let fs: Arc<dyn FileSystem> = Arc::new(FakeFileSystem {
        files: Mutex::new(HashMap::from([("a.md".to_string(), b"hello".to_vec())])),
    });
    let clock: Arc<dyn Clock> = Arc::new(FakeClock(AtomicU64::new(1)));
    let config = EmbeddingConfig {
        model_name: "fake".to_string(),
        model_dimension: 3,
        schema_version: 1,
    };
    let db = Arc::new(FolderDatabase::open(&folder, &config, 3).await.unwrap());
    let orchestrator = Arc::new(IndexingOrchestrator::new(Arc::new(FakeParser), Arc::new(FakeChunker), Arc::new(FakeFactory)));
    let manager = FolderLifecycleManager::new(folder, db, orchestrator, fs, clock);

    manager.start_scanning().await.unwrap();
    wait_for_status(&manager, FolderStatus::Ready).await;
    manager.stop().await;
    manager.reset().await;
    assert_eq!(manager.status().await, FolderStatus::Pending);
}
