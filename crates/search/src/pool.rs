use std::num::NonZeroUsize;
use std::sync::Arc;

use folder_mcp_protocol::{EmbeddingConfig, Folder, Result};
use folder_mcp_store::FolderDatabase;
use lru::LruCache;
use tokio::sync::Mutex;

use crate::cosine::cosine_similarity;
use crate::result::SearchResult;

pub const DEFAULT_MAX_OPEN_DATABASES: usize = 10;
pub const DEFAULT_TOP_K: usize = 10;
pub const DEFAULT_THRESHOLD: f32 = 0.3;
pub const MAX_RESULTS_LIMIT: usize = 100;
pub const MIN_THRESHOLD: f32 = -1.0;
pub const MAX_THRESHOLD: f32 = 1.0;

fn clamp_top_k(top_k: usize) -> usize {
    top_k.clamp(1, MAX_RESULTS_LIMIT)
}

fn clamp_threshold(threshold: f32) -> f32 {
    threshold.clamp(MIN_THRESHOLD, MAX_THRESHOLD)
}

struct OpenFolder {
    db: Arc<FolderDatabase>,
    model_id: String,
}

/// LRU pool of opened `FolderDatabase`s serving query-time cosine-similarity
/// search, per-folder or across every known folder.
///
/// A folder's entry can arrive two ways: `register` accepts a handle already
/// opened by its `FolderLifecycleManager` (the usual path, the manager keeps
/// writing to it while the pool only reads), or `open_or_get` opens one
/// itself when nothing already holds it open. Either way, eviction is a
/// single LRU policy over `maxOpenDatabases`.
pub struct VectorSearchPool {
    open: Mutex<LruCache<String, OpenFolder>>,
    max_backups: usize,
}

impl VectorSearchPool {
    #[must_use]
    pub fn new(max_open_databases: usize) -> Self {
        Self::with_max_backups(max_open_databases, folder_mcp_store::DEFAULT_BACKUP_COUNT)
    }

    #[must_use]
    pub fn with_max_backups(max_open_databases: usize, max_backups: usize) -> Self {
        let cap = NonZeroUsize::new(max_open_databases).unwrap_or(NonZeroUsize::MIN);
        Self {
            open: Mutex::new(LruCache::new(cap)),
            max_backups,
        }
    }

    /// Registers an already-open database handle, e.g. one shared by its
    /// `FolderLifecycleManager`. Touches the LRU order, evicting the least
    /// recently used folder if the pool is at capacity.
    pub async fn register(&self, folder_path: impl Into<String>, model_id: impl Into<String>, db: Arc<FolderDatabase>) {
        let mut open = self.open.lock().await;
        open.put(
            folder_path.into(),
            OpenFolder {
                db,
                model_id: model_id.into(),
            },
        );
    }

    /// Returns the pool's handle for `folder`, opening it on demand (and
    /// evicting the least recently used entry if necessary) when not
    /// already held.
    pub async fn open_or_get(&self, folder: &Folder, config: &EmbeddingConfig) -> Result<Arc<FolderDatabase>> {
        let key = folder.folder_path.to_string_lossy().into_owned();
        {
            let mut open = self.open.lock().await;
            if let Some(entry) = open.get(&key) {
                return Ok(entry.db.clone());
            }
        }
        let db = Arc::new(FolderDatabase::open(folder, config, self.max_backups).await?);
        self.register(key, config.model_name.clone(), db.clone()).await;
        Ok(db)
    }

    /// Evicts `folder_path` from the pool without closing anything held
    /// elsewhere (the underlying `FolderDatabase` stays open as long as the
    /// owning manager still has an `Arc` to it).
    pub async fn evict(&self, folder_path: &str) {
        self.open.lock().await.pop(folder_path);
    }

    /// Searches the embeddings stored for one folder. Returns an empty
    /// result if the folder isn't known to the pool or has no stored
    /// embeddings.
    pub async fn search_in_folder(&self, query_vector: &[f32], folder_path: &str, top_k: usize, threshold: f32) -> Result<Vec<SearchResult>> {
        let top_k = clamp_top_k(top_k);
        let threshold = clamp_threshold(threshold);

        let entry = {
            let mut open = self.open.lock().await;
            match open.get(folder_path) {
                Some(entry) => (entry.db.clone(), entry.model_id.clone()),
                None => return Ok(Vec::new()),
            }
        };
        let (db, model_id) = entry;

        let rows = db.stream_embeddings().await?;
        if rows.is_empty() {
            return Ok(Vec::new());
        }

        let mut scored: Vec<SearchResult> = rows
            .into_iter()
            .map(|row| {
                let score = cosine_similarity(query_vector, &row.vector);
                SearchResult {
                    document_id: row.document_id,
                    chunk_id: row.chunk_id,
                    score,
                    content: row.content,
                    folder_path: folder_path.to_string(),
                    model_id: model_id.clone(),
                    metadata: row.metadata,
                }
            })
            .filter(|r| r.score >= threshold)
            .collect();

        scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(top_k);
        Ok(scored)
    }

    /// Searches every folder currently known to the pool and merges by
    /// descending score.
    pub async fn search_all(&self, query_vector: &[f32], top_k: usize, threshold: f32) -> Result<Vec<SearchResult>> {
        let top_k = clamp_top_k(top_k);
        let threshold = clamp_threshold(threshold);

        let folder_paths: Vec<String> = {
            let open = self.open.lock().await;
            open.iter().map(|(path, _)| path.clone()).collect()
        };

        let mut merged = Vec::new();
        for folder_path in folder_paths {
            let mut results = self.search_in_folder(query_vector, &folder_path, top_k, threshold).await?;
            merged.append(&mut results);
        }
        merged.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        merged.truncate(top_k);
        Ok(merged)
    }

    /// Folder paths currently held open, most recently used first.
    pub async fn known_folders(&self) -> Vec<String> {
        self.open.lock().await.iter().map(|(path, _)| path.clone()).collect()
    }

    /// Releases every open handle. Underlying databases close once their
    /// other owners (managers) also drop their references.
    pub async fn shutdown(&self) {
        self.open.lock().await.clear();
    }
}

