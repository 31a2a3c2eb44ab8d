use std::sync::Arc;

use folder_mcp_protocol::{EngineError, Result};

use crate::backend_cache::BackendCache;
use crate::collaborators::{Chunker, EmbeddingBackendFactory, FileParser};

/// Extensions recognized by the pipeline; concrete parsing for each is an
/// external collaborator the orchestrator never implements itself.
pub const SUPPORTED_EXTENSIONS: &[&str] = &["pdf", "docx", "xlsx", "pptx", "txt", "md"];

pub const DEFAULT_BATCH_SIZE: usize = 10;

#[must_use]
pub fn is_supported_extension(file_path: &str) -> bool {
    std::path::Path::new(file_path)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| SUPPORTED_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

/// Metadata attached to one surviving embedding, aligned by position with
/// [`ProcessFileOutcome::embeddings`].
#[derive(Debug, Clone)]
pub struct ChunkMetadata {
    pub file_path: String,
    pub chunk_id: String,
    pub chunk_index: usize,
    pub content: String,
    pub start_position: usize,
    pub end_position: usize,
    pub file_hash: String,
}

#[derive(Debug, Default)]
pub struct ProcessFileOutcome {
    pub chunk_count: usize,
    pub embedding_count: usize,
    pub bytes: usize,
    pub words: usize,
    pub embeddings: Vec<Vec<f32>>,
    pub metadata: Vec<ChunkMetadata>,
}

/// Per-file pipeline: parse -> chunk -> embed in batches -> return what the
/// caller should persist.
pub struct IndexingOrchestrator {
    parser: Arc<dyn FileParser>,
    chunker: Arc<dyn Chunker>,
    backend_cache: BackendCache,
    batch_size: usize,
}

impl IndexingOrchestrator {
    #[must_use]
    pub fn new(parser: Arc<dyn FileParser>, chunker: Arc<dyn Chunker>, backend_factory: Arc<dyn EmbeddingBackendFactory>) -> Self {
        Self {
            parser,
            chunker,
            backend_cache: BackendCache::new(backend_factory),
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }

    pub async fn process_file(&self, file_path: &str, model_id: &str, filesystem_hash: Option<String>) -> Result<ProcessFileOutcome> {
        if !is_supported_extension(file_path) {
            return Err(EngineError::UnsupportedType(file_path.to_string()));
        }

        let parsed = self.parser.parse(file_path).await?;
        let chunks = self.chunker.chunk(&parsed).await?;
        let file_hash = filesystem_hash.unwrap_or_else(|| fallback_content_hash(&parsed.content));
        let backend = self.backend_cache.get_or_create(model_id).await?;

        let bytes = parsed.content.len();
        let words = parsed.content.split_whitespace().count();

        let mut outcome = ProcessFileOutcome {
            chunk_count: chunks.len(),
            bytes,
            words,
            ..ProcessFileOutcome::default()
        };

        for (batch_start, batch) in chunks.chunks(self.batch_size).enumerate() {
            let texts: Vec<String> = batch.iter().map(|c| c.content.clone()).collect();
            let embedded = match backend.embed(&texts).await {
                Ok(results) => results,
                Err(e) => {
                    log::warn!("{file_path}: embedding batch {batch_start} failed, skipping: {e}");
                    continue;
                }
            };

            for (offset, (chunk, vector)) in batch.iter().zip(embedded).enumerate() {
                let Some(vector) = vector else { continue };
                let chunk_index = batch_start * self.batch_size + offset;
                outcome.metadata.push(ChunkMetadata {
                    file_path: file_path.to_string(),
                    chunk_id: format!("{file_path}_chunk_{chunk_index}"),
                    chunk_index,
                    content: chunk.content.clone(),
                    start_position: chunk.start_position,
                    end_position: chunk.end_position,
                    file_hash: file_hash.clone(),
                });
                outcome.embeddings.push(vector);
            }
        }

        if outcome.embeddings.len() != outcome.metadata.len() {
            return Err(EngineError::EmbedFailed(format!(
                "{file_path}: embeddings/metadata count mismatch ({} vs {})",
                outcome.embeddings.len(),
                outcome.metadata.len()
            )));
        }
        outcome.embedding_count = outcome.embeddings.len();
        Ok(outcome)
    }

    /// Hook for releasing any per-file resources held by collaborators.
    /// Actual document deletion is `FolderDatabase::remove_document`.
    pub async fn remove_file(&self, _file_path: &str) -> Result<()> {
        Ok(())
    }
}

/// Used only when the caller has no filesystem-derived hash to hand in.
fn fallback_content_hash(content: &str) -> String {
    use std::hash::{Hash, Hasher};
    let mut hasher = std::collections::hash_map::DefaultHasher::new();
    content.hash(&mut hasher);
    format!("{:016x}", hasher.finish())
}
