//! Traits for the pipeline's external collaborators. Concrete PDF/DOCX/XLSX/
//! PPTX/TXT/MD parsers and concrete embedding backends (local CPU ONNX,
//! remote GPU) are explicitly out of scope — only their contracts live here.

use async_trait::async_trait;
use folder_mcp_protocol::Result;

/// Text and metadata extracted from one file by a format-specific parser.
#[derive(Debug, Clone, Default)]
pub struct ParsedContent {
    pub content: String,
    pub metadata: serde_json::Value,
}

#[async_trait]
pub trait FileParser: Send + Sync {
    async fn parse(&self, file_path: &str) -> Result<ParsedContent>;
}

/// One chunk as produced by a chunking strategy, before it is persisted.
#[derive(Debug, Clone)]
pub struct RawChunk {
    pub content: String,
    pub start_position: usize,
    pub end_position: usize,
}

#[async_trait]
pub trait Chunker: Send + Sync {
    async fn chunk(&self, parsed: &ParsedContent) -> Result<Vec<RawChunk>>;
}

/// The outcome of embedding one chunk. `None` means the backend produced no
/// usable vector for that position; it is discarded, not treated as an
/// error.
pub type EmbedResult = Option<Vec<f32>>;

#[async_trait]
pub trait EmbeddingBackend: Send + Sync {
    /// Embeds a batch, positionally aligned with the input.
    async fn embed(&self, batch: &[String]) -> Result<Vec<EmbedResult>>;

    fn dimension(&self) -> usize;
}

/// Constructs an [`EmbeddingBackend`] for a `<provider>:<name>` model id.
/// Backend-specific tuning (batch size, worker pool, thread count) is the
/// factory implementation's concern.
#[async_trait]
pub trait EmbeddingBackendFactory: Send + Sync {
    async fn create(&self, model_id: &str) -> Result<std::sync::Arc<dyn EmbeddingBackend>>;
}
