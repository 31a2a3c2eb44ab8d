//! A deterministic, in-memory stand-in for the real file-format parsers and
//! embedding backends the engine deliberately leaves as external
//! collaborators. This is demo wiring only: `DemoEmbeddingBackend` is a hash
//! of the chunk's bytes, not a trained model, and `DemoParser` treats every
//! supported extension as UTF-8 text rather than actually parsing
//! PDF/DOCX/XLSX/PPTX structure.

use std::sync::Arc;

use async_trait::async_trait;
use folder_mcp_index::{Chunker, EmbeddingBackend, EmbeddingBackendFactory, FileParser, ParsedContent, RawChunk};
use folder_mcp_protocol::{EngineError, Result};
use md5::{Digest, Md5};

/// Dimension produced by [`DemoEmbeddingBackend`]; arbitrary, chosen to be
/// small enough for the demo to stay fast.
pub const DEMO_EMBEDDING_DIMENSION: usize = 32;

/// Model id the demo CLI registers folders under.
pub const DEMO_MODEL_ID: &str = "demo:hash32";

/// Words per chunk, chosen so a typical README produces a handful of chunks
/// rather than one giant blob.
const WORDS_PER_CHUNK: usize = 80;

pub struct DemoParser;

#[async_trait]
impl FileParser for DemoParser {
    async fn parse(&self, file_path: &str) -> Result<ParsedContent> {
        let bytes = tokio::fs::read(file_path).await.map_err(|_| EngineError::ReadFailed(file_path.to_string()))?;
        let content = String::from_utf8_lossy(&bytes).into_owned();
        Ok(ParsedContent {
            content,
            metadata: serde_json::json!({ "source": file_path }),
        })
    }
}

pub struct DemoChunker;

#[async_trait]
impl Chunker for DemoChunker {
    async fn chunk(&self, parsed: &ParsedContent) -> Result<Vec<RawChunk>> {
        let words: Vec<&str> = parsed.content.split_whitespace().collect();
        if words.is_empty() {
            return Ok(Vec::new());
        }

        let mut chunks = Vec::new();
        let mut position = 0usize;
        for group in words.chunks(WORDS_PER_CHUNK) {
            let content = group.join(" ");
            let start_position = position;
            let end_position = start_position + content.len();
            chunks.push(RawChunk { content, start_position, end_position });
            position = end_position + 1;
        }
        Ok(chunks)
    }
}

/// Hashes each chunk's text into a unit vector. Chunks with identical text
/// get identical embeddings; otherwise two chunks' cosine similarity carries
/// no semantic meaning. Good enough to exercise storage and ranking, not a
/// real embedding model.
pub struct DemoEmbeddingBackend {
    dimension: usize,
}

impl DemoEmbeddingBackend {
    #[must_use]
    pub fn new(dimension: usize) -> Self {
        Self { dimension }
    }

    fn embed_one(&self, text: &str) -> Vec<f32> {
        let mut out = Vec::with_capacity(self.dimension);
        let mut counter: u32 = 0;
        while out.len() < self.dimension {
            let mut hasher = Md5::new();
            hasher.update(text.as_bytes());
            hasher.update(counter.to_le_bytes());
            let digest = hasher.finalize();
            for byte in digest {
                if out.len() == self.dimension {
                    break;
                }
                out.push((f32::from(byte) / 127.5) - 1.0);
            }
            counter += 1;
        }
        let norm = out.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            for v in &mut out {
                *v /= norm;
            }
        }
        out
    }
}

#[async_trait]
impl EmbeddingBackend for DemoEmbeddingBackend {
    async fn embed(&self, batch: &[String]) -> Result<Vec<Option<Vec<f32>>>> {
        Ok(batch.iter().map(|t| Some(self.embed_one(t))).collect())
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

pub struct DemoEmbeddingBackendFactory {
    dimension: usize,
}

impl DemoEmbeddingBackendFactory {
    #[must_use]
    pub fn new(dimension: usize) -> Self {
        Self { dimension }
    }
}

#[async_trait]
impl EmbeddingBackendFactory for DemoEmbeddingBackendFactory {
    async fn create(&self, _model_id: &str) -> Result<Arc<dyn EmbeddingBackend>> {
        Ok(Arc::new(DemoEmbeddingBackend::new(self.dimension)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn identical_text_hashes_identically() {
        let backend = DemoEmbeddingBackend::new(16);
        assert_eq!(backend.embed_one("hello world"), backend.embed_one("hello world"));
    }

    #[test]
    fn distinct_text_hashes_differently() {
        let backend = DemoEmbeddingBackend::new(16);
        assert_ne!(backend.embed_one("hello"), backend.embed_one("world"));
    }

    #[tokio::test]
    async fn empty_content_chunks_to_nothing() {
        let chunker = DemoChunker;
        let parsed = ParsedContent { content: String::new(), metadata: serde_json::json!({}) };
        assert!(chunker.chunk(&parsed).await.unwrap().is_empty());
    }
}
