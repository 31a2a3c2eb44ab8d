//! The parse -> chunk -> embed -> persist pipeline for one file, plus
//! document-level embedding aggregation and per-model backend routing.

mod aggregator;
mod backend_cache;
mod collaborators;
mod orchestrator;

pub use aggregator::DocumentEmbeddingAggregator;
pub use backend_cache::{parse_model_id, BackendCache};
pub use collaborators::{Chunker, EmbedResult, EmbeddingBackend, EmbeddingBackendFactory, FileParser, ParsedContent, RawChunk};
pub use orchestrator::{is_supported_extension, ChunkMetadata, IndexingOrchestrator, ProcessFileOutcome, DEFAULT_BATCH_SIZE, SUPPORTED_EXTENSIONS};
