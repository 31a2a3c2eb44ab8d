//! Query-time cosine-similarity search across one or many folder databases.

mod cosine;
mod pool;
mod result;

pub use cosine::cosine_similarity;
pub use pool::{VectorSearchPool, DEFAULT_MAX_OPEN_DATABASES, DEFAULT_THRESHOLD, DEFAULT_TOP_K, MAX_RESULTS_LIMIT, MAX_THRESHOLD, MIN_THRESHOLD};
pub use result::SearchResult;
