/// One scored chunk, returned from `search_in_folder`/`search_all` sorted by
/// descending `score`.
#[derive(Debug, Clone)]
pub struct SearchResult {
    pub document_id: i64,
    pub chunk_id: i64,
    pub score: f32,
    pub content: String,
    pub folder_path: String,
    pub model_id: String,
    pub metadata: Option<serde_json::Value>,
}
