/// Bumped whenever the DDL below changes in an incompatible way. A mismatch
/// between this constant and the `schema_version` row found on disk causes
/// the database (and its WAL/SHM siblings) to be deleted and recreated.
pub const SCHEMA_VERSION: u32 = 1;

/// Default number of post-init/on-demand backups retained per folder.
pub const DEFAULT_MAX_BACKUPS: usize = 3;

/// DDL applied on every open, after the version check. `dimension` is the
/// folder's configured embedding dimension, recorded alongside each vector
/// row so a stale `embeddings` table can be told apart from a fresh one.
pub fn schema_ddl(dimension: usize) -> String {
    format!(
        r#"
        CREATE TABLE IF NOT EXISTS schema_version (
            id INTEGER PRIMARY KEY CHECK (id = 1),
            version INTEGER NOT NULL,
            updated_at INTEGER NOT NULL
        );

        CREATE TABLE IF NOT EXISTS embedding_config (
            id INTEGER PRIMARY KEY CHECK (id = 1),
            model_name TEXT NOT NULL,
            model_dimension INTEGER NOT NULL
        );

        CREATE TABLE IF NOT EXISTS documents (
            id INTEGER PRIMARY KEY,
            file_path TEXT NOT NULL UNIQUE,
            mime_type TEXT NOT NULL,
            document_embedding TEXT,
            document_keywords TEXT,
            document_processing_ms INTEGER NOT NULL DEFAULT 0
        );
        CREATE INDEX IF NOT EXISTS idx_documents_file_path ON documents(file_path);

        CREATE TABLE IF NOT EXISTS chunks (
            id INTEGER PRIMARY KEY,
            document_id INTEGER NOT NULL REFERENCES documents(id) ON DELETE CASCADE,
            chunk_index INTEGER NOT NULL,
            content TEXT NOT NULL,
            start_position INTEGER NOT NULL,
            end_position INTEGER NOT NULL,
            key_phrases TEXT,
            readability_score REAL
        );
        CREATE INDEX IF NOT EXISTS idx_chunks_document_id ON chunks(document_id);

        CREATE TABLE IF NOT EXISTS embeddings (
            chunk_id INTEGER PRIMARY KEY REFERENCES chunks(id) ON DELETE CASCADE,
            vector_blob TEXT NOT NULL,
            dimension INTEGER NOT NULL DEFAULT {dimension}
        );

        CREATE TABLE IF NOT EXISTS file_states (
            file_path TEXT PRIMARY KEY,
            content_hash TEXT NOT NULL,
            processing_state TEXT NOT NULL,
            last_attempt INTEGER NOT NULL,
            success_timestamp INTEGER,
            failure_reason TEXT,
            attempt_count INTEGER NOT NULL DEFAULT 0,
            chunk_count INTEGER
        );
        CREATE INDEX IF NOT EXISTS idx_file_states_content_hash ON file_states(content_hash);
        CREATE INDEX IF NOT EXISTS idx_file_states_processing_state ON file_states(processing_state);
        CREATE INDEX IF NOT EXISTS idx_file_states_last_attempt ON file_states(last_attempt);
        "#
    )
}
