use std::fs;
use std::path::{Path, PathBuf};

use folder_mcp_protocol::{Chunk, EmbeddingConfig, EngineError, Folder, Result};
use rusqlite::Connection;

use crate::conn::Conn;
use crate::corruption::{self, Severity};
use crate::schema::{self, SCHEMA_VERSION};

static REGISTER_VEC_EXTENSION: std::sync::Once = std::sync::Once::new();

/// Registers `sqlite-vec` as an auto-extension so every subsequently opened
/// connection in this process has `vec_version()` / `vec0` available. Done
/// once per process; repeated registration is a no-op in SQLite.
fn register_vec_extension() {
    REGISTER_VEC_EXTENSION.call_once(|| unsafe {
        #[allow(clippy::missing_transmute_annotations)]
        let init_fn = std::mem::transmute::<
            *const (),
            unsafe extern "C" fn(
                *mut rusqlite::ffi::sqlite3,
                *mut *mut std::os::raw::c_char,
                *const rusqlite::ffi::sqlite3_api_routines,
            ) -> std::os::raw::c_int,
        >(sqlite_vec::sqlite3_vec_init as *const ());
        rusqlite::ffi::sqlite3_auto_extension(Some(init_fn));
    });
}

/// One stored chunk embedding joined with its chunk and document, as handed
/// to `VectorSearchPool` for scoring.
#[derive(Debug, Clone)]
pub struct EmbeddingRow {
    pub document_id: i64,
    pub chunk_id: i64,
    pub content: String,
    pub file_path: String,
    pub vector: Vec<f32>,
    pub metadata: Option<serde_json::Value>,
}

/// Single point of access to one folder's persistent store: schema, version
/// checks, corruption recovery, backups, and the document/chunk/embedding
/// tables. `FileStateStore` (in `state_store.rs`) shares the same [`Conn`]
/// to operate on `file_states`.
pub struct FolderDatabase {
    conn: Conn,
    data_dir: PathBuf,
    max_backups: usize,
    ready: bool,
}

impl FolderDatabase {
    /// Runs the full open sequence: ensure the data directory, version-check,
    /// corruption-check/repair, load the vector extension, apply schema,
    /// validate `embedding_config`, and take a post-init backup.
    pub async fn open(folder: &Folder, config: &EmbeddingConfig, max_backups: usize) -> Result<Self> {
        let data_dir = folder.data_dir();
        fs::create_dir_all(&data_dir)?;
        let db_path = folder.db_path();

        Self::reconcile_schema_version(&db_path)?;
        Self::reconcile_corruption(&db_path, &data_dir, max_backups)?;

        register_vec_extension();
        let connection = Connection::open(&db_path)
            .map_err(|e| EngineError::OpenFailed(format!("{}: {e}", db_path.display())))?;
        Self::apply_pragmas(&connection)?;

        let version: String = connection
            .query_row("SELECT vec_version()", [], |r| r.get(0))
            .map_err(|e| EngineError::OpenFailed(format!("vector extension unavailable: {e}")))?;
        log::debug!("opened {} with sqlite-vec {version}", db_path.display());

        connection
            .execute_batch(&schema::schema_ddl(config.model_dimension))
            .map_err(|e| EngineError::OpenFailed(format!("schema DDL failed: {e}")))?;
        connection
            .execute(
                "INSERT OR IGNORE INTO schema_version (id, version, updated_at) VALUES (1, ?1, strftime('%s','now'))",
                rusqlite::params![SCHEMA_VERSION],
            )
            .map_err(|e| EngineError::OpenFailed(e.to_string()))?;

        Self::validate_embedding_config(&connection, config)?;

        let conn = Conn::new(connection, db_path.clone());
        let db = Self {
            conn,
            data_dir,
            max_backups,
            ready: true,
        };
        if let Err(e) = db.backup("init").await {
            log::warn!("post-init backup failed for {}: {e}", db_path.display());
        }
        Ok(db)
    }

    fn reconcile_schema_version(db_path: &Path) -> Result<()> {
        if !db_path.exists() {
            return Ok(());
        }
        let matches = Connection::open(db_path)
            .ok()
            .and_then(|c| {
                c.query_row("SELECT version FROM schema_version WHERE id = 1", [], |r| r.get::<_, u32>(0))
                    .ok()
            })
            .is_some_and(|v| v == SCHEMA_VERSION);
        if !matches {
            log::warn!("schema version mismatch for {}, recreating database", db_path.display());
            remove_db_files(db_path);
        }
        Ok(())
    }

    fn reconcile_corruption(db_path: &Path, data_dir: &Path, max_backups: usize) -> Result<()> {
        if !db_path.exists() {
            return Ok(());
        }
        let severity = {
            let conn = Connection::open(db_path).map_err(|e| EngineError::OpenFailed(e.to_string()))?;
            corruption::classify(&conn)?
        };
        match severity {
            Severity::None => Ok(()),
            Severity::Minor | Severity::Severe => {
                let repaired = Connection::open(db_path)
                    .ok()
                    .and_then(|c| corruption::repair(&c).ok())
                    .is_some();
                if repaired {
                    Ok(())
                } else {
                    Self::recover_from_backup_or_rebuild(db_path, data_dir, max_backups)
                }
            }
            Severity::Critical => Self::recover_from_backup_or_rebuild(db_path, data_dir, max_backups),
        }
    }

    fn recover_from_backup_or_rebuild(db_path: &Path, data_dir: &Path, max_backups: usize) -> Result<()> {
        if let Some(backup) = latest_backup(data_dir, max_backups) {
            log::warn!("restoring {} from backup {}", db_path.display(), backup.display());
            remove_db_files(db_path);
            fs::copy(&backup, db_path)?;
            Ok(())
        } else {
            let ts = current_unix_millis();
            let quarantined = db_path.with_extension(format!("corrupted.{ts}"));
            log::error!(
                "database {} unrecoverably corrupted, moving aside to {} (data loss)",
                db_path.display(),
                quarantined.display()
            );
            let _ = fs::rename(db_path, &quarantined);
            remove_db_files(db_path);
            Ok(())
        }
    }

    fn apply_pragmas(conn: &Connection) -> Result<()> {
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA foreign_keys = ON;
             PRAGMA synchronous = NORMAL;",
        )
        .map_err(|e| EngineError::OpenFailed(format!("pragma setup failed: {e}")))
    }

    fn validate_embedding_config(conn: &Connection, config: &EmbeddingConfig) -> Result<()> {
        let existing: Option<(String, i64)> = conn
            .query_row(
                "SELECT model_name, model_dimension FROM embedding_config WHERE id = 1",
                [],
                |r| Ok((r.get(0)?, r.get(1)?)),
            )
            .ok();
        match existing {
            None => {
                conn.execute(
                    "INSERT INTO embedding_config (id, model_name, model_dimension) VALUES (1, ?1, ?2)",
                    rusqlite::params![config.model_name, config.model_dimension as i64],
                )
                .map_err(|e| EngineError::OpenFailed(e.to_string()))?;
                Ok(())
            }
            Some((db_model, db_dim)) if db_model == config.model_name && db_dim as usize == config.model_dimension => {
                Ok(())
            }
            Some((db_model, db_dim)) => Err(EngineError::ModelMismatch {
                db_model,
                db_dim: db_dim as usize,
                cfg_model: config.model_name.clone(),
                cfg_dim: config.model_dimension,
            }),
        }
    }

    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.ready
    }

    /// Hands out a `FileStateStore` sharing this database's connection.
    #[must_use]
    pub fn file_states(&self) -> crate::state_store::FileStateStore {
        crate::state_store::FileStateStore::new(self.conn.clone())
    }

    /// Insert-or-replace the document row and replace all of its chunks and
    /// embeddings in one transaction.
    pub async fn add_embeddings(
        &self,
        file_path: String,
        mime_type: String,
        chunks: Vec<Chunk>,
        embeddings: Vec<(i64, Vec<f32>)>,
        document_embedding: Option<Vec<f32>>,
        document_processing_ms: u64,
    ) -> Result<()> {
        self.conn
            .transaction(move |tx| {
                let doc_embedding_b64 = document_embedding.as_deref().map(folder_mcp_protocol::encode_embedding);
                tx.execute(
                    "INSERT INTO documents (file_path, mime_type, document_embedding, document_processing_ms)
                     VALUES (?1, ?2, ?3, ?4)
                     ON CONFLICT(file_path) DO UPDATE SET
                        mime_type = excluded.mime_type,
                        document_embedding = excluded.document_embedding,
                        document_processing_ms = excluded.document_processing_ms",
                    rusqlite::params![file_path, mime_type, doc_embedding_b64, document_processing_ms as i64],
                )
                .map_err(|e| EngineError::Other(e.to_string()))?;

                let document_id: i64 = tx
                    .query_row("SELECT id FROM documents WHERE file_path = ?1", [&file_path], |r| r.get(0))
                    .map_err(|e| EngineError::Other(e.to_string()))?;

                tx.execute("DELETE FROM chunks WHERE document_id = ?1", [document_id])
                    .map_err(|e| EngineError::Other(e.to_string()))?;

                let mut chunk_ids = Vec::with_capacity(chunks.len());
                for chunk in &chunks {
                    tx.execute(
                        "INSERT INTO chunks (document_id, chunk_index, content, start_position, end_position, key_phrases, readability_score)
                         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                        rusqlite::params![
                            document_id,
                            chunk.chunk_index as i64,
                            chunk.content,
                            chunk.start_position as i64,
                            chunk.end_position as i64,
                            chunk.key_phrases.as_ref().map(ToString::to_string),
                            chunk.readability_score,
                        ],
                    )
                    .map_err(|e| EngineError::Other(e.to_string()))?;
                    chunk_ids.push(tx.last_insert_rowid());
                }

                for (i, (_original_chunk_id, vector)) in embeddings.into_iter().enumerate() {
                    let Some(&row_id) = chunk_ids.get(i) else {
                        continue;
                    };
                    let encoded = folder_mcp_protocol::encode_embedding(&vector);
                    tx.execute(
                        "INSERT OR REPLACE INTO embeddings (chunk_id, vector_blob, dimension) VALUES (?1, ?2, ?3)",
                        rusqlite::params![row_id, encoded, vector.len() as i64],
                    )
                    .map_err(|e| EngineError::Other(e.to_string()))?;
                }
                Ok(())
            })
            .await
    }

    /// Cascade-deletes a document and everything that hangs off it, plus its
    /// `file_states` row.
    pub async fn remove_document(&self, file_path: String) -> Result<()> {
        self.conn
            .transaction(move |tx| {
                tx.execute("DELETE FROM documents WHERE file_path = ?1", [&file_path])
                    .map_err(|e| EngineError::Other(e.to_string()))?;
                tx.execute("DELETE FROM file_states WHERE file_path = ?1", [&file_path])
                    .map_err(|e| EngineError::Other(e.to_string()))?;
                Ok(())
            })
            .await
    }

    /// One row per stored chunk embedding, joined with its chunk and
    /// document, for `VectorSearchPool` to score in-process.
    pub async fn stream_embeddings(&self) -> Result<Vec<EmbeddingRow>> {
        self.conn
            .query(|conn| {
                let mut stmt = conn
                    .prepare(
                        "SELECT d.id, c.id, c.content, d.file_path, e.vector_blob, c.key_phrases
                         FROM embeddings e
                         JOIN chunks c ON c.id = e.chunk_id
                         JOIN documents d ON d.id = c.document_id",
                    )
                    .map_err(|e| EngineError::Other(e.to_string()))?;
                let rows = stmt
                    .query_map([], |r| {
                        Ok((
                            r.get::<_, i64>(0)?,
                            r.get::<_, i64>(1)?,
                            r.get::<_, String>(2)?,
                            r.get::<_, String>(3)?,
                            r.get::<_, String>(4)?,
                            r.get::<_, Option<String>>(5)?,
                        ))
                    })
                    .map_err(|e| EngineError::Other(e.to_string()))?;
                let mut out = Vec::new();
                for row in rows {
                    let (document_id, chunk_id, content, file_path, vector_blob, key_phrases) =
                        row.map_err(|e| EngineError::Other(e.to_string()))?;
                    let vector = folder_mcp_protocol::decode_embedding(&vector_blob)?;
                    let metadata = key_phrases.and_then(|s| serde_json::from_str(&s).ok());
                    out.push(EmbeddingRow {
                        document_id,
                        chunk_id,
                        content,
                        file_path,
                        vector,
                        metadata,
                    });
                }
                Ok(out)
            })
            .await
    }

    /// `filePath -> contentHash` for every known file, used by `ChangeDetector`.
    pub async fn document_fingerprints(&self) -> Result<std::collections::HashMap<String, String>> {
        self.conn
            .query(|conn| {
                let mut stmt = conn
                    .prepare("SELECT file_path, content_hash FROM file_states")
                    .map_err(|e| EngineError::Other(e.to_string()))?;
                let rows = stmt
                    .query_map([], |r| Ok((r.get::<_, String>(0)?, r.get::<_, String>(1)?)))
                    .map_err(|e| EngineError::Other(e.to_string()))?;
                let mut map = std::collections::HashMap::new();
                for row in rows {
                    let (path, hash) = row.map_err(|e| EngineError::Other(e.to_string()))?;
                    map.insert(path, hash);
                }
                Ok(map)
            })
            .await
    }

    /// WAL checkpoint. Best-effort: failures are logged, never propagated.
    pub async fn checkpoint(&self) {
        let result = self
            .conn
            .query(|conn| {
                conn.execute_batch("PRAGMA wal_checkpoint(TRUNCATE);")
                    .map_err(|e| EngineError::Other(e.to_string()))
            })
            .await;
        if let Err(e) = result {
            log::warn!("checkpoint failed for {}: {e}", self.conn.path().display());
        }
    }

    /// Online backup (falling back to a file copy) into `<dataDir>/backups/`,
    /// pruning anything beyond `maxBackups`.
    pub async fn backup(&self, suffix: &str) -> Result<PathBuf> {
        let data_dir = self.data_dir.clone();
        let backups_dir = data_dir.join("backups");
        fs::create_dir_all(&backups_dir)?;
        let ts = current_unix_millis();
        let dest = backups_dir.join(format!("embeddings-{ts}-{suffix}.db"));
        let dest_for_task = dest.clone();

        self.conn
            .query(move |conn| {
                let mut dst = Connection::open(&dest_for_task)
                    .map_err(|e| EngineError::Other(format!("backup open failed: {e}")))?;
                match rusqlite::backup::Backup::new(conn, &mut dst) {
                    Ok(backup) => backup
                        .run_to_completion(5, std::time::Duration::from_millis(50), None)
                        .map_err(|e| EngineError::Other(format!("backup run failed: {e}"))),
                    Err(e) => Err(EngineError::Other(format!("backup init failed: {e}"))),
                }
            })
            .await?;

        prune_backups(&backups_dir, self.max_backups);
        Ok(dest)
    }
}

fn remove_db_files(db_path: &Path) {
    for ext in ["", "-wal", "-shm"] {
        let p = if ext.is_empty() {
            db_path.to_path_buf()
        } else {
            let mut os = db_path.as_os_str().to_owned();
            os.push(ext);
            PathBuf::from(os)
        };
        let _ = fs::remove_file(p);
    }
}

fn latest_backup(data_dir: &Path, _max_backups: usize) -> Option<PathBuf> {
    let backups_dir = data_dir.join("backups");
    let mut entries: Vec<_> = fs::read_dir(backups_dir).ok()?.filter_map(|e| e.ok()).collect();
    entries.sort_by_key(|e| e.file_name());
    entries.last().map(|e| e.path())
}

fn prune_backups(backups_dir: &Path, max_backups: usize) {
    let Ok(read) = fs::read_dir(backups_dir) else { return };
    let mut entries: Vec<_> = read.filter_map(|e| e.ok()).collect();
    entries.sort_by_key(|e| e.file_name());
    while entries.len() > max_backups {
        let victim = entries.remove(0);
        let _ = fs::remove_file(victim.path());
    }
}

fn current_unix_millis() -> u128 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or_default()
}

pub use schema::DEFAULT_MAX_BACKUPS as DEFAULT_BACKUP_COUNT;
