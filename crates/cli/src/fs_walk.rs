//! Real filesystem access for the demo CLI, implementing the `FileSystem`
//! collaborator trait injected into every `FolderLifecycleManager`.

use async_trait::async_trait;
use folder_mcp_index::is_supported_extension;
use folder_mcp_protocol::{DirEntry, EngineError, FileSystem, Result};
use ignore::WalkBuilder;

/// Recursively lists files via `ignore::WalkBuilder` (respects `.gitignore`),
/// skipping the engine's own `.folder-mcp` data directory and any extension
/// the indexing pipeline doesn't recognize.
pub struct RealFileSystem;

#[async_trait]
impl FileSystem for RealFileSystem {
    async fn list_files(&self, root: &str) -> Result<Vec<DirEntry>> {
        let root = root.to_string();
        tokio::task::spawn_blocking(move || {
            let mut entries = Vec::new();
            let walker = WalkBuilder::new(&root).hidden(false).build();
            for entry in walker {
                let entry = match entry {
                    Ok(entry) => entry,
                    Err(e) => {
                        log::warn!("skipping unreadable entry while scanning {root}: {e}");
                        continue;
                    }
                };
                let path = entry.path();
                if path.components().any(|c| c.as_os_str() == ".folder-mcp") {
                    continue;
                }
                let Some(file_type) = entry.file_type() else { continue };
                if !file_type.is_file() {
                    continue;
                }
                let path_str = path.to_string_lossy().into_owned();
                if !is_supported_extension(&path_str) {
                    continue;
                }
                let metadata = match entry.metadata() {
                    Ok(metadata) => metadata,
                    Err(e) => {
                        log::warn!("skipping {path_str}: {e}");
                        continue;
                    }
                };
                let mtime_ms = metadata
                    .modified()
                    .ok()
                    .and_then(|m| m.duration_since(std::time::UNIX_EPOCH).ok())
                    .map(|d| d.as_millis() as u64)
                    .unwrap_or_default();
                entries.push(DirEntry { path: path_str, size: metadata.len(), mtime_ms });
            }
            entries
        })
        .await
        .map_err(|e| EngineError::Other(format!("folder walk task panicked: {e}")))
    }

    async fn read_file(&self, path: &str) -> Result<Vec<u8>> {
        tokio::fs::read(path).await.map_err(|_| EngineError::ReadFailed(path.to_string()))
    }
}
