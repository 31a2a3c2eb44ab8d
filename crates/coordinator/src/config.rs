use folder_mcp_protocol::{EmbeddingConfig, Folder};

/// Everything a manager needs to open and run one folder, resolved once by
/// the caller that owns the `folderId -> ResolvedFolderConfig` mapping.
#[derive(Debug, Clone)]
pub struct ResolvedFolderConfig {
    pub folder: Folder,
    pub embedding_config: EmbeddingConfig,
    pub max_backups: usize,
}
