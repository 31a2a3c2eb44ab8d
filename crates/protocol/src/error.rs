use thiserror::Error;

pub type Result<T> = std::result::Result<T, EngineError>;

/// Error taxonomy shared by every crate in the workspace.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("model mismatch: database has ({db_model}, dim={db_dim}), configured ({cfg_model}, dim={cfg_dim})")]
    ModelMismatch {
        db_model: String,
        db_dim: usize,
        cfg_model: String,
        cfg_dim: usize,
    },

    #[error("dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("invalid model id: {0}")]
    InvalidModelId(String),

    #[error("database open failed: {0}")]
    OpenFailed(String),

    #[error("database corrupted beyond repair: {0}")]
    Corrupted(String),

    #[error("integrity check failed: {0}")]
    IntegrityCheckFailed(String),

    #[error("unsupported file type: {0}")]
    UnsupportedType(String),

    #[error("read failed: {0}")]
    ReadFailed(String),

    #[error("parse failed: {0}")]
    ParseFailed(String),

    #[error("embed failed: {0}")]
    EmbedFailed(String),

    #[error("illegal state transition: {from} -> {to}")]
    IllegalTransition { from: String, to: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{0}")]
    Other(String),
}
