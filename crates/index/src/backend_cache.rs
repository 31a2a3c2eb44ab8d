use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use folder_mcp_protocol::{EngineError, Result};
use tokio::sync::OnceCell;

use crate::collaborators::{EmbeddingBackend, EmbeddingBackendFactory};

/// Splits a model id of the form `<provider>:<name>`.
pub fn parse_model_id(model_id: &str) -> Result<(&str, &str)> {
    model_id
        .split_once(':')
        .ok_or_else(|| EngineError::InvalidModelId(model_id.to_string()))
}

/// Caches one `EmbeddingBackend` per `modelId`, with single-flight creation:
/// two simultaneous requests for the same model share one initialization.
pub struct BackendCache {
    factory: Arc<dyn EmbeddingBackendFactory>,
    cells: Mutex<HashMap<String, Arc<OnceCell<Arc<dyn EmbeddingBackend>>>>>,
}

impl BackendCache {
    #[must_use]
    pub fn new(factory: Arc<dyn EmbeddingBackendFactory>) -> Self {
        Self {
            factory,
            cells: Mutex::new(HashMap::new()),
        }
    }

    pub async fn get_or_create(&self, model_id: &str) -> Result<Arc<dyn EmbeddingBackend>> {
        parse_model_id(model_id)?;
        let cell = {
            let mut cells = self.cells.lock().expect("backend cache mutex poisoned");
            cells.entry(model_id.to_string()).or_insert_with(|| Arc::new(OnceCell::new())).clone()
        };
        let factory = self.factory.clone();
        let model_id = model_id.to_string();
        cell.get_or_try_init(|| async move { factory.create(&model_id).await })
            .await
            .cloned()
    }
}
