//! Demo binary exercising the engine end-to-end against real folders on
//! disk. Not a production indexing tool: parsing and embedding are the
//! deterministic stand-ins in [`demo`], not real file-format parsers or a
//! trained model (see `demo` module docs).

mod demo;
mod fs_walk;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use folder_mcp_index::IndexingOrchestrator;
use folder_mcp_lifecycle::FolderLifecycleManager;
use folder_mcp_protocol::{Clock, EmbeddingConfig, FileSystem, Folder, FolderStatus, SystemClock};
use folder_mcp_search::VectorSearchPool;
use folder_mcp_store::FolderDatabase;

use demo::{DemoChunker, DemoEmbeddingBackendFactory, DemoParser, DEMO_EMBEDDING_DIMENSION, DEMO_MODEL_ID};
use fs_walk::RealFileSystem;

#[derive(Parser)]
#[command(name = "folder-mcp")]
#[command(about = "Folder indexing and vector search engine demo")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Scan and index a folder from scratch (or resume an existing one)
    Index { path: PathBuf },
    /// Re-scan an already-indexed folder for changes
    Rescan { path: PathBuf },
    /// Search one indexed folder with a query embedding
    Search {
        path: PathBuf,
        /// File containing a JSON array of floats, e.g. `[0.1, 0.2, 0.3]`
        query_vector_file: PathBuf,
        #[arg(long, default_value_t = folder_mcp_search::DEFAULT_TOP_K)]
        top_k: usize,
        #[arg(long, default_value_t = folder_mcp_search::DEFAULT_THRESHOLD)]
        threshold: f32,
    },
    /// Report what's stored for a folder
    Status { path: PathBuf },
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Index { path } => cmd_index_or_rescan(&path).await,
        Commands::Rescan { path } => cmd_index_or_rescan(&path).await,
        Commands::Search { path, query_vector_file, top_k, threshold } => cmd_search(&path, &query_vector_file, top_k, threshold).await,
        Commands::Status { path } => cmd_status(&path).await,
    }
}

fn folder_for(path: &std::path::Path) -> Result<Folder> {
    let canonical = path.canonicalize().with_context(|| format!("{} does not exist", path.display()))?;
    let folder_id = canonical.to_string_lossy().into_owned();
    Ok(Folder::new(folder_id, canonical, DEMO_MODEL_ID))
}

fn embedding_config() -> EmbeddingConfig {
    EmbeddingConfig {
        model_name: DEMO_MODEL_ID.to_string(),
        model_dimension: DEMO_EMBEDDING_DIMENSION,
        schema_version: 1,
    }
}

async fn build_manager(folder: Folder) -> Result<(Arc<FolderLifecycleManager>, Arc<FolderDatabase>)> {
    let config = embedding_config();
    let db = Arc::new(FolderDatabase::open(&folder, &config, folder_mcp_store::DEFAULT_BACKUP_COUNT).await?);
    let orchestrator = Arc::new(IndexingOrchestrator::new(
        Arc::new(DemoParser),
        Arc::new(DemoChunker),
        Arc::new(DemoEmbeddingBackendFactory::new(DEMO_EMBEDDING_DIMENSION)),
    ));
    let fs: Arc<dyn FileSystem> = Arc::new(RealFileSystem);
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let manager = FolderLifecycleManager::new(folder, db.clone(), orchestrator, fs, clock);
    Ok((manager, db))
}

async fn cmd_index_or_rescan(path: &std::path::Path) -> Result<()> {
    let folder = folder_for(path)?;
    let folder_path = folder.folder_path.clone();
    let (manager, db) = build_manager(folder).await?;

    manager.start_scanning().await.context("scan failed")?;
    match manager.status().await {
        FolderStatus::Ready => {
            manager.start_indexing().await.context("indexing failed to start")?;
            wait_for_terminal(&manager).await?;
        }
        FolderStatus::Active => {}
        other => anyhow::bail!("unexpected status after scan: {other:?}"),
    }

    let state = manager.state_snapshot().await;
    let documents = db.document_fingerprints().await?.len();
    println!(
        "{}: {:?}, {} documents, {}% complete",
        folder_path.display(),
        state.status,
        documents,
        state.progress.percentage()
    );
    if let Some(error) = &state.error_message {
        println!("last error: {error}");
    }
    Ok(())
}

async fn wait_for_terminal(manager: &Arc<FolderLifecycleManager>) -> Result<()> {
    loop {
        match manager.status().await {
            FolderStatus::Active | FolderStatus::Error => return Ok(()),
            _ => tokio::time::sleep(Duration::from_millis(20)).await,
        }
    }
}

async fn cmd_search(path: &std::path::Path, query_vector_file: &std::path::Path, top_k: usize, threshold: f32) -> Result<()> {
    let folder = folder_for(path)?;
    let folder_id = folder.folder_id.to_string();
    let config = embedding_config();
    let db = Arc::new(FolderDatabase::open(&folder, &config, folder_mcp_store::DEFAULT_BACKUP_COUNT).await?);

    let raw = tokio::fs::read_to_string(query_vector_file)
        .await
        .with_context(|| format!("could not read {}", query_vector_file.display()))?;
    let query: Vec<f32> = serde_json::from_str(&raw).context("query vector file must contain a JSON array of numbers")?;

    let pool = VectorSearchPool::new(folder_mcp_search::DEFAULT_MAX_OPEN_DATABASES);
    pool.register(folder_id.clone(), DEMO_MODEL_ID, db).await;

    let results = pool.search_in_folder(&query, &folder_id, top_k, threshold).await?;
    println!("{}", serde_json::to_string_pretty(&to_json(&results))?);
    Ok(())
}

fn to_json(results: &[folder_mcp_search::SearchResult]) -> serde_json::Value {
    serde_json::json!(results
        .iter()
        .map(|r| serde_json::json!({
            "documentId": r.document_id,
            "chunkId": r.chunk_id,
            "score": r.score,
            "content": r.content,
            "folderPath": r.folder_path,
            "modelId": r.model_id,
        }))
        .collect::<Vec<_>>())
}

async fn cmd_status(path: &std::path::Path) -> Result<()> {
    let folder = folder_for(path)?;
    let config = embedding_config();
    let db = FolderDatabase::open(&folder, &config, folder_mcp_store::DEFAULT_BACKUP_COUNT).await?;
    let documents = db.document_fingerprints().await?.len();
    println!("{}: ready={}, {} documents", folder.folder_path.display(), db.is_ready(), documents);
    Ok(())
}
