use std::sync::Arc;

use folder_mcp_protocol::{Chunk, EmbeddingConfig, Folder};
use folder_mcp_search::VectorSearchPool;
use folder_mcp_store::FolderDatabase;

async fn seed_folder(name: &str, dim: usize, vectors: &[(&str, Vec<f32>)]) -> (tempfile::TempDir, Arc<FolderDatabase>) {
    let dir = tempfile::tempdir().unwrap();
    let folder = Folder::new(name, dir.path().to_path_buf(), "local:fake");
    let config = EmbeddingConfig {
        model_name: "local:fake".to_string(),
        model_dimension: dim,
        schema_version: 1,
    };
    let db = Arc::new(FolderDatabase::open(&folder, &config, 3).await.unwrap());

    for (path, vector) in vectors {
        let chunk = Chunk {
            id: 0,
            document_id: 0,
            chunk_index: 0,
            content: format!("content of {path}"),
            start_position: 0,
            end_position: 10,
            key_phrases: None,
            readability_score: None,
        };
        db.add_embeddings(
            (*path).to_string(),
            "text/plain".to_string(),
            vec![chunk],
            vec![(0, vector.clone())],
            Some(vector.clone()),
            0,
        )
        .await
        .unwrap();
    }
    (dir, db)
}

#[tokio::test]
async fn search_in_folder_ranks_by_similarity_above_threshold() {
    let (_dir, db) = seed_folder(
        "f1",
        3,
        &[("near.md", vec![1.0, 0.0, 0.0]), ("far.md", vec![-1.0, 0.0, 0.0]), ("mid.md", vec![0.7, 0.7, 0.0])],
    )
    .await;

    let pool = VectorSearchPool::new(10);
    pool.register("f1", "local:fake", db).await;

    let results = pool.search_in_folder(&[1.0, 0.0, 0.0], "f1", 10, 0.3).await.unwrap();
    assert_eq!(results.len(), 2);
    assert_eq!(results[0].content, "content of near.md");
    assert!(results[0].score >= results[1].score);
    assert!(results.iter().all(|r| r.score >= 0.3));
}

#[tokio::test]
async fn search_in_folder_returns_empty_for_unknown_folder() {
    let pool = VectorSearchPool::new(10);
    let results = pool.search_in_folder(&[1.0, 0.0], "missing", 10, 0.3).await.unwrap();
    assert!(results.is_empty());
}

#[tokio::test]
async fn search_all_merges_across_folders_by_descending_score() {
    let (_dir_a, db_a) = seed_folder("a", 2, &[("a1.md", vec![1.0, 0.0])]).await;
    let (_dir_b, db_b) = seed_folder("b", 2, &[("b1.md", vec![0.9, 0.1])]).await;

    let pool = VectorSearchPool::new(10);
    pool.register("a", "local:fake", db_a).await;
    pool.register("b", "local:fake", db_b).await;

    let results = pool.search_all(&[1.0, 0.0], 10, 0.0).await.unwrap();
    assert_eq!(results.len(), 2);
    assert!(results[0].score >= results[1].score);
    assert_eq!(results[0].content, "content of a1.md");
}

#[tokio::test]
async fn pool_evicts_least_recently_used_folder_at_capacity() {
    let (_dir_a, db_a) = seed_folder("a", 2, &[("a1.md", vec![1.0, 0.0])]).await;
    let (_dir_b, db_b) = seed_folder("b", 2, &[("b1.md", vec![1.0, 0.0])]).await;

    let pool = VectorSearchPool::new(1);
    pool.register("a", "local:fake", db_a).await;
    pool.register("b", "local:fake", db_b).await;

    let known = pool.known_folders().await;
    assert_eq!(known.len(), 1);
    assert_eq!(known[0], "b");
}
