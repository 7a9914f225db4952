//! End-to-end scenarios exercising the Store, Indexer, and Queue together,
//! mirroring the scope of `wg-ragsmith`'s `integration_mock_embeddings`
//! suite but driven against this crate's own chunker and job queue instead
//! of semantic chunking.

use std::sync::Arc;
use std::time::Duration;

use goldie_core::{Embedder, Indexer, JobStatus, MockEmbedder, Queue, Store};

async fn harness() -> (tempfile::TempDir, Arc<Indexer<MockEmbedder>>, Queue<MockEmbedder>) {
    let dir = tempfile::tempdir().unwrap();
    let store = Store::open(dir.path().join("goldie.db"), 16).await.unwrap();
    let embedder = Arc::new(MockEmbedder::new(16));
    let indexer = Arc::new(Indexer::new(store.clone(), embedder, 1000, 200));
    let queue = Queue::new(store, Arc::clone(&indexer));
    (dir, indexer, queue)
}

#[tokio::test]
async fn file_index_then_search_finds_the_document() {
    let (dir, _indexer, queue) = harness().await;
    let path = dir.path().join("a.txt");
    tokio::fs::write(&path, "Go is a programming language").await.unwrap();

    let job_id = queue.enqueue_index_file(&path).await.unwrap();
    queue.start().await;
    let job = queue.store().wait_for_job(&job_id, Duration::from_secs(5)).await.unwrap().unwrap();
    queue.stop().await;

    assert_eq!(job.status, JobStatus::Completed);

    let store = queue.store();
    let embedder = MockEmbedder::new(16);
    let query_embedding = embedder.embed("programming").await.unwrap();
    let results = store.search(&query_embedding, 5).await.unwrap();

    assert!(!results.is_empty());
    let hit = results.iter().find(|r| r.document.id == "a.txt");
    let hit = hit.expect("expected a.txt to be indexed");
    assert_eq!(hit.document.metadata.get("filename"), Some(&"a.txt".to_string()));
    assert!(hit.document.metadata.contains_key("checksum"));
}

#[tokio::test]
async fn directory_fan_out_completes_all_children() {
    let (dir, _indexer, queue) = harness().await;
    tokio::fs::write(dir.path().join("a.md"), "alpha content").await.unwrap();
    tokio::fs::write(dir.path().join("b.md"), "beta content").await.unwrap();
    tokio::fs::write(dir.path().join("c.txt"), "not markdown").await.unwrap();

    let job_id = queue.enqueue_index_directory(dir.path(), "*.md", false).await.unwrap();
    queue.start().await;

    let parent = queue.store().wait_for_job(&job_id, Duration::from_secs(5)).await.unwrap().unwrap();
    assert_eq!(parent.status, JobStatus::Completed);
    assert_eq!(parent.result.as_ref().unwrap()["file_count"], 2);

    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    loop {
        let stats = queue.store().get_child_job_stats(&job_id).await.unwrap();
        if stats.queued == 0 && stats.processing == 0 {
            assert_eq!(stats.total, 2);
            assert_eq!(stats.completed, 2);
            assert_eq!(stats.failed, 0);
            break;
        }
        assert!(tokio::time::Instant::now() < deadline, "children never finished");
        tokio::time::sleep(Duration::from_millis(20)).await;
    }

    queue.stop().await;
}

#[tokio::test]
async fn checksum_skip_leaves_document_count_unchanged() {
    let (dir, indexer, _queue) = harness().await;
    let path = dir.path().join("a.txt");
    tokio::fs::write(&path, "Go is a programming language").await.unwrap();

    let (_, first_count) = indexer.index_file(&path).await.unwrap();
    assert_eq!(first_count, 1);
    let before = indexer.store().count().await.unwrap();

    let (_, second_count) = indexer.index_file(&path).await.unwrap();
    assert_eq!(second_count, 0);
    let after = indexer.store().count().await.unwrap();
    assert_eq!(before, after);
}

#[tokio::test]
async fn chunking_produces_linked_chunks() {
    let (_dir, indexer, _queue) = harness().await;
    let text = "x".repeat(2500);
    let (id, count) = indexer.index(&text, &Default::default(), Some("doc")).await.unwrap();

    assert_eq!(id, "doc");
    assert!(count >= 3);
    for i in 0..count {
        let chunk = indexer.store().get_document(&format!("doc_chunk_{i}")).await.unwrap().unwrap();
        assert_eq!(chunk.metadata.get("parent_id"), Some(&"doc".to_string()));
        assert_eq!(chunk.metadata.get("total_chunks"), Some(&count.to_string()));
    }
}

#[tokio::test]
async fn clear_queue_removes_unstarted_jobs() {
    let (_dir, _indexer, queue) = harness().await;
    for _ in 0..3 {
        queue.enqueue_index_file("/tmp/never-created.txt").await.unwrap();
    }
    let jobs = queue.store().list_jobs(None).await.unwrap();
    assert_eq!(jobs.len(), 3);

    let deleted = queue
        .store()
        .delete_jobs(goldie_core::JobStatusFilter::Status(JobStatus::Queued))
        .await
        .unwrap();
    assert_eq!(deleted, 3);
    assert_eq!(queue.store().list_jobs(None).await.unwrap().len(), 0);
}

#[tokio::test]
async fn delete_cascades_to_all_chunks() {
    let (_dir, indexer, _queue) = harness().await;
    let text = "x".repeat(2500);
    let (id, count) = indexer.index(&text, &Default::default(), Some("doc")).await.unwrap();

    let deleted = indexer.delete_document_and_chunks(&id).await.unwrap();
    assert_eq!(deleted, count);

    let embedder = MockEmbedder::new(16);
    let query_embedding = embedder.embed("x").await.unwrap();
    let results = indexer.store().search(&query_embedding, 10).await.unwrap();
    assert!(results.iter().all(|r| !r.document.id.starts_with("doc")));
}
