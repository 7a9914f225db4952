//! Single-worker asynchronous job runner (`spec.md` §4.3).
//!
//! The lifecycle and shutdown handshake are grounded on
//! `codetriever-indexing::worker::IndexingWorker`: an `Arc<AtomicBool>`
//! shutdown flag checked at the top of each poll iteration, a fixed-interval
//! `tokio::time::sleep` when no work is available, and a `JoinHandle` that
//! `Stop()` awaits to guarantee the in-flight job drains before returning.
//! The panic barrier that respawns the worker after an unexpected
//! termination is grounded on `weavegraph::runtimes::runner::AppRunner`'s
//! treatment of a `JoinError` as a reportable event rather than a process
//! crash.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

use crate::embedder::Embedder;
use crate::error::GoldieError;
use crate::indexer::Indexer;
use crate::store::{JobType, Store};

/// Default interval at which the worker polls for the next queued job.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(500);

#[derive(Debug, Serialize, Deserialize)]
struct IndexFileParams {
    path: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct IndexDirectoryParams {
    directory: String,
    #[serde(default = "default_pattern")]
    pattern: String,
    #[serde(default)]
    recursive: bool,
}

fn default_pattern() -> String {
    "*".to_string()
}

/// Accepts ingestion jobs synchronously and runs them, one at a time, on a
/// single background worker.
pub struct Queue<E: Embedder + 'static> {
    store: Store,
    indexer: Arc<Indexer<E>>,
    poll_interval: Duration,
    shutdown: Arc<AtomicBool>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl<E: Embedder + 'static> Queue<E> {
    pub fn new(store: Store, indexer: Arc<Indexer<E>>) -> Self {
        Self {
            store,
            indexer,
            poll_interval: DEFAULT_POLL_INTERVAL,
            shutdown: Arc::new(AtomicBool::new(false)),
            handle: Mutex::new(None),
        }
    }

    #[must_use]
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// The Store backing this queue, for callers that need to observe job
    /// or document state directly.
    pub fn store(&self) -> &Store {
        &self.store
    }

    /// Enqueues a top-level `index_file` job, returning its id immediately.
    pub async fn enqueue_index_file(&self, path: impl Into<PathBuf>) -> Result<String, GoldieError> {
        let params = IndexFileParams {
            path: path.into().display().to_string(),
        };
        self.store
            .create_job(JobType::IndexFile, serde_json::to_value(params)?)
            .await
    }

    /// Enqueues a top-level `index_directory` job, returning its id
    /// immediately.
    pub async fn enqueue_index_directory(
        &self,
        directory: impl Into<PathBuf>,
        pattern: impl Into<String>,
        recursive: bool,
    ) -> Result<String, GoldieError> {
        let params = IndexDirectoryParams {
            directory: directory.into().display().to_string(),
            pattern: pattern.into(),
            recursive,
        };
        self.store
            .create_job(JobType::IndexDirectory, serde_json::to_value(params)?)
            .await
    }

    /// Spawns the background worker if it is not already running.
    pub async fn start(&self) {
        let mut handle = self.handle.lock().await;
        if handle.is_some() {
            return;
        }
        self.shutdown.store(false, Ordering::Relaxed);
        *handle = Some(self.spawn_supervisor());
    }

    /// Signals the worker to stop and waits for it to drain the
    /// currently-processing job; subsequent queued jobs are left untouched.
    pub async fn stop(&self) {
        self.shutdown.store(true, Ordering::Relaxed);
        let mut handle = self.handle.lock().await;
        if let Some(handle) = handle.take() {
            if let Err(err) = handle.await {
                tracing::error!("queue worker task panicked during shutdown: {err}");
            }
        }
    }

    /// Spawns a task that runs [`Self::worker_loop`] and, if that loop ever
    /// returns via panic, logs the cause and respawns it — a bad job can
    /// never permanently disable ingestion.
    fn spawn_supervisor(&self) -> JoinHandle<()> {
        let store = self.store.clone();
        let indexer = Arc::clone(&self.indexer);
        let shutdown = Arc::clone(&self.shutdown);
        let poll_interval = self.poll_interval;

        tokio::spawn(async move {
            loop {
                if shutdown.load(Ordering::Relaxed) {
                    return;
                }
                let store = store.clone();
                let indexer = Arc::clone(&indexer);
                let shutdown_inner = Arc::clone(&shutdown);

                let result = tokio::spawn(async move {
                    Self::worker_loop(store, indexer, shutdown_inner, poll_interval).await;
                })
                .await;

                if let Err(err) = result {
                    tracing::error!("queue worker panicked, restarting: {err}");
                    continue;
                }
                return;
            }
        })
    }

    async fn worker_loop(
        store: Store,
        indexer: Arc<Indexer<E>>,
        shutdown: Arc<AtomicBool>,
        poll_interval: Duration,
    ) {
        loop {
            if shutdown.load(Ordering::Relaxed) {
                return;
            }

            match store.get_next_pending_job().await {
                Ok(Some(job)) => {
                    Self::run_job(&store, &indexer, job).await;
                }
                Ok(None) => {
                    tokio::time::sleep(poll_interval).await;
                }
                Err(err) => {
                    tracing::error!("failed to claim next job: {err}");
                    tokio::time::sleep(poll_interval).await;
                }
            }
        }
    }

    async fn run_job(store: &Store, indexer: &Indexer<E>, job: crate::store::Job) {
        let result = match job.job_type {
            JobType::IndexFile => Self::run_index_file(store, indexer, &job).await,
            JobType::IndexDirectory => Self::run_index_directory(store, indexer, &job).await,
        };

        if let Err(err) = result {
            tracing::error!("job {} failed: {err}", job.id);
            if let Err(update_err) = store.update_job_error(&job.id, &err.to_string()).await {
                tracing::error!("failed to record job {} failure: {update_err}", job.id);
            }
        }
    }

    async fn run_index_file(
        store: &Store,
        indexer: &Indexer<E>,
        job: &crate::store::Job,
    ) -> Result<(), GoldieError> {
        let params: IndexFileParams = serde_json::from_value(job.params.clone())
            .map_err(|err| GoldieError::InvalidInput(format!("malformed index_file params: {err}")))?;

        store.update_job_progress(&job.id, 0, 1).await?;
        let (id, chunk_count) = indexer.index_file(&params.path).await?;

        store
            .update_job_result(
                &job.id,
                serde_json::json!({"id": id, "chunk_count": chunk_count, "path": params.path}),
            )
            .await?;
        store.update_job_progress(&job.id, 1, 1).await?;
        Ok(())
    }

    async fn run_index_directory(
        store: &Store,
        indexer: &Indexer<E>,
        job: &crate::store::Job,
    ) -> Result<(), GoldieError> {
        let params: IndexDirectoryParams = serde_json::from_value(job.params.clone()).map_err(|err| {
            GoldieError::InvalidInput(format!("malformed index_directory params: {err}"))
        })?;

        let paths = indexer
            .scan_directory(&params.directory, &params.pattern, params.recursive)
            .await?;

        store.update_job_progress(&job.id, 0, paths.len() as i64).await?;

        let mut child_job_ids = Vec::with_capacity(paths.len());
        for path in &paths {
            let child_params = IndexFileParams {
                path: path.display().to_string(),
            };
            let child_id = store
                .create_job_with_parent(JobType::IndexFile, serde_json::to_value(child_params)?, &job.id)
                .await?;
            child_job_ids.push(child_id);
        }

        store
            .update_job_result(
                &job.id,
                serde_json::json!({
                    "file_count": paths.len(),
                    "child_job_ids": child_job_ids,
                    "directory": params.directory,
                    "pattern": params.pattern,
                    "recursive": params.recursive,
                }),
            )
            .await?;
        Ok(())
    }
}

impl<E: Embedder + 'static> Drop for Queue<E> {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{small_embedder, temp_store};
    use crate::store::{JobStatus, JobStatusFilter};

    async fn queue() -> (tempfile::TempDir, Queue<crate::embedder::MockEmbedder>) {
        let (dir, store) = temp_store(8).await;
        let indexer = Arc::new(Indexer::new(store.clone(), Arc::new(small_embedder()), 1000, 200));
        (dir, Queue::new(store, indexer))
    }

    #[tokio::test]
    async fn enqueue_without_starting_leaves_jobs_queued() {
        let (_dir, queue) = queue().await;
        for _ in 0..3 {
            queue.enqueue_index_file("/tmp/does-not-exist.txt").await.unwrap();
        }
        let jobs = queue.store.list_jobs(None).await.unwrap();
        assert_eq!(jobs.len(), 3);

        let deleted = queue.store.delete_jobs(JobStatusFilter::Status(JobStatus::Queued)).await.unwrap();
        assert_eq!(deleted, 3);
    }

    #[tokio::test]
    async fn worker_processes_index_file_job_to_completion() {
        let (dir, queue) = queue().await;
        let path = dir.path().join("a.txt");
        tokio::fs::write(&path, "Go is a programming language").await.unwrap();

        let job_id = queue.enqueue_index_file(&path).await.unwrap();
        queue.start().await;

        let job = queue
            .store
            .wait_for_job(&job_id, Duration::from_secs(5))
            .await
            .unwrap()
            .unwrap();

        queue.stop().await;

        assert_eq!(job.status, JobStatus::Completed);
        assert_eq!(job.result.unwrap()["id"], "a.txt");
    }

    #[tokio::test]
    async fn worker_fans_out_directory_job_into_children() {
        let (dir, queue) = queue().await;
        tokio::fs::write(dir.path().join("a.md"), "alpha").await.unwrap();
        tokio::fs::write(dir.path().join("b.md"), "beta").await.unwrap();
        tokio::fs::write(dir.path().join("c.txt"), "gamma").await.unwrap();

        let job_id = queue
            .enqueue_index_directory(dir.path(), "*.md", false)
            .await
            .unwrap();
        queue.start().await;

        let job = queue
            .store
            .wait_for_job(&job_id, Duration::from_secs(5))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(job.status, JobStatus::Completed);
        assert_eq!(job.result.as_ref().unwrap()["file_count"], 2);

        let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
        loop {
            let stats = queue.store.get_child_job_stats(&job_id).await.unwrap();
            if stats.queued == 0 && stats.processing == 0 {
                assert_eq!(stats.total, 2);
                assert_eq!(stats.completed, 2);
                break;
            }
            if tokio::time::Instant::now() >= deadline {
                panic!("children never completed: {stats:?}");
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }

        queue.stop().await;
    }

    #[tokio::test]
    async fn unknown_job_type_params_fail_gracefully() {
        let (_dir, queue) = queue().await;
        let job_id = queue
            .store
            .create_job(JobType::IndexFile, serde_json::json!({"not_a_path": true}))
            .await
            .unwrap();
        queue.start().await;

        let job = queue
            .store
            .wait_for_job(&job_id, Duration::from_secs(5))
            .await
            .unwrap()
            .unwrap();
        queue.stop().await;

        assert_eq!(job.status, JobStatus::Failed);
        assert!(job.error.is_some());
    }
}
