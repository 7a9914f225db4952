//! The document-and-vector store plus the job table (`spec.md` §4.1).
//!
//! Grounded on `wg-ragsmith::stores::sqlite::SqliteChunkStore`: a single
//! `tokio_rusqlite::Connection` actor thread, the `sqlite-vec` extension
//! registered once via `sqlite3_auto_extension`, and `vec_distance_cosine`
//! evaluated as a scalar function inside a hand-written `JOIN` rather than
//! through a `vec0` virtual table's own KNN operator — the teacher's store
//! never uses `vec0`, so neither does this one. Every multi-row mutation
//! runs inside a single `conn.call` closure so the whole operation commits
//! or rolls back as one unit on the connection's dedicated thread.

use std::collections::HashMap;
use std::mem::transmute;
use std::os::raw::c_char;
use std::path::Path;
use std::sync::{Mutex, Once};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio_rusqlite::{ffi, Connection, OptionalExtension};
use uuid::Uuid;

use crate::error::{GoldieError, GoldieResult};

/// String-to-string document metadata. Reserved keys (`parent_id`,
/// `chunk_index`, `total_chunks`, `source`, `filename`, `checksum`) are
/// ordinary entries as far as the Store is concerned; their meaning is
/// assigned by the Indexer.
pub type DocumentMetadata = HashMap<String, String>;

/// A stored document, without its embedding (the Store never returns
/// embeddings from read paths).
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub id: String,
    pub content: String,
    pub metadata: DocumentMetadata,
    pub created_at: DateTime<Utc>,
}

/// A search hit: the document, the store's native distance, and the
/// derived similarity score (`1 - distance`).
#[derive(Debug, Clone, PartialEq)]
pub struct SearchResult {
    pub document: Document,
    pub distance: f32,
    pub score: f32,
}

/// Job kind, serialized in the `jobs.type` column as its snake_case name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobType {
    IndexFile,
    IndexDirectory,
}

impl JobType {
    fn as_str(self) -> &'static str {
        match self {
            JobType::IndexFile => "index_file",
            JobType::IndexDirectory => "index_directory",
        }
    }

    fn parse(raw: &str) -> Option<Self> {
        match raw {
            "index_file" => Some(JobType::IndexFile),
            "index_directory" => Some(JobType::IndexDirectory),
            _ => None,
        }
    }
}

/// Job lifecycle state. `Completed` and `Failed` are terminal and sticky.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Queued,
    Processing,
    Completed,
    Failed,
}

impl JobStatus {
    fn as_str(self) -> &'static str {
        match self {
            JobStatus::Queued => "queued",
            JobStatus::Processing => "processing",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        }
    }

    fn parse(raw: &str) -> Option<Self> {
        match raw {
            "queued" => Some(JobStatus::Queued),
            "processing" => Some(JobStatus::Processing),
            "completed" => Some(JobStatus::Completed),
            "failed" => Some(JobStatus::Failed),
            _ => None,
        }
    }

    /// `true` for `Completed` and `Failed`.
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }
}

/// A persistent ingestion job record.
#[derive(Debug, Clone, PartialEq)]
pub struct Job {
    pub id: String,
    pub job_type: JobType,
    pub status: JobStatus,
    pub params: serde_json::Value,
    pub result: Option<serde_json::Value>,
    pub error: Option<String>,
    pub progress: i64,
    pub total: i64,
    pub parent_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Aggregate counts of a parent job's children, by status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ChildJobStats {
    pub total: usize,
    pub queued: usize,
    pub processing: usize,
    pub completed: usize,
    pub failed: usize,
}

/// Filter for [`Store::delete_jobs`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStatusFilter {
    Status(JobStatus),
    All,
}

fn now_rfc3339() -> String {
    Utc::now().to_rfc3339()
}

fn parse_timestamp(raw: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

fn metadata_to_json(metadata: &DocumentMetadata) -> GoldieResult<String> {
    Ok(serde_json::to_string(metadata)?)
}

/// Parses stored metadata JSON, substituting an empty mapping for anything
/// corrupted rather than failing the read (`spec.md` §4.1 failure semantics).
fn metadata_from_json(raw: &str) -> DocumentMetadata {
    serde_json::from_str(raw).unwrap_or_default()
}

/// Durable container for documents, their embeddings, and jobs.
///
/// Wraps a single [`tokio_rusqlite::Connection`], which owns a dedicated
/// blocking thread; every operation below is one `conn.call` round trip to
/// that thread, so sequential callers never race on the underlying file.
#[derive(Clone)]
pub struct Store {
    conn: Connection,
    dimensions: usize,
}

impl Store {
    /// Open (creating if absent) the database at `path`, enforcing that its
    /// embedding dimension matches `dimensions`.
    pub async fn open(path: impl AsRef<Path>, dimensions: usize) -> GoldieResult<Self> {
        Self::register_sqlite_vec()?;

        if let Some(parent) = path.as_ref().parent() {
            tokio::fs::create_dir_all(parent).await.ok();
        }

        let conn = Connection::open(path.as_ref()).await?;

        conn.call(|conn| {
            let result = conn.query_row("select vec_version()", [], |row| row.get::<_, String>(0));
            match result {
                Ok(_) => Ok(()),
                Err(err) => Err(tokio_rusqlite::Error::Rusqlite(err)),
            }
        })
        .await?;

        let store = Self { conn, dimensions };
        store.init_schema().await?;
        store.check_dimensions().await?;
        Ok(store)
    }

    fn register_sqlite_vec() -> GoldieResult<()> {
        static INIT: Once = Once::new();
        static INIT_RESULT: Mutex<Option<Result<(), String>>> = Mutex::new(None);

        INIT.call_once(|| {
            let result = unsafe {
                type SqliteExtensionInit = unsafe extern "C" fn(
                    *mut ffi::sqlite3,
                    *mut *mut c_char,
                    *const ffi::sqlite3_api_routines,
                ) -> i32;

                let init: unsafe extern "C" fn() = sqlite_vec::sqlite3_vec_init;
                let init_fn: SqliteExtensionInit =
                    transmute::<unsafe extern "C" fn(), SqliteExtensionInit>(init);
                let rc = ffi::sqlite3_auto_extension(Some(init_fn));
                if rc != 0 {
                    Err(format!("failed to register sqlite-vec extension (code {rc})"))
                } else {
                    Ok(())
                }
            };
            *INIT_RESULT.lock().expect("init result mutex poisoned") = Some(result);
        });

        INIT_RESULT
            .lock()
            .expect("init result mutex poisoned")
            .clone()
            .expect("init was called but result not set")
            .map_err(GoldieError::BackendUnavailable)
    }

    async fn init_schema(&self) -> GoldieResult<()> {
        self.conn
            .call(|conn| {
                conn.execute_batch(
                    "
                    CREATE TABLE IF NOT EXISTS documents (
                        id TEXT PRIMARY KEY,
                        content TEXT NOT NULL,
                        metadata TEXT NOT NULL,
                        created_at TEXT NOT NULL
                    );
                    CREATE TABLE IF NOT EXISTS documents_vec (
                        id TEXT PRIMARY KEY REFERENCES documents(id) ON DELETE CASCADE,
                        embedding TEXT NOT NULL
                    );
                    CREATE TABLE IF NOT EXISTS jobs (
                        id TEXT PRIMARY KEY,
                        type TEXT NOT NULL,
                        status TEXT NOT NULL,
                        params TEXT NOT NULL,
                        result TEXT,
                        error TEXT,
                        progress INTEGER NOT NULL DEFAULT 0,
                        total INTEGER NOT NULL DEFAULT 0,
                        parent_id TEXT,
                        created_at TEXT NOT NULL,
                        updated_at TEXT NOT NULL
                    );
                    CREATE INDEX IF NOT EXISTS idx_jobs_status ON jobs(status);
                    CREATE INDEX IF NOT EXISTS idx_jobs_parent_id ON jobs(parent_id);
                    CREATE TABLE IF NOT EXISTS goldie_meta (
                        key TEXT PRIMARY KEY,
                        value TEXT NOT NULL
                    );
                    ",
                )
                .map_err(tokio_rusqlite::Error::Rusqlite)
            })
            .await?;

        // Idempotent migration: older databases may predate parent_id on jobs.
        let has_parent_id = self
            .conn
            .call(|conn| {
                let mut stmt = conn
                    .prepare("PRAGMA table_info(jobs)")
                    .map_err(tokio_rusqlite::Error::Rusqlite)?;
                let found = stmt
                    .query_map([], |row| row.get::<_, String>(1))
                    .map_err(tokio_rusqlite::Error::Rusqlite)?
                    .filter_map(Result::ok)
                    .any(|name| name == "parent_id");
                Ok(found)
            })
            .await?;

        if !has_parent_id {
            self.conn
                .call(|conn| {
                    conn.execute("ALTER TABLE jobs ADD COLUMN parent_id TEXT", [])
                        .map_err(tokio_rusqlite::Error::Rusqlite)
                })
                .await?;
        }

        Ok(())
    }

    /// Records the dimension on first open, and rejects mismatched reopens.
    async fn check_dimensions(&self) -> GoldieResult<()> {
        let dimensions = self.dimensions;
        let stored: Option<String> = self
            .conn
            .call(|conn| {
                conn.query_row(
                    "SELECT value FROM goldie_meta WHERE key = 'dimensions'",
                    [],
                    |row| row.get(0),
                )
                .optional()
                .map_err(tokio_rusqlite::Error::Rusqlite)
            })
            .await?;

        match stored {
            Some(raw) => {
                let existing: usize = raw.parse().unwrap_or(0);
                if existing != dimensions {
                    return Err(GoldieError::InvalidInput(format!(
                        "database was created with dimension {existing}, cannot open with {dimensions}"
                    )));
                }
            }
            None => {
                self.conn
                    .call(move |conn| {
                        conn.execute(
                            "INSERT INTO goldie_meta (key, value) VALUES ('dimensions', ?1)",
                            [dimensions.to_string()],
                        )
                        .map_err(tokio_rusqlite::Error::Rusqlite)
                    })
                    .await?;
            }
        }
        Ok(())
    }

    /// Fixed embedding dimension this store was opened with.
    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    // ------------------------------------------------------------------
    // Documents
    // ------------------------------------------------------------------

    /// Upserts a document and its embedding in one transaction.
    pub async fn add_document(
        &self,
        id: &str,
        content: &str,
        metadata: &DocumentMetadata,
        embedding: &[f32],
    ) -> GoldieResult<()> {
        if embedding.len() != self.dimensions {
            return Err(GoldieError::EmbeddingFailure(format!(
                "embedding has dimension {}, expected {}",
                embedding.len(),
                self.dimensions
            )));
        }

        let id = id.to_string();
        let content = content.to_string();
        let metadata_json = metadata_to_json(metadata)?;
        let embedding_json = serde_json::to_string(embedding)?;
        let created_at = now_rfc3339();

        self.conn
            .call(move |conn| {
                let tx = conn.transaction().map_err(tokio_rusqlite::Error::Rusqlite)?;
                tx.execute(
                    "INSERT INTO documents (id, content, metadata, created_at) VALUES (?1, ?2, ?3, ?4)
                     ON CONFLICT(id) DO UPDATE SET content = excluded.content,
                                                    metadata = excluded.metadata,
                                                    created_at = excluded.created_at",
                    rusqlite::params![id, content, metadata_json, created_at],
                )
                .map_err(tokio_rusqlite::Error::Rusqlite)?;
                tx.execute(
                    "INSERT INTO documents_vec (id, embedding) VALUES (?1, ?2)
                     ON CONFLICT(id) DO UPDATE SET embedding = excluded.embedding",
                    rusqlite::params![id, embedding_json],
                )
                .map_err(tokio_rusqlite::Error::Rusqlite)?;
                tx.commit().map_err(tokio_rusqlite::Error::Rusqlite)?;
                Ok(())
            })
            .await?;
        Ok(())
    }

    /// Returns a document by id, without its embedding.
    pub async fn get_document(&self, id: &str) -> GoldieResult<Option<Document>> {
        let id = id.to_string();
        let row = self
            .conn
            .call(move |conn| {
                conn.query_row(
                    "SELECT id, content, metadata, created_at FROM documents WHERE id = ?1",
                    [&id],
                    |row| {
                        Ok((
                            row.get::<_, String>(0)?,
                            row.get::<_, String>(1)?,
                            row.get::<_, String>(2)?,
                            row.get::<_, String>(3)?,
                        ))
                    },
                )
                .optional()
                .map_err(tokio_rusqlite::Error::Rusqlite)
            })
            .await?;

        Ok(row.map(|(id, content, metadata, created_at)| Document {
            id,
            content,
            metadata: metadata_from_json(&metadata),
            created_at: parse_timestamp(&created_at),
        }))
    }

    /// All documents, newest first, without embeddings.
    pub async fn list_documents(&self) -> GoldieResult<Vec<Document>> {
        let rows = self
            .conn
            .call(|conn| {
                let mut stmt = conn
                    .prepare("SELECT id, content, metadata, created_at FROM documents ORDER BY created_at DESC")
                    .map_err(tokio_rusqlite::Error::Rusqlite)?;
                let rows = stmt
                    .query_map([], |row| {
                        Ok((
                            row.get::<_, String>(0)?,
                            row.get::<_, String>(1)?,
                            row.get::<_, String>(2)?,
                            row.get::<_, String>(3)?,
                        ))
                    })
                    .map_err(tokio_rusqlite::Error::Rusqlite)?;
                let mut out = Vec::new();
                for row in rows {
                    out.push(row.map_err(tokio_rusqlite::Error::Rusqlite)?);
                }
                Ok(out)
            })
            .await?;

        Ok(rows
            .into_iter()
            .map(|(id, content, metadata, created_at)| Document {
                id,
                content,
                metadata: metadata_from_json(&metadata),
                created_at: parse_timestamp(&created_at),
            })
            .collect())
    }

    /// Deletes a document and its embedding in one transaction. Returns the
    /// number of document rows removed (0 or 1); absence is not an error.
    pub async fn delete_document(&self, id: &str) -> GoldieResult<usize> {
        let id = id.to_string();
        let deleted = self
            .conn
            .call(move |conn| {
                let tx = conn.transaction().map_err(tokio_rusqlite::Error::Rusqlite)?;
                let deleted = tx
                    .execute("DELETE FROM documents WHERE id = ?1", [&id])
                    .map_err(tokio_rusqlite::Error::Rusqlite)?;
                tx.execute("DELETE FROM documents_vec WHERE id = ?1", [&id])
                    .map_err(tokio_rusqlite::Error::Rusqlite)?;
                tx.commit().map_err(tokio_rusqlite::Error::Rusqlite)?;
                Ok(deleted)
            })
            .await?;
        Ok(deleted)
    }

    /// Number of document rows.
    pub async fn count(&self) -> GoldieResult<usize> {
        let count: i64 = self
            .conn
            .call(|conn| {
                conn.query_row("SELECT COUNT(*) FROM documents", [], |row| row.get(0))
                    .map_err(tokio_rusqlite::Error::Rusqlite)
            })
            .await?;
        Ok(count as usize)
    }

    /// Nearest-neighbor search by cosine distance. `k` defaults to 5 when
    /// non-positive.
    pub async fn search(&self, embedding: &[f32], k: i64) -> GoldieResult<Vec<SearchResult>> {
        let limit = if k <= 0 {
            crate::config::DEFAULT_SEARCH_LIMIT as i64
        } else {
            k
        };
        let embedding_json = serde_json::to_string(embedding)?;

        let rows = self
            .conn
            .call(move |conn| {
                let mut stmt = conn
                    .prepare(
                        "SELECT d.id, d.content, d.metadata, d.created_at, \
                         vec_distance_cosine(v.embedding, vec_f32(?1)) as distance \
                         FROM documents d JOIN documents_vec v ON d.id = v.id \
                         ORDER BY distance ASC LIMIT ?2",
                    )
                    .map_err(tokio_rusqlite::Error::Rusqlite)?;
                let rows = stmt
                    .query_map(rusqlite::params![embedding_json, limit], |row| {
                        Ok((
                            row.get::<_, String>(0)?,
                            row.get::<_, String>(1)?,
                            row.get::<_, String>(2)?,
                            row.get::<_, String>(3)?,
                            row.get::<_, f32>(4)?,
                        ))
                    })
                    .map_err(tokio_rusqlite::Error::Rusqlite)?;
                let mut out = Vec::new();
                for row in rows {
                    out.push(row.map_err(tokio_rusqlite::Error::Rusqlite)?);
                }
                Ok(out)
            })
            .await?;

        Ok(rows
            .into_iter()
            .map(|(id, content, metadata, created_at, distance)| SearchResult {
                document: Document {
                    id,
                    content,
                    metadata: metadata_from_json(&metadata),
                    created_at: parse_timestamp(&created_at),
                },
                distance,
                score: 1.0 - distance,
            })
            .collect())
    }

    // ------------------------------------------------------------------
    // Jobs
    // ------------------------------------------------------------------

    /// Creates a top-level job with a fresh UUID and status `queued`,
    /// returning the new job's id.
    pub async fn create_job(&self, job_type: JobType, params: serde_json::Value) -> GoldieResult<String> {
        self.insert_job(job_type, params, None).await
    }

    /// Creates a job with a parent, for children enqueued by a directory job.
    pub async fn create_job_with_parent(
        &self,
        job_type: JobType,
        params: serde_json::Value,
        parent_id: &str,
    ) -> GoldieResult<String> {
        self.insert_job(job_type, params, Some(parent_id.to_string())).await
    }

    async fn insert_job(
        &self,
        job_type: JobType,
        params: serde_json::Value,
        parent_id: Option<String>,
    ) -> GoldieResult<String> {
        let id = Uuid::new_v4().to_string();
        let params_json = serde_json::to_string(&params)?;
        let now = now_rfc3339();
        let job_type_str = job_type.as_str();
        let insert_id = id.clone();

        self.conn
            .call(move |conn| {
                conn.execute(
                    "INSERT INTO jobs (id, type, status, params, result, error, progress, total, parent_id, created_at, updated_at)
                     VALUES (?1, ?2, 'queued', ?3, NULL, NULL, 0, 0, ?4, ?5, ?5)",
                    rusqlite::params![insert_id, job_type_str, params_json, parent_id, now],
                )
                .map_err(tokio_rusqlite::Error::Rusqlite)
            })
            .await?;
        Ok(id)
    }

    /// Returns a job by id.
    pub async fn get_job(&self, id: &str) -> GoldieResult<Option<Job>> {
        let id = id.to_string();
        let row = self.conn.call(move |conn| Self::query_job(conn, &id)).await?;
        Ok(row)
    }

    fn query_job(conn: &rusqlite::Connection, id: &str) -> Result<Option<Job>, tokio_rusqlite::Error> {
        conn.query_row(
            "SELECT id, type, status, params, result, error, progress, total, parent_id, created_at, updated_at \
             FROM jobs WHERE id = ?1",
            [id],
            Self::row_to_job,
        )
        .optional()
        .map_err(tokio_rusqlite::Error::Rusqlite)
    }

    fn row_to_job(row: &rusqlite::Row<'_>) -> rusqlite::Result<Job> {
        let type_raw: String = row.get(1)?;
        let status_raw: String = row.get(2)?;
        let params_raw: String = row.get(3)?;
        let result_raw: Option<String> = row.get(4)?;
        let created_raw: String = row.get(9)?;
        let updated_raw: String = row.get(10)?;

        Ok(Job {
            id: row.get(0)?,
            job_type: JobType::parse(&type_raw).unwrap_or(JobType::IndexFile),
            status: JobStatus::parse(&status_raw).unwrap_or(JobStatus::Failed),
            params: serde_json::from_str(&params_raw).unwrap_or(serde_json::Value::Null),
            result: result_raw.and_then(|raw| serde_json::from_str(&raw).ok()),
            error: row.get(5)?,
            progress: row.get(6)?,
            total: row.get(7)?,
            parent_id: row.get(8)?,
            created_at: parse_timestamp(&created_raw),
            updated_at: parse_timestamp(&updated_raw),
        })
    }

    /// All jobs, or only those with `status`, newest first.
    pub async fn list_jobs(&self, status: Option<JobStatus>) -> GoldieResult<Vec<Job>> {
        let jobs = self
            .conn
            .call(move |conn| {
                let (sql, status_str) = match status {
                    Some(status) => (
                        "SELECT id, type, status, params, result, error, progress, total, parent_id, created_at, updated_at \
                         FROM jobs WHERE status = ?1 ORDER BY created_at DESC",
                        Some(status.as_str().to_string()),
                    ),
                    None => (
                        "SELECT id, type, status, params, result, error, progress, total, parent_id, created_at, updated_at \
                         FROM jobs ORDER BY created_at DESC",
                        None,
                    ),
                };
                let mut stmt = conn.prepare(sql).map_err(tokio_rusqlite::Error::Rusqlite)?;
                let rows = match &status_str {
                    Some(s) => stmt
                        .query_map([s], Self::row_to_job)
                        .map_err(tokio_rusqlite::Error::Rusqlite)?
                        .collect::<Result<Vec<_>, _>>(),
                    None => stmt
                        .query_map([], Self::row_to_job)
                        .map_err(tokio_rusqlite::Error::Rusqlite)?
                        .collect::<Result<Vec<_>, _>>(),
                };
                rows.map_err(tokio_rusqlite::Error::Rusqlite)
            })
            .await?;
        Ok(jobs)
    }

    /// Updates a job's status and bumps `updated_at`.
    pub async fn update_job_status(&self, id: &str, status: JobStatus) -> GoldieResult<()> {
        let id = id.to_string();
        let now = now_rfc3339();
        self.conn
            .call(move |conn| {
                conn.execute(
                    "UPDATE jobs SET status = ?1, updated_at = ?2 WHERE id = ?3",
                    rusqlite::params![status.as_str(), now, id],
                )
                .map_err(tokio_rusqlite::Error::Rusqlite)
            })
            .await?;
        Ok(())
    }

    /// Updates a job's progress counters and bumps `updated_at`.
    pub async fn update_job_progress(&self, id: &str, progress: i64, total: i64) -> GoldieResult<()> {
        let id = id.to_string();
        let now = now_rfc3339();
        self.conn
            .call(move |conn| {
                conn.execute(
                    "UPDATE jobs SET progress = ?1, total = ?2, updated_at = ?3 WHERE id = ?4",
                    rusqlite::params![progress, total, now, id],
                )
                .map_err(tokio_rusqlite::Error::Rusqlite)
            })
            .await?;
        Ok(())
    }

    /// Writes the job's result and marks it `completed`.
    pub async fn update_job_result(&self, id: &str, result: serde_json::Value) -> GoldieResult<()> {
        let id = id.to_string();
        let now = now_rfc3339();
        let result_json = serde_json::to_string(&result)?;
        self.conn
            .call(move |conn| {
                conn.execute(
                    "UPDATE jobs SET result = ?1, status = 'completed', updated_at = ?2 WHERE id = ?3",
                    rusqlite::params![result_json, now, id],
                )
                .map_err(tokio_rusqlite::Error::Rusqlite)
            })
            .await?;
        Ok(())
    }

    /// Writes the job's error and marks it `failed`.
    pub async fn update_job_error(&self, id: &str, error: &str) -> GoldieResult<()> {
        let id = id.to_string();
        let error = error.to_string();
        let now = now_rfc3339();
        self.conn
            .call(move |conn| {
                conn.execute(
                    "UPDATE jobs SET error = ?1, status = 'failed', updated_at = ?2 WHERE id = ?3",
                    rusqlite::params![error, now, id],
                )
                .map_err(tokio_rusqlite::Error::Rusqlite)
            })
            .await?;
        Ok(())
    }

    /// Atomically claims the oldest queued job, marking it `processing`.
    /// Runs as a single transaction so two concurrent callers can never
    /// claim the same job.
    pub async fn get_next_pending_job(&self) -> GoldieResult<Option<Job>> {
        let now = now_rfc3339();
        let job = self
            .conn
            .call(move |conn| {
                let tx = conn.transaction().map_err(tokio_rusqlite::Error::Rusqlite)?;
                let claimed_id: Option<String> = tx
                    .query_row(
                        "SELECT id FROM jobs WHERE status = 'queued' ORDER BY created_at ASC LIMIT 1",
                        [],
                        |row| row.get(0),
                    )
                    .optional()
                    .map_err(tokio_rusqlite::Error::Rusqlite)?;

                let Some(id) = claimed_id else {
                    tx.commit().map_err(tokio_rusqlite::Error::Rusqlite)?;
                    return Ok(None);
                };

                tx.execute(
                    "UPDATE jobs SET status = 'processing', updated_at = ?1 WHERE id = ?2",
                    rusqlite::params![now, id],
                )
                .map_err(tokio_rusqlite::Error::Rusqlite)?;

                let job = Self::query_job(&tx, &id)?;
                tx.commit().map_err(tokio_rusqlite::Error::Rusqlite)?;
                Ok(job)
            })
            .await?;
        Ok(job)
    }

    /// Aggregate counts of jobs whose `parent_id` matches, by status.
    pub async fn get_child_job_stats(&self, parent_id: &str) -> GoldieResult<ChildJobStats> {
        let parent_id = parent_id.to_string();
        let statuses = self
            .conn
            .call(move |conn| {
                let mut stmt = conn
                    .prepare("SELECT status FROM jobs WHERE parent_id = ?1")
                    .map_err(tokio_rusqlite::Error::Rusqlite)?;
                let rows = stmt
                    .query_map([&parent_id], |row| row.get::<_, String>(0))
                    .map_err(tokio_rusqlite::Error::Rusqlite)?;
                let mut out = Vec::new();
                for row in rows {
                    out.push(row.map_err(tokio_rusqlite::Error::Rusqlite)?);
                }
                Ok(out)
            })
            .await?;

        let mut stats = ChildJobStats::default();
        for raw in statuses {
            stats.total += 1;
            match JobStatus::parse(&raw) {
                Some(JobStatus::Queued) => stats.queued += 1,
                Some(JobStatus::Processing) => stats.processing += 1,
                Some(JobStatus::Completed) => stats.completed += 1,
                Some(JobStatus::Failed) => stats.failed += 1,
                None => {}
            }
        }
        Ok(stats)
    }

    /// Polls [`Self::get_job`] every 50ms until the job reaches a terminal
    /// status or `timeout` elapses, returning the last observed state.
    pub async fn wait_for_job(&self, id: &str, timeout: std::time::Duration) -> GoldieResult<Option<Job>> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let job = self.get_job(id).await?;
            if job.as_ref().map(|j| j.status.is_terminal()).unwrap_or(true) {
                return Ok(job);
            }
            if tokio::time::Instant::now() >= deadline {
                return Ok(job);
            }
            tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        }
    }

    /// Deletes jobs by status, or all jobs. Returns the count removed.
    pub async fn delete_jobs(&self, filter: JobStatusFilter) -> GoldieResult<usize> {
        let deleted = self
            .conn
            .call(move |conn| match filter {
                JobStatusFilter::All => conn
                    .execute("DELETE FROM jobs", [])
                    .map_err(tokio_rusqlite::Error::Rusqlite),
                JobStatusFilter::Status(status) => conn
                    .execute("DELETE FROM jobs WHERE status = ?1", [status.as_str()])
                    .map_err(tokio_rusqlite::Error::Rusqlite),
            })
            .await?;
        Ok(deleted)
    }
}
