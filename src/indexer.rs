//! Turns external inputs into Document rows plus embeddings (`spec.md` §4.2).
//!
//! The Indexer borrows a [`Store`] and an [`Embedder`]; it never owns the
//! database file or the model, matching the no-cycle ownership rule the
//! Queue relies on.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::chunking::chunk_text;
use crate::embedder::Embedder;
use crate::error::{GoldieError, GoldieResult};
use crate::skip::SkipPatterns;
use crate::store::{DocumentMetadata, Store};

/// Ceiling on the chunk-deletion linear probe in
/// [`Indexer::delete_document_and_chunks`].
const MAX_CHUNK_PROBE: usize = 10_000;

/// Outcome of [`Indexer::index_directory`], partitioned by what happened to
/// each discovered path.
#[derive(Debug, Default)]
pub struct IndexDirectoryOutcome {
    /// `(document id, chunk count)` for files that were freshly indexed.
    pub indexed: Vec<(String, usize)>,
    /// Ids of files whose checksum was unchanged, so indexing was skipped.
    pub skipped: Vec<String>,
    /// `(path, error message)` for files that failed to index.
    pub failed: Vec<(PathBuf, String)>,
}

/// Chunks and embeds content, files, and directories, writing the results
/// through a [`Store`].
pub struct Indexer<E: Embedder> {
    store: Store,
    embedder: Arc<E>,
    chunk_size: usize,
    chunk_overlap: usize,
}

impl<E: Embedder> Indexer<E> {
    pub fn new(store: Store, embedder: Arc<E>, chunk_size: usize, chunk_overlap: usize) -> Self {
        Self {
            store,
            embedder,
            chunk_size,
            chunk_overlap,
        }
    }

    /// The Store this indexer writes through, for callers that need to
    /// query or manage documents directly.
    pub fn store(&self) -> &Store {
        &self.store
    }

    /// Indexes inline text content under `id` (a fresh UUID if empty),
    /// chunking it if it exceeds the configured chunk size. Returns the
    /// document id used and the number of chunks stored (1 for unchunked
    /// content).
    pub async fn index(
        &self,
        content: &str,
        metadata: &DocumentMetadata,
        id: Option<&str>,
    ) -> GoldieResult<(String, usize)> {
        if content.is_empty() {
            return Err(GoldieError::InvalidInput("content must not be empty".into()));
        }

        let id = match id {
            Some(id) if !id.is_empty() => id.to_string(),
            _ => Uuid::new_v4().to_string(),
        };

        if content.chars().count() <= self.chunk_size {
            let embedding = self.embedder.embed(content).await.map_err(|err| {
                GoldieError::EmbeddingFailure(format!("failed to embed document {id}: {err}"))
            })?;
            self.store.add_document(&id, content, metadata, &embedding).await?;
            return Ok((id, 1));
        }

        let pieces = chunk_text(content, self.chunk_size, self.chunk_overlap);
        let total = pieces.len();

        for (index, piece) in pieces.into_iter().enumerate() {
            let mut chunk_metadata = metadata.clone();
            chunk_metadata.insert("parent_id".into(), id.clone());
            chunk_metadata.insert("chunk_index".into(), index.to_string());
            chunk_metadata.insert("total_chunks".into(), total.to_string());

            let embedding = self.embedder.embed(&piece).await.map_err(|err| {
                GoldieError::EmbeddingFailure(format!(
                    "failed to embed chunk {index} of document {id}: {err}"
                ))
            })?;

            let chunk_id = format!("{id}_chunk_{index}");
            self.store
                .add_document(&chunk_id, &piece, &chunk_metadata, &embedding)
                .await?;
        }

        Ok((id, total))
    }

    /// Reads `path` fully, computes its checksum, and indexes it under its
    /// basename unless the checksum is unchanged from the last index, in
    /// which case it returns `(id, 0)`.
    pub async fn index_file(&self, path: impl AsRef<Path>) -> GoldieResult<(String, usize)> {
        let path = path.as_ref();
        let id = path
            .file_name()
            .and_then(|name| name.to_str())
            .ok_or_else(|| GoldieError::InvalidInput(format!("path has no file name: {}", path.display())))?
            .to_string();

        let bytes = tokio::fs::read(path).await?;
        let checksum = format!("{:x}", Sha256::digest(&bytes));

        let existing_checksum = self.existing_checksum(&id).await?;
        if existing_checksum.as_deref() == Some(checksum.as_str()) {
            return Ok((id, 0));
        }
        if existing_checksum.is_some() {
            self.delete_document_and_chunks(&id).await?;
        }

        let content = String::from_utf8_lossy(&bytes).into_owned();
        let mut metadata = DocumentMetadata::new();
        metadata.insert("source".into(), path.display().to_string());
        metadata.insert("filename".into(), id.clone());
        metadata.insert("checksum".into(), checksum);

        self.index(&content, &metadata, Some(&id)).await
    }

    async fn existing_checksum(&self, id: &str) -> GoldieResult<Option<String>> {
        if let Some(doc) = self.store.get_document(id).await? {
            return Ok(doc.metadata.get("checksum").cloned());
        }
        if let Some(doc) = self.store.get_document(&format!("{id}_chunk_0")).await? {
            return Ok(doc.metadata.get("checksum").cloned());
        }
        Ok(None)
    }

    /// Deletes the base document and all of its chunks, probing
    /// `"<id>_chunk_0"`, `"<id>_chunk_1"`, … until the first miss or
    /// [`MAX_CHUNK_PROBE`]. Returns the number of rows deleted.
    pub async fn delete_document_and_chunks(&self, id: &str) -> GoldieResult<usize> {
        let mut deleted = self.store.delete_document(id).await?;

        for index in 0..MAX_CHUNK_PROBE {
            let chunk_id = format!("{id}_chunk_{index}");
            let removed = self.store.delete_document(&chunk_id).await?;
            if removed == 0 {
                break;
            }
            deleted += removed;
        }

        Ok(deleted)
    }

    /// Enumerates regular files under `dir` matching `pattern` (`*` when
    /// empty), descending into subdirectories when `recursive`, applying
    /// the directory's `.goldieskip` patterns (or the built-in defaults).
    /// Does not index; returns the resulting path list.
    pub async fn scan_directory(
        &self,
        dir: impl AsRef<Path>,
        pattern: &str,
        recursive: bool,
    ) -> GoldieResult<Vec<PathBuf>> {
        let dir = dir.as_ref();
        let pattern = if pattern.is_empty() { "*" } else { pattern };
        let skip = SkipPatterns::load(dir).await?;

        let glob_pattern = if recursive {
            dir.join("**").join(pattern)
        } else {
            dir.join(pattern)
        };
        let glob_pattern = glob_pattern.to_string_lossy().into_owned();

        let mut paths = Vec::new();
        let entries = glob::glob(&glob_pattern)
            .map_err(|err| GoldieError::InvalidInput(format!("invalid pattern '{pattern}': {err}")))?;

        for entry in entries {
            let path = entry.map_err(|err| GoldieError::IoFailure(err.to_string()))?;
            if !path.is_file() {
                continue;
            }
            if skip.matches(&path, false) {
                continue;
            }
            paths.push(path);
        }

        paths.sort();
        Ok(paths)
    }

    /// Synchronous convenience variant: scans `dir` and indexes every
    /// discovered file, partitioning the results.
    pub async fn index_directory(
        &self,
        dir: impl AsRef<Path>,
        pattern: &str,
        recursive: bool,
    ) -> GoldieResult<IndexDirectoryOutcome> {
        let paths = self.scan_directory(dir, pattern, recursive).await?;
        let mut outcome = IndexDirectoryOutcome::default();

        for path in paths {
            match self.index_file(&path).await {
                Ok((id, 0)) => outcome.skipped.push(id),
                Ok((id, count)) => outcome.indexed.push((id, count)),
                Err(err) => outcome.failed.push((path, err.to_string())),
            }
        }

        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{small_embedder, temp_store};

    async fn indexer() -> (tempfile::TempDir, Indexer<crate::embedder::MockEmbedder>) {
        let (dir, store) = temp_store(8).await;
        let indexer = Indexer::new(store, Arc::new(small_embedder()), 1000, 200);
        (dir, indexer)
    }

    #[tokio::test]
    async fn index_rejects_empty_content() {
        let (_dir, indexer) = indexer().await;
        let err = indexer.index("", &DocumentMetadata::new(), None).await.unwrap_err();
        assert!(matches!(err, GoldieError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn index_generates_id_when_absent() {
        let (_dir, indexer) = indexer().await;
        let (id, count) = indexer.index("hello", &DocumentMetadata::new(), None).await.unwrap();
        assert!(!id.is_empty());
        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn index_chunks_long_content() {
        let (_dir, indexer) = indexer().await;
        let text = "x".repeat(2500);
        let (id, count) = indexer
            .index(&text, &DocumentMetadata::new(), Some("doc"))
            .await
            .unwrap();
        assert_eq!(id, "doc");
        assert!(count >= 3);

        for i in 0..count {
            let chunk = indexer
                .store
                .get_document(&format!("doc_chunk_{i}"))
                .await
                .unwrap()
                .unwrap();
            assert_eq!(chunk.metadata.get("parent_id"), Some(&"doc".to_string()));
            assert_eq!(chunk.metadata.get("total_chunks"), Some(&count.to_string()));
        }
    }

    #[tokio::test]
    async fn index_file_skips_unchanged_checksum() {
        let (dir, indexer) = indexer().await;
        let path = dir.path().join("a.txt");
        tokio::fs::write(&path, "Go is a programming language").await.unwrap();

        let (id, count) = indexer.index_file(&path).await.unwrap();
        assert_eq!(id, "a.txt");
        assert_eq!(count, 1);

        let (id2, count2) = indexer.index_file(&path).await.unwrap();
        assert_eq!(id2, "a.txt");
        assert_eq!(count2, 0);
        assert_eq!(indexer.store.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn index_file_reindexes_on_changed_checksum() {
        let (dir, indexer) = indexer().await;
        let path = dir.path().join("a.txt");
        tokio::fs::write(&path, "version one").await.unwrap();
        indexer.index_file(&path).await.unwrap();

        tokio::fs::write(&path, "version two, much longer now").await.unwrap();
        let (_, count) = indexer.index_file(&path).await.unwrap();
        assert_eq!(count, 1);

        let doc = indexer.store.get_document("a.txt").await.unwrap().unwrap();
        assert_eq!(doc.content, "version two, much longer now");
    }

    #[tokio::test]
    async fn delete_document_and_chunks_counts_all_rows() {
        let (_dir, indexer) = indexer().await;
        let text = "x".repeat(2500);
        let (id, count) = indexer.index(&text, &DocumentMetadata::new(), Some("doc")).await.unwrap();

        let deleted = indexer.delete_document_and_chunks(&id).await.unwrap();
        assert_eq!(deleted, count);
        assert_eq!(indexer.store.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn scan_directory_applies_pattern_and_skip_list() {
        let (dir, indexer) = indexer().await;
        tokio::fs::write(dir.path().join("a.md"), "a").await.unwrap();
        tokio::fs::write(dir.path().join("b.md"), "b").await.unwrap();
        tokio::fs::write(dir.path().join("c.txt"), "c").await.unwrap();
        tokio::fs::create_dir(dir.path().join(".git")).await.unwrap();
        tokio::fs::write(dir.path().join(".git").join("ignored.md"), "x").await.unwrap();

        let paths = indexer.scan_directory(dir.path(), "*.md", true).await.unwrap();
        assert_eq!(paths.len(), 2);
        assert!(paths.iter().all(|p| p.extension().and_then(|e| e.to_str()) == Some("md")));
    }

    #[tokio::test]
    async fn index_directory_partitions_outcomes() {
        let (dir, indexer) = indexer().await;
        tokio::fs::write(dir.path().join("a.md"), "alpha").await.unwrap();
        tokio::fs::write(dir.path().join("b.md"), "beta").await.unwrap();

        let outcome = indexer.index_directory(dir.path(), "*.md", false).await.unwrap();
        assert_eq!(outcome.indexed.len(), 2);
        assert!(outcome.skipped.is_empty());
        assert!(outcome.failed.is_empty());

        let outcome2 = indexer.index_directory(dir.path(), "*.md", false).await.unwrap();
        assert_eq!(outcome2.skipped.len(), 2);
        assert!(outcome2.indexed.is_empty());
    }
}
