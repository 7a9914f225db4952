//! The embedder capability the core consumes (`spec.md` §4.4).
//!
//! The core never implements a real backend (ONNX, remote HTTP) — those are
//! out of scope (`spec.md` §1). It only defines the trait, a mutex-based
//! adapter for embedders that are not internally thread-safe, and a
//! deterministic mock used by this crate's own tests.

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::error::GoldieResult;

/// Maps text to a fixed-length float vector.
///
/// Implementations are treated as a single-consumer resource by the rest of
/// the core (`spec.md` §5): the Queue's single worker and synchronous query
/// handlers are the only callers, but an implementation that is not
/// internally synchronized should be wrapped in [`SerializedEmbedder`].
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embed a single piece of text. Fails with `invalid_input` for empty text.
    async fn embed(&self, text: &str) -> GoldieResult<Vec<f32>>;

    /// Embed a batch of texts, preserving order. Implementations may embed
    /// sequentially; there is no requirement that this be faster than
    /// repeated calls to [`embed`](Self::embed).
    async fn embed_batch(&self, texts: &[String]) -> GoldieResult<Vec<Vec<f32>>> {
        let mut out = Vec::with_capacity(texts.len());
        for text in texts {
            out.push(self.embed(text).await?);
        }
        Ok(out)
    }

    /// Fixed dimension of vectors this embedder produces.
    fn dimensions(&self) -> usize;

    /// Run a throwaway embedding to amortize first-call cost. Optional;
    /// the default is a no-op.
    async fn warmup(&self) -> GoldieResult<()> {
        Ok(())
    }

    /// Release backing resources. Optional; the default is a no-op.
    async fn close(&self) -> GoldieResult<()> {
        Ok(())
    }
}

/// Wraps an [`Embedder`] in a mutex so concurrent callers (queries and the
/// worker) are serialized even if the inner implementation is not
/// thread-safe on its own.
pub struct SerializedEmbedder<E> {
    inner: Mutex<E>,
    dimensions: usize,
}

impl<E: Embedder> SerializedEmbedder<E> {
    /// Wrap `inner`, caching its reported dimension so [`dimensions`] does
    /// not need to lock.
    ///
    /// [`dimensions`]: Embedder::dimensions
    pub fn new(inner: E) -> Self {
        let dimensions = inner.dimensions();
        Self {
            inner: Mutex::new(inner),
            dimensions,
        }
    }
}

#[async_trait]
impl<E: Embedder> Embedder for SerializedEmbedder<E> {
    async fn embed(&self, text: &str) -> GoldieResult<Vec<f32>> {
        self.inner.lock().await.embed(text).await
    }

    async fn embed_batch(&self, texts: &[String]) -> GoldieResult<Vec<Vec<f32>>> {
        self.inner.lock().await.embed_batch(texts).await
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    async fn warmup(&self) -> GoldieResult<()> {
        self.inner.lock().await.warmup().await
    }

    async fn close(&self) -> GoldieResult<()> {
        self.inner.lock().await.close().await
    }
}

/// Deterministic in-memory embedder for tests.
///
/// Produces a fixed-dimension vector derived from a simple hash of the
/// input text, so identical text always yields identical vectors and
/// distinct text (almost always) yields distinct ones, without depending on
/// a real model. Grounded on the hash-based determinism of
/// `wg-ragsmith::semantic_chunking::embeddings::MockEmbeddingProvider`.
#[derive(Debug, Clone)]
pub struct MockEmbedder {
    dimensions: usize,
}

impl MockEmbedder {
    /// Create a mock embedder that produces vectors of `dimensions` length.
    pub fn new(dimensions: usize) -> Self {
        Self { dimensions }
    }

    fn hash_vector(&self, text: &str) -> Vec<f32> {
        use std::collections::hash_map::DefaultHasher;
        use std::hash::{Hash, Hasher};

        let mut out = Vec::with_capacity(self.dimensions);
        for i in 0..self.dimensions {
            let mut hasher = DefaultHasher::new();
            text.hash(&mut hasher);
            i.hash(&mut hasher);
            let bits = hasher.finish();
            // Map to [-1.0, 1.0].
            let value = (bits % 2_000_001) as f32 / 1_000_000.0 - 1.0;
            out.push(value);
        }
        out
    }
}

#[async_trait]
impl Embedder for MockEmbedder {
    async fn embed(&self, text: &str) -> GoldieResult<Vec<f32>> {
        if text.is_empty() {
            return Err(crate::error::GoldieError::InvalidInput(
                "cannot embed empty text".into(),
            ));
        }
        Ok(self.hash_vector(text))
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn mock_embedder_is_deterministic() {
        let embedder = MockEmbedder::new(8);
        let a1 = embedder.embed("hello world").await.unwrap();
        let a2 = embedder.embed("hello world").await.unwrap();
        let b = embedder.embed("goodbye world").await.unwrap();
        assert_eq!(a1, a2);
        assert_ne!(a1, b);
        assert_eq!(a1.len(), 8);
    }

    #[tokio::test]
    async fn mock_embedder_rejects_empty_text() {
        let embedder = MockEmbedder::new(8);
        assert!(embedder.embed("").await.is_err());
    }

    #[tokio::test]
    async fn serialized_embedder_delegates() {
        let embedder = SerializedEmbedder::new(MockEmbedder::new(4));
        assert_eq!(embedder.dimensions(), 4);
        let vec = embedder.embed("x").await.unwrap();
        assert_eq!(vec.len(), 4);
    }
}
