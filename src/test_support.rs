//! Shared test fixtures for this crate's own unit and integration tests.

use crate::embedder::MockEmbedder;
use crate::store::Store;

/// Opens a [`Store`] backed by a fresh temp-directory database file.
/// The `TempDir` must be kept alive by the caller for the store's lifetime.
pub async fn temp_store(dimensions: usize) -> (tempfile::TempDir, Store) {
    let dir = tempfile::tempdir().expect("create temp dir");
    let store = Store::open(dir.path().join("goldie.db"), dimensions)
        .await
        .expect("open store");
    (dir, store)
}

/// A [`MockEmbedder`] with a small dimension, convenient for tests that
/// don't care about the exact vector values.
pub fn small_embedder() -> MockEmbedder {
    MockEmbedder::new(8)
}
