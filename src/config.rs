//! Configuration knobs.
//!
//! The core recognizes exactly the knobs named in `spec.md` §6: database
//! file path, embedding dimension, chunk size, and chunk overlap. There is
//! no dynamic reconfiguration and no file/env loading here — CLI flag
//! parsing and process lifecycle are owned by the external server
//! (`spec.md` §1).

use std::path::PathBuf;

/// Default chunk size in characters, matching the reference implementation.
pub const DEFAULT_CHUNK_SIZE: usize = 1000;

/// Default chunk overlap in characters.
pub const DEFAULT_CHUNK_OVERLAP: usize = 200;

/// Default search result count when a caller passes a non-positive limit.
pub const DEFAULT_SEARCH_LIMIT: usize = 5;

/// Configuration for the Store and Indexer.
#[derive(Debug, Clone)]
pub struct Config {
    /// Path to the SQLite database file.
    pub db_path: PathBuf,
    /// Fixed embedding dimension enforced by the Store.
    pub dimensions: usize,
    /// Maximum chunk size, in characters, before overlap trimming.
    pub chunk_size: usize,
    /// Overlap, in characters, between consecutive chunks.
    pub chunk_overlap: usize,
}

impl Config {
    /// Build a config for the given embedding dimension, using the default
    /// user-local data directory for the database file and the reference
    /// chunking defaults.
    pub fn new(dimensions: usize) -> Self {
        let db_path = dirs::data_local_dir()
            .unwrap_or_else(std::env::temp_dir)
            .join("goldie")
            .join("goldie.db");
        Self {
            db_path,
            dimensions,
            chunk_size: DEFAULT_CHUNK_SIZE,
            chunk_overlap: DEFAULT_CHUNK_OVERLAP,
        }
    }

    /// Override the database path.
    #[must_use]
    pub fn with_db_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.db_path = path.into();
        self
    }

    /// Override the chunk size and overlap.
    #[must_use]
    pub fn with_chunking(mut self, chunk_size: usize, chunk_overlap: usize) -> Self {
        self.chunk_size = chunk_size;
        self.chunk_overlap = chunk_overlap;
        self
    }
}
