//! ```text
//! Embedder (external) ──┬─► Indexer::index / index_file / index_directory
//!                        │        │
//!                        │        ├─► chunking::chunk_text
//!                        │        └─► Store::add_document
//!                        │
//!                        └─► Queue worker ──► Indexer ──► Store
//!
//! Store ──► documents + documents_vec (sqlite-vec) + jobs
//! ```
//!
//! `goldie-core` is the indexing-and-retrieval engine of the Goldie local
//! RAG service: a chunker, a document-and-vector store, and a single-worker
//! asynchronous job queue. It does not speak any wire protocol and does not
//! implement an embedding backend — callers provide an [`Embedder`] and,
//! for file/directory ingestion, drive a [`Queue`].

pub mod chunking;
pub mod config;
pub mod embedder;
pub mod error;
pub mod indexer;
pub mod queue;
pub mod skip;
pub mod store;

pub use config::Config;
pub use embedder::{Embedder, MockEmbedder, SerializedEmbedder};
pub use error::{GoldieError, GoldieResult};
pub use indexer::Indexer;
pub use queue::Queue;
pub use skip::SkipPatterns;
pub use store::{
    ChildJobStats, Document, DocumentMetadata, Job, JobStatus, JobStatusFilter, JobType,
    SearchResult, Store,
};

#[cfg(test)]
pub mod test_support;
