//! Retrieval engine
//!
//! Chunking, embedding, record storage, indexing and hybrid search.

pub mod chunker;
pub mod embedding;
pub mod engine;
pub mod indexer;
pub mod keywords;
pub mod store;
pub mod vectordb;

pub use embedding::{cosine_similarity, EmbeddingProvider, HarmonicEmbedder};
pub use engine::{SearchEngine, SearchResult};
pub use indexer::{Indexer, IndexingStats};
pub use store::{EmbeddingRecord, MemoryStore, RecordStore, StoreError};
pub use vectordb::VectorDB;
