//! planner-recall library
//!
//! On-device retrieval over a planner's meetings and notes.
//!
//! # Modules
//!
//! - `core`: Planner documents, frontmatter, paths and configuration
//! - `search`: Chunking, embedding, record store, indexing and hybrid search

pub mod core;
pub mod search;

// Re-exports for convenience
pub use crate::core::config::PlannerConfig;
pub use crate::core::document::{Document, Meeting, Note, ParentRef, SourceType};
pub use crate::core::paths::PlannerPaths;
