pub mod engine;
pub mod query;
pub mod scoring;

pub use engine::HybridRetrievalEngine;
pub use query::{RagChunk, RagFilters, RagQuery, RagResponse};
