pub mod chunker;
pub mod embedder_worker;
pub mod models;

pub use chunker::{chunk_text, ChunkOutput};
pub use embedder_worker::{EmbedderWorker, KbIndexPayload};
