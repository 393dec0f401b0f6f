pub mod prompt;
pub mod worker;

pub use worker::{SegmentGenerationWorker, SegmentMakePayload};
