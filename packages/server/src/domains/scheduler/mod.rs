pub mod scheduler;

pub use scheduler::{segment_idempotency_key, Scheduler};
