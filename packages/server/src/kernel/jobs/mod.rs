pub mod janitor;
pub mod job;
pub mod queue;
pub mod worker_runtime;

pub use job::{ErrorKind, Job, JobPriority, JobStatus};
pub use queue::{EnqueueResult, EnqueueSpec, JobQueue, PostgresJobQueue};
pub use worker_runtime::{JobHandler, JobWorker, JobWorkerConfig};
