pub mod embedding_client;
pub mod jobs;
pub mod llm_client;
pub mod server_kernel;
pub mod service_host;
pub mod time_service;
pub mod tts_client;

pub use server_kernel::ServerKernel;
pub use service_host::{Service, ServiceHost};
pub use time_service::TimeService;
