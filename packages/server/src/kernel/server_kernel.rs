//! `ServerKernel`: the dependency-injection container shared by the HTTP
//! server, the workers, and the CLI. Grounded on the teacher's
//! `kernel::server_kernel::ServerKernel` / `kernel::deps::ServerDeps`
//! pattern: one struct of `Arc<dyn Base*>` capabilities built once at
//! startup from `Config`, handed to every handler by reference.

use std::sync::Arc;

use sqlx::PgPool;

use crate::config::Config;
use crate::kernel::embedding_client::{BaseEmbeddingService, EmbeddingClient};
use crate::kernel::jobs::{JobQueue, PostgresJobQueue};
use crate::kernel::llm_client::{BaseLlmService, LlmClient};
use crate::kernel::time_service::TimeService;
use crate::kernel::tts_client::{BaseTtsService, TtsClient};

pub struct ServerKernel {
    pub pool: PgPool,
    pub config: Config,
    pub queue: Arc<dyn JobQueue>,
    pub time: Arc<TimeService>,
    pub embeddings: Arc<dyn BaseEmbeddingService>,
    pub llm: Arc<dyn BaseLlmService>,
    pub tts: Arc<dyn BaseTtsService>,
}

impl ServerKernel {
    pub async fn build(config: Config) -> anyhow::Result<Arc<Self>> {
        let pool = sqlx::postgres::PgPoolOptions::new()
            .max_connections(5)
            .connect(&config.database_url)
            .await?;

        let queue: Arc<dyn JobQueue> =
            Arc::new(PostgresJobQueue::new(pool.clone(), config.lease_seconds));
        let time = Arc::new(TimeService::new(
            config.future_year_offset,
            config.ntp_pool_host.clone(),
        ));
        let embeddings: Arc<dyn BaseEmbeddingService> = Arc::new(EmbeddingClient::new(
            config.embedding_backend_url.clone(),
            config.embedding_api_key.clone(),
        ));
        let llm: Arc<dyn BaseLlmService> = Arc::new(LlmClient::new(
            config.llm_backend_url.clone(),
            config.llm_api_key.clone(),
        ));
        let tts: Arc<dyn BaseTtsService> = Arc::new(TtsClient::new(config.tts_backend_url.clone()));

        Ok(Arc::new(Self {
            pool,
            config,
            queue,
            time,
            embeddings,
            llm,
            tts,
        }))
    }
}
