//! Axum application state: a thin wrapper around `ServerKernel` plus the
//! retrieval engine, mirroring the teacher's `common::app_state::AppState`
//! capability-struct pattern.

use std::sync::Arc;

use crate::domains::retrieval::HybridRetrievalEngine;
use crate::kernel::ServerKernel;

#[derive(Clone)]
pub struct AppState {
    pub kernel: Arc<ServerKernel>,
    pub retrieval: Arc<HybridRetrievalEngine>,
}

impl AppState {
    pub fn new(kernel: Arc<ServerKernel>) -> Self {
        let retrieval = Arc::new(HybridRetrievalEngine::new(kernel.pool.clone(), kernel.embeddings.clone()));
        Self { kernel, retrieval }
    }
}
