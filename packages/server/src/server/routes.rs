//! HTTP surface (§6): `/rag/query`, `/health`, `/time`. Grounded in
//! structure on the teacher's `bin/server.rs` axum router setup.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;
use tower_http::trace::TraceLayer;

use crate::domains::retrieval::RagQuery;
use super::state::AppState;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/rag/query", post(rag_query))
        .route("/health", get(health))
        .route("/time", get(time))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

async fn rag_query(State(state): State<AppState>, Json(query): Json<RagQuery>) -> Response {
    if query.text.trim().is_empty() {
        return (StatusCode::BAD_REQUEST, Json(ErrorBody { error: "text must not be empty".to_string() })).into_response();
    }

    match state.retrieval.query(&query).await {
        Ok(resp) => {
            if resp.degraded.unwrap_or(false) && !query.allow_degraded {
                return (
                    StatusCode::SERVICE_UNAVAILABLE,
                    Json(ErrorBody { error: "retrieval degraded and allow_degraded=false".to_string() }),
                )
                    .into_response();
            }
            (StatusCode::OK, Json(resp)).into_response()
        }
        Err(e) => (StatusCode::SERVICE_UNAVAILABLE, Json(ErrorBody { error: e.to_string() })).into_response(),
    }
}

#[derive(Debug, Serialize)]
struct HealthBody {
    status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    degraded: Option<bool>,
    ntp_skew_ms: i64,
}

async fn health(State(state): State<AppState>) -> Json<HealthBody> {
    let db_ok = sqlx::query("SELECT 1").execute(&state.kernel.pool).await.is_ok();
    let healthy = db_ok && state.kernel.time.healthy();
    Json(HealthBody {
        status: if healthy { "ok" } else { "degraded" },
        degraded: (!healthy).then_some(true),
        ntp_skew_ms: state.kernel.time.skew_ms(),
    })
}

#[derive(Debug, Serialize)]
struct TimeBody {
    real_utc: chrono::DateTime<chrono::Utc>,
    future_display: chrono::DateTime<chrono::Utc>,
    year_offset: i64,
    ntp_skew_ms: i64,
    healthy: bool,
}

async fn time(State(state): State<AppState>) -> Json<TimeBody> {
    Json(TimeBody {
        real_utc: state.kernel.time.now_real(),
        future_display: state.kernel.time.now_future(),
        year_offset: state.kernel.time.year_offset(),
        ntp_skew_ms: state.kernel.time.skew_ms(),
        healthy: state.kernel.time.healthy(),
    })
}
