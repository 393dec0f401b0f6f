//! The `Record` trait: a uniform CRUD surface over a Postgres-backed model,
//! mirrored from the teacher's `common::sql::Record` used throughout
//! `kernel/jobs/job.rs` and the `domains::schedules` models.

use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

#[async_trait]
pub trait Record: Sized + Send + Sync {
    /// Insert `self`, returning the persisted row (populated defaults,
    /// generated id, timestamps).
    async fn insert(&self, pool: &PgPool) -> sqlx::Result<Self>;

    /// Fetch a single row by primary key.
    async fn find_by_id(pool: &PgPool, id: Uuid) -> sqlx::Result<Option<Self>>;

    /// Persist the current state of an already-inserted row.
    async fn update(&self, pool: &PgPool) -> sqlx::Result<Self>;

    /// Remove the row by primary key.
    async fn delete(pool: &PgPool, id: Uuid) -> sqlx::Result<()>;
}
