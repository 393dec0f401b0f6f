//! Segment State Machine (§4.6 C6): typed transitions with optimistic
//! concurrency and idempotent side effects. Grounded on the teacher's
//! `kernel/jobs/job.rs` claim-via-`UPDATE ... WHERE` pattern — here
//! applied to advancing a single row instead of claiming a batch.

use chrono::Utc;
use sqlx::PgPool;
use thiserror::Error;
use uuid::Uuid;

use super::models::{Segment, SegmentState};

#[derive(Debug, Error)]
pub enum StateTransitionError {
    #[error("transition {from:?} -> {to:?} is not allowed")]
    InvalidTransition { from: SegmentState, to: SegmentState },
    #[error("segment {0} was modified by another worker (stale predecessor state)")]
    Conflict(Uuid),
    #[error("segment {0} not found")]
    NotFound(Uuid),
    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

/// The allowed edges of §4.6's diagram, plus the terminal `failed` edge
/// reachable from `generating`, `rendering`, and `normalizing`.
fn allowed(from: SegmentState, to: SegmentState) -> bool {
    use SegmentState::*;
    matches!(
        (from, to),
        (Queued, Retrieving)
            | (Retrieving, Generating)
            | (Generating, Rendering)
            | (Rendering, Normalizing)
            | (Normalizing, Ready)
            | (Ready, Airing)
            | (Airing, Aired)
            | (Aired, Archived)
            | (Generating, Failed)
            | (Rendering, Failed)
            | (Normalizing, Failed)
            | (Retrieving, Failed)
            | (Queued, Failed)
    )
}

/// Advance `segment_id` from `from` to `to`, recording `actor`. Protected
/// by optimistic concurrency: the `UPDATE` only applies while the row is
/// still in `from`; a zero-row result means another worker already moved
/// it, which is reported as a `Conflict` so the caller aborts without
/// side effects (§5 Ordering guarantees).
pub async fn transition(
    pool: &PgPool,
    segment_id: Uuid,
    from: SegmentState,
    to: SegmentState,
    actor: &str,
) -> Result<Segment, StateTransitionError> {
    if !allowed(from, to) {
        return Err(StateTransitionError::InvalidTransition { from, to });
    }

    let updated: Option<Segment> = sqlx::query_as(
        r#"
        UPDATE segments
        SET state = $3, updated_at = NOW()
        WHERE id = $1 AND state = $2
        RETURNING *
        "#,
    )
    .bind(segment_id)
    .bind(from)
    .bind(to)
    .fetch_optional(pool)
    .await?;

    match updated {
        Some(segment) => {
            tracing::info!(segment_id = %segment_id, from = ?from, to = ?to, actor, "segment transitioned");
            Ok(segment)
        }
        None => match Segment::find(pool, segment_id).await? {
            Some(_) => Err(StateTransitionError::Conflict(segment_id)),
            None => Err(StateTransitionError::NotFound(segment_id)),
        },
    }
}

/// Transition straight to `failed`, recording the reason. Allowed from any
/// non-terminal state; idempotent if already `failed`.
pub async fn fail(
    pool: &PgPool,
    segment_id: Uuid,
    reason: &str,
) -> Result<Segment, StateTransitionError> {
    let updated: Option<Segment> = sqlx::query_as(
        r#"
        UPDATE segments
        SET state = 'failed', last_error = $2, updated_at = NOW()
        WHERE id = $1 AND state NOT IN ('failed', 'archived')
        RETURNING *
        "#,
    )
    .bind(segment_id)
    .bind(reason)
    .fetch_optional(pool)
    .await?;

    match updated {
        Some(segment) => Ok(segment),
        None => Segment::find(pool, segment_id)
            .await?
            .ok_or(StateTransitionError::NotFound(segment_id)),
    }
}

/// In-state retry: increments `retry_count`; once it reaches `max_retries`
/// the segment is moved to `failed` instead (§4.6 rule).
pub async fn record_retry(
    pool: &PgPool,
    segment_id: Uuid,
    error: &str,
) -> Result<Segment, StateTransitionError> {
    let segment = Segment::find(pool, segment_id)
        .await?
        .ok_or(StateTransitionError::NotFound(segment_id))?;

    if segment.retry_count + 1 >= segment.max_retries {
        return fail(pool, segment_id, error).await;
    }

    let updated: Segment = sqlx::query_as(
        r#"
        UPDATE segments
        SET retry_count = retry_count + 1, last_error = $2, updated_at = NOW()
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(segment_id)
    .bind(error)
    .fetch_one(pool)
    .await?;
    Ok(updated)
}

/// Operator action: reset a `failed` segment back to `queued`, clearing
/// `last_error` and `retry_count` (§4.6).
pub async fn revive(pool: &PgPool, segment_id: Uuid) -> Result<Segment, StateTransitionError> {
    let updated: Option<Segment> = sqlx::query_as(
        r#"
        UPDATE segments
        SET state = 'queued', last_error = NULL, retry_count = 0, updated_at = NOW()
        WHERE id = $1 AND state = 'failed'
        RETURNING *
        "#,
    )
    .bind(segment_id)
    .fetch_optional(pool)
    .await?;

    updated.ok_or_else(|| {
        // Either not found, or not in `failed` — both reported the same
        // way since reviving a non-failed segment is always a caller bug.
        StateTransitionError::InvalidTransition {
            from: SegmentState::Queued,
            to: SegmentState::Queued,
        }
    })
}

impl Segment {
    pub async fn find(pool: &PgPool, id: Uuid) -> sqlx::Result<Option<Segment>> {
        sqlx::query_as("SELECT * FROM segments WHERE id = $1")
            .bind(id)
            .fetch_optional(pool)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use SegmentState::*;

    #[test]
    fn happy_path_transitions_are_allowed() {
        assert!(allowed(Queued, Retrieving));
        assert!(allowed(Retrieving, Generating));
        assert!(allowed(Generating, Rendering));
        assert!(allowed(Rendering, Normalizing));
        assert!(allowed(Normalizing, Ready));
        assert!(allowed(Ready, Airing));
        assert!(allowed(Airing, Aired));
        assert!(allowed(Aired, Archived));
    }

    #[test]
    fn skipping_a_state_is_rejected() {
        assert!(!allowed(Queued, Generating));
        assert!(!allowed(Retrieving, Ready));
    }

    #[test]
    fn failed_is_terminal_no_outbound_edges() {
        assert!(!allowed(Failed, Queued));
        assert!(!allowed(Failed, Retrieving));
    }

    #[test]
    fn failure_reachable_from_mid_pipeline_states() {
        assert!(allowed(Generating, Failed));
        assert!(allowed(Rendering, Failed));
        assert!(allowed(Normalizing, Failed));
    }

    #[test]
    fn archived_has_no_outbound_edges() {
        assert!(!allowed(Archived, Queued));
    }
}
