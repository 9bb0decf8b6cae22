use sqlx::PgPool;
use uuid::Uuid;

use crate::models::QueueItem;

/// Enqueue one unit of work for an accepted submission. This is the
/// `enqueueProcessing` interface the intake layer calls.
pub async fn enqueue(pool: &PgPool, submission_id: Uuid) -> Result<QueueItem, sqlx::Error> {
    sqlx::query_as::<_, QueueItem>(
        "INSERT INTO process_queue (submission_id) VALUES ($1) RETURNING *",
    )
    .bind(submission_id)
    .fetch_one(pool)
    .await
}

/// Atomically claim the next ready item using SELECT FOR UPDATE SKIP LOCKED.
pub async fn claim_next(pool: &PgPool) -> Result<Option<QueueItem>, sqlx::Error> {
    sqlx::query_as::<_, QueueItem>(
        "UPDATE process_queue SET status = 'processing', attempts = attempts + 1
         WHERE id = (
             SELECT id FROM process_queue
             WHERE status = 'pending'
               AND next_retry_at <= now()
             ORDER BY next_retry_at ASC
             LIMIT 1
             FOR UPDATE SKIP LOCKED
         )
         RETURNING *",
    )
    .fetch_optional(pool)
    .await
}

pub async fn mark_completed(pool: &PgPool, id: Uuid) -> Result<(), sqlx::Error> {
    sqlx::query(
        "UPDATE process_queue SET status = 'completed', completed_at = now()
         WHERE id = $1",
    )
    .bind(id)
    .execute(pool)
    .await?;
    Ok(())
}

/// Put the item back in the queue with exponential backoff. Once max
/// attempts are exhausted the item becomes terminally 'failed'.
pub async fn mark_failed(
    pool: &PgPool,
    id: Uuid,
    attempts: i32,
    max_attempts: i32,
    error: &str,
) -> Result<(), sqlx::Error> {
    if attempts >= max_attempts {
        mark_failed_permanent(pool, id, error).await
    } else {
        // 2^attempts seconds between retries
        let backoff_secs = 2_i64.pow(attempts as u32);
        sqlx::query(
            "UPDATE process_queue
             SET status = 'pending',
                 last_error = $2,
                 next_retry_at = now() + make_interval(secs => $3::double precision)
             WHERE id = $1",
        )
        .bind(id)
        .bind(error)
        .bind(backoff_secs as f64)
        .execute(pool)
        .await?;
        Ok(())
    }
}

/// Terminal failure: permanent errors are not worth retrying.
pub async fn mark_failed_permanent(
    pool: &PgPool,
    id: Uuid,
    error: &str,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "UPDATE process_queue SET status = 'failed', last_error = $2, completed_at = now()
         WHERE id = $1",
    )
    .bind(id)
    .bind(error)
    .execute(pool)
    .await?;
    Ok(())
}
