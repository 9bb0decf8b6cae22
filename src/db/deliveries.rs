use sqlx::PgPool;
use uuid::Uuid;

use crate::models::Delivery;

pub async fn create(
    pool: &PgPool,
    endpoint_destination_id: Uuid,
    submission_id: Uuid,
    status: &str,
    response: Option<&serde_json::Value>,
) -> Result<Delivery, sqlx::Error> {
    sqlx::query_as::<_, Delivery>(
        "INSERT INTO deliveries (endpoint_destination_id, submission_id, status, response)
         VALUES ($1, $2, $3, $4) RETURNING *",
    )
    .bind(endpoint_destination_id)
    .bind(submission_id)
    .bind(status)
    .bind(response)
    .fetch_one(pool)
    .await
}

/// Whether this attachment already delivered this submission successfully.
/// Task delivery is at-least-once; retried tasks skip completed attachments.
pub async fn succeeded(
    pool: &PgPool,
    endpoint_destination_id: Uuid,
    submission_id: Uuid,
) -> Result<bool, sqlx::Error> {
    sqlx::query_scalar::<_, bool>(
        "SELECT EXISTS(SELECT 1 FROM deliveries
         WHERE endpoint_destination_id = $1 AND submission_id = $2 AND status = 'success')",
    )
    .bind(endpoint_destination_id)
    .bind(submission_id)
    .fetch_one(pool)
    .await
}

pub async fn list_for_submission(
    pool: &PgPool,
    submission_id: Uuid,
) -> Result<Vec<Delivery>, sqlx::Error> {
    sqlx::query_as::<_, Delivery>(
        "SELECT * FROM deliveries WHERE submission_id = $1 ORDER BY created_at ASC",
    )
    .bind(submission_id)
    .fetch_all(pool)
    .await
}
