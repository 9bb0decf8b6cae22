use sqlx::PgPool;
use uuid::Uuid;

use crate::models::Submission;

pub async fn create(
    pool: &PgPool,
    endpoint_id: Uuid,
    data: &serde_json::Value,
    referrer: Option<&str>,
    user_agent: Option<&str>,
    ip: Option<&str>,
) -> Result<Submission, sqlx::Error> {
    sqlx::query_as::<_, Submission>(
        "INSERT INTO submissions (endpoint_id, data, referrer, user_agent, ip)
         VALUES ($1, $2, $3, $4, $5) RETURNING *",
    )
    .bind(endpoint_id)
    .bind(data)
    .bind(referrer)
    .bind(user_agent)
    .bind(ip)
    .fetch_one(pool)
    .await
}

pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Submission>, sqlx::Error> {
    sqlx::query_as::<_, Submission>("SELECT * FROM submissions WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
}

/// Every field name observed across an endpoint's historical submissions.
/// Used to seed columns when a sheet destination is first attached.
pub async fn distinct_field_names(
    pool: &PgPool,
    endpoint_id: Uuid,
) -> Result<Vec<String>, sqlx::Error> {
    sqlx::query_scalar::<_, String>(
        "SELECT DISTINCT jsonb_object_keys(data) FROM submissions
         WHERE endpoint_id = $1 ORDER BY 1",
    )
    .bind(endpoint_id)
    .fetch_all(pool)
    .await
}
