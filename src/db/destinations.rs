use sqlx::PgPool;
use uuid::Uuid;

use crate::models::Destination;

pub async fn create(
    pool: &PgPool,
    user_id: Uuid,
    kind: &str,
    settings: &serde_json::Value,
) -> Result<Destination, sqlx::Error> {
    sqlx::query_as::<_, Destination>(
        "INSERT INTO destinations (user_id, kind, settings)
         VALUES ($1, $2, $3) RETURNING *",
    )
    .bind(user_id)
    .bind(kind)
    .bind(settings)
    .fetch_one(pool)
    .await
}

pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Destination>, sqlx::Error> {
    sqlx::query_as::<_, Destination>("SELECT * FROM destinations WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
}

/// Flag a destination with an owner-facing failure reason. Processing keeps
/// running for other destinations; this is the out-of-band surface for
/// permanent errors.
pub async fn flag_disabled(pool: &PgPool, id: Uuid, reason: &str) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE destinations SET disabled_reason = $2 WHERE id = $1")
        .bind(id)
        .bind(reason)
        .execute(pool)
        .await?;
    Ok(())
}

pub async fn clear_disabled(pool: &PgPool, id: Uuid) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE destinations SET disabled_reason = NULL WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}
