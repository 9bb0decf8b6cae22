use std::collections::BTreeMap;

use sqlx::PgPool;
use uuid::Uuid;

use crate::models::{Destination, EndpointDestination};

pub async fn create(
    pool: &PgPool,
    endpoint_id: Uuid,
    destination_id: Uuid,
    template: &serde_json::Value,
) -> Result<EndpointDestination, sqlx::Error> {
    sqlx::query_as::<_, EndpointDestination>(
        "INSERT INTO endpoint_destinations (endpoint_id, destination_id, template)
         VALUES ($1, $2, $3) RETURNING *",
    )
    .bind(endpoint_id)
    .bind(destination_id)
    .bind(template)
    .fetch_one(pool)
    .await
}

pub async fn find_by_id(
    pool: &PgPool,
    id: Uuid,
) -> Result<Option<EndpointDestination>, sqlx::Error> {
    sqlx::query_as::<_, EndpointDestination>(
        "SELECT * FROM endpoint_destinations WHERE id = $1",
    )
    .bind(id)
    .fetch_optional(pool)
    .await
}

pub async fn exists(
    pool: &PgPool,
    endpoint_id: Uuid,
    destination_id: Uuid,
) -> Result<bool, sqlx::Error> {
    sqlx::query_scalar::<_, bool>(
        "SELECT EXISTS(SELECT 1 FROM endpoint_destinations
         WHERE endpoint_id = $1 AND destination_id = $2)",
    )
    .bind(endpoint_id)
    .bind(destination_id)
    .fetch_one(pool)
    .await
}

/// All attachments for an endpoint, paired with their destination rows.
pub async fn list_for_endpoint(
    pool: &PgPool,
    endpoint_id: Uuid,
) -> Result<Vec<(EndpointDestination, Destination)>, sqlx::Error> {
    let attachments = sqlx::query_as::<_, EndpointDestination>(
        "SELECT * FROM endpoint_destinations WHERE endpoint_id = $1 ORDER BY created_at ASC",
    )
    .bind(endpoint_id)
    .fetch_all(pool)
    .await?;

    let mut result = Vec::with_capacity(attachments.len());
    for attachment in attachments {
        let destination = sqlx::query_as::<_, Destination>(
            "SELECT * FROM destinations WHERE id = $1",
        )
        .bind(attachment.destination_id)
        .fetch_one(pool)
        .await?;
        result.push((attachment, destination));
    }
    Ok(result)
}

/// Merge newly created columns into the template's `columns` map. Merge, not
/// replace: concurrent growth from another field set must survive.
pub async fn merge_columns(
    pool: &PgPool,
    id: Uuid,
    columns: &BTreeMap<String, i64>,
) -> Result<(), sqlx::Error> {
    let patch = serde_json::to_value(columns).unwrap_or_default();
    sqlx::query(
        "UPDATE endpoint_destinations
         SET template = jsonb_set(
             template,
             '{columns}',
             COALESCE(template->'columns', '{}'::jsonb) || $2
         )
         WHERE id = $1",
    )
    .bind(id)
    .bind(patch)
    .execute(pool)
    .await?;
    Ok(())
}
