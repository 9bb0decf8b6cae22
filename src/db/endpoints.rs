use sqlx::PgPool;
use uuid::Uuid;

use crate::models::Endpoint;

pub struct NewEndpoint<'a> {
    pub organization_id: Uuid,
    pub name: &'a str,
    pub token: Option<&'a str>,
    pub redirect_url: Option<&'a str>,
    pub referrer_pattern: Option<&'a str>,
    pub strict: bool,
    pub fields: Option<&'a serde_json::Value>,
}

pub async fn create(pool: &PgPool, new: &NewEndpoint<'_>) -> Result<Endpoint, sqlx::Error> {
    sqlx::query_as::<_, Endpoint>(
        "INSERT INTO endpoints (organization_id, name, token, redirect_url, referrer_pattern, strict, fields)
         VALUES ($1, $2, $3, $4, $5, $6, $7) RETURNING *",
    )
    .bind(new.organization_id)
    .bind(new.name)
    .bind(new.token)
    .bind(new.redirect_url)
    .bind(new.referrer_pattern)
    .bind(new.strict)
    .bind(new.fields)
    .fetch_one(pool)
    .await
}

pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Endpoint>, sqlx::Error> {
    sqlx::query_as::<_, Endpoint>("SELECT * FROM endpoints WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
}
