use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

/// Raw (still encrypted) credential row. Decryption lives in `oauth`.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct CredentialRow {
    pub user_id: Uuid,
    pub access_token_enc: Vec<u8>,
    pub refresh_token_enc: Option<Vec<u8>>,
    pub expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

pub async fn find_by_user(
    pool: &PgPool,
    user_id: Uuid,
) -> Result<Option<CredentialRow>, sqlx::Error> {
    sqlx::query_as::<_, CredentialRow>("SELECT * FROM google_credentials WHERE user_id = $1")
        .bind(user_id)
        .fetch_optional(pool)
        .await
}

pub async fn upsert(
    pool: &PgPool,
    user_id: Uuid,
    access_token_enc: &[u8],
    refresh_token_enc: Option<&[u8]>,
    expires_at: Option<DateTime<Utc>>,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO google_credentials (user_id, access_token_enc, refresh_token_enc, expires_at)
         VALUES ($1, $2, $3, $4)
         ON CONFLICT (user_id) DO UPDATE SET
             access_token_enc = EXCLUDED.access_token_enc,
             refresh_token_enc = COALESCE(EXCLUDED.refresh_token_enc, google_credentials.refresh_token_enc),
             expires_at = EXCLUDED.expires_at,
             updated_at = now()",
    )
    .bind(user_id)
    .bind(access_token_enc)
    .bind(refresh_token_enc)
    .bind(expires_at)
    .execute(pool)
    .await?;
    Ok(())
}

/// Only the access token changed (refresh flow); keep the refresh token.
pub async fn update_access_token(
    pool: &PgPool,
    user_id: Uuid,
    access_token_enc: &[u8],
    expires_at: Option<DateTime<Utc>>,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "UPDATE google_credentials
         SET access_token_enc = $2, expires_at = $3, updated_at = now()
         WHERE user_id = $1",
    )
    .bind(user_id)
    .bind(access_token_enc)
    .bind(expires_at)
    .execute(pool)
    .await?;
    Ok(())
}
