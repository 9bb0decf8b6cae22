use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use sqlx::PgPool;
use uuid::Uuid;

use crate::crypto;
use crate::db;
use crate::destinations::ProcessError;

/// Refresh slightly before the recorded expiry to absorb clock skew and
/// request latency.
const EXPIRY_MARGIN_SECS: i64 = 60;

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<i64>,
}

#[derive(Debug, Deserialize, Default)]
struct TokenErrorResponse {
    #[serde(default)]
    error: String,
}

/// Durable per-user Google OAuth credential store. Tokens are encrypted at
/// rest; the consent flow that acquires the initial grant lives outside this
/// crate, which only stores and refreshes it.
#[derive(Clone)]
pub struct CredentialStore {
    pool: PgPool,
    http: reqwest::Client,
    encryption_key: String,
    client_id: Option<String>,
    client_secret: Option<String>,
    token_url: String,
}

impl CredentialStore {
    pub fn new(
        pool: PgPool,
        encryption_key: String,
        client_id: Option<String>,
        client_secret: Option<String>,
        token_url: String,
    ) -> Result<Self, String> {
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .map_err(|e| format!("Failed to build HTTP client: {e}"))?;
        Ok(Self {
            pool,
            http,
            encryption_key,
            client_id,
            client_secret,
            token_url,
        })
    }

    /// Persist a grant obtained by the external consent flow.
    pub async fn store_grant(
        &self,
        user_id: Uuid,
        access_token: &str,
        refresh_token: Option<&str>,
        expires_at: Option<DateTime<Utc>>,
    ) -> Result<(), String> {
        let access_enc = crypto::encrypt(access_token, &self.encryption_key)?;
        let refresh_enc = match refresh_token {
            Some(t) => Some(crypto::encrypt(t, &self.encryption_key)?),
            None => None,
        };
        db::credentials::upsert(
            &self.pool,
            user_id,
            &access_enc,
            refresh_enc.as_deref(),
            expires_at,
        )
        .await
        .map_err(|e| format!("Failed to store credential: {e}"))
    }

    /// A currently valid access token for the user, refreshing if the stored
    /// one has expired. Absent or revoked grants surface as credential
    /// errors; destinations must not fall back to an unauthenticated client.
    pub async fn access_token(&self, user_id: Uuid) -> Result<String, ProcessError> {
        let row = db::credentials::find_by_user(&self.pool, user_id)
            .await
            .map_err(|e| ProcessError::Transient(format!("Failed to load credential: {e}")))?
            .ok_or_else(|| {
                ProcessError::Credential(format!("No Google credential stored for user {user_id}"))
            })?;

        if !needs_refresh(row.expires_at, Utc::now()) {
            return crypto::decrypt(&row.access_token_enc, &self.encryption_key)
                .map_err(ProcessError::Permanent);
        }

        let refresh_enc = row.refresh_token_enc.ok_or_else(|| {
            ProcessError::Credential(
                "Access token expired and no refresh token is stored".into(),
            )
        })?;
        let refresh_token = crypto::decrypt(&refresh_enc, &self.encryption_key)
            .map_err(ProcessError::Permanent)?;

        self.refresh(user_id, &refresh_token).await
    }

    async fn refresh(&self, user_id: Uuid, refresh_token: &str) -> Result<String, ProcessError> {
        let (client_id, client_secret) = match (&self.client_id, &self.client_secret) {
            (Some(id), Some(secret)) => (id.as_str(), secret.as_str()),
            _ => {
                return Err(ProcessError::Permanent(
                    "Google OAuth client is not configured".into(),
                ));
            }
        };

        let resp = self
            .http
            .post(&self.token_url)
            .form(&[
                ("client_id", client_id),
                ("client_secret", client_secret),
                ("refresh_token", refresh_token),
                ("grant_type", "refresh_token"),
            ])
            .send()
            .await
            .map_err(|e| ProcessError::Transient(format!("Token refresh request failed: {e}")))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            let err: TokenErrorResponse = serde_json::from_str(&body).unwrap_or_default();
            // invalid_grant means the user revoked access; owner must re-link.
            if err.error == "invalid_grant" {
                return Err(ProcessError::Credential(
                    "Google refresh token has been revoked".into(),
                ));
            }
            let msg = format!("Token refresh returned {status}: {body}");
            return Err(if status.is_server_error() {
                ProcessError::Transient(msg)
            } else {
                ProcessError::Permanent(msg)
            });
        }

        let token: TokenResponse = resp
            .json()
            .await
            .map_err(|e| ProcessError::Permanent(format!("Malformed token response: {e}")))?;

        let expires_at = token
            .expires_in
            .map(|secs| Utc::now() + Duration::seconds(secs));
        let access_enc = crypto::encrypt(&token.access_token, &self.encryption_key)
            .map_err(ProcessError::Permanent)?;
        db::credentials::update_access_token(&self.pool, user_id, &access_enc, expires_at)
            .await
            .map_err(|e| ProcessError::Transient(format!("Failed to persist token: {e}")))?;

        tracing::debug!("Refreshed Google access token for user {user_id}");
        Ok(token.access_token)
    }
}

fn needs_refresh(expires_at: Option<DateTime<Utc>>, now: DateTime<Utc>) -> bool {
    match expires_at {
        // No recorded expiry: assume the token is still good and let a 401
        // from the API surface as a credential error.
        None => false,
        Some(at) => at <= now + Duration::seconds(EXPIRY_MARGIN_SECS),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn refresh_decision_respects_margin() {
        let now = Utc::now();
        assert!(!needs_refresh(None, now));
        assert!(!needs_refresh(Some(now + Duration::seconds(3600)), now));
        assert!(needs_refresh(Some(now + Duration::seconds(30)), now));
        assert!(needs_refresh(Some(now - Duration::seconds(1)), now));
    }
}
