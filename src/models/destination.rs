use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Account-level sink configuration. Durable credentials/state shared across
/// every endpoint that uses it (e.g. one Google OAuth grant per user).
#[derive(Debug, Clone, sqlx::FromRow, Serialize, Deserialize)]
pub struct Destination {
    pub id: Uuid,
    pub user_id: Uuid,
    pub kind: String,
    pub settings: serde_json::Value,
    /// Set when a permanent failure disables the destination; owner-facing.
    pub disabled_reason: Option<String>,
    pub created_at: DateTime<Utc>,
}
