use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A named intake point owned by an organization.
#[derive(Debug, Clone, sqlx::FromRow, Serialize, Deserialize)]
pub struct Endpoint {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub name: String,
    /// Optional secret token for unguessable-URL access.
    pub token: Option<String>,
    pub redirect_url: Option<String>,
    /// Regex the Referer origin must match, if set.
    pub referrer_pattern: Option<String>,
    /// Reject fields not declared in `fields`.
    pub strict: bool,
    pub fields: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
}
