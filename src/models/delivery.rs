use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, sqlx::FromRow, Serialize, Deserialize)]
pub struct Delivery {
    pub id: Uuid,
    pub endpoint_destination_id: Uuid,
    pub submission_id: Uuid,
    pub status: String,
    pub response: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
}
