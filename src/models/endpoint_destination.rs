use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The attachment of one destination to one endpoint. `template` is the
/// kind-specific configuration blob; for Google Sheets it carries the
/// field -> developer-metadata-id column map and grows as new fields appear.
#[derive(Debug, Clone, sqlx::FromRow, Serialize, Deserialize)]
pub struct EndpointDestination {
    pub id: Uuid,
    pub endpoint_id: Uuid,
    pub destination_id: Uuid,
    pub template: serde_json::Value,
    pub created_at: DateTime<Utc>,
}
