use std::sync::LazyLock;

use async_trait::async_trait;
use regex::Regex;
use serde_json::{Value, json};
use sqlx::PgPool;

use crate::db;
use crate::models::{Destination, Endpoint, EndpointDestination};
use crate::oauth::CredentialStore;
use crate::sheets::sync::SheetSynchronizer;

use super::context::ProcessContext;
use super::{DestinationKind, DestinationVariant, ProcessError};

static SHEET_URL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^https://docs\.google\.com/spreadsheets/d/([^/\s?#]+)").unwrap());

pub struct GoogleSheetVariant {
    pool: PgPool,
    synchronizer: SheetSynchronizer,
    credentials: CredentialStore,
}

impl GoogleSheetVariant {
    pub fn new(pool: PgPool, synchronizer: SheetSynchronizer, credentials: CredentialStore) -> Self {
        Self {
            pool,
            synchronizer,
            credentials,
        }
    }
}

/// Accepts either a full Sheets URL or a bare spreadsheet id.
fn spreadsheet_id(value: &str) -> Option<String> {
    if let Some(caps) = SHEET_URL_RE.captures(value) {
        return Some(caps[1].to_string());
    }
    let looks_like_id = !value.is_empty()
        && value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    looks_like_id.then(|| value.to_string())
}

#[async_trait]
impl DestinationVariant for GoogleSheetVariant {
    fn kind(&self) -> DestinationKind {
        DestinationKind::GoogleSheet
    }

    fn is_valid(&self, value: &str) -> bool {
        SHEET_URL_RE.is_match(value)
    }

    async fn create_attachment(
        &self,
        destination: &Destination,
        endpoint: &Endpoint,
        args: &Value,
    ) -> Result<Value, ProcessError> {
        let spreadsheet = args
            .get("spreadsheet")
            .and_then(|v| v.as_str())
            .and_then(spreadsheet_id)
            .ok_or_else(|| {
                ProcessError::Permanent("A spreadsheet URL or id is required".into())
            })?;

        let token = self.credentials.access_token(destination.user_id).await?;

        // Seed columns from every field name already observed on this
        // endpoint, before the first live row is appended.
        let seed_fields = db::submissions::distinct_field_names(&self.pool, endpoint.id)
            .await
            .map_err(|e| ProcessError::Transient(format!("Failed to load field names: {e}")))?;

        let organization = db::organizations::find_by_id(&self.pool, endpoint.organization_id)
            .await
            .map_err(|e| ProcessError::Transient(format!("Failed to load organization: {e}")))?;
        let tab_title = match organization {
            Some(org) => format!("FormRelay/{}/{}", org.name, endpoint.name),
            None => format!("FormRelay/{}", endpoint.name),
        };

        let template = self
            .synchronizer
            .provision(&token, &spreadsheet, &tab_title, &seed_fields)
            .await?;

        serde_json::to_value(&template)
            .map_err(|e| ProcessError::Permanent(format!("Failed to serialize template: {e}")))
    }

    async fn process(
        &self,
        ctx: &ProcessContext,
        destination: &Destination,
        attachment: &EndpointDestination,
    ) -> Result<Option<Value>, ProcessError> {
        let token = self.credentials.access_token(destination.user_id).await?;

        // Serialize column allocation per attachment: without this, two
        // workers processing submissions with the same new field would each
        // see it as missing and create duplicate columns.
        let lock = db::locks::lock_attachment(&self.pool, attachment.id)
            .await
            .map_err(|e| ProcessError::Transient(format!("Failed to acquire lock: {e}")))?;

        let result = self
            .synchronizer
            .process(&token, attachment.id, &ctx.submission)
            .await;

        if let Err(e) = lock.release().await {
            tracing::warn!("Failed to release attachment lock: {e}");
        }

        result.map(|r| {
            r.or_else(|| Some(json!({ "message": "Row appended" })))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_spreadsheet_id_from_url() {
        let url = "https://docs.google.com/spreadsheets/d/1AbC-dEf_123/edit#gid=0";
        assert_eq!(spreadsheet_id(url), Some("1AbC-dEf_123".to_string()));
    }

    #[test]
    fn accepts_bare_ids() {
        assert_eq!(spreadsheet_id("1AbC-dEf_123"), Some("1AbC-dEf_123".to_string()));
    }

    #[test]
    fn rejects_other_urls_and_garbage() {
        assert_eq!(spreadsheet_id("https://example.com/spreadsheets/d/x"), None);
        assert_eq!(spreadsheet_id(""), None);
        assert_eq!(spreadsheet_id("has spaces"), None);
    }
}
