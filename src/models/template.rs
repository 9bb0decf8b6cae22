use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Template blob for a Google Sheets attachment. The `columns` map is the
/// durable field -> developer-metadata-id registry; it only ever grows.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SheetTemplate {
    pub spreadsheet_id: String,
    pub title: String,
    pub sheet_id: i64,
    #[serde(default)]
    pub columns: BTreeMap<String, i64>,
}

/// Template blob for Gmail/Email attachments. `to`, `subject` and `body`
/// support `{{path}}` placeholders; an omitted `to` falls back to `sender`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailTemplate {
    #[serde(default)]
    pub to: String,
    #[serde(default)]
    pub sender: Option<String>,
    pub subject: String,
    pub body: String,
}

/// Template blob for webhook attachments.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookTemplate {
    pub url: String,
    #[serde(default)]
    pub method: Option<String>,
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
}
