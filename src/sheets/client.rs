use serde::Deserialize;
use serde_json::{Value, json};

use crate::destinations::ProcessError;

/// Developer metadata as returned by the Sheets API. The metadata id is the
/// durable handle binding a field name to a column; the dimension range is
/// re-read on every run because absolute indices shift under insertions.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeveloperMetadata {
    pub metadata_id: i64,
    #[serde(default)]
    pub metadata_key: Option<String>,
    #[serde(default)]
    pub metadata_value: Option<String>,
    pub location: MetadataLocation,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetadataLocation {
    pub dimension_range: Option<DimensionRange>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DimensionRange {
    pub sheet_id: i64,
    #[serde(default)]
    pub dimension: Option<String>,
    #[serde(default)]
    pub start_index: i64,
    #[serde(default)]
    pub end_index: i64,
}

impl DeveloperMetadata {
    pub fn start_index(&self) -> Option<i64> {
        self.location
            .dimension_range
            .as_ref()
            .map(|r| r.start_index)
    }
}

#[derive(Debug, Deserialize)]
struct SpreadsheetProperties {
    title: String,
}

#[derive(Debug, Deserialize)]
struct Spreadsheet {
    properties: SpreadsheetProperties,
}

#[derive(Debug, Deserialize)]
struct BatchUpdateResponse {
    #[serde(default)]
    replies: Vec<Value>,
}

/// Thin client over the Sheets v4 REST API. The base URL is configuration,
/// not behavior; tests point it at a local mock.
#[derive(Clone)]
pub struct SheetsClient {
    http: reqwest::Client,
    base_url: String,
}

impl SheetsClient {
    pub fn new(base_url: String) -> Result<Self, String> {
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .map_err(|e| format!("Failed to build HTTP client: {e}"))?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub async fn spreadsheet_title(
        &self,
        token: &str,
        spreadsheet_id: &str,
    ) -> Result<String, ProcessError> {
        let url = format!(
            "{}/v4/spreadsheets/{spreadsheet_id}?fields=properties.title",
            self.base_url
        );
        let resp = self
            .http
            .get(&url)
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| ProcessError::Transient(format!("Sheets API request failed: {e}")))?;
        let resp = check_status(resp).await?;
        let spreadsheet: Spreadsheet = resp
            .json()
            .await
            .map_err(|e| ProcessError::Permanent(format!("Malformed spreadsheet response: {e}")))?;
        Ok(spreadsheet.properties.title)
    }

    pub async fn developer_metadata(
        &self,
        token: &str,
        spreadsheet_id: &str,
        metadata_id: i64,
    ) -> Result<DeveloperMetadata, ProcessError> {
        let url = format!(
            "{}/v4/spreadsheets/{spreadsheet_id}/developerMetadata/{metadata_id}",
            self.base_url
        );
        let resp = self
            .http
            .get(&url)
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| ProcessError::Transient(format!("Sheets API request failed: {e}")))?;
        let resp = check_status(resp).await?;
        resp.json()
            .await
            .map_err(|e| ProcessError::Permanent(format!("Malformed metadata response: {e}")))
    }

    pub async fn batch_update(
        &self,
        token: &str,
        spreadsheet_id: &str,
        requests: Vec<Value>,
    ) -> Result<Vec<Value>, ProcessError> {
        let url = format!(
            "{}/v4/spreadsheets/{spreadsheet_id}:batchUpdate",
            self.base_url
        );
        let resp = self
            .http
            .post(&url)
            .bearer_auth(token)
            .json(&json!({ "requests": requests }))
            .send()
            .await
            .map_err(|e| ProcessError::Transient(format!("Sheets API request failed: {e}")))?;
        let resp = check_status(resp).await?;
        let body: BatchUpdateResponse = resp
            .json()
            .await
            .map_err(|e| ProcessError::Permanent(format!("Malformed batchUpdate response: {e}")))?;
        Ok(body.replies)
    }
}

/// Map HTTP failure modes onto the processing error taxonomy: 401/403 are
/// credential/permission problems, 404 means the spreadsheet is gone, 429 and
/// 5xx are retryable.
async fn check_status(resp: reqwest::Response) -> Result<reqwest::Response, ProcessError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }

    let body: String = resp
        .text()
        .await
        .unwrap_or_default()
        .chars()
        .take(512)
        .collect();
    let msg = format!("Sheets API returned {status}: {body}");

    Err(match status.as_u16() {
        401 => ProcessError::Credential(msg),
        403 => ProcessError::Permanent(msg),
        404 => ProcessError::Permanent(msg),
        429 => ProcessError::Transient(msg),
        code if code >= 500 => ProcessError::Transient(msg),
        _ => ProcessError::Permanent(msg),
    })
}

// batchUpdate request builders, one per operation the synchronizer issues.

pub fn insert_columns_request(sheet_id: i64, start_index: i64, count: usize) -> Value {
    json!({
        "insertDimension": {
            "range": {
                "sheetId": sheet_id,
                "dimension": "COLUMNS",
                "startIndex": start_index,
                "endIndex": start_index + count as i64,
            },
            "inheritFromBefore": false,
        }
    })
}

pub fn header_cells_request(sheet_id: i64, start_index: i64, fieldnames: &[String]) -> Value {
    let values: Vec<Value> = fieldnames
        .iter()
        .map(|f| json!({ "userEnteredValue": { "stringValue": f } }))
        .collect();
    json!({
        "updateCells": {
            "rows": [{ "values": values }],
            "start": { "sheetId": sheet_id, "rowIndex": 0, "columnIndex": start_index },
            "fields": "userEnteredValue.stringValue",
        }
    })
}

/// Freezing an already-frozen header row is a no-op on the remote side.
pub fn freeze_header_request(sheet_id: i64) -> Value {
    json!({
        "updateSheetProperties": {
            "properties": {
                "sheetId": sheet_id,
                "gridProperties": { "frozenRowCount": 1 },
            },
            "fields": "gridProperties.frozenRowCount",
        }
    })
}

pub fn create_metadata_request(sheet_id: i64, fieldname: &str, index: i64) -> Value {
    json!({
        "createDeveloperMetadata": {
            "developerMetadata": {
                "metadataKey": "fieldname",
                "metadataValue": fieldname,
                "location": {
                    "dimensionRange": {
                        "sheetId": sheet_id,
                        "dimension": "COLUMNS",
                        "startIndex": index,
                        "endIndex": index + 1,
                    }
                },
                "visibility": "PROJECT",
            }
        }
    })
}

pub fn append_cells_request(sheet_id: i64, cells: &[Option<String>]) -> Value {
    let values: Vec<Value> = cells
        .iter()
        .map(|cell| match cell {
            Some(v) => json!({ "userEnteredValue": { "stringValue": v } }),
            None => json!({}),
        })
        .collect();
    json!({
        "appendCells": {
            "sheetId": sheet_id,
            "rows": [{ "values": values }],
            "fields": "userEnteredValue.stringValue",
        }
    })
}

pub fn add_sheet_request(title: &str) -> Value {
    json!({
        "addSheet": {
            "properties": {
                "title": title,
                "tabColor": { "red": 1, "blue": 1 },
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_columns_covers_exact_range() {
        let req = insert_columns_request(7, 4, 2);
        assert_eq!(req["insertDimension"]["range"]["startIndex"], 4);
        assert_eq!(req["insertDimension"]["range"]["endIndex"], 6);
        assert_eq!(req["insertDimension"]["range"]["sheetId"], 7);
    }

    #[test]
    fn append_cells_keeps_empty_cells_empty() {
        let req = append_cells_request(1, &[Some("a".into()), None, Some("c".into())]);
        let values = req["appendCells"]["rows"][0]["values"].as_array().unwrap();
        assert_eq!(values.len(), 3);
        assert_eq!(values[0]["userEnteredValue"]["stringValue"], "a");
        assert!(values[1].as_object().unwrap().is_empty());
        assert_eq!(values[2]["userEnteredValue"]["stringValue"], "c");
    }

    #[test]
    fn metadata_request_tags_the_field_name() {
        let req = create_metadata_request(3, "email", 5);
        let md = &req["createDeveloperMetadata"]["developerMetadata"];
        assert_eq!(md["metadataKey"], "fieldname");
        assert_eq!(md["metadataValue"], "email");
        assert_eq!(md["location"]["dimensionRange"]["startIndex"], 5);
        assert_eq!(md["location"]["dimensionRange"]["endIndex"], 6);
    }
}
