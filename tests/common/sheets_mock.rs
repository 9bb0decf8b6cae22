//! In-process stand-in for the Sheets v4 REST API. Tracks created sheets,
//! developer metadata handles, and appended rows so tests can assert on the
//! exact sequence of mutations a synchronization run performs.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use axum::Router;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use serde_json::{Value, json};

#[derive(Debug, Clone)]
pub struct MetadataEntry {
    pub value: String,
    pub start_index: i64,
    pub sheet_id: i64,
}

#[derive(Debug, Default)]
pub struct SheetsMockState {
    next_sheet_id: i64,
    next_metadata_id: i64,
    /// When set, every handler returns this status instead of succeeding.
    pub fail_status: Option<u16>,
    pub metadata: HashMap<i64, MetadataEntry>,
    pub appended_rows: Vec<Vec<Value>>,
    pub batch_updates: Vec<Value>,
}

type Shared = Arc<Mutex<SheetsMockState>>;

pub struct SheetsMock {
    pub addr: SocketAddr,
    state: Shared,
}

impl SheetsMock {
    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn set_fail_status(&self, status: Option<u16>) {
        self.state.lock().unwrap().fail_status = status;
    }

    pub fn metadata_entries(&self) -> Vec<MetadataEntry> {
        self.state.lock().unwrap().metadata.values().cloned().collect()
    }

    pub fn metadata_for_field(&self, field: &str) -> Option<MetadataEntry> {
        self.state
            .lock()
            .unwrap()
            .metadata
            .values()
            .find(|e| e.value == field)
            .cloned()
    }

    pub fn appended_rows(&self) -> Vec<Vec<Value>> {
        self.state.lock().unwrap().appended_rows.clone()
    }

    pub fn batch_update_count(&self) -> usize {
        self.state.lock().unwrap().batch_updates.len()
    }
}

pub async fn spawn_sheets_mock() -> SheetsMock {
    let state: Shared = Arc::new(Mutex::new(SheetsMockState {
        next_sheet_id: 100,
        next_metadata_id: 1000,
        ..Default::default()
    }));

    let app = Router::new()
        .route(
            "/v4/spreadsheets/{id}/developerMetadata/{metadata_id}",
            get(developer_metadata),
        )
        // A trailing `:batchUpdate` is part of the final path segment, so the
        // same pattern serves both the metadata GET and the mutation POST.
        .route("/v4/spreadsheets/{id}", get(spreadsheet).post(batch_update))
        .with_state(state.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind sheets mock");
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("Sheets mock failed");
    });

    SheetsMock { addr, state }
}

fn injected_failure(state: &Shared) -> Option<Response> {
    let status = state.lock().unwrap().fail_status?;
    let status = StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    Some((status, axum::Json(json!({ "error": { "message": "injected" } }))).into_response())
}

async fn spreadsheet(State(state): State<Shared>, Path(_id): Path<String>) -> Response {
    if let Some(resp) = injected_failure(&state) {
        return resp;
    }
    axum::Json(json!({ "properties": { "title": "Test Spreadsheet" } })).into_response()
}

async fn developer_metadata(
    State(state): State<Shared>,
    Path((_id, metadata_id)): Path<(String, i64)>,
) -> Response {
    if let Some(resp) = injected_failure(&state) {
        return resp;
    }
    let state = state.lock().unwrap();
    match state.metadata.get(&metadata_id) {
        Some(entry) => axum::Json(json!({
            "metadataId": metadata_id,
            "metadataKey": "fieldname",
            "metadataValue": entry.value,
            "location": {
                "dimensionRange": {
                    "sheetId": entry.sheet_id,
                    "dimension": "COLUMNS",
                    "startIndex": entry.start_index,
                    "endIndex": entry.start_index + 1,
                }
            }
        }))
        .into_response(),
        None => (
            StatusCode::NOT_FOUND,
            axum::Json(json!({ "error": { "message": "metadata not found" } })),
        )
            .into_response(),
    }
}

async fn batch_update(
    State(state): State<Shared>,
    Path(_id): Path<String>,
    axum::Json(body): axum::Json<Value>,
) -> Response {
    if let Some(resp) = injected_failure(&state) {
        return resp;
    }
    let mut state = state.lock().unwrap();
    state.batch_updates.push(body.clone());

    let requests = body["requests"].as_array().cloned().unwrap_or_default();
    let mut replies = Vec::with_capacity(requests.len());

    for request in &requests {
        if request.get("addSheet").is_some() {
            let sheet_id = state.next_sheet_id;
            state.next_sheet_id += 1;
            replies.push(json!({
                "addSheet": { "properties": { "sheetId": sheet_id } }
            }));
        } else if let Some(create) = request.get("createDeveloperMetadata") {
            let md = &create["developerMetadata"];
            let range = &md["location"]["dimensionRange"];
            let metadata_id = state.next_metadata_id;
            state.next_metadata_id += 1;
            state.metadata.insert(
                metadata_id,
                MetadataEntry {
                    value: md["metadataValue"].as_str().unwrap_or_default().to_string(),
                    start_index: range["startIndex"].as_i64().unwrap_or_default(),
                    sheet_id: range["sheetId"].as_i64().unwrap_or_default(),
                },
            );
            replies.push(json!({
                "createDeveloperMetadata": {
                    "developerMetadata": { "metadataId": metadata_id }
                }
            }));
        } else if let Some(append) = request.get("appendCells") {
            let values = append["rows"][0]["values"]
                .as_array()
                .cloned()
                .unwrap_or_default();
            state.appended_rows.push(values);
            replies.push(json!({}));
        } else {
            replies.push(json!({}));
        }
    }

    axum::Json(json!({ "replies": replies })).into_response()
}
