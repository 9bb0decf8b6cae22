use std::collections::BTreeMap;

use serde_json::{Value, json};
use sqlx::PgPool;
use uuid::Uuid;

use crate::db;
use crate::destinations::ProcessError;
use crate::models::{SheetTemplate, Submission};

use super::client::{
    SheetsClient, add_sheet_request, append_cells_request, create_metadata_request,
    freeze_header_request, header_cells_request, insert_columns_request,
};
use super::registry;
use super::row;
use super::title;

/// Hard ceiling on grid width in the Sheets backend.
const MAX_COLUMNS: i64 = 18_278;

/// In an allocation batchUpdate the first three requests (insert columns,
/// header cells, freeze) produce no useful replies; metadata replies follow.
const ALLOCATION_PREAMBLE: usize = 3;

/// Keeps one spreadsheet tab's columns in sync with the evolving superset of
/// submitted field names and appends each submission as a row.
///
/// The column map on the attachment template is merged, never replaced, and
/// is persisted before the row append so a crash between the two leaves the
/// new columns discoverable on retry.
#[derive(Clone)]
pub struct SheetSynchronizer {
    pool: PgPool,
    client: SheetsClient,
}

impl SheetSynchronizer {
    pub fn new(pool: PgPool, client: SheetsClient) -> Self {
        Self { pool, client }
    }

    /// Run one synchronization attempt for one submission.
    pub async fn process(
        &self,
        token: &str,
        attachment_id: Uuid,
        submission: &Submission,
    ) -> Result<Option<Value>, ProcessError> {
        // Re-fetch the template: a previous failed attempt may already have
        // allocated and persisted columns for some of this submission's
        // fields, and those must not be treated as missing again.
        let attachment = db::endpoint_destinations::find_by_id(&self.pool, attachment_id)
            .await
            .map_err(|e| ProcessError::Transient(format!("Failed to load attachment: {e}")))?
            .ok_or_else(|| ProcessError::Permanent("Attachment no longer exists".into()))?;

        let template: SheetTemplate = serde_json::from_value(attachment.template)
            .map_err(|e| ProcessError::Permanent(format!("Malformed sheet template: {e}")))?;

        let data = submission
            .data
            .as_object()
            .ok_or_else(|| ProcessError::Permanent("Submission data is not an object".into()))?;

        let fields: Vec<&str> = data.keys().map(String::as_str).collect();
        validate_fieldnames(fields.iter().copied())?;

        // Fetch: current position of every known metadata handle. Positions
        // must be re-read each run because other operations may have shifted
        // absolute indices; the handles themselves stay valid.
        let mut positions: BTreeMap<String, i64> = BTreeMap::new();
        for (field, &metadata_id) in &template.columns {
            let metadata = self
                .client
                .developer_metadata(token, &template.spreadsheet_id, metadata_id)
                .await?;
            let start = metadata.start_index().ok_or_else(|| {
                ProcessError::Permanent(format!(
                    "Metadata handle {metadata_id} for field '{field}' has no column range"
                ))
            })?;
            positions.insert(field.clone(), start);
        }

        // Diff + allocate: new columns always go strictly to the right of the
        // furthest known column so relative order of existing handles never
        // changes.
        let missing = registry::diff_fields(&template.columns, fields.iter().copied());
        let mut columns_created = 0usize;
        if !missing.is_empty() {
            let insert_at = registry::furthest_column_index(&positions) + 1;
            if insert_at + missing.len() as i64 > MAX_COLUMNS {
                return Err(ProcessError::SchemaDrift(format!(
                    "Allocating {} new columns at index {insert_at} would exceed the {MAX_COLUMNS}-column limit",
                    missing.len()
                )));
            }

            let created = self
                .allocate_columns(token, &template.spreadsheet_id, template.sheet_id, &missing, insert_at)
                .await?;
            columns_created = created.len();

            // Persist the merged column map before appending; the remote
            // columns already exist, so losing this write would orphan them.
            db::endpoint_destinations::merge_columns(&self.pool, attachment_id, &created)
                .await
                .map_err(|e| {
                    ProcessError::Transient(format!("Failed to persist column map: {e}"))
                })?;

            for (offset, field) in missing.iter().enumerate() {
                positions.insert(field.clone(), insert_at + offset as i64);
            }
        }

        // Build + append.
        let position_to_field: BTreeMap<i64, String> =
            positions.iter().map(|(f, &p)| (p, f.clone())).collect();
        let cells = row::build_row(&position_to_field, data);

        self.client
            .batch_update(
                token,
                &template.spreadsheet_id,
                vec![append_cells_request(template.sheet_id, &cells)],
            )
            .await?;

        let width = format!("A:{}", title::to_title(cells.len().max(1) as u32));
        Ok(Some(json!({
            "spreadsheet_id": template.spreadsheet_id,
            "sheet_id": template.sheet_id,
            "columns_created": columns_created,
            "range": width,
        })))
    }

    /// One-time provisioning when a destination is attached: create a new tab
    /// in the chosen spreadsheet and seed it with any historically observed
    /// field names before the first live row is appended.
    pub async fn provision(
        &self,
        token: &str,
        spreadsheet_id: &str,
        tab_title: &str,
        seed_fields: &[String],
    ) -> Result<SheetTemplate, ProcessError> {
        validate_fieldnames(seed_fields.iter().map(String::as_str))?;
        if seed_fields.len() as i64 > MAX_COLUMNS {
            return Err(ProcessError::SchemaDrift(format!(
                "{} seed fields exceed the {MAX_COLUMNS}-column limit",
                seed_fields.len()
            )));
        }

        let title = self.client.spreadsheet_title(token, spreadsheet_id).await?;

        let replies = self
            .client
            .batch_update(token, spreadsheet_id, vec![add_sheet_request(tab_title)])
            .await?;
        let sheet_id = replies
            .first()
            .and_then(|r| r["addSheet"]["properties"]["sheetId"].as_i64())
            .ok_or_else(|| {
                ProcessError::Permanent("addSheet reply did not contain a sheet id".into())
            })?;

        let columns = if seed_fields.is_empty() {
            BTreeMap::new()
        } else {
            self.allocate_columns(token, spreadsheet_id, sheet_id, seed_fields, 0)
                .await?
        };

        Ok(SheetTemplate {
            spreadsheet_id: spreadsheet_id.to_string(),
            title,
            sheet_id,
            columns,
        })
    }

    /// Insert `fields.len()` columns at `insert_at`, write their header
    /// cells, freeze the header row, and create one developer-metadata handle
    /// per column, all in a single batchUpdate. Returns field -> metadata id.
    async fn allocate_columns(
        &self,
        token: &str,
        spreadsheet_id: &str,
        sheet_id: i64,
        fields: &[String],
        insert_at: i64,
    ) -> Result<BTreeMap<String, i64>, ProcessError> {
        let mut requests = vec![
            insert_columns_request(sheet_id, insert_at, fields.len()),
            header_cells_request(sheet_id, insert_at, fields),
            freeze_header_request(sheet_id),
        ];
        for (offset, field) in fields.iter().enumerate() {
            requests.push(create_metadata_request(
                sheet_id,
                field,
                insert_at + offset as i64,
            ));
        }

        let replies = self
            .client
            .batch_update(token, spreadsheet_id, requests)
            .await?;

        let metadata_replies = replies.get(ALLOCATION_PREAMBLE..).unwrap_or_default();
        if metadata_replies.len() != fields.len() {
            return Err(ProcessError::Permanent(format!(
                "Expected {} createDeveloperMetadata replies, got {}",
                fields.len(),
                metadata_replies.len()
            )));
        }

        let mut created = BTreeMap::new();
        for (field, reply) in fields.iter().zip(metadata_replies) {
            let id = reply["createDeveloperMetadata"]["developerMetadata"]["metadataId"]
                .as_i64()
                .ok_or_else(|| {
                    ProcessError::Permanent(format!(
                        "createDeveloperMetadata reply for field '{field}' has no metadata id"
                    ))
                })?;
            created.insert(field.clone(), id);
        }
        Ok(created)
    }
}

/// Reject field names the sheet cannot represent instead of truncating them.
fn validate_fieldnames<'a, I>(fields: I) -> Result<(), ProcessError>
where
    I: IntoIterator<Item = &'a str>,
{
    for field in fields {
        if field.is_empty() {
            return Err(ProcessError::SchemaDrift(
                "Field names must not be empty".into(),
            ));
        }
        if field.len() > 256 {
            let preview: String = field.chars().take(32).collect();
            return Err(ProcessError::SchemaDrift(format!(
                "Field name exceeds 256 characters: '{preview}...'"
            )));
        }
    }
    Ok(())
}

/// Where a batch of new columns lands relative to the currently known ones.
/// Pure planning helper; exercised directly by tests.
pub fn allocation_start(positions_by_field: &BTreeMap<String, i64>) -> i64 {
    registry::furthest_column_index(positions_by_field) + 1
}
