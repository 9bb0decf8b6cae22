use std::net::IpAddr;

use axum::http::HeaderMap;
use regex::Regex;
use uuid::Uuid;

use crate::db;
use crate::error::AppError;
use crate::models::Endpoint;
use crate::state::SharedState;

use super::fields;
use super::metadata;

pub struct PipelineResult {
    pub submission_id: Uuid,
    pub redirect_url: Option<String>,
}

/// Accept one inbound payload: gate it against the endpoint's access rules,
/// persist it, and enqueue processing. Destination outcomes are an
/// owner-facing concern; the submitter sees success once the work is queued.
pub async fn run(
    state: &SharedState,
    endpoint: &Endpoint,
    headers: &HeaderMap,
    peer_addr: Option<IpAddr>,
    raw_data: serde_json::Value,
    query_token: Option<&str>,
    query_redirect: Option<&str>,
) -> Result<PipelineResult, AppError> {
    // Secret-token endpoints are unguessable: a bad token looks like a
    // missing endpoint, not a forbidden one.
    if let Some(expected) = endpoint.token.as_deref() {
        if query_token != Some(expected) {
            return Err(AppError::NotFound("Endpoint not found".into()));
        }
    }

    let meta = metadata::extract(headers, peer_addr, &state.config.trusted_proxies);

    if let Some(pattern) = endpoint.referrer_pattern.as_deref() {
        let re = Regex::new(pattern).map_err(|e| {
            AppError::Internal(format!("Invalid referrer pattern on endpoint: {e}"))
        })?;
        let allowed = meta.referrer.as_deref().is_some_and(|r| re.is_match(r));
        if !allowed {
            return Err(AppError::Forbidden("Referrer not allowed".into()));
        }
    }

    if endpoint.strict {
        let declared = fields::declared_names(endpoint.fields.as_ref());
        let unknown = fields::unknown_fields(&raw_data, &declared);
        if !unknown.is_empty() {
            return Err(AppError::BadRequest(format!(
                "Unknown fields: {}",
                unknown.join(", ")
            )));
        }
    }

    let submission = db::submissions::create(
        &state.pool,
        endpoint.id,
        &raw_data,
        meta.referrer.as_deref(),
        meta.user_agent.as_deref(),
        meta.ip.as_deref(),
    )
    .await?;

    db::process_queue::enqueue(&state.pool, submission.id).await?;

    let redirect_url = query_redirect
        .map(|s| s.to_string())
        .or_else(|| endpoint.redirect_url.clone());

    Ok(PipelineResult {
        submission_id: submission.id,
        redirect_url,
    })
}
