use std::net::IpAddr;

use axum::Json;
use axum::body::Bytes;
use axum::extract::{ConnectInfo, Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Redirect, Response};
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use crate::db;
use crate::error::AppError;
use crate::state::SharedState;
use crate::submission::{parser, pipeline};

#[derive(Debug, Deserialize)]
pub struct IngestQuery {
    token: Option<String>,
    redirect: Option<String>,
}

pub async fn ingest(
    State(state): State<SharedState>,
    Path(endpoint_id): Path<Uuid>,
    Query(query): Query<IngestQuery>,
    ConnectInfo(addr): ConnectInfo<std::net::SocketAddr>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, AppError> {
    let endpoint = db::endpoints::find_by_id(&state.pool, endpoint_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Endpoint not found".into()))?;

    let content_type = headers.get("content-type").and_then(|v| v.to_str().ok());
    let raw_data =
        parser::parse_body(content_type, &body).map_err(AppError::BadRequest)?;

    let peer_ip: Option<IpAddr> = Some(addr.ip());

    let result = pipeline::run(
        &state,
        &endpoint,
        &headers,
        peer_ip,
        raw_data,
        query.token.as_deref(),
        query.redirect.as_deref(),
    )
    .await?;

    // Browser form posts get redirected; API clients get JSON.
    if let Some(ref url) = result.redirect_url {
        if content_type.is_some_and(|ct| ct.contains("form")) {
            return Ok(Redirect::to(url).into_response());
        }
    }

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "status": "created",
            "submission_id": result.submission_id,
        })),
    )
        .into_response())
}
