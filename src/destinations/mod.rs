pub mod context;
pub mod email;
pub mod google_sheet;
pub mod template;
pub mod webhook;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

use crate::db;
use crate::error::AppError;
use crate::models::{Destination, Endpoint, EndpointDestination};

use context::ProcessContext;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DestinationKind {
    GoogleSheet,
    Gmail,
    Webhook,
    Email,
}

impl DestinationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DestinationKind::GoogleSheet => "google_sheet",
            DestinationKind::Gmail => "gmail",
            DestinationKind::Webhook => "webhook",
            DestinationKind::Email => "email",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "google_sheet" => Some(DestinationKind::GoogleSheet),
            "gmail" => Some(DestinationKind::Gmail),
            "webhook" => Some(DestinationKind::Webhook),
            "email" => Some(DestinationKind::Email),
            _ => None,
        }
    }
}

impl std::fmt::Display for DestinationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Failure taxonomy for destination processing. Only transient errors are
/// eligible for task-level retry; the rest are surfaced to the owner.
#[derive(Debug)]
pub enum ProcessError {
    /// Missing or revoked OAuth credential for the destination owner.
    Credential(String),
    /// Rate limit or upstream 5xx; retried with backoff.
    Transient(String),
    /// Spreadsheet deleted, permission revoked, malformed template.
    Permanent(String),
    /// Field name collides with limits the sheet cannot represent.
    SchemaDrift(String),
}

impl ProcessError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, ProcessError::Transient(_))
    }

    /// Whether this failure should be flagged on the destination row so the
    /// owner sees it out-of-band.
    pub fn disables_destination(&self) -> bool {
        matches!(
            self,
            ProcessError::Credential(_) | ProcessError::Permanent(_)
        )
    }
}

impl std::fmt::Display for ProcessError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProcessError::Credential(msg) => write!(f, "credential error: {msg}"),
            ProcessError::Transient(msg) => write!(f, "transient error: {msg}"),
            ProcessError::Permanent(msg) => write!(f, "permanent error: {msg}"),
            ProcessError::SchemaDrift(msg) => write!(f, "schema drift: {msg}"),
        }
    }
}

impl std::error::Error for ProcessError {}

/// One destination variant (Google Sheets, Gmail, webhook, email).
///
/// `create_attachment` performs the one-time provisioning when a destination
/// is attached to an endpoint and returns the initial template blob.
/// `process` delivers a single submission to one attachment.
#[async_trait]
pub trait DestinationVariant: Send + Sync {
    fn kind(&self) -> DestinationKind;

    /// Whether `value` is a plausible target for this variant (e.g. a Google
    /// Sheets URL). Separate from ownership/credential checks.
    fn is_valid(&self, value: &str) -> bool;

    async fn create_attachment(
        &self,
        destination: &Destination,
        endpoint: &Endpoint,
        args: &serde_json::Value,
    ) -> Result<serde_json::Value, ProcessError>;

    async fn process(
        &self,
        ctx: &ProcessContext,
        destination: &Destination,
        attachment: &EndpointDestination,
    ) -> Result<Option<serde_json::Value>, ProcessError>;
}

pub struct DestinationRegistry {
    variants: HashMap<DestinationKind, Arc<dyn DestinationVariant>>,
}

impl DestinationRegistry {
    pub fn new() -> Self {
        Self {
            variants: HashMap::new(),
        }
    }

    pub fn register(&mut self, variant: Arc<dyn DestinationVariant>) {
        self.variants.insert(variant.kind(), variant);
    }

    pub fn get(&self, kind: &str) -> Option<&Arc<dyn DestinationVariant>> {
        DestinationKind::parse(kind).and_then(|k| self.variants.get(&k))
    }
}

impl Default for DestinationRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Attach a destination to an endpoint, running the variant's initial
/// provisioning. One attachment per (endpoint, destination) pair is enforced.
pub async fn attach_destination(
    pool: &PgPool,
    registry: &DestinationRegistry,
    endpoint_id: Uuid,
    destination_id: Uuid,
    args: &serde_json::Value,
) -> Result<EndpointDestination, AppError> {
    let endpoint = db::endpoints::find_by_id(pool, endpoint_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Endpoint not found".into()))?;

    let destination = db::destinations::find_by_id(pool, destination_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Destination not found".into()))?;

    let variant = registry.get(&destination.kind).ok_or_else(|| {
        AppError::BadRequest(format!("Unknown destination kind: {}", destination.kind))
    })?;

    if db::endpoint_destinations::exists(pool, endpoint_id, destination_id).await? {
        return Err(AppError::Conflict(
            "Destination is already attached to this endpoint".into(),
        ));
    }

    let template = variant
        .create_attachment(&destination, &endpoint, args)
        .await
        .map_err(|e| match e {
            ProcessError::Credential(msg) => AppError::BadRequest(msg),
            ProcessError::SchemaDrift(msg) => AppError::BadRequest(msg),
            ProcessError::Permanent(msg) => AppError::BadRequest(msg),
            ProcessError::Transient(msg) => AppError::Internal(msg),
        })?;

    let attachment =
        db::endpoint_destinations::create(pool, endpoint_id, destination_id, &template).await?;

    tracing::info!(
        "Attached {} destination {destination_id} to endpoint {endpoint_id}",
        destination.kind
    );

    Ok(attachment)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_round_trip() {
        for kind in [
            DestinationKind::GoogleSheet,
            DestinationKind::Gmail,
            DestinationKind::Webhook,
            DestinationKind::Email,
        ] {
            assert_eq!(DestinationKind::parse(kind.as_str()), Some(kind));
        }
        assert_eq!(DestinationKind::parse("slack"), None);
    }

    #[test]
    fn only_transient_errors_retry() {
        assert!(ProcessError::Transient("503".into()).is_retryable());
        assert!(!ProcessError::Credential("revoked".into()).is_retryable());
        assert!(!ProcessError::Permanent("404".into()).is_retryable());
        assert!(!ProcessError::SchemaDrift("too wide".into()).is_retryable());
    }

    #[test]
    fn permanent_failures_disable_the_destination() {
        assert!(ProcessError::Credential("revoked".into()).disables_destination());
        assert!(ProcessError::Permanent("deleted".into()).disables_destination());
        assert!(!ProcessError::Transient("rate limited".into()).disables_destination());
    }
}
