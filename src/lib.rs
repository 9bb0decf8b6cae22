pub mod config;
pub mod crypto;
pub mod db;
pub mod destinations;
pub mod error;
pub mod models;
pub mod oauth;
pub mod routes;
pub mod sheets;
pub mod state;
pub mod submission;
pub mod worker;

use std::sync::Arc;

use axum::Router;
use sqlx::PgPool;
use tower_http::trace::TraceLayer;

use crate::config::Config;
use crate::destinations::email::{EmailVariant, Mailer};
use crate::destinations::google_sheet::GoogleSheetVariant;
use crate::destinations::webhook::WebhookVariant;
use crate::destinations::{DestinationKind, DestinationRegistry};
use crate::oauth::CredentialStore;
use crate::sheets::client::SheetsClient;
use crate::sheets::sync::SheetSynchronizer;
use crate::state::{AppState, SharedState};

pub fn build_app(pool: PgPool, config: Config) -> (Router, SharedState) {
    let credentials = CredentialStore::new(
        pool.clone(),
        config.encryption_key.clone(),
        config.google_client_id.clone(),
        config.google_client_secret.clone(),
        config.oauth_token_url.clone(),
    )
    .expect("Failed to build credential store");

    let sheets_client =
        SheetsClient::new(config.sheets_base_url.clone()).expect("Failed to build Sheets client");
    let synchronizer = SheetSynchronizer::new(pool.clone(), sheets_client);

    let mailer = config.smtp.as_ref().and_then(|smtp| match Mailer::new(smtp) {
        Ok(mailer) => {
            tracing::info!("SMTP configured");
            Some(Arc::new(mailer))
        }
        Err(e) => {
            tracing::warn!("SMTP not available: {e}");
            None
        }
    });

    // Build the destination registry
    let mut destinations = DestinationRegistry::new();
    destinations.register(Arc::new(GoogleSheetVariant::new(
        pool.clone(),
        synchronizer,
        credentials.clone(),
    )));
    destinations.register(Arc::new(EmailVariant::new(
        DestinationKind::Gmail,
        mailer.clone(),
    )));
    destinations.register(Arc::new(EmailVariant::new(
        DestinationKind::Email,
        mailer,
    )));
    destinations.register(Arc::new(
        WebhookVariant::new().expect("Failed to build webhook client"),
    ));

    let state: SharedState = Arc::new(AppState {
        pool,
        config,
        destinations,
        credentials,
    });

    let router = Router::new()
        .merge(routes::ingest_routes())
        .route("/health", axum::routing::get(health))
        .layer(TraceLayer::new_for_http())
        .with_state(state.clone());

    (router, state)
}

async fn health() -> &'static str {
    "ok"
}
