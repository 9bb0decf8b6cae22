use std::sync::Arc;

use sqlx::PgPool;

use crate::config::Config;
use crate::destinations::DestinationRegistry;
use crate::oauth::CredentialStore;

pub type SharedState = Arc<AppState>;

pub struct AppState {
    pub pool: PgPool,
    pub config: Config,
    pub destinations: DestinationRegistry,
    pub credentials: CredentialStore,
}
