pub mod sheets_mock;

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use reqwest::{Client, StatusCode};
use serde_json::{Value, json};
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use uuid::Uuid;

use formrelay::config::Config;
use formrelay::db;
use formrelay::models::{Destination, Endpoint, Organization, User};
use formrelay::state::SharedState;

use sheets_mock::{SheetsMock, spawn_sheets_mock};

/// A running test server with a dedicated test database and an in-process
/// Sheets API mock the app's Sheets client is pointed at.
pub struct TestApp {
    pub addr: SocketAddr,
    pub pool: PgPool,
    pub client: Client,
    pub db_name: String,
    pub state: SharedState,
    pub sheets: SheetsMock,
}

impl TestApp {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    /// Create an organization with one user and a stored Google grant.
    pub async fn seed_account(&self, name: &str) -> (Organization, User) {
        let org = db::organizations::create(&self.pool, name)
            .await
            .expect("create organization failed");
        let user = db::users::create(&self.pool, &format!("{name}@test.com"), org.id)
            .await
            .expect("create user failed");
        self.state
            .credentials
            .store_grant(user.id, "test-access-token", None, None)
            .await
            .expect("store grant failed");
        (org, user)
    }

    pub async fn create_endpoint(&self, org_id: Uuid, name: &str) -> Endpoint {
        db::endpoints::create(
            &self.pool,
            &db::endpoints::NewEndpoint {
                organization_id: org_id,
                name,
                token: None,
                redirect_url: None,
                referrer_pattern: None,
                strict: false,
                fields: None,
            },
        )
        .await
        .expect("create endpoint failed")
    }

    pub async fn create_destination(&self, user_id: Uuid, kind: &str) -> Destination {
        db::destinations::create(&self.pool, user_id, kind, &json!({}))
            .await
            .expect("create destination failed")
    }

    /// Attach a destination to an endpoint through the variant registry,
    /// running its provisioning against the mock.
    pub async fn attach(
        &self,
        endpoint_id: Uuid,
        destination_id: Uuid,
        args: Value,
    ) -> Result<formrelay::models::EndpointDestination, formrelay::error::AppError> {
        formrelay::destinations::attach_destination(
            &self.pool,
            &self.state.destinations,
            endpoint_id,
            destination_id,
            &args,
        )
        .await
    }

    pub async fn submit_json(&self, endpoint_id: Uuid, data: &Value) -> (Value, StatusCode) {
        let resp = self
            .client
            .post(self.url(&format!("/v1/f/{endpoint_id}")))
            .json(data)
            .send()
            .await
            .expect("submit json failed");
        let status = resp.status();
        let body: Value = resp.json().await.unwrap_or(json!(null));
        (body, status)
    }

    pub async fn submit_form(
        &self,
        endpoint_id: Uuid,
        query: &str,
        data: &[(&str, &str)],
    ) -> reqwest::Response {
        self.client
            .post(self.url(&format!("/v1/f/{endpoint_id}{query}")))
            .form(data)
            .send()
            .await
            .expect("submit form failed")
    }

    /// Run queued submissions to completion the way a worker would.
    pub async fn drain_queue(&self) {
        loop {
            match formrelay::worker::process_next(&self.state).await {
                Ok(true) => continue,
                Ok(false) => break,
                Err(e) => panic!("queue processing failed: {e}"),
            }
        }
    }

    /// Clear a pending retry's backoff so the next drain picks it up now.
    pub async fn expire_backoff(&self) {
        sqlx::query("UPDATE process_queue SET next_retry_at = NOW() WHERE status = 'pending'")
            .execute(&self.pool)
            .await
            .expect("expire backoff failed");
    }

    pub async fn queue_status(&self, submission_id: Uuid) -> String {
        sqlx::query_scalar::<_, String>(
            "SELECT status FROM process_queue WHERE submission_id = $1",
        )
        .bind(submission_id)
        .fetch_one(&self.pool)
        .await
        .expect("queue status lookup failed")
    }
}

/// Spawn a test app with a fresh temporary database and its own Sheets mock.
pub async fn spawn_app() -> TestApp {
    let _ = dotenvy::dotenv();

    let base_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set for tests");

    let db_name = format!(
        "formrelay_test_{}",
        Uuid::now_v7().to_string().replace('-', "")
    );

    let admin_url = base_url
        .rsplit_once('/')
        .map(|(base, _)| format!("{base}/postgres"))
        .unwrap_or_else(|| base_url.clone());

    let admin_pool = PgPoolOptions::new()
        .max_connections(2)
        .connect(&admin_url)
        .await
        .expect("Failed to connect to postgres for test DB creation");

    sqlx::query(&format!("CREATE DATABASE \"{db_name}\""))
        .execute(&admin_pool)
        .await
        .expect("Failed to create test database");

    admin_pool.close().await;

    let test_url = base_url
        .rsplit_once('/')
        .map(|(base, _)| format!("{base}/{db_name}"))
        .unwrap_or_else(|| base_url.clone());

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&test_url)
        .await
        .expect("Failed to connect to test database");

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("Failed to run migrations on test database");

    let sheets = spawn_sheets_mock().await;

    let config = Config {
        database_url: test_url,
        encryption_key: "test-encryption-key-32-chars-ok!".to_string(),
        host: "127.0.0.1".parse().unwrap(),
        port: 0, // unused, we bind to random port
        google_client_id: None,
        google_client_secret: None,
        sheets_base_url: sheets.base_url(),
        oauth_token_url: format!("{}/token", sheets.base_url()),
        worker_count: 1,
        task_timeout_secs: 5,
        trusted_proxies: vec![],
        log_level: "warn".to_string(),
        smtp: None,
    };

    let (app, state) = formrelay::build_app(pool.clone(), config);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind to random port");
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .await
        .expect("Server failed");
    });

    let client = Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .build()
        .unwrap();

    TestApp {
        addr,
        pool,
        client,
        db_name,
        state,
        sheets,
    }
}

/// A webhook receiver that counts hits and answers with a fixed status.
pub struct WebhookSink {
    pub url: String,
    hits: Arc<AtomicUsize>,
}

impl WebhookSink {
    pub fn hits(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }
}

pub async fn spawn_webhook_sink(status: u16) -> WebhookSink {
    let hits = Arc::new(AtomicUsize::new(0));
    let counter = hits.clone();

    let app = axum::Router::new().route(
        "/hook",
        axum::routing::post(move || {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                axum::http::StatusCode::from_u16(status)
                    .unwrap_or(axum::http::StatusCode::INTERNAL_SERVER_ERROR)
            }
        }),
    );

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind webhook sink");
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("Webhook sink failed");
    });

    WebhookSink {
        url: format!("http://{addr}/hook"),
        hits,
    }
}

/// Drop the test database after tests complete.
pub async fn cleanup(app: TestApp) {
    let db_name = app.db_name.clone();
    app.pool.close().await;

    let base_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set for tests");
    let admin_url = base_url
        .rsplit_once('/')
        .map(|(base, _)| format!("{base}/postgres"))
        .unwrap_or_else(|| base_url.clone());

    let admin_pool = PgPoolOptions::new()
        .max_connections(2)
        .connect(&admin_url)
        .await
        .expect("Failed to connect for cleanup");

    let _ = sqlx::query(&format!("DROP DATABASE IF EXISTS \"{db_name}\" WITH (FORCE)"))
        .execute(&admin_pool)
        .await;

    admin_pool.close().await;
}
