use std::net::IpAddr;

use ipnet::IpNet;

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub encryption_key: String,
    pub host: IpAddr,
    pub port: u16,
    pub google_client_id: Option<String>,
    pub google_client_secret: Option<String>,
    /// Base URL of the Sheets API; a configuration value, not behavior.
    pub sheets_base_url: String,
    pub oauth_token_url: String,
    pub worker_count: usize,
    pub task_timeout_secs: u64,
    pub trusted_proxies: Vec<IpNet>,
    pub log_level: String,
    pub smtp: Option<SmtpConfig>,
}

#[derive(Debug, Clone)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub pass: String,
    pub from: String,
}

impl Config {
    pub fn from_env() -> Result<Self, String> {
        let database_url = env_required("DATABASE_URL")?;
        let encryption_key = env_required("FORMRELAY_ENCRYPTION_KEY")?;

        let host: IpAddr = env_or("FORMRELAY_HOST", "0.0.0.0")
            .parse()
            .map_err(|e| format!("Invalid FORMRELAY_HOST: {e}"))?;

        let port: u16 = env_or("FORMRELAY_PORT", "3000")
            .parse()
            .map_err(|e| format!("Invalid FORMRELAY_PORT: {e}"))?;

        let google_client_id = std::env::var("GOOGLE_CLIENT_ID").ok();
        let google_client_secret = std::env::var("GOOGLE_CLIENT_SECRET").ok();

        let sheets_base_url = env_or(
            "FORMRELAY_SHEETS_BASE_URL",
            "https://sheets.googleapis.com",
        );
        let oauth_token_url = env_or(
            "FORMRELAY_OAUTH_TOKEN_URL",
            "https://oauth2.googleapis.com/token",
        );

        let worker_count: usize = env_or("FORMRELAY_WORKERS", "4")
            .parse()
            .map_err(|e| format!("Invalid FORMRELAY_WORKERS: {e}"))?;

        let task_timeout_secs: u64 = env_or("FORMRELAY_TASK_TIMEOUT_SECS", "30")
            .parse()
            .map_err(|e| format!("Invalid FORMRELAY_TASK_TIMEOUT_SECS: {e}"))?;

        let trusted_proxies: Vec<IpNet> = env_or("FORMRELAY_TRUSTED_PROXIES", "")
            .split(',')
            .filter(|s| !s.trim().is_empty())
            .map(|s| {
                s.trim()
                    .parse()
                    .map_err(|e| format!("Invalid FORMRELAY_TRUSTED_PROXIES entry '{s}': {e}"))
            })
            .collect::<Result<Vec<_>, _>>()?;

        let log_level = env_or("FORMRELAY_LOG_LEVEL", "info");

        let smtp = match (
            std::env::var("FORMRELAY_SMTP_HOST").ok(),
            std::env::var("FORMRELAY_SMTP_PORT").ok(),
            std::env::var("FORMRELAY_SMTP_USER").ok(),
            std::env::var("FORMRELAY_SMTP_PASS").ok(),
            std::env::var("FORMRELAY_SMTP_FROM").ok(),
        ) {
            (Some(host), Some(port), Some(user), Some(pass), Some(from)) => Some(SmtpConfig {
                host,
                port: port
                    .parse()
                    .map_err(|e| format!("Invalid FORMRELAY_SMTP_PORT: {e}"))?,
                user,
                pass,
                from,
            }),
            _ => None,
        };

        Ok(Config {
            database_url,
            encryption_key,
            host,
            port,
            google_client_id,
            google_client_secret,
            sheets_base_url,
            oauth_token_url,
            worker_count,
            task_timeout_secs,
            trusted_proxies,
            log_level,
            smtp,
        })
    }
}

fn env_required(key: &str) -> Result<String, String> {
    std::env::var(key).map_err(|_| format!("Missing required environment variable: {key}"))
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}
