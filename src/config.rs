use anyhow::{Context, Result};
use std::env;
use url::Url;

use crate::client::rate_limit::RateLimitConfig;

/// The build environment, driving HTTPS enforcement and log verbosity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Development,
    Production,
}

impl Environment {
    /// Returns `true` in production builds.
    pub fn is_production(&self) -> bool {
        matches!(self, Environment::Production)
    }

    /// Returns `true` in development builds.
    pub fn is_development(&self) -> bool {
        matches!(self, Environment::Development)
    }
}

/// The client's configuration.
#[derive(Clone)]
pub struct Config {
    /// The base URL all relative requests resolve against. When set, every
    /// resolved request must land on the same host.
    pub base_url: Option<Url>,
    /// The build environment.
    pub environment: Environment,
    /// The per-request timeout in seconds.
    pub request_timeout_secs: u64,
    /// The remote logging endpoint (absolute, or relative to `base_url`).
    pub log_endpoint: String,
    /// The timeout for best-effort log delivery, in seconds.
    pub log_timeout_secs: u64,
    /// The prefix all application storage keys share.
    pub storage_prefix: String,
    /// Per-category rate limits.
    pub rate_limits: RateLimitConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_url: None,
            environment: Environment::Development,
            request_timeout_secs: 30,
            log_endpoint: "/api/logs".to_string(),
            log_timeout_secs: 5,
            storage_prefix: "inkstudio".to_string(),
            rate_limits: RateLimitConfig::default(),
        }
    }
}

impl Config {
    /// Creates a new `Config` from environment variables.
    ///
    /// # Returns
    ///
    /// A `Result` containing the `Config`.
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let environment = match env::var("APP_ENV")
            .unwrap_or_else(|_| "development".to_string())
            .to_lowercase()
            .as_str()
        {
            "production" | "prod" => Environment::Production,
            _ => Environment::Development,
        };

        let base_url = match env::var("API_BASE_URL") {
            Ok(raw) => Some(Url::parse(&raw).context("API_BASE_URL must be a valid URL")?),
            Err(_) => None,
        };

        Ok(Self {
            base_url,
            environment,
            request_timeout_secs: env::var("REQUEST_TIMEOUT_SECS")
                .unwrap_or_else(|_| "30".to_string())
                .parse()
                .context("Invalid REQUEST_TIMEOUT_SECS")?,
            log_endpoint: env::var("LOG_ENDPOINT").unwrap_or_else(|_| "/api/logs".to_string()),
            log_timeout_secs: env::var("LOG_TIMEOUT_SECS")
                .unwrap_or_else(|_| "5".to_string())
                .parse()
                .context("Invalid LOG_TIMEOUT_SECS")?,
            storage_prefix: env::var("STORAGE_PREFIX")
                .unwrap_or_else(|_| "inkstudio".to_string()),
            rate_limits: RateLimitConfig::default(),
        })
    }
}
