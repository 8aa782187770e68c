use futures::future::BoxFuture;
use http::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use http::{HeaderMap, HeaderValue, Method};
use sonic_rs::Value;
use std::sync::Arc;
use std::time::{Duration, Instant};
use url::Url;

use crate::auth::AuthProvider;
use crate::client::fingerprint::{client_fingerprint, EnvironmentInfo};
use crate::client::rate_limit::{RateLimiter, AUTH_CATEGORY, DEFAULT_CATEGORY, UPLOAD_CATEGORY};
use crate::clock::Clock;
use crate::config::Config;
use crate::error::{ApiError, Result};
use crate::models::log::LogEntry;
use crate::services::logger::{LogSink, Logger};

/// Header names that survive sanitization. Everything else is dropped
/// silently.
const ALLOWED_HEADERS: [&str; 5] = [
    "content-type",
    "authorization",
    "x-api-key",
    "accept",
    "cache-control",
];

/// Header values are truncated to this many characters.
const MAX_HEADER_VALUE_CHARS: usize = 1000;

/// Options for a single [`SecureApiClient::fetch`] call.
#[derive(Debug, Clone)]
pub struct RequestOptions {
    /// The HTTP method.
    pub method: Method,
    /// Caller-supplied headers; passed through sanitization.
    pub headers: HeaderMap,
    /// A JSON body, serialized before sending.
    pub body: Option<Value>,
    /// A raw body (uploads); mutually exclusive with `body`.
    pub raw_body: Option<Vec<u8>>,
    /// The rate-limit category this request counts against.
    pub rate_category: String,
    /// When `true`, no bearer token is attached (login/signup flows).
    pub skip_auth: bool,
    /// When `true`, the content-type header is stripped entirely so the
    /// body can carry its own (e.g. a multipart boundary).
    pub omit_content_type: bool,
    /// Overrides the configured request timeout.
    pub timeout: Option<Duration>,
}

impl Default for RequestOptions {
    fn default() -> Self {
        Self {
            method: Method::GET,
            headers: HeaderMap::new(),
            body: None,
            raw_body: None,
            rate_category: DEFAULT_CATEGORY.to_string(),
            skip_auth: false,
            omit_content_type: false,
            timeout: None,
        }
    }
}

/// The single sanctioned path for outbound HTTP calls.
///
/// Adds URL validation, header sanitization, bearer-token injection,
/// fingerprint-keyed sliding-window rate limiting, timeouts and call
/// logging that ad hoc requests would otherwise skip.
pub struct SecureApiClient {
    http: reqwest::Client,
    config: Config,
    logger: Arc<Logger>,
    auth: Option<Arc<dyn AuthProvider>>,
    limiter: RateLimiter,
    clock: Arc<dyn Clock>,
    fingerprint: String,
}

impl SecureApiClient {
    /// Creates a new `SecureApiClient`.
    ///
    /// # Arguments
    ///
    /// * `config` - Base URL, environment, timeouts and rate limits.
    /// * `env_info` - The environment facts the rate-limit fingerprint is
    ///   derived from.
    /// * `logger` - Destination for call logs and degradation warnings.
    /// * `clock` - The time source for rate-limit windows and token expiry.
    ///
    /// # Returns
    ///
    /// A `Result` containing the client.
    pub fn new(
        config: Config,
        env_info: &EnvironmentInfo,
        logger: Arc<Logger>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        let http = reqwest::Client::builder().build()?;
        let limiter = RateLimiter::new(config.rate_limits.clone(), clock.clone());
        let fingerprint = client_fingerprint(env_info);

        Ok(Self {
            http,
            config,
            logger,
            auth: None,
            limiter,
            clock,
            fingerprint,
        })
    }

    /// Injects the auth-session collaborator.
    pub fn with_auth_provider(mut self, auth: Arc<dyn AuthProvider>) -> Self {
        self.auth = Some(auth);
        self
    }

    /// The fingerprint keying this client's rate-limit windows.
    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    /// Resolves and validates a request URL.
    ///
    /// Relative URLs resolve against the configured base URL. Rejected:
    /// non-HTTPS URLs in production, and cross-origin URLs when a base URL
    /// is configured.
    pub fn validate_url(&self, url: &str) -> Result<Url> {
        let resolved = match &self.config.base_url {
            Some(base) => base
                .join(url)
                .map_err(|e| ApiError::Validation(format!("Invalid URL '{}': {}", url, e)))?,
            None => Url::parse(url)
                .map_err(|e| ApiError::Validation(format!("Invalid URL '{}': {}", url, e)))?,
        };

        if self.config.environment.is_production() && resolved.scheme() != "https" {
            return Err(ApiError::Validation(
                "Only HTTPS URLs are allowed in production".to_string(),
            ));
        }

        if let Some(base) = &self.config.base_url {
            if resolved.host_str() != base.host_str() {
                return Err(ApiError::Validation(format!(
                    "Cross-origin request to '{}' is not allowed",
                    resolved.host_str().unwrap_or("unknown")
                )));
            }
        }

        Ok(resolved)
    }

    /// Sanitizes caller-supplied headers.
    ///
    /// Starts from the fixed JSON defaults, copies through only the header
    /// allow-list (case-insensitively), truncates each value to 1000
    /// characters and silently drops everything else.
    pub fn sanitize_headers(&self, headers: &HeaderMap) -> HeaderMap {
        let mut sanitized = HeaderMap::new();
        sanitized.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        sanitized.insert(ACCEPT, HeaderValue::from_static("application/json"));

        for (name, value) in headers {
            if !ALLOWED_HEADERS.contains(&name.as_str()) {
                continue;
            }
            let Ok(text) = value.to_str() else {
                continue;
            };
            let truncated: String = text.chars().take(MAX_HEADER_VALUE_CHARS).collect();
            if let Ok(value) = HeaderValue::from_str(&truncated) {
                sanitized.insert(name.clone(), value);
            }
        }

        sanitized
    }

    /// Attaches the bearer token from the auth collaborator, when one
    /// exists. Failures are logged at warning level and never block the
    /// request; it proceeds unauthenticated.
    async fn add_auth_headers(&self, headers: &mut HeaderMap) {
        let Some(auth) = &self.auth else {
            return;
        };

        match auth.current_session().await {
            Ok(Some(session)) if session.is_valid(self.clock.now()) => {
                match HeaderValue::from_str(&format!("Bearer {}", session.access_token)) {
                    Ok(value) => {
                        headers.insert(AUTHORIZATION, value);
                    }
                    Err(e) => {
                        tracing::warn!("⚠️ Access token is not a valid header value: {}", e);
                    }
                }
            }
            Ok(_) => {}
            Err(e) => {
                tracing::warn!("⚠️ Failed to resolve auth session: {}", e);
            }
        }
    }

    /// Issues one validated, rate-limited, logged request.
    ///
    /// Validation and rate-limit rejections are fatal and thrown before any
    /// network activity; the rate-limit message carries the remaining
    /// quota. The attempt (endpoint, method, status, duration) is logged
    /// regardless of outcome, and any non-2xx status becomes an error.
    pub async fn fetch(&self, url: &str, options: RequestOptions) -> Result<reqwest::Response> {
        let target = self.validate_url(url)?;

        if !self.limiter.is_allowed(&self.fingerprint, &options.rate_category) {
            let remaining = self
                .limiter
                .remaining_requests(&self.fingerprint, &options.rate_category);
            return Err(ApiError::RateLimitExceeded(format!(
                "Too many '{}' requests, {} remaining in the current window",
                options.rate_category, remaining
            )));
        }

        let mut headers = self.sanitize_headers(&options.headers);
        if options.omit_content_type {
            headers.remove(CONTENT_TYPE);
        }
        if !options.skip_auth {
            self.add_auth_headers(&mut headers).await;
        }

        let mut request = self
            .http
            .request(options.method.clone(), target.clone())
            .headers(headers);
        if let Some(body) = &options.body {
            let payload =
                sonic_rs::to_string(body).map_err(|e| ApiError::Serialization(e.to_string()))?;
            request = request.body(payload);
        } else if let Some(raw) = options.raw_body {
            request = request.body(raw);
        }

        let timeout = options
            .timeout
            .unwrap_or(Duration::from_secs(self.config.request_timeout_secs));
        let endpoint = target.path().to_string();
        let method = options.method.as_str().to_string();
        let started = Instant::now();

        // Dropping the in-flight future on timeout aborts the request.
        let outcome = tokio::time::timeout(timeout, request.send()).await;
        let duration_ms = started.elapsed().as_millis() as u64;

        match outcome {
            Err(_) => {
                self.logger
                    .api_call(&endpoint, &method, None, duration_ms)
                    .await;
                Err(ApiError::Timeout(timeout.as_secs()))
            }
            Ok(Err(e)) => {
                self.logger
                    .api_call(&endpoint, &method, None, duration_ms)
                    .await;
                Err(ApiError::Network(e))
            }
            Ok(Ok(response)) => {
                let status = response.status();
                self.logger
                    .api_call(&endpoint, &method, Some(status.as_u16()), duration_ms)
                    .await;

                if !status.is_success() {
                    return Err(ApiError::HttpStatus(status));
                }
                Ok(response)
            }
        }
    }

    /// Issues a GET request in the default category.
    pub async fn get(&self, url: &str) -> Result<reqwest::Response> {
        self.fetch(url, RequestOptions::default()).await
    }

    /// Issues a POST request with a JSON body in the default category.
    pub async fn post(&self, url: &str, body: Value) -> Result<reqwest::Response> {
        self.fetch(
            url,
            RequestOptions {
                method: Method::POST,
                body: Some(body),
                ..Default::default()
            },
        )
        .await
    }

    /// Issues a PUT request with a JSON body in the default category.
    pub async fn put(&self, url: &str, body: Value) -> Result<reqwest::Response> {
        self.fetch(
            url,
            RequestOptions {
                method: Method::PUT,
                body: Some(body),
                ..Default::default()
            },
        )
        .await
    }

    /// Issues a DELETE request in the default category.
    pub async fn delete(&self, url: &str) -> Result<reqwest::Response> {
        self.fetch(
            url,
            RequestOptions {
                method: Method::DELETE,
                ..Default::default()
            },
        )
        .await
    }

    /// Uploads a raw body in the `upload` category.
    ///
    /// The content-type header is stripped entirely (even when supplied) so
    /// the body can set its own, e.g. a multipart boundary.
    pub async fn upload(
        &self,
        url: &str,
        body: Vec<u8>,
        headers: HeaderMap,
    ) -> Result<reqwest::Response> {
        self.fetch(
            url,
            RequestOptions {
                method: Method::POST,
                headers,
                raw_body: Some(body),
                rate_category: UPLOAD_CATEGORY.to_string(),
                omit_content_type: true,
                ..Default::default()
            },
        )
        .await
    }

    /// Issues a login/signup request in the `auth` category.
    ///
    /// Never attaches a bearer token: this path exists to obtain one.
    pub async fn auth_request(&self, url: &str, body: Value) -> Result<reqwest::Response> {
        self.fetch(
            url,
            RequestOptions {
                method: Method::POST,
                body: Some(body),
                rate_category: AUTH_CATEGORY.to_string(),
                skip_auth: true,
                ..Default::default()
            },
        )
        .await
    }

    /// The quiet delivery path for the logger's remote sink.
    ///
    /// Unauthenticated, short timeout, no rate limiting, and no call
    /// logging (delivering a log entry must not produce another one).
    async fn deliver_log_entry(&self, entry: &LogEntry) -> Result<()> {
        let target = self.validate_url(&self.config.log_endpoint)?;
        let payload =
            sonic_rs::to_string(entry).map_err(|e| ApiError::Serialization(e.to_string()))?;

        let send = self
            .http
            .post(target)
            .header(CONTENT_TYPE, HeaderValue::from_static("application/json"))
            .body(payload)
            .send();

        let response = tokio::time::timeout(Duration::from_secs(self.config.log_timeout_secs), send)
            .await
            .map_err(|_| ApiError::Timeout(self.config.log_timeout_secs))??;

        if !response.status().is_success() {
            return Err(ApiError::HttpStatus(response.status()));
        }
        Ok(())
    }
}

impl LogSink for SecureApiClient {
    fn deliver<'a>(&'a self, entry: &'a LogEntry) -> BoxFuture<'a, Result<()>> {
        Box::pin(self.deliver_log_entry(entry))
    }
}
