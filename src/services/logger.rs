use chrono::Utc;
use futures::future::BoxFuture;
use sonic_rs::{json, Value};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;
use uuid::Uuid;

use crate::client::fingerprint::EnvironmentInfo;
use crate::config::Environment;
use crate::error::Result;
use crate::models::log::{LogEntry, LogLevel};

/// The maximum number of undelivered entries kept locally.
pub const LOG_BUFFER_CAPACITY: usize = 100;

/// The remote destination for structured log entries.
///
/// Implemented by [`crate::client::secure::SecureApiClient`]; injected so
/// the logger stays a dependency leaf and tests can script delivery
/// failures.
pub trait LogSink: Send + Sync {
    /// Delivers one entry. Best-effort; failures are recovered by the
    /// logger's local buffer.
    fn deliver<'a>(&'a self, entry: &'a LogEntry) -> BoxFuture<'a, Result<()>>;
}

/// A structured logging facade with graceful degradation.
///
/// Entries below the minimum level for the build environment are dropped.
/// Development builds mirror every entry to the console (via `tracing`);
/// delivery to the remote sink is asynchronous and best-effort, with
/// failed entries falling back to a capped local buffer.
pub struct Logger {
    environment: Environment,
    min_level: LogLevel,
    user_agent: String,
    current_url: RwLock<Option<String>>,
    buffer: Mutex<VecDeque<LogEntry>>,
    sink: RwLock<Option<Arc<dyn LogSink>>>,
}

impl Logger {
    /// Creates a new `Logger` for the given environment.
    ///
    /// Production builds log warnings and above; development builds log
    /// everything.
    pub fn new(environment: Environment, env_info: &EnvironmentInfo) -> Self {
        let min_level = if environment.is_production() {
            LogLevel::Warn
        } else {
            LogLevel::Debug
        };

        Self {
            environment,
            min_level,
            user_agent: env_info.user_agent.clone(),
            current_url: RwLock::new(None),
            buffer: Mutex::new(VecDeque::new()),
            sink: RwLock::new(None),
        }
    }

    /// Attaches the remote delivery sink. Entries logged before this call
    /// go straight to the local buffer.
    pub fn attach_sink(&self, sink: Arc<dyn LogSink>) {
        *self.sink.write().unwrap() = Some(sink);
    }

    /// Records the page URL stamped onto subsequent entries.
    pub fn set_current_url(&self, url: impl Into<String>) {
        *self.current_url.write().unwrap() = Some(url.into());
    }

    fn build_entry(&self, level: LogLevel, message: &str, fields: Value) -> LogEntry {
        LogEntry {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            level,
            message: message.to_string(),
            fields,
            user_agent: Some(self.user_agent.clone()),
            url: self.current_url.read().unwrap().clone(),
        }
    }

    fn mirror_to_console(&self, entry: &LogEntry) {
        if !self.environment.is_development() {
            return;
        }
        let fields = sonic_rs::to_string(&entry.fields).unwrap_or_default();
        match entry.level {
            LogLevel::Debug => tracing::debug!(fields = %fields, "{}", entry.message),
            LogLevel::Info => tracing::info!(fields = %fields, "{}", entry.message),
            LogLevel::Warn => tracing::warn!(fields = %fields, "{}", entry.message),
            LogLevel::Error => tracing::error!(fields = %fields, "{}", entry.message),
        }
    }

    fn buffer_entry(&self, entry: LogEntry) {
        let mut buffer = self.buffer.lock().unwrap();
        buffer.push_back(entry);
        while buffer.len() > LOG_BUFFER_CAPACITY {
            buffer.pop_front();
        }
    }

    /// Records one entry at the given level.
    ///
    /// Filters below the minimum level, mirrors to the console in
    /// development, then attempts remote delivery; on failure the entry is
    /// buffered locally so it is not silently lost.
    pub async fn log(&self, level: LogLevel, message: &str, fields: Value) {
        if level < self.min_level {
            return;
        }

        let entry = self.build_entry(level, message, fields);
        self.mirror_to_console(&entry);

        let sink = self.sink.read().unwrap().clone();
        match sink {
            Some(sink) => {
                if let Err(e) = sink.deliver(&entry).await {
                    tracing::warn!("⚠️ Log delivery failed, buffering entry: {}", e);
                    self.buffer_entry(entry);
                }
            }
            None => self.buffer_entry(entry),
        }
    }

    /// Records a debug entry.
    pub async fn debug(&self, message: &str, fields: Value) {
        self.log(LogLevel::Debug, message, fields).await;
    }

    /// Records an info entry.
    pub async fn info(&self, message: &str, fields: Value) {
        self.log(LogLevel::Info, message, fields).await;
    }

    /// Records a warning entry.
    pub async fn warn(&self, message: &str, fields: Value) {
        self.log(LogLevel::Warn, message, fields).await;
    }

    /// Records an error entry.
    pub async fn error(&self, message: &str, fields: Value) {
        self.log(LogLevel::Error, message, fields).await;
    }

    /// Records a performance timing entry.
    pub async fn performance(&self, operation: &str, duration: Duration) {
        self.info(
            "performance",
            json!({
                "operation": operation,
                "duration_ms": duration.as_millis() as u64,
            }),
        )
        .await;
    }

    /// Records a user-action entry.
    pub async fn user_action(&self, action: &str, fields: Value) {
        self.info(
            "user_action",
            json!({
                "action": action,
                "details": fields,
            }),
        )
        .await;
    }

    /// Records a route change and updates the URL stamped onto subsequent
    /// entries.
    pub async fn route_change(&self, from: &str, to: &str) {
        self.set_current_url(to);
        self.info(
            "route_change",
            json!({
                "from": from,
                "to": to,
            }),
        )
        .await;
    }

    /// Records an API-call entry with status-dependent severity: 5xx and
    /// missing responses log as errors, 4xx as warnings, the rest as info.
    pub async fn api_call(
        &self,
        endpoint: &str,
        method: &str,
        status: Option<u16>,
        duration_ms: u64,
    ) {
        let level = LogLevel::for_status(status);
        self.log(
            level,
            "api_call",
            json!({
                "endpoint": endpoint,
                "method": method,
                "status": status,
                "duration_ms": duration_ms,
            }),
        )
        .await;
    }

    /// Returns a copy of the locally buffered (undelivered) entries.
    pub fn buffered_entries(&self) -> Vec<LogEntry> {
        self.buffer.lock().unwrap().iter().cloned().collect()
    }

    /// Installs a process-wide panic hook that funnels panics into the
    /// error log path.
    ///
    /// The hook cannot await, so entries go straight to the local buffer
    /// and the console; the analogue of a browser's uncaught-error handler.
    pub fn install_panic_hook(self: &Arc<Self>) {
        let logger = Arc::clone(self);
        let previous = std::panic::take_hook();
        std::panic::set_hook(Box::new(move |info| {
            let message = info
                .payload()
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| info.payload().downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "panic with non-string payload".to_string());
            let location = info
                .location()
                .map(|l| format!("{}:{}", l.file(), l.line()));

            let entry = logger.build_entry(
                LogLevel::Error,
                "unhandled_panic",
                json!({
                    "panic_message": message,
                    "location": location,
                }),
            );
            tracing::error!("❌ Unhandled panic: {}", message);
            logger.buffer_entry(entry);

            previous(info);
        }));
    }
}
