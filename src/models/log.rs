use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sonic_rs::{JsonValueTrait, Value};
use uuid::Uuid;

fn value_is_null(value: &Value) -> bool {
    value.is_null()
}

/// Log severity, ordered from least to most severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    /// The severity for an API-call entry with the given HTTP status.
    /// `None` means the request never produced a response.
    pub fn for_status(status: Option<u16>) -> Self {
        match status {
            None => LogLevel::Error,
            Some(s) if s >= 500 => LogLevel::Error,
            Some(s) if s >= 400 => LogLevel::Warn,
            Some(_) => LogLevel::Info,
        }
    }
}

/// One structured log entry, as delivered to the remote logging endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    /// A unique identifier for this entry.
    pub id: Uuid,
    /// When the entry was recorded.
    pub timestamp: DateTime<Utc>,
    /// The entry's severity.
    pub level: LogLevel,
    /// The log message.
    pub message: String,
    /// Arbitrary extra fields attached by the caller.
    #[serde(default, skip_serializing_if = "value_is_null")]
    pub fields: Value,
    /// The client's user agent string.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
    /// The page URL current at the time of logging, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}
