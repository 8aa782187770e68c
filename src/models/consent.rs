use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// The current consent record schema version.
pub const CONSENT_VERSION: &str = "1.0";

/// Consent records older than this are treated as expired.
pub const CONSENT_MAX_AGE_DAYS: i64 = 30;

const MILLIS_PER_DAY: i64 = 24 * 60 * 60 * 1000;

/// The persisted decision governing whether tracking is allowed.
///
/// A record older than 30 days is expired and must be cleared before being
/// honored, regardless of `granted`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsentRecord {
    /// Whether personalization/tracking is currently permitted.
    pub granted: bool,
    /// When consent was last set, in milliseconds since the Unix epoch.
    pub timestamp: i64,
    /// Schema version tag for future migrations.
    pub version: String,
}

impl ConsentRecord {
    /// Creates a fresh record stamped at `now_millis`.
    pub fn new(granted: bool, now_millis: i64) -> Self {
        Self {
            granted,
            timestamp: now_millis,
            version: CONSENT_VERSION.to_string(),
        }
    }

    /// Returns `true` if the record is older than 30 days at `now_millis`.
    pub fn is_expired(&self, now_millis: i64) -> bool {
        now_millis - self.timestamp > CONSENT_MAX_AGE_DAYS * MILLIS_PER_DAY
    }
}

/// Optional per-feature consent flags, supplementing [`ConsentRecord`].
///
/// Same 30-day expiry as the top-level record, checked independently.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GranularConsent {
    /// One boolean flag per trackable feature.
    pub features: HashMap<String, bool>,
    /// When these flags were last set, in milliseconds since the Unix epoch.
    pub timestamp: i64,
    /// Schema version tag for future migrations.
    pub version: String,
}

impl GranularConsent {
    /// Creates a fresh record stamped at `now_millis`.
    pub fn new(features: HashMap<String, bool>, now_millis: i64) -> Self {
        Self {
            features,
            timestamp: now_millis,
            version: CONSENT_VERSION.to_string(),
        }
    }

    /// Returns `true` if the record is older than 30 days at `now_millis`.
    pub fn is_expired(&self, now_millis: i64) -> bool {
        now_millis - self.timestamp > CONSENT_MAX_AGE_DAYS * MILLIS_PER_DAY
    }
}
