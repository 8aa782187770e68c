use chrono::{DateTime, Utc};
use serde::Serialize;
use sonic_rs::Value;
use uuid::Uuid;

use crate::location::LocationData;

/// A GDPR data-portability export.
///
/// Carries the raw persisted blobs exactly as stored, so the user sees what
/// the site actually holds. Missing pieces are `null` rather than an error.
#[derive(Debug, Clone, Serialize)]
pub struct UserDataExport {
    /// A unique identifier for this export.
    pub export_id: Uuid,
    /// When the export was produced.
    pub exported_at: DateTime<Utc>,
    /// The raw persisted consent record, if present and parseable.
    pub consent: Option<Value>,
    /// The raw persisted granular consent record, if present and parseable.
    pub granular_consent: Option<Value>,
    /// The raw ephemeral session record, if present and parseable.
    pub session: Option<Value>,
    /// The location service's own cached location, if any.
    pub cached_location: Option<LocationData>,
}
