use serde::Serialize;
use sonic_rs::Value;
use std::collections::HashMap;
use std::sync::Arc;

use crate::clock::Clock;
use crate::location::{LocationData, LocationService};
use crate::models::consent::{ConsentRecord, GranularConsent};
use crate::models::export::UserDataExport;
use crate::models::session::{GeneratedIdea, LocationSnapshot, SessionData, VisitedPage};
use crate::storage::StorageProvider;

/// High-accuracy location snapshots older than this are not used as a
/// cached fallback.
pub const HIGH_ACCURACY_MAX_AGE_MINUTES: i64 = 30;

const MILLIS_PER_MINUTE: i64 = 60 * 1000;

/// A partial update merged into the current session data.
///
/// `None` fields leave the stored value untouched; caps and interest
/// deduplication are applied after the merge.
#[derive(Debug, Default, Clone)]
pub struct SessionPatch {
    pub interests: Option<Vec<String>>,
    pub visited_pages: Option<Vec<VisitedPage>>,
    pub generated_ideas: Option<Vec<GeneratedIdea>>,
    pub location: Option<LocationSnapshot>,
    pub high_accuracy_location: Option<LocationSnapshot>,
}

/// A read-only projection of session data for the personalization engine.
#[derive(Debug, Clone, Default, Serialize)]
pub struct PersonalizationContext {
    /// A formatted "City, Region" string, when a location is cached.
    pub location: Option<String>,
    /// The visitor's deduplicated interests, most recent last.
    pub interests: Vec<String>,
    /// The pages visited this session, in visit order.
    pub visited_pages: Vec<String>,
    /// Previously generated ideas.
    pub recent_ideas: Vec<String>,
    /// The prompts that produced those ideas.
    pub recent_prompts: Vec<String>,
}

/// The single authority on whether behavioral data may be collected, and
/// the sole read/write path for that data.
///
/// Consent lives in persistent storage (30-day expiry), session data in
/// ephemeral storage (24-hour expiry). Expired records are deleted eagerly
/// at read time. No method here fails: storage and serialization errors
/// degrade to "no consent / no data" with a warning-level log, which is why
/// the signatures are `bool` / `Option<T>` rather than `Result`.
pub struct PrivacySessionManager {
    persistent: Arc<dyn StorageProvider>,
    ephemeral: Arc<dyn StorageProvider>,
    location_service: Option<Arc<dyn LocationService>>,
    clock: Arc<dyn Clock>,
    prefix: String,
}

impl PrivacySessionManager {
    /// Creates a new manager over the given stores.
    ///
    /// # Arguments
    ///
    /// * `persistent` - Long-lived storage for consent records.
    /// * `ephemeral` - Tab-scoped storage for session data.
    /// * `clock` - The time source for expiry checks.
    /// * `prefix` - The application storage-key prefix.
    pub fn new(
        persistent: Arc<dyn StorageProvider>,
        ephemeral: Arc<dyn StorageProvider>,
        clock: Arc<dyn Clock>,
        prefix: impl Into<String>,
    ) -> Self {
        Self {
            persistent,
            ephemeral,
            location_service: None,
            clock,
            prefix: prefix.into(),
        }
    }

    /// Injects the geolocation collaborator.
    pub fn with_location_service(mut self, service: Arc<dyn LocationService>) -> Self {
        self.location_service = Some(service);
        self
    }

    fn consent_key(&self) -> String {
        format!("{}_privacy_consent", self.prefix)
    }

    fn granular_key(&self) -> String {
        format!("{}_granular_consent", self.prefix)
    }

    fn session_key(&self) -> String {
        format!("{}_session_data", self.prefix)
    }

    /// Reads and parses a stored JSON record, degrading to `None` on any
    /// storage or parse failure.
    fn read_record<T: serde::de::DeserializeOwned>(
        &self,
        store: &dyn StorageProvider,
        key: &str,
    ) -> Option<T> {
        let raw = match store.get(key) {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(e) => {
                tracing::warn!("⚠️ Storage read failed for {}: {}", key, e);
                return None;
            }
        };

        match sonic_rs::from_str(&raw) {
            Ok(record) => Some(record),
            Err(e) => {
                tracing::warn!("⚠️ Malformed record under {}: {}", key, e);
                None
            }
        }
    }

    fn write_record<T: Serialize>(&self, store: &dyn StorageProvider, key: &str, record: &T) -> bool {
        let raw = match sonic_rs::to_string(record) {
            Ok(raw) => raw,
            Err(e) => {
                tracing::warn!("⚠️ Failed to serialize record for {}: {}", key, e);
                return false;
            }
        };

        match store.set(key, &raw) {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!("⚠️ Storage write failed for {}: {}", key, e);
                false
            }
        }
    }

    fn remove_key(&self, store: &dyn StorageProvider, key: &str) {
        if let Err(e) = store.remove(key) {
            tracing::warn!("⚠️ Storage remove failed for {}: {}", key, e);
        }
    }

    /// Reads the consent record, eagerly deleting it when expired.
    fn read_consent(&self) -> Option<ConsentRecord> {
        let record: ConsentRecord = self.read_record(self.persistent.as_ref(), &self.consent_key())?;
        if record.is_expired(self.clock.now_millis()) {
            tracing::debug!("🕑 Consent record expired, clearing");
            self.remove_key(self.persistent.as_ref(), &self.consent_key());
            return None;
        }
        Some(record)
    }

    /// Returns whether tracking is currently permitted.
    ///
    /// `false` when storage is unavailable, the record is absent or
    /// malformed, or the record is older than 30 days (in which case it is
    /// also removed).
    pub fn has_consent(&self) -> bool {
        self.read_consent().map(|c| c.granted).unwrap_or(false)
    }

    /// Alias for [`Self::has_consent`], named for the personalization call
    /// sites.
    pub fn can_personalize(&self) -> bool {
        self.has_consent()
    }

    /// Writes a fresh consent record with the current timestamp.
    ///
    /// Denying consent unconditionally deletes all session data as a side
    /// effect, before the record is written. Returns `false` (without
    /// panicking) when storage is unavailable.
    pub fn set_consent(&self, granted: bool) -> bool {
        if !granted {
            self.remove_key(self.ephemeral.as_ref(), &self.session_key());
            tracing::debug!("🗑️ Consent denied, session data cleared");
        }

        let record = ConsentRecord::new(granted, self.clock.now_millis());
        self.write_record(self.persistent.as_ref(), &self.consent_key(), &record)
    }

    /// Writes per-feature consent flags with the current timestamp.
    pub fn set_granular_consent(&self, features: HashMap<String, bool>) -> bool {
        let record = GranularConsent::new(features, self.clock.now_millis());
        self.write_record(self.persistent.as_ref(), &self.granular_key(), &record)
    }

    /// Returns the per-feature consent flags, honoring the same 30-day
    /// expiry as the top-level record (checked independently).
    pub fn granular_consent(&self) -> Option<HashMap<String, bool>> {
        let record: GranularConsent =
            self.read_record(self.persistent.as_ref(), &self.granular_key())?;
        if record.is_expired(self.clock.now_millis()) {
            tracing::debug!("🕑 Granular consent expired, clearing");
            self.remove_key(self.persistent.as_ref(), &self.granular_key());
            return None;
        }
        Some(record.features)
    }

    /// Returns `true` only if a valid granular record exists and the named
    /// feature flag is set.
    pub fn has_feature_consent(&self, feature: &str) -> bool {
        self.granular_consent()
            .and_then(|features| features.get(feature).copied())
            .unwrap_or(false)
    }

    /// Removes both consent records and all session data. Used for
    /// explicit withdrawal.
    pub fn clear_consent(&self) {
        self.remove_key(self.persistent.as_ref(), &self.consent_key());
        self.remove_key(self.persistent.as_ref(), &self.granular_key());
        self.remove_key(self.ephemeral.as_ref(), &self.session_key());
        tracing::info!("🗑️ Consent withdrawn, all tracking data cleared");
    }

    /// Returns the current session data.
    ///
    /// `None` without consent, or when the record is absent, malformed, or
    /// older than 24 hours (in which case it is also removed).
    pub fn session_data(&self) -> Option<SessionData> {
        if !self.has_consent() {
            return None;
        }

        let record: SessionData = self.read_record(self.ephemeral.as_ref(), &self.session_key())?;
        if record.is_expired(self.clock.now_millis()) {
            tracing::debug!("🕑 Session data expired, clearing");
            self.remove_key(self.ephemeral.as_ref(), &self.session_key());
            return None;
        }
        Some(record)
    }

    /// Merges `patch` into the current (or newly initialized) session data.
    ///
    /// Refreshes the last-write timestamp, deduplicates interests and
    /// applies the retention caps (10 interests / 20 visited pages / 5
    /// generated ideas, keeping the most recent). A no-op returning `false`
    /// without consent.
    pub fn update_session_data(&self, patch: SessionPatch) -> bool {
        if !self.has_consent() {
            return false;
        }

        let now = self.clock.now_millis();
        let mut data = self.session_data().unwrap_or_else(|| SessionData::empty(now));

        if let Some(interests) = patch.interests {
            data.interests = interests;
        }
        if let Some(visited_pages) = patch.visited_pages {
            data.visited_pages = visited_pages;
        }
        if let Some(generated_ideas) = patch.generated_ideas {
            data.generated_ideas = generated_ideas;
        }
        if let Some(location) = patch.location {
            data.location = Some(location);
        }
        if let Some(high_accuracy) = patch.high_accuracy_location {
            data.high_accuracy_location = Some(high_accuracy);
        }

        data.timestamp = now;
        data.apply_caps();

        self.write_record(self.ephemeral.as_ref(), &self.session_key(), &data)
    }

    /// Appends one interest to the session, deduplicating and keeping the
    /// most recent 10.
    pub fn add_interest(&self, interest: &str) -> bool {
        if !self.has_consent() {
            return false;
        }

        let mut interests = self
            .session_data()
            .map(|data| data.interests)
            .unwrap_or_default();
        interests.push(interest.to_string());

        self.update_session_data(SessionPatch {
            interests: Some(interests),
            ..Default::default()
        })
    }

    /// Appends one page visit to the session history, keeping the most
    /// recent 20.
    pub fn track_page_visit(&self, page: &str, metadata: Option<Value>) -> bool {
        if !self.has_consent() {
            return false;
        }

        let mut visited = self
            .session_data()
            .map(|data| data.visited_pages)
            .unwrap_or_default();
        visited.push(VisitedPage {
            page: page.to_string(),
            timestamp: self.clock.now_millis(),
            metadata,
        });

        self.update_session_data(SessionPatch {
            visited_pages: Some(visited),
            ..Default::default()
        })
    }

    /// Appends one generated idea to the session history, keeping the most
    /// recent 5.
    pub fn save_generated_idea(&self, idea: &str, user_prompt: &str) -> bool {
        if !self.has_consent() {
            return false;
        }

        let mut ideas = self
            .session_data()
            .map(|data| data.generated_ideas)
            .unwrap_or_default();
        ideas.push(GeneratedIdea {
            idea: idea.to_string(),
            user_prompt: user_prompt.to_string(),
            timestamp: self.clock.now_millis(),
        });

        self.update_session_data(SessionPatch {
            generated_ideas: Some(ideas),
            ..Default::default()
        })
    }

    fn cache_location(&self, location: &LocationData) {
        self.update_session_data(SessionPatch {
            location: Some(LocationSnapshot {
                location: location.clone(),
                cached_at: self.clock.now_millis(),
            }),
            ..Default::default()
        });
    }

    /// Returns the visitor's location, consent-gated.
    ///
    /// Without consent, returns `None` immediately with no suspension.
    /// With consent: the collaborator's cached location is preferred; a
    /// fresh lookup is awaited only when no cached value exists. Either
    /// result is cached into session data. With no collaborator injected,
    /// falls back to a previously stored, known location. Never fails.
    pub async fn get_location_data(&self) -> Option<LocationData> {
        if !self.has_consent() {
            return None;
        }

        let Some(service) = &self.location_service else {
            return self
                .session_data()
                .and_then(|data| data.location)
                .map(|snapshot| snapshot.location)
                .filter(LocationData::is_known);
        };

        if let Some(location) = service.current_location() {
            self.cache_location(&location);
            return Some(location);
        }

        match service.refresh().await {
            Some(location) => {
                self.cache_location(&location);
                Some(location)
            }
            None => {
                tracing::warn!("⚠️ Location refresh returned no result");
                None
            }
        }
    }

    /// Returns a high-accuracy location, consent-gated.
    ///
    /// Prefers a fresh request to the collaborator's high-accuracy path,
    /// falling back to a cached snapshot no older than 30 minutes.
    pub async fn get_high_accuracy_location(&self) -> Option<LocationData> {
        if !self.has_consent() {
            return None;
        }

        if let Some(service) = &self.location_service {
            if let Some(location) = service.request_high_accuracy().await {
                self.update_session_data(SessionPatch {
                    high_accuracy_location: Some(LocationSnapshot {
                        location: location.clone(),
                        cached_at: self.clock.now_millis(),
                    }),
                    ..Default::default()
                });
                return Some(location);
            }
            tracing::warn!("⚠️ High-accuracy location request returned no result");
        }

        let cutoff = self.clock.now_millis() - HIGH_ACCURACY_MAX_AGE_MINUTES * MILLIS_PER_MINUTE;
        self.session_data()
            .and_then(|data| data.high_accuracy_location)
            .filter(|snapshot| snapshot.cached_at >= cutoff)
            .map(|snapshot| snapshot.location)
            .filter(LocationData::is_known)
    }

    /// Assembles the read-only projection handed to the personalization
    /// engine. Empty without consent; never mutates state.
    pub fn personalization_context(&self) -> PersonalizationContext {
        if !self.has_consent() {
            return PersonalizationContext::default();
        }

        let Some(data) = self.session_data() else {
            return PersonalizationContext::default();
        };

        PersonalizationContext {
            location: data
                .location
                .as_ref()
                .filter(|snapshot| snapshot.location.is_known())
                .map(|snapshot| snapshot.location.display()),
            interests: data.interests.clone(),
            visited_pages: data
                .visited_pages
                .iter()
                .map(|visit| visit.page.clone())
                .collect(),
            recent_ideas: data
                .generated_ideas
                .iter()
                .map(|idea| idea.idea.clone())
                .collect(),
            recent_prompts: data
                .generated_ideas
                .iter()
                .map(|idea| idea.user_prompt.clone())
                .collect(),
        }
    }

    fn read_raw_value(&self, store: &dyn StorageProvider, key: &str) -> Option<Value> {
        match store.get(key) {
            Ok(Some(raw)) => match sonic_rs::from_str(&raw) {
                Ok(value) => Some(value),
                Err(e) => {
                    tracing::warn!("⚠️ Unparseable blob under {} in export: {}", key, e);
                    None
                }
            },
            Ok(None) => None,
            Err(e) => {
                tracing::warn!("⚠️ Storage read failed for {} in export: {}", key, e);
                None
            }
        }
    }

    /// GDPR data portability: every blob the site holds about the visitor,
    /// raw as stored. Missing pieces are `None` rather than an error.
    pub fn export_user_data(&self) -> UserDataExport {
        UserDataExport {
            export_id: uuid::Uuid::new_v4(),
            exported_at: self.clock.now(),
            consent: self.read_raw_value(self.persistent.as_ref(), &self.consent_key()),
            granular_consent: self.read_raw_value(self.persistent.as_ref(), &self.granular_key()),
            session: self.read_raw_value(self.ephemeral.as_ref(), &self.session_key()),
            cached_location: self
                .location_service
                .as_ref()
                .and_then(|service| service.current_location()),
        }
    }

    fn purge_prefixed_keys(&self, store: &dyn StorageProvider, scan_prefix: &str) {
        match store.keys() {
            Ok(keys) => {
                for key in keys {
                    if key.starts_with(scan_prefix) {
                        self.remove_key(store, &key);
                    }
                }
            }
            Err(e) => {
                tracing::warn!("⚠️ Key scan failed during erasure: {}", e);
            }
        }
    }

    /// GDPR erasure: clears both consent stores and session data, then
    /// scans both stores for any stray application-prefixed key and removes
    /// it. Keys created outside the prefix convention escape this scan.
    pub fn delete_all_user_data(&self) {
        self.clear_consent();

        let scan_prefix = format!("{}_", self.prefix);
        self.purge_prefixed_keys(self.persistent.as_ref(), &scan_prefix);
        self.purge_prefixed_keys(self.ephemeral.as_ref(), &scan_prefix);

        tracing::info!("🗑️ All user data deleted");
    }
}
