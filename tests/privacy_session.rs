use chrono::DateTime;
use futures::future::BoxFuture;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use studio_client::models::session::{MAX_INTERESTS, MAX_VISITED_PAGES};
use studio_client::storage::UnavailableStorage;
use studio_client::{
    Clock, LocationData, LocationService, ManualClock, MemoryStorage, PrivacySessionManager,
    SessionPatch, StorageProvider,
};

const PREFIX: &str = "inkstudio";

/// A location service with scripted answers for each lookup path.
struct ScriptedLocationService {
    cached: Mutex<Option<LocationData>>,
    refresh_result: Option<LocationData>,
    high_accuracy_result: Option<LocationData>,
}

impl ScriptedLocationService {
    fn new(
        cached: Option<LocationData>,
        refresh_result: Option<LocationData>,
        high_accuracy_result: Option<LocationData>,
    ) -> Self {
        Self {
            cached: Mutex::new(cached),
            refresh_result,
            high_accuracy_result,
        }
    }
}

impl LocationService for ScriptedLocationService {
    fn current_location(&self) -> Option<LocationData> {
        self.cached.lock().unwrap().clone()
    }

    fn refresh(&self) -> BoxFuture<'_, Option<LocationData>> {
        let result = self.refresh_result.clone();
        Box::pin(async move { result })
    }

    fn request_high_accuracy(&self) -> BoxFuture<'_, Option<LocationData>> {
        let result = self.high_accuracy_result.clone();
        Box::pin(async move { result })
    }
}

fn fixed_clock() -> Arc<ManualClock> {
    let start = DateTime::from_timestamp_millis(1_750_000_000_000).unwrap();
    Arc::new(ManualClock::new(start))
}

fn manager() -> (Arc<MemoryStorage>, Arc<MemoryStorage>, Arc<ManualClock>, PrivacySessionManager) {
    let persistent = Arc::new(MemoryStorage::new());
    let ephemeral = Arc::new(MemoryStorage::new());
    let clock = fixed_clock();
    let manager = PrivacySessionManager::new(
        persistent.clone(),
        ephemeral.clone(),
        clock.clone(),
        PREFIX,
    );
    (persistent, ephemeral, clock, manager)
}

#[test]
fn consent_round_trip() {
    let (_, _, _, manager) = manager();

    assert!(!manager.has_consent());
    assert!(manager.set_consent(true));
    assert!(manager.has_consent());
    assert!(manager.can_personalize());

    assert!(manager.set_consent(false));
    assert!(!manager.has_consent());
}

#[test]
fn expired_consent_is_cleared_on_read() {
    let (persistent, _, clock, manager) = manager();

    assert!(manager.set_consent(true));
    clock.advance(Duration::from_secs(31 * 24 * 60 * 60));

    assert!(!manager.has_consent());
    let key = format!("{}_privacy_consent", PREFIX);
    assert_eq!(persistent.get(&key).unwrap(), None);
}

#[test]
fn denying_consent_deletes_session_data() {
    let (_, ephemeral, _, manager) = manager();

    manager.set_consent(true);
    assert!(manager.add_interest("blackwork"));
    assert!(manager.session_data().is_some());

    manager.set_consent(false);
    assert!(manager.session_data().is_none());
    let key = format!("{}_session_data", PREFIX);
    assert_eq!(ephemeral.get(&key).unwrap(), None);
}

#[test]
fn tracking_without_consent_is_a_no_op() {
    let (_, ephemeral, _, manager) = manager();

    manager.set_consent(false);
    assert!(!manager.add_interest("fine-line"));
    assert!(!manager.track_page_visit("/services", None));
    assert!(!manager.save_generated_idea("rose sleeve", "flowers"));
    assert!(!manager.update_session_data(SessionPatch::default()));

    let key = format!("{}_session_data", PREFIX);
    assert_eq!(ephemeral.get(&key).unwrap(), None);
}

#[test]
fn interests_are_deduplicated_and_capped() {
    let (_, _, _, manager) = manager();
    manager.set_consent(true);

    for i in 0..8 {
        assert!(manager.add_interest(&format!("style-{}", i)));
    }
    // Repeats move to the back rather than duplicating.
    assert!(manager.add_interest("style-2"));
    let interests = manager.session_data().unwrap().interests;
    assert_eq!(interests.len(), 8);
    assert_eq!(interests.last().unwrap(), "style-2");

    for i in 8..15 {
        manager.add_interest(&format!("style-{}", i));
    }
    let interests = manager.session_data().unwrap().interests;
    assert_eq!(interests.len(), MAX_INTERESTS);
    assert_eq!(interests.last().unwrap(), "style-14");
    let unique: std::collections::HashSet<_> = interests.iter().collect();
    assert_eq!(unique.len(), interests.len());
}

#[test]
fn page_visits_keep_the_last_twenty_in_order() {
    let (_, _, _, manager) = manager();
    manager.set_consent(true);

    for i in 0..25 {
        assert!(manager.track_page_visit(&format!("/page-{}", i), None));
    }

    let visits = manager.session_data().unwrap().visited_pages;
    assert_eq!(visits.len(), MAX_VISITED_PAGES);
    assert_eq!(visits.first().unwrap().page, "/page-5");
    assert_eq!(visits.last().unwrap().page, "/page-24");
}

#[test]
fn generated_ideas_keep_the_last_five() {
    let (_, _, _, manager) = manager();
    manager.set_consent(true);

    for i in 0..7 {
        assert!(manager.save_generated_idea(&format!("idea-{}", i), &format!("prompt-{}", i)));
    }

    let ideas = manager.session_data().unwrap().generated_ideas;
    assert_eq!(ideas.len(), 5);
    assert_eq!(ideas.first().unwrap().idea, "idea-2");
    assert_eq!(ideas.last().unwrap().user_prompt, "prompt-6");
}

#[test]
fn session_data_expires_after_24_hours() {
    let (_, ephemeral, clock, manager) = manager();
    manager.set_consent(true);
    manager.add_interest("realism");

    clock.advance(Duration::from_secs(25 * 60 * 60));

    assert!(manager.session_data().is_none());
    let key = format!("{}_session_data", PREFIX);
    assert_eq!(ephemeral.get(&key).unwrap(), None);
}

#[test]
fn granular_consent_expires_independently() {
    let (persistent, _, clock, manager) = manager();

    let mut features = HashMap::new();
    features.insert("location".to_string(), true);
    features.insert("ideas".to_string(), false);
    assert!(manager.set_granular_consent(features));

    assert!(manager.has_feature_consent("location"));
    assert!(!manager.has_feature_consent("ideas"));
    assert!(!manager.has_feature_consent("never-set"));

    clock.advance(Duration::from_secs(31 * 24 * 60 * 60));
    assert!(manager.granular_consent().is_none());
    let key = format!("{}_granular_consent", PREFIX);
    assert_eq!(persistent.get(&key).unwrap(), None);
}

#[test]
fn unavailable_storage_degrades_to_no_consent() {
    let manager = PrivacySessionManager::new(
        Arc::new(UnavailableStorage),
        Arc::new(UnavailableStorage),
        fixed_clock(),
        PREFIX,
    );

    assert!(!manager.has_consent());
    assert!(!manager.set_consent(true));
    assert!(manager.session_data().is_none());
    assert!(!manager.add_interest("anything"));
}

#[test]
fn malformed_records_degrade_to_no_data() {
    let (persistent, ephemeral, _, manager) = manager();

    persistent
        .set(&format!("{}_privacy_consent", PREFIX), "{not json")
        .unwrap();
    assert!(!manager.has_consent());

    manager.set_consent(true);
    ephemeral
        .set(&format!("{}_session_data", PREFIX), "[5,6]")
        .unwrap();
    assert!(manager.session_data().is_none());
}

#[tokio::test]
async fn location_without_consent_returns_none() {
    let (_, _, _, manager) = manager();
    let manager = manager.with_location_service(Arc::new(ScriptedLocationService::new(
        Some(LocationData::city("Laurel")),
        None,
        None,
    )));

    assert!(manager.get_location_data().await.is_none());
    assert!(manager.get_high_accuracy_location().await.is_none());
}

#[tokio::test]
async fn location_falls_back_to_refresh_and_caches_the_result() {
    let (_, _, _, manager) = manager();
    let manager = manager.with_location_service(Arc::new(ScriptedLocationService::new(
        None,
        Some(LocationData::city("Laurel")),
        None,
    )));
    manager.set_consent(true);

    let location = manager.get_location_data().await.unwrap();
    assert_eq!(location.city, "Laurel");

    let cached = manager.session_data().unwrap().location.unwrap();
    assert_eq!(cached.location.city, "Laurel");
}

#[tokio::test]
async fn cached_service_location_is_preferred_over_refresh() {
    let (_, _, _, manager) = manager();
    let manager = manager.with_location_service(Arc::new(ScriptedLocationService::new(
        Some(LocationData::city("Laurel")),
        Some(LocationData::city("Columbia")),
        None,
    )));
    manager.set_consent(true);

    let location = manager.get_location_data().await.unwrap();
    assert_eq!(location.city, "Laurel");
}

#[tokio::test]
async fn stored_location_is_used_when_no_service_is_injected() {
    let (_, _, clock, manager) = manager();
    manager.set_consent(true);
    manager.update_session_data(SessionPatch {
        location: Some(studio_client::models::session::LocationSnapshot {
            location: LocationData::city("Laurel"),
            cached_at: clock.now_millis(),
        }),
        ..Default::default()
    });

    let location = manager.get_location_data().await.unwrap();
    assert_eq!(location.city, "Laurel");
}

#[tokio::test]
async fn unknown_stored_location_is_never_returned() {
    let (_, _, clock, manager) = manager();
    manager.set_consent(true);
    manager.update_session_data(SessionPatch {
        location: Some(studio_client::models::session::LocationSnapshot {
            location: LocationData::city("Unknown"),
            cached_at: clock.now_millis(),
        }),
        ..Default::default()
    });

    assert!(manager.get_location_data().await.is_none());
}

#[tokio::test]
async fn high_accuracy_prefers_a_fresh_request() {
    let (_, _, _, manager) = manager();
    let manager = manager.with_location_service(Arc::new(ScriptedLocationService::new(
        None,
        None,
        Some(LocationData::city("Laurel")),
    )));
    manager.set_consent(true);

    let location = manager.get_high_accuracy_location().await.unwrap();
    assert_eq!(location.city, "Laurel");
    assert!(manager.session_data().unwrap().high_accuracy_location.is_some());
}

#[tokio::test]
async fn high_accuracy_falls_back_to_a_recent_cache_only() {
    let (_, _, clock, manager) = manager();
    let manager = manager.with_location_service(Arc::new(ScriptedLocationService::new(
        None, None, None,
    )));
    manager.set_consent(true);
    manager.update_session_data(SessionPatch {
        high_accuracy_location: Some(studio_client::models::session::LocationSnapshot {
            location: LocationData::city("Laurel"),
            cached_at: clock.now_millis(),
        }),
        ..Default::default()
    });

    // 10 minutes old: still served.
    clock.advance(Duration::from_secs(10 * 60));
    assert_eq!(
        manager.get_high_accuracy_location().await.unwrap().city,
        "Laurel"
    );

    // 40 minutes old: too stale.
    clock.advance(Duration::from_secs(30 * 60));
    assert!(manager.get_high_accuracy_location().await.is_none());
}

#[test]
fn personalization_context_is_empty_without_consent() {
    let (_, _, _, manager) = manager();

    let context = manager.personalization_context();
    assert!(context.location.is_none());
    assert!(context.interests.is_empty());
    assert!(context.visited_pages.is_empty());
}

#[test]
fn personalization_context_projects_session_data() {
    let (_, _, clock, manager) = manager();
    manager.set_consent(true);
    manager.add_interest("japanese");
    manager.track_page_visit("/gallery", None);
    manager.save_generated_idea("koi half-sleeve", "koi fish");
    manager.update_session_data(SessionPatch {
        location: Some(studio_client::models::session::LocationSnapshot {
            location: LocationData {
                city: "Laurel".to_string(),
                region: Some("MD".to_string()),
                country: None,
                source: None,
            },
            cached_at: clock.now_millis(),
        }),
        ..Default::default()
    });

    let context = manager.personalization_context();
    assert_eq!(context.location.as_deref(), Some("Laurel, MD"));
    assert_eq!(context.interests, vec!["japanese"]);
    assert_eq!(context.visited_pages, vec!["/gallery"]);
    assert_eq!(context.recent_ideas, vec!["koi half-sleeve"]);
    assert_eq!(context.recent_prompts, vec!["koi fish"]);
}

#[test]
fn export_includes_raw_blobs_and_tolerates_missing_pieces() {
    let (_, _, _, manager) = manager();
    let manager = manager.with_location_service(Arc::new(ScriptedLocationService::new(
        Some(LocationData::city("Laurel")),
        None,
        None,
    )));

    // Nothing stored yet: every piece is absent, nothing panics.
    let export = manager.export_user_data();
    assert!(export.consent.is_none());
    assert!(export.session.is_none());
    assert_eq!(export.cached_location.as_ref().unwrap().city, "Laurel");

    manager.set_consent(true);
    manager.add_interest("traditional");
    let export = manager.export_user_data();
    assert!(export.consent.is_some());
    assert!(export.session.is_some());
    assert!(export.granular_consent.is_none());
}

#[test]
fn delete_all_user_data_sweeps_every_prefixed_key() {
    let (persistent, ephemeral, _, manager) = manager();
    manager.set_consent(true);
    manager.add_interest("geometric");

    // Stray keys created outside the manager but under the app prefix.
    persistent.set("inkstudio_ab_bucket", "b").unwrap();
    ephemeral.set("inkstudio_last_banner", "summer").unwrap();
    // A foreign key that must survive the sweep.
    persistent.set("other_site_pref", "keep").unwrap();

    manager.delete_all_user_data();

    assert!(!manager.has_consent());
    assert!(manager.session_data().is_none());
    for key in persistent.keys().unwrap() {
        assert!(!key.starts_with("inkstudio_"), "leftover key: {}", key);
    }
    for key in ephemeral.keys().unwrap() {
        assert!(!key.starts_with("inkstudio_"), "leftover key: {}", key);
    }
    assert_eq!(persistent.get("other_site_pref").unwrap().as_deref(), Some("keep"));
}

#[test]
fn clear_consent_removes_everything() {
    let (persistent, ephemeral, _, manager) = manager();
    manager.set_consent(true);
    let mut features = HashMap::new();
    features.insert("location".to_string(), true);
    manager.set_granular_consent(features);
    manager.add_interest("dotwork");

    manager.clear_consent();

    assert!(persistent.is_empty());
    assert!(ephemeral.is_empty());
}
