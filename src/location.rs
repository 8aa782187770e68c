use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};

/// A location snapshot as reported by the location service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocationData {
    /// The city name, or `"Unknown"` when the service could not resolve one.
    pub city: String,
    /// The region or state, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    /// The country, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    /// Which lookup produced this snapshot (e.g. "ip", "gps").
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

impl LocationData {
    /// Creates a snapshot with just a city name.
    pub fn city(city: impl Into<String>) -> Self {
        Self {
            city: city.into(),
            region: None,
            country: None,
            source: None,
        }
    }

    /// Returns `true` unless this is an "Unknown" placeholder snapshot.
    /// Placeholder snapshots are never used as a cached fallback.
    pub fn is_known(&self) -> bool {
        !self.city.is_empty() && self.city != "Unknown"
    }

    /// A human-readable "City, Region" string for personalization copy.
    pub fn display(&self) -> String {
        match &self.region {
            Some(region) => format!("{}, {}", self.city, region),
            None => self.city.clone(),
        }
    }
}

/// The injected geolocation collaborator.
///
/// The privacy manager does not implement geolocation itself; it asks this
/// service and caches the answers (consent-gated) into session data.
pub trait LocationService: Send + Sync {
    /// Returns the service's own cached location, if it has one. Must not
    /// perform a network lookup.
    fn current_location(&self) -> Option<LocationData>;

    /// Performs a fresh (standard accuracy) lookup.
    fn refresh(&self) -> BoxFuture<'_, Option<LocationData>>;

    /// Performs a fresh high-accuracy lookup.
    fn request_high_accuracy(&self) -> BoxFuture<'_, Option<LocationData>>;
}
