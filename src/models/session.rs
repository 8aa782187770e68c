use serde::{Deserialize, Serialize};
use sonic_rs::Value;

use crate::location::LocationData;

/// The maximum number of interests retained per session.
pub const MAX_INTERESTS: usize = 10;
/// The maximum number of visited pages retained per session.
pub const MAX_VISITED_PAGES: usize = 20;
/// The maximum number of generated ideas retained per session.
pub const MAX_GENERATED_IDEAS: usize = 5;
/// Session data older than this is treated as expired.
pub const SESSION_MAX_AGE_HOURS: i64 = 24;

const MILLIS_PER_HOUR: i64 = 60 * 60 * 1000;

/// One page-visit entry in the session history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VisitedPage {
    /// The visited page (path or logical page name).
    pub page: String,
    /// When the visit happened, in milliseconds since the Unix epoch.
    pub timestamp: i64,
    /// Arbitrary extra metadata recorded with the visit.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
}

/// One generated-content entry in the session history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratedIdea {
    /// The generated idea text.
    pub idea: String,
    /// The prompt the user supplied.
    pub user_prompt: String,
    /// When the idea was generated, in milliseconds since the Unix epoch.
    pub timestamp: i64,
}

/// A location snapshot plus its own cache timestamp.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocationSnapshot {
    /// The cached location.
    #[serde(flatten)]
    pub location: LocationData,
    /// When the snapshot was cached, in milliseconds since the Unix epoch.
    pub cached_at: i64,
}

/// The ephemeral, consent-gated bundle of behavioral signals for the
/// current browser session.
///
/// Must never be read, written, or returned to a caller unless the current
/// consent record is valid and granted; the whole record expires 24 hours
/// after `timestamp`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionData {
    /// Deduplicated interests, most recent last, capped to 10.
    #[serde(default)]
    pub interests: Vec<String>,
    /// Page-visit history in call order, capped to the most recent 20.
    #[serde(default)]
    pub visited_pages: Vec<VisitedPage>,
    /// Generated-content history, capped to the most recent 5.
    #[serde(default)]
    pub generated_ideas: Vec<GeneratedIdea>,
    /// Last-known standard-accuracy location.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<LocationSnapshot>,
    /// Last-known high-accuracy location.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub high_accuracy_location: Option<LocationSnapshot>,
    /// Last-write time, in milliseconds since the Unix epoch.
    pub timestamp: i64,
}

impl SessionData {
    /// Creates an empty record stamped at `now_millis`.
    pub fn empty(now_millis: i64) -> Self {
        Self {
            interests: Vec::new(),
            visited_pages: Vec::new(),
            generated_ideas: Vec::new(),
            location: None,
            high_accuracy_location: None,
            timestamp: now_millis,
        }
    }

    /// Returns `true` if the record is older than 24 hours at `now_millis`.
    pub fn is_expired(&self, now_millis: i64) -> bool {
        now_millis - self.timestamp > SESSION_MAX_AGE_HOURS * MILLIS_PER_HOUR
    }

    /// Deduplicates interests (keeping the last occurrence of each) and
    /// trims every capped list to its most recent entries.
    pub fn apply_caps(&mut self) {
        let mut deduped: Vec<String> = Vec::with_capacity(self.interests.len());
        for interest in self.interests.drain(..) {
            deduped.retain(|existing| existing != &interest);
            deduped.push(interest);
        }
        if deduped.len() > MAX_INTERESTS {
            deduped.drain(..deduped.len() - MAX_INTERESTS);
        }
        self.interests = deduped;

        if self.visited_pages.len() > MAX_VISITED_PAGES {
            let excess = self.visited_pages.len() - MAX_VISITED_PAGES;
            self.visited_pages.drain(..excess);
        }

        if self.generated_ideas.len() > MAX_GENERATED_IDEAS {
            let excess = self.generated_ideas.len() - MAX_GENERATED_IDEAS;
            self.generated_ideas.drain(..excess);
        }
    }
}
