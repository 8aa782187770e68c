use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::clock::Clock;

/// The rate-limit category every uncategorized request falls under.
pub const DEFAULT_CATEGORY: &str = "default";
/// The category for login/signup traffic.
pub const AUTH_CATEGORY: &str = "auth";
/// The category for upload traffic.
pub const UPLOAD_CATEGORY: &str = "upload";

/// A sliding-window ceiling for one request category.
#[derive(Debug, Clone, Copy)]
pub struct RateLimit {
    /// The maximum number of requests within the window.
    pub requests: usize,
    /// The trailing window length.
    pub window: Duration,
}

/// Per-category rate limits. Unknown categories fall back to `default`.
#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    categories: HashMap<String, RateLimit>,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        let mut categories = HashMap::new();
        categories.insert(
            DEFAULT_CATEGORY.to_string(),
            RateLimit {
                requests: 60,
                window: Duration::from_secs(60),
            },
        );
        categories.insert(
            AUTH_CATEGORY.to_string(),
            RateLimit {
                requests: 10,
                window: Duration::from_secs(60),
            },
        );
        categories.insert(
            UPLOAD_CATEGORY.to_string(),
            RateLimit {
                requests: 10,
                window: Duration::from_secs(60),
            },
        );
        Self { categories }
    }
}

impl RateLimitConfig {
    /// Sets the limit for a category, replacing any existing one.
    pub fn with_category(mut self, category: &str, limit: RateLimit) -> Self {
        self.categories.insert(category.to_string(), limit);
        self
    }

    /// Resolves the limit for `category`, falling back to `default`.
    pub fn resolve(&self, category: &str) -> RateLimit {
        self.categories
            .get(category)
            .or_else(|| self.categories.get(DEFAULT_CATEGORY))
            .copied()
            .unwrap_or(RateLimit {
                requests: 60,
                window: Duration::from_secs(60),
            })
    }
}

/// A sliding-window rate limiter keyed by `(client, category)`.
///
/// State is purely in-memory and scoped to one client instance; separate
/// instances do not share windows.
#[derive(Clone)]
pub struct RateLimiter {
    windows: Arc<Mutex<HashMap<(String, String), Vec<i64>>>>,
    config: RateLimitConfig,
    clock: Arc<dyn Clock>,
}

impl RateLimiter {
    /// Creates a new `RateLimiter` with the given limits.
    pub fn new(config: RateLimitConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            windows: Arc::new(Mutex::new(HashMap::new())),
            config,
            clock,
        }
    }

    /// Checks and records one request for `key` in `category`.
    ///
    /// Prunes timestamps older than the trailing window, rejects without
    /// recording when the pruned count is at the ceiling, and otherwise
    /// records the request. Check-and-record is atomic: the whole sequence
    /// runs under one lock.
    pub fn is_allowed(&self, key: &str, category: &str) -> bool {
        let limit = self.config.resolve(category);
        let now = self.clock.now_millis();
        let cutoff = now - limit.window.as_millis() as i64;

        let mut windows = self.windows.lock().unwrap();
        let timestamps = windows
            .entry((key.to_string(), category.to_string()))
            .or_default();
        timestamps.retain(|&at| at > cutoff);

        if timestamps.len() >= limit.requests {
            return false;
        }

        timestamps.push(now);
        true
    }

    /// Returns how many requests `key` has left in `category`, floored at 0.
    /// Does not mutate the window.
    pub fn remaining_requests(&self, key: &str, category: &str) -> usize {
        let limit = self.config.resolve(category);
        let cutoff = self.clock.now_millis() - limit.window.as_millis() as i64;

        let windows = self.windows.lock().unwrap();
        let fresh = windows
            .get(&(key.to_string(), category.to_string()))
            .map(|timestamps| timestamps.iter().filter(|&&at| at > cutoff).count())
            .unwrap_or(0);

        limit.requests.saturating_sub(fresh)
    }
}
