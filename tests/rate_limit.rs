use chrono::DateTime;
use std::sync::Arc;
use std::time::Duration;

use studio_client::{ManualClock, RateLimit, RateLimitConfig, RateLimiter};

fn limiter() -> (Arc<ManualClock>, RateLimiter) {
    let clock = Arc::new(ManualClock::new(
        DateTime::from_timestamp_millis(1_750_000_000_000).unwrap(),
    ));
    let limiter = RateLimiter::new(RateLimitConfig::default(), clock.clone());
    (clock, limiter)
}

#[test]
fn default_category_allows_exactly_sixty_per_window() {
    let (_, limiter) = limiter();

    for i in 0..60 {
        assert!(limiter.is_allowed("clientA", "default"), "call {} rejected", i);
    }
    assert!(!limiter.is_allowed("clientA", "default"));
    assert_eq!(limiter.remaining_requests("clientA", "default"), 0);
}

#[test]
fn window_elapse_frees_the_quota() {
    let (clock, limiter) = limiter();

    for _ in 0..60 {
        assert!(limiter.is_allowed("clientA", "default"));
    }
    assert!(!limiter.is_allowed("clientA", "default"));

    clock.advance(Duration::from_secs(61));
    assert!(limiter.is_allowed("clientA", "default"));
}

#[test]
fn sliding_window_prunes_gradually() {
    let clock = Arc::new(ManualClock::new(
        DateTime::from_timestamp_millis(1_750_000_000_000).unwrap(),
    ));
    let config = RateLimitConfig::default().with_category(
        "default",
        RateLimit {
            requests: 2,
            window: Duration::from_secs(60),
        },
    );
    let limiter = RateLimiter::new(config, clock.clone());

    assert!(limiter.is_allowed("c", "default"));
    clock.advance(Duration::from_secs(40));
    assert!(limiter.is_allowed("c", "default"));
    // First request still inside the trailing window.
    assert!(!limiter.is_allowed("c", "default"));
    // 70s after the first request, 30s after the second: one slot free.
    clock.advance(Duration::from_secs(30));
    assert!(limiter.is_allowed("c", "default"));
    assert!(!limiter.is_allowed("c", "default"));
}

#[test]
fn rejection_records_nothing() {
    let (_, limiter) = limiter();

    for _ in 0..60 {
        limiter.is_allowed("clientA", "default");
    }
    // Repeated rejections must not extend the window with new timestamps.
    for _ in 0..10 {
        assert!(!limiter.is_allowed("clientA", "default"));
    }
    assert_eq!(limiter.remaining_requests("clientA", "default"), 0);
}

#[test]
fn remaining_requests_does_not_mutate() {
    let (_, limiter) = limiter();

    assert_eq!(limiter.remaining_requests("clientA", "default"), 60);
    assert_eq!(limiter.remaining_requests("clientA", "default"), 60);

    assert!(limiter.is_allowed("clientA", "default"));
    assert_eq!(limiter.remaining_requests("clientA", "default"), 59);
    assert_eq!(limiter.remaining_requests("clientA", "default"), 59);
}

#[test]
fn keys_and_categories_are_independent() {
    let (_, limiter) = limiter();

    for _ in 0..60 {
        assert!(limiter.is_allowed("clientA", "default"));
    }
    assert!(!limiter.is_allowed("clientA", "default"));

    // Another client and another category are unaffected.
    assert!(limiter.is_allowed("clientB", "default"));
    assert!(limiter.is_allowed("clientA", "auth"));
}

#[test]
fn auth_category_is_stricter() {
    let (_, limiter) = limiter();

    for _ in 0..10 {
        assert!(limiter.is_allowed("clientA", "auth"));
    }
    assert!(!limiter.is_allowed("clientA", "auth"));
}

#[test]
fn unknown_category_falls_back_to_default() {
    let (_, limiter) = limiter();

    assert_eq!(limiter.remaining_requests("clientA", "no-such-category"), 60);
    assert!(limiter.is_allowed("clientA", "no-such-category"));
    assert_eq!(limiter.remaining_requests("clientA", "no-such-category"), 59);
}
