//! Client-side core for the studio marketing site.
//!
//! Three components make up this crate:
//!
//! - [`services::privacy::PrivacySessionManager`] — the single authority on
//!   whether behavioral data may be collected, and the sole read/write path
//!   for consent records and session data.
//! - [`client::secure::SecureApiClient`] — the sanctioned path for outbound
//!   HTTP calls: URL validation, header sanitization, bearer-token injection,
//!   sliding-window rate limiting and request timeouts.
//! - [`services::logger::Logger`] — structured logging with best-effort
//!   remote delivery and a capped local fallback buffer.
//!
//! All components are explicitly constructed and take their collaborators
//! (storage, location service, auth session, clock) as injected trait
//! objects, so lifecycle is controlled by the application root rather than
//! shared global state.

pub mod auth;
pub mod clock;
pub mod config;
pub mod error;
pub mod location;
pub mod storage;
pub mod telemetry;

pub mod models {
    pub mod consent;
    pub mod export;
    pub mod log;
    pub mod session;
}

pub mod services {
    pub mod logger;
    pub mod privacy;
}

pub mod client {
    pub mod fingerprint;
    pub mod rate_limit;
    pub mod secure;
}

pub use auth::{AuthProvider, AuthSession};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{Config, Environment};
pub use error::{ApiError, Result};
pub use location::{LocationData, LocationService};
pub use storage::{MemoryStorage, StorageError, StorageProvider};

pub use client::fingerprint::EnvironmentInfo;
pub use client::rate_limit::{RateLimit, RateLimitConfig, RateLimiter};
pub use client::secure::{RequestOptions, SecureApiClient};
pub use services::logger::{LogSink, Logger};
pub use services::privacy::{PersonalizationContext, PrivacySessionManager, SessionPatch};
