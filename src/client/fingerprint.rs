use sha2::{Digest, Sha256};

/// The client environment facts the fingerprint is derived from.
///
/// In a browser these come from `navigator` and `screen`; in tests or
/// server-side contexts the application root fills them in explicitly.
#[derive(Debug, Clone)]
pub struct EnvironmentInfo {
    /// The user agent string.
    pub user_agent: String,
    /// The preferred language tag (e.g. "en-US").
    pub language: String,
    /// The screen width in pixels (0 when headless).
    pub screen_width: u32,
    /// The screen height in pixels (0 when headless).
    pub screen_height: u32,
    /// The IANA timezone name.
    pub timezone: String,
}

impl Default for EnvironmentInfo {
    fn default() -> Self {
        Self {
            user_agent: format!("studio-client/{}", env!("CARGO_PKG_VERSION")),
            language: "en-US".to_string(),
            screen_width: 0,
            screen_height: 0,
            timezone: "UTC".to_string(),
        }
    }
}

/// Derives the stable per-client identifier used to key rate-limit state.
///
/// The first 16 hex characters of a SHA-256 over the joined environment
/// facts. Stable for one browser/device configuration, not a tracking ID.
pub fn client_fingerprint(info: &EnvironmentInfo) -> String {
    let material = format!(
        "{}|{}|{}x{}|{}",
        info.user_agent, info.language, info.screen_width, info.screen_height, info.timezone
    );
    let digest = Sha256::digest(material.as_bytes());
    hex::encode(digest)[..16].to_string()
}
