//! Transport configuration, read from `MANGABUFF_*` environment variables.

use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "https://mangabuff.ru";
pub const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:136.0) Gecko/20100101 Firefox/136.0";

/// Settings shared by every session built in one process.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Site root without a trailing slash.
    pub base_url: String,
    pub user_agent: String,
    pub connect_timeout: Duration,
    pub read_timeout: Duration,
    /// Hard cap on a single response body.
    pub max_content_bytes: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            connect_timeout: Duration::from_secs(4),
            read_timeout: Duration::from_secs(8),
            max_content_bytes: 2_000_000,
        }
    }
}

impl ClientConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            base_url: env_string("MANGABUFF_BASE_URL")
                .map(|url| url.trim_end_matches('/').to_string())
                .unwrap_or(defaults.base_url),
            user_agent: env_string("MANGABUFF_UA").unwrap_or(defaults.user_agent),
            connect_timeout: Duration::from_secs(env_u64("MANGABUFF_CONNECT_TIMEOUT", 4)),
            read_timeout: Duration::from_secs(env_u64("MANGABUFF_READ_TIMEOUT", 8)),
            max_content_bytes: env_u64("MANGABUFF_MAX_CONTENT_BYTES", defaults.max_content_bytes),
        }
    }

    /// Same settings pointed at another host. Used for testing with wiremock.
    pub fn with_base_url(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            ..Self::default()
        }
    }
}

fn env_string(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|val| !val.trim().is_empty())
}

fn env_u64(key: &str, default: u64) -> u64 {
    std::env::var(key)
        .ok()
        .and_then(|val| val.parse::<u64>().ok())
        .unwrap_or(default)
}
