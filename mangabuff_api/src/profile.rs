//! Persisted account state: cookie jar, header overrides and identity.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Header keys a profile may override on the session.
pub const OVERRIDABLE_HEADERS: &[&str] = &[
    "x-csrf-token",
    "x-requested-with",
    "User-Agent",
    "Accept",
    "Accept-Language",
];

/// Cookie names worth persisting after login.
pub const WANTED_COOKIES: &[&str] = &["XSRF-TOKEN", "mangabuff_session", "__ddg9_", "theme"];

/// Cookie name prefixes worth persisting after login.
pub const WANTED_COOKIE_PREFIXES: &[&str] = &["remember_web"];

/// A stored account. Every field tolerates being absent on disk.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    #[serde(default)]
    pub cookie: BTreeMap<String, String>,
    #[serde(default)]
    pub client_headers: BTreeMap<String, String>,
    #[serde(default, deserialize_with = "string_or_number")]
    pub id: String,
    #[serde(default)]
    pub club_name: String,
}

impl Profile {
    /// Header override by case-insensitive name, ignoring empty values.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.client_headers
            .iter()
            .find(|(k, v)| k.eq_ignore_ascii_case(name) && !v.trim().is_empty())
            .map(|(_, v)| v.as_str())
    }

    pub fn csrf_token(&self) -> Option<&str> {
        self.header("x-csrf-token")
    }

    /// Numeric user id, if the profile carries one.
    pub fn user_id(&self) -> Option<i64> {
        self.id.trim().parse().ok()
    }

    /// Keep only the cookies the site needs to recognise the session again.
    pub fn retain_wanted_cookies(cookies: BTreeMap<String, String>) -> BTreeMap<String, String> {
        let mut kept: BTreeMap<String, String> = cookies
            .into_iter()
            .filter(|(name, _)| {
                WANTED_COOKIES.contains(&name.as_str())
                    || WANTED_COOKIE_PREFIXES.iter().any(|p| name.starts_with(p))
            })
            .collect();
        kept.entry("theme".to_string())
            .or_insert_with(|| "light".to_string());
        kept
    }
}

fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(match value {
        serde_json::Value::String(s) => s,
        serde_json::Value::Number(n) => n.to_string(),
        _ => String::new(),
    })
}
