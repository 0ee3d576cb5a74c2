//! On-disk profile store: one pretty-printed JSON file per account.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use mangabuff_api::{ClientConfig, Profile};

use crate::error::MangaBuffError;

/// Directory of `{name}.json` profiles and the card files saved beside them.
#[derive(Debug, Clone)]
pub struct ProfileStore {
    root: PathBuf,
}

impl ProfileStore {
    /// Open (and create if needed) the profile directory.
    pub fn new(root: impl Into<PathBuf>) -> Result<Self, MangaBuffError> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path_for(&self, name: &str) -> PathBuf {
        self.root.join(format!("{}.json", name))
    }

    /// Stored profile, or `None` when missing or unreadable.
    pub fn read(&self, name: &str) -> Option<Profile> {
        let path = self.path_for(name);
        let raw = fs::read_to_string(&path).ok()?;
        match serde_json::from_str(&raw) {
            Ok(profile) => Some(profile),
            Err(e) => {
                tracing::warn!("ignoring unreadable profile {}: {}", path.display(), e);
                None
            }
        }
    }

    pub fn write(&self, name: &str, profile: &Profile) -> Result<PathBuf, MangaBuffError> {
        let path = self.path_for(name);
        write_json_atomic(&path, profile)?;
        Ok(path)
    }

    /// Fresh profile with empty session cookies and browser-like headers.
    pub fn default_profile(user_id: Option<&str>, club_name: Option<&str>) -> Profile {
        let cookie: BTreeMap<String, String> = [
            ("XSRF-TOKEN", ""),
            ("mangabuff_session", ""),
            ("__ddg9_", ""),
            ("theme", "light"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

        let client_headers: BTreeMap<String, String> = [
            ("User-Agent", ClientConfig::default().user_agent),
            (
                "Accept",
                "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8".to_string(),
            ),
            ("Accept-Language", "ru,en;q=0.8".to_string()),
            ("x-csrf-token", String::new()),
            ("x-requested-with", "XMLHttpRequest".to_string()),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect();

        Profile {
            cookie,
            client_headers,
            id: user_id.unwrap_or("").to_string(),
            club_name: club_name.unwrap_or("").to_string(),
        }
    }
}

/// Pretty JSON written to `{path}.tmp` and renamed over `path`.
pub fn write_json_atomic<T: serde::Serialize + ?Sized>(path: &Path, value: &T) -> Result<(), MangaBuffError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);
    fs::write(&tmp, serde_json::to_string_pretty(value)?)?;
    fs::rename(&tmp, path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_then_read_back() {
        let dir = tempfile::tempdir().unwrap();
        let store = ProfileStore::new(dir.path().join("profiles")).unwrap();
        let profile = ProfileStore::default_profile(Some("42"), Some("Club"));

        let path = store.write("main", &profile).unwrap();
        assert_eq!(path, store.path_for("main"));
        assert!(!dir.path().join("profiles/main.json.tmp").exists());
        assert_eq!(store.read("main"), Some(profile));
    }

    #[test]
    fn missing_or_corrupt_profile_reads_as_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = ProfileStore::new(dir.path()).unwrap();
        assert_eq!(store.read("nobody"), None);

        fs::write(store.path_for("broken"), "{not json").unwrap();
        assert_eq!(store.read("broken"), None);
    }

    #[test]
    fn default_profile_shape() {
        let profile = ProfileStore::default_profile(None, None);
        assert_eq!(profile.cookie.get("theme").map(String::as_str), Some("light"));
        assert_eq!(profile.csrf_token(), None);
        assert_eq!(profile.user_id(), None);
        assert!(profile.header("user-agent").is_some());
    }
}
