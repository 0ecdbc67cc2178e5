use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{fs, path::PathBuf, sync::RwLock};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectorSettings {
    pub enabled: bool,
}

impl Default for DetectorSettings {
    fn default() -> Self {
        Self { enabled: true }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
struct UserSettings {
    detector: DetectorSettings,
}

/// JSON-backed settings shared with external writers.
///
/// Another process may rewrite the file at any time; `reload` runs once per
/// poll cycle and last write wins. Writes here are whole-file, so a reader
/// racing a writer sees one version or the other.
pub struct SettingsStore {
    path: PathBuf,
    data: RwLock<UserSettings>,
}

impl SettingsStore {
    pub fn new(path: PathBuf) -> Result<Self> {
        let data = if path.exists() {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read settings from {}", path.display()))?;
            serde_json::from_str(&contents).unwrap_or_default()
        } else {
            UserSettings::default()
        };

        Ok(Self {
            path,
            data: RwLock::new(data),
        })
    }

    pub fn detector_enabled(&self) -> bool {
        self.data.read().unwrap().detector.enabled
    }

    pub fn set_detector_enabled(&self, enabled: bool) -> Result<()> {
        let mut guard = self.data.write().unwrap();
        guard.detector.enabled = enabled;
        self.persist(&guard)
    }

    /// Re-read the backing file so toggles from other processes take effect
    /// without a restart. A missing file resets to defaults; a malformed one
    /// keeps the current state and reports the error.
    pub fn reload(&self) -> Result<()> {
        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(_) => {
                *self.data.write().unwrap() = UserSettings::default();
                return Ok(());
            }
        };

        let data: UserSettings = serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse settings at {}", self.path.display()))?;
        *self.data.write().unwrap() = data;
        Ok(())
    }

    fn persist(&self, data: &UserSettings) -> Result<()> {
        let serialized = serde_json::to_string_pretty(data)?;
        fs::write(&self.path, serialized)
            .with_context(|| format!("Failed to write settings to {}", self.path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reload_picks_up_external_writes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        let store = SettingsStore::new(path.clone()).unwrap();
        assert!(store.detector_enabled());

        fs::write(&path, r#"{"detector": {"enabled": false}}"#).unwrap();
        store.reload().unwrap();
        assert!(!store.detector_enabled());
    }

    #[test]
    fn missing_file_reloads_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        let store = SettingsStore::new(path.clone()).unwrap();

        store.set_detector_enabled(false).unwrap();
        fs::remove_file(&path).unwrap();
        store.reload().unwrap();
        assert!(store.detector_enabled());
    }

    #[test]
    fn malformed_file_keeps_current_state() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        let store = SettingsStore::new(path.clone()).unwrap();

        store.set_detector_enabled(false).unwrap();
        fs::write(&path, "{{{").unwrap();
        assert!(store.reload().is_err());
        assert!(!store.detector_enabled());
    }

    #[test]
    fn set_detector_enabled_persists_across_stores() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");

        let store = SettingsStore::new(path.clone()).unwrap();
        store.set_detector_enabled(false).unwrap();

        let reopened = SettingsStore::new(path).unwrap();
        assert!(!reopened.detector_enabled());
    }
}
