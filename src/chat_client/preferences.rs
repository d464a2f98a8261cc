//! Client preferences persisted as JSON

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::AppError;

/// User preferences
///
/// Missing keys in the file take their default values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Preferences {
    pub show_timestamps: bool,
    pub save_history: bool,
    pub notification_sound: bool,
    pub theme: String,
    pub max_history: usize,
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            show_timestamps: true,
            save_history: true,
            notification_sound: true,
            theme: "default".to_string(),
            max_history: 100,
        }
    }
}

impl Preferences {
    /// Load from `path`, falling back to defaults
    ///
    /// A missing file is silent; an unreadable one is logged.
    pub fn load(path: &Path) -> Self {
        match Self::try_load(path) {
            Ok(prefs) => prefs,
            Err(AppError::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => Self::default(),
            Err(e) => {
                warn!("Could not load preferences from {}: {}", path.display(), e);
                Self::default()
            }
        }
    }

    fn try_load(path: &Path) -> Result<Self, AppError> {
        let raw = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    /// Write as pretty JSON
    pub fn save(&self, path: &Path) -> Result<(), AppError> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// `(key, value)` pairs sorted by key, for display
    pub fn entries(&self) -> Vec<(String, String)> {
        match serde_json::to_value(self) {
            Ok(serde_json::Value::Object(map)) => map
                .into_iter()
                .map(|(key, value)| {
                    let value = match value {
                        serde_json::Value::String(s) => s,
                        other => other.to_string(),
                    };
                    (key, value)
                })
                .collect(),
            _ => Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let prefs = Preferences::load(&dir.path().join("absent.json"));
        assert_eq!(prefs, Preferences::default());
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("preferences.json");

        let prefs = Preferences {
            theme: "dark".to_string(),
            max_history: 50,
            ..Preferences::default()
        };
        prefs.save(&path).unwrap();

        assert_eq!(Preferences::load(&path), prefs);
    }

    #[test]
    fn test_partial_file_merges_with_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("preferences.json");
        std::fs::write(&path, r#"{"show_timestamps": false}"#).unwrap();

        let prefs = Preferences::load(&path);
        assert!(!prefs.show_timestamps);
        assert_eq!(prefs.theme, "default");
        assert_eq!(prefs.max_history, 100);
    }

    #[test]
    fn test_corrupt_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("preferences.json");
        std::fs::write(&path, "not json").unwrap();

        assert_eq!(Preferences::load(&path), Preferences::default());
    }

    #[test]
    fn test_entries() {
        let entries = Preferences::default().entries();
        assert!(entries.contains(&("theme".to_string(), "default".to_string())));
        assert!(entries.contains(&("max_history".to_string(), "100".to_string())));
    }
}
