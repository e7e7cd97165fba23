//! Persistence model and configuration IO.

use std::fs;
use std::path::PathBuf;

use anyhow::{anyhow, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

use crate::danbooru::Rating;

/// File name used under the per-user config directory.
const SETTINGS_FILE: &str = "settings.json";

/// Settings persisted to `settings.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppSettings {
    /// Space-separated search tags.
    pub tags: String,
    /// Content rating constraint appended to every query.
    pub rating: Rating,
    /// Seconds between wallpaper changes.
    pub interval_secs: u64,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            tags: String::from("1girl solo"),
            rating: Rating::General,
            interval_secs: 300,
        }
    }
}

/// Build the settings path and ensure the directory exists.
fn settings_path() -> Result<PathBuf> {
    let proj_dirs = ProjectDirs::from("dev", "wallpaper_slideshow", "wallpaper_slideshow")
        .ok_or_else(|| anyhow!("cannot determine config directory"))?;
    let config_dir = proj_dirs.config_dir();
    fs::create_dir_all(config_dir)?;
    Ok(config_dir.join(SETTINGS_FILE))
}

/// Load settings from disk, returning defaults when missing.
pub fn load() -> AppSettings {
    let path = match settings_path() {
        Ok(path) => path,
        Err(_) => return AppSettings::default(),
    };
    let contents = match fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(_) => return AppSettings::default(),
    };
    serde_json::from_str(&contents).unwrap_or_default()
}

/// Persist settings to disk as pretty JSON.
pub fn save(settings: &AppSettings) -> Result<()> {
    let path = settings_path()?;
    let contents = serde_json::to_string_pretty(settings)?;
    fs::write(path, contents)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_fill_missing_fields() {
        let settings: AppSettings = serde_json::from_str("{}").unwrap();
        assert_eq!(settings.tags, "1girl solo");
        assert_eq!(settings.rating, Rating::General);
        assert_eq!(settings.interval_secs, 300);
    }

    #[test]
    fn settings_round_trip() {
        let settings = AppSettings {
            tags: String::from("scenery sunset"),
            rating: Rating::Sensitive,
            interval_secs: 900,
        };
        let json = serde_json::to_string(&settings).unwrap();
        let parsed: AppSettings = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.tags, settings.tags);
        assert_eq!(parsed.rating, settings.rating);
        assert_eq!(parsed.interval_secs, settings.interval_secs);
    }
}
