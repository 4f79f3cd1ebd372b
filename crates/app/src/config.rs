//! Settings loading for the CLI.

use anyhow::{Context, Result};
use shared::settings::AppSettings;
use shared::StudioError;
use std::fs;
use std::path::{Path, PathBuf};

/// Environment variables holding the gateway key, in lookup order.
pub const API_KEY_VARS: [&str; 2] = ["GATEWAY_API_KEY", "LOVABLE_API_KEY"];

pub fn config_path() -> Option<PathBuf> {
    directories::ProjectDirs::from("com.local", "Outfit Studio", "OutfitStudio")
        .map(|proj| proj.config_dir().join("settings.json"))
}

/// Default data directory when neither the settings file nor `--data-dir`
/// names one.
fn default_data_dir() -> Option<PathBuf> {
    directories::ProjectDirs::from("com.local", "Outfit Studio", "OutfitStudio")
        .map(|proj| proj.data_dir().to_path_buf())
}

/// Read settings from `path`. A missing file yields the defaults.
pub fn read_settings(path: &Path) -> Result<AppSettings, StudioError> {
    if !path.exists() {
        return Ok(AppSettings::default());
    }
    let bytes = fs::read(path)?;
    serde_json::from_slice(&bytes)
        .map_err(|e| StudioError::Config(format!("{}: {}", path.display(), e)))
}

/// First non-blank value among [`API_KEY_VARS`].
pub fn api_key_from<F>(lookup: F) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    API_KEY_VARS
        .iter()
        .filter_map(|name| lookup(name))
        .map(|v| v.trim().to_string())
        .find(|v| !v.is_empty())
}

/// Settings file, then environment, then command-line overrides.
pub fn load(data_dir_override: Option<PathBuf>) -> Result<AppSettings> {
    let mut settings = match config_path().filter(|p| p.exists()) {
        Some(path) => read_settings(&path).context("failed to load settings")?,
        None => {
            let mut settings = AppSettings::default();
            if let Some(dir) = default_data_dir() {
                settings.storage.data_dir = dir;
            }
            settings
        }
    };

    settings.gateway.api_key = api_key_from(|name| std::env::var(name).ok());
    if let Some(dir) = data_dir_override {
        settings.storage.data_dir = dir;
    }
    tracing::debug!(data_dir = %settings.storage.data_dir.display(), "settings loaded");
    Ok(settings)
}
