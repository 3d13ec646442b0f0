//! Settings and vendor defaults, both TOML files in the platform config dir.

use std::fs;
use std::path::{Path, PathBuf};

use directories::{BaseDirs, ProjectDirs};
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::model::Party;
use crate::template::Template;

pub const SETTINGS_FILE: &str = "settings.toml";
pub const SENDER_FILE: &str = "sender.toml";
pub const DEFAULT_OUTPUT_DIR: &str = "~/Documents/Invoices";

const DEFAULT_SENDER_TEMPLATE: &str = include_str!("../sender.toml");

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppSettings {
    #[serde(default = "default_output_dir")]
    pub output_dir: String,
    #[serde(default)]
    pub default_template: Template,
}

fn default_output_dir() -> String {
    DEFAULT_OUTPUT_DIR.to_string()
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
            default_template: Template::default(),
        }
    }
}

impl AppSettings {
    /// Output directory with `~` resolved.
    pub fn output_path(&self) -> PathBuf {
        PathBuf::from(expand_home_dir(&self.output_dir))
    }
}

pub fn config_dir() -> PathBuf {
    match ProjectDirs::from("com", "invoice-desk", "app") {
        Some(dirs) => dirs.config_dir().to_path_buf(),
        None => PathBuf::from("."),
    }
}

/// `Ok(None)` when no settings file exists yet.
pub fn load_settings_from(dir: &Path) -> Result<Option<AppSettings>, ConfigError> {
    let path = dir.join(SETTINGS_FILE);
    if !path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(&path).map_err(|source| ConfigError::Read {
        path: path.clone(),
        source,
    })?;
    toml::from_str(&content)
        .map(Some)
        .map_err(|source| ConfigError::Parse { path, source })
}

pub fn save_settings_to(dir: &Path, settings: &AppSettings) -> Result<PathBuf, ConfigError> {
    let path = dir.join(SETTINGS_FILE);
    fs::create_dir_all(dir).map_err(|source| ConfigError::Write {
        path: dir.to_path_buf(),
        source,
    })?;
    let toml_str = toml::to_string_pretty(settings)?;
    fs::write(&path, toml_str).map_err(|source| ConfigError::Write {
        path: path.clone(),
        source,
    })?;
    tracing::info!(path = %path.display(), "settings saved");
    Ok(path)
}

/// Vendor block from `sender.toml`, writing the bundled default on first use.
pub fn load_sender_from(dir: &Path) -> Result<Party, ConfigError> {
    let path = dir.join(SENDER_FILE);
    if path.exists() {
        let content = fs::read_to_string(&path).map_err(|source| ConfigError::Read {
            path: path.clone(),
            source,
        })?;
        return toml::from_str(&content).map_err(|source| ConfigError::Parse { path, source });
    }

    tracing::info!(path = %path.display(), "initializing default sender configuration");
    fs::create_dir_all(dir).map_err(|source| ConfigError::Write {
        path: dir.to_path_buf(),
        source,
    })?;
    fs::write(&path, DEFAULT_SENDER_TEMPLATE).map_err(|source| ConfigError::Write {
        path: path.clone(),
        source,
    })?;
    toml::from_str(DEFAULT_SENDER_TEMPLATE).map_err(|source| ConfigError::Parse { path, source })
}

pub fn expand_home_dir(path: &str) -> String {
    if path.starts_with('~') {
        if let Some(base_dirs) = BaseDirs::new() {
            let home = base_dirs.home_dir().to_string_lossy();
            return path.replacen('~', &home, 1);
        }
    }
    path.to_string()
}
