//! Configuration module for honey
//!
//! Handles loading settings from YAML files and environment variables, and
//! resolving per-backend option values.

mod resolver;
mod settings;

pub use resolver::*;
pub use settings::*;

use anyhow::Result;
use std::path::PathBuf;
use tracing::info;

/// Candidate settings file locations, most specific first
pub fn settings_paths() -> Vec<PathBuf> {
    let mut paths = Vec::new();
    if let Ok(path) = std::env::var("HONEY_SETTINGS_PATH") {
        paths.push(PathBuf::from(path));
    }
    paths.push(PathBuf::from("honey.yml"));
    paths.push(PathBuf::from("config/honey.yml"));
    if let Some(dir) = dirs::config_dir() {
        paths.push(dir.join("honey/honey.yml"));
    }
    paths
}

/// Load settings from the first existing file, or defaults
pub fn load() -> Result<Settings> {
    let mut settings = match settings_paths().into_iter().find(|p| p.exists()) {
        Some(path) => {
            info!("Loading settings from: {}", path.display());
            Settings::from_file(&path)?
        }
        None => {
            info!("No settings file found, using defaults");
            Settings::default()
        }
    };
    settings.merge_env();
    Ok(settings)
}
