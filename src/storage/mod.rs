//! Storage Layer
//!
//! Resolves where configuration and the optional custom dictionary live.

use anyhow::Result;
use std::path::PathBuf;

/// File name of the application config inside the config directory
pub const CONFIG_FILE: &str = "config.toml";

/// File name of a user dictionary inside the config directory
pub const DICTIONARY_FILE: &str = "dictionary.toml";

/// Get the configuration directory, creating it if needed
pub fn get_config_dir() -> Result<PathBuf> {
    let proj_dirs = directories::ProjectDirs::from("org", "allergenscan", "AllergenScan")
        .ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))?;

    let config_dir = proj_dirs.config_dir().to_path_buf();
    std::fs::create_dir_all(&config_dir)?;

    Ok(config_dir)
}

/// Default path of the config file
pub fn default_config_path() -> Result<PathBuf> {
    Ok(get_config_dir()?.join(CONFIG_FILE))
}

/// Default path of a user dictionary
pub fn default_dictionary_path() -> Result<PathBuf> {
    Ok(get_config_dir()?.join(DICTIONARY_FILE))
}
