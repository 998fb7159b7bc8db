//! Application Configuration
//!
//! User settings stored in TOML format. Every section has defaults, so a
//! config file only needs the keys it changes.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Application settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Image normalization before OCR
    pub normalize: NormalizeSettings,
    /// Fuzzy keyword matching
    pub matching: MatchSettings,
    /// OCR engine settings
    pub ocr: OcrSettings,
    /// Product lookup settings
    pub lookup: LookupSettings,
    /// Keyword dictionary source
    pub dictionary: DictionarySettings,
}

/// Image normalization settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NormalizeSettings {
    /// Upscale factor, must be >= 1
    pub scale: f32,
    /// Contrast multiplier around mid-gray (1.0 = unchanged)
    pub contrast: f32,
    /// Brightness multiplier applied after contrast (1.0 = unchanged)
    pub brightness: f32,
    /// Sharpen strength (0.0 = off)
    pub sharpen: f32,
}

impl Default for NormalizeSettings {
    fn default() -> Self {
        Self {
            scale: 2.0,
            contrast: 1.5,
            brightness: 0.9,
            sharpen: 0.0,
        }
    }
}

/// Fuzzy matching settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchSettings {
    /// Maximum edit distance between a token and a keyword (0 = exact only)
    pub max_distance: usize,
}

impl Default for MatchSettings {
    fn default() -> Self {
        Self { max_distance: 1 }
    }
}

/// OCR engine settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OcrSettings {
    /// Tesseract executable
    pub command: String,
    /// Language hint passed to the engine
    pub language: String,
    /// Tesseract page segmentation mode (--psm)
    pub page_segmentation_mode: Option<u8>,
    /// Maximum time for one recognition
    pub timeout_secs: u64,
}

impl Default for OcrSettings {
    fn default() -> Self {
        Self {
            command: "tesseract".to_string(),
            language: "deu".to_string(),
            page_segmentation_mode: None,
            timeout_secs: 60,
        }
    }
}

/// Product lookup settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LookupSettings {
    /// Open Food Facts base URL
    pub base_url: String,
    /// Request timeout
    pub timeout_secs: u64,
    /// User-Agent header sent with lookups
    pub user_agent: String,
}

impl Default for LookupSettings {
    fn default() -> Self {
        Self {
            base_url: "https://world.openfoodfacts.org".to_string(),
            timeout_secs: 15,
            user_agent: concat!("allergen-scan/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

/// Keyword dictionary source
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DictionarySettings {
    /// TOML dictionary replacing the built-in one
    pub path: Option<PathBuf>,
}

/// Load configuration from file
pub fn load_config(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config {}", path.display()))?;
    let config: AppConfig = toml::from_str(&content)
        .with_context(|| format!("Failed to parse config {}", path.display()))?;
    Ok(config)
}

/// Save configuration to file
pub fn save_config(config: &AppConfig, path: &Path) -> Result<()> {
    let content = toml::to_string_pretty(config)?;
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, content)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_app_config() {
        let config = AppConfig::default();

        assert!((config.normalize.scale - 2.0).abs() < 0.001);
        assert!((config.normalize.contrast - 1.5).abs() < 0.001);
        assert!((config.normalize.brightness - 0.9).abs() < 0.001);
        assert_eq!(config.normalize.sharpen, 0.0);

        assert_eq!(config.matching.max_distance, 1);

        assert_eq!(config.ocr.command, "tesseract");
        assert_eq!(config.ocr.language, "deu");
        assert!(config.ocr.page_segmentation_mode.is_none());
        assert_eq!(config.ocr.timeout_secs, 60);

        assert_eq!(config.lookup.base_url, "https://world.openfoodfacts.org");
        assert!(config.lookup.user_agent.starts_with("allergen-scan/"));

        assert!(config.dictionary.path.is_none());
    }

    #[test]
    fn test_config_serialization_roundtrip() {
        let mut config = AppConfig::default();
        config.matching.max_distance = 2;
        config.ocr.page_segmentation_mode = Some(6);
        config.dictionary.path = Some(PathBuf::from("/etc/allergens.toml"));

        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: AppConfig = toml::from_str(&toml_str).unwrap();

        assert_eq!(parsed.matching.max_distance, 2);
        assert_eq!(parsed.ocr.page_segmentation_mode, Some(6));
        assert_eq!(parsed.dictionary.path, Some(PathBuf::from("/etc/allergens.toml")));
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let parsed: AppConfig = toml::from_str(
            r#"
            [normalize]
            scale = 3.0

            [ocr]
            language = "deu+eng"
            "#,
        )
        .unwrap();

        assert!((parsed.normalize.scale - 3.0).abs() < 0.001);
        assert!((parsed.normalize.contrast - 1.5).abs() < 0.001);
        assert_eq!(parsed.ocr.language, "deu+eng");
        assert_eq!(parsed.ocr.command, "tesseract");
        assert_eq!(parsed.matching.max_distance, 1);
    }

    #[test]
    fn test_save_and_load_config() {
        let mut config = AppConfig::default();
        config.normalize.contrast = 1.8;
        let temp_file = NamedTempFile::new().unwrap();

        save_config(&config, temp_file.path()).unwrap();
        let loaded = load_config(temp_file.path()).unwrap();

        assert!((loaded.normalize.contrast - 1.8).abs() < 0.001);
        assert_eq!(loaded.lookup.timeout_secs, config.lookup.timeout_secs);
    }

    #[test]
    fn test_load_config_file_not_found() {
        let result = load_config(Path::new("/nonexistent/path/config.toml"));
        assert!(result.is_err());
    }

    #[test]
    fn test_load_config_invalid_toml() {
        let mut temp_file = NamedTempFile::new().unwrap();
        writeln!(temp_file, "this is not valid toml {{{{").unwrap();

        let result = load_config(temp_file.path());
        assert!(result.is_err());
    }
}
