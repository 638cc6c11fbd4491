//! # Config Loader
//!
//! Configuration loading and parsing module.
//!
//! Responsibilities:
//! - Read `box.json` (book and scope defaults) from a configuration directory
//! - Parse optional `uploader.toml` / `uploader.json` settings
//! - Validate configuration legality
//! - Parse human-readable byte sizes
//!
//! # Example
//!
//! ```no_run
//! use config_loader::ConfigLoader;
//! use std::path::Path;
//!
//! let config = ConfigLoader::load_from_dir(Path::new("./cfg")).unwrap();
//! println!("Client: {:?}", config.settings.delivery.client);
//! ```

mod parser;
mod size;
mod validator;

pub use contracts::{BoxConfig, UploaderSettings};
pub use parser::ConfigFormat;
pub use size::parse_byte_size;

use contracts::ContractError;
use std::path::{Path, PathBuf};

/// Name of the box identity file inside the configuration directory
pub const BOX_CONFIG_FILE: &str = "box.json";

/// Settings file stem, looked up as `.toml` then `.json`
pub const SETTINGS_FILE_STEM: &str = "uploader";

/// Configuration loaded from a directory
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    /// Content of `box.json`
    pub box_config: BoxConfig,
    /// Uploader settings (defaults when no settings file exists)
    pub settings: UploaderSettings,
    /// Settings file actually read
    pub settings_path: Option<PathBuf>,
}

/// Configuration loader
///
/// Provides static methods to load configuration from directories, files or strings.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load a configuration directory
    ///
    /// # Errors
    /// - Directory or `box.json` missing
    /// - Parse failure
    /// - Validation failure
    pub fn load_from_dir(dir: &Path) -> Result<LoadedConfig, ContractError> {
        if !dir.is_dir() {
            return Err(ContractError::config_validation(
                "config_dir",
                format!("'{}' isn't exist or directory", dir.display()),
            ));
        }

        let box_path = dir.join(BOX_CONFIG_FILE);
        if !box_path.is_file() {
            return Err(ContractError::config_validation(
                "config_dir",
                format!("'{}' not found", box_path.display()),
            ));
        }
        let box_config = Self::load_box_from_str(&Self::read_file(&box_path)?)?;

        let settings_path = Self::find_settings_file(dir);
        let settings = match &settings_path {
            Some(path) => Self::load_settings_from_path(path)?,
            None => UploaderSettings::default(),
        };

        Ok(LoadedConfig {
            box_config,
            settings,
            settings_path,
        })
    }

    /// Load uploader settings from file path
    ///
    /// Automatically detects format from file extension (.toml / .json).
    pub fn load_settings_from_path(path: &Path) -> Result<UploaderSettings, ContractError> {
        let format = Self::detect_format(path)?;
        let content = Self::read_file(path)?;
        Self::load_settings_from_str(&content, format)
    }

    /// Load uploader settings from string
    pub fn load_settings_from_str(
        content: &str,
        format: ConfigFormat,
    ) -> Result<UploaderSettings, ContractError> {
        let settings = parser::parse_settings(content, format)?;
        validator::validate_settings(&settings)?;
        Ok(settings)
    }

    /// Load `box.json` content from string
    pub fn load_box_from_str(content: &str) -> Result<BoxConfig, ContractError> {
        let config = parser::parse_box(content)?;
        validator::validate_box(&config)?;
        Ok(config)
    }

    /// Serialize settings to TOML string
    pub fn to_toml(settings: &UploaderSettings) -> Result<String, ContractError> {
        toml::to_string_pretty(settings)
            .map_err(|e| ContractError::config_parse(format!("TOML serialize error: {e}")))
    }

    /// Serialize settings to JSON string
    pub fn to_json(settings: &UploaderSettings) -> Result<String, ContractError> {
        serde_json::to_string_pretty(settings)
            .map_err(|e| ContractError::config_parse(format!("JSON serialize error: {e}")))
    }
}

impl ConfigLoader {
    /// Infer configuration format from file extension
    fn detect_format(path: &Path) -> Result<ConfigFormat, ContractError> {
        let ext = path.extension().and_then(|e| e.to_str()).ok_or_else(|| {
            ContractError::config_parse("cannot determine file format from extension")
        })?;

        ConfigFormat::from_extension(ext).ok_or_else(|| {
            ContractError::config_parse(format!("unsupported config format: .{ext}"))
        })
    }

    fn find_settings_file(dir: &Path) -> Option<PathBuf> {
        ["toml", "json"]
            .iter()
            .map(|ext| dir.join(format!("{SETTINGS_FILE_STEM}.{ext}")))
            .find(|path| path.is_file())
    }

    /// Read configuration file content
    fn read_file(path: &Path) -> Result<String, ContractError> {
        Ok(std::fs::read_to_string(path)?)
    }
}
