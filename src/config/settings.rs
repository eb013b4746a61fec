//! TOML-based configuration for wrq.
//!
//! Supports a config file (wrq.toml) with environment variable expansion.
//!
//! Example configuration:
//! ```toml
//! catalog = "catalog.toml"
//!
//! [server]
//! max_rows = 5000
//! debug = true
//!
//! [security]
//! permission_table = "app.permissions"
//! inline_threshold = 20
//!
//! [data_sources.default]
//! driver = "sqlite"
//! path = "${WRQ_DATA}/sales.db"
//! ```

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

/// Error type for settings.
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("Config file not found: {0}")]
    FileNotFound(PathBuf),

    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Data source not found: {0}")]
    DataSourceNotFound(String),

    #[error("Unsupported driver: {0}")]
    UnsupportedDriver(String),
}

/// Root configuration structure.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct Settings {
    /// Catalog file, relative to the config file.
    pub catalog: String,

    /// Result limits and diagnostics.
    pub server: ServerSettings,

    /// Row-level security storage.
    pub security: SecuritySettings,

    /// Named data sources.
    pub data_sources: HashMap<String, DataSourceSettings>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            catalog: "catalog.toml".to_string(),
            server: ServerSettings::default(),
            security: SecuritySettings::default(),
            data_sources: HashMap::new(),
        }
    }
}

/// Server limits.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerSettings {
    /// Server-side row cap.
    pub max_rows: u64,

    /// Emit the literal-substituted SQL and timings in responses.
    pub debug: bool,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            max_rows: 10_000,
            debug: false,
        }
    }
}

/// Where subject permissions live.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SecuritySettings {
    pub permission_table: String,
    pub subject_column: String,
    pub category_column: String,
    pub value_column: String,

    /// Above this many values a permission check becomes a sub-select.
    pub inline_threshold: usize,
}

impl Default for SecuritySettings {
    fn default() -> Self {
        Self {
            permission_table: "wrq_permission".to_string(),
            subject_column: "subject_id".to_string(),
            category_column: "category".to_string(),
            value_column: "value".to_string(),
            inline_threshold: 20,
        }
    }
}

/// Data source configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DataSourceSettings {
    /// Database driver. Only `sqlite` ships with the crate.
    pub driver: String,

    /// Database file or `:memory:` (supports ${ENV_VAR} expansion).
    pub path: String,
}

impl DataSourceSettings {
    /// Validate the driver name.
    pub fn check_driver(&self) -> Result<(), SettingsError> {
        match self.driver.to_lowercase().as_str() {
            "sqlite" | "sqlite3" => Ok(()),
            other => Err(SettingsError::UnsupportedDriver(other.to_string())),
        }
    }

    /// Get the path with environment variables expanded.
    pub fn resolved_path(&self) -> Result<String, SettingsError> {
        expand_env_vars(&self.path)
    }
}

impl Settings {
    /// Load settings from a TOML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, SettingsError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(SettingsError::FileNotFound(path.to_path_buf()));
        }

        let content = fs::read_to_string(path)?;
        let settings: Settings = toml::from_str(&content)?;
        Ok(settings)
    }

    /// Load settings from the default config file locations.
    ///
    /// Searches in order:
    /// 1. Environment variable `WRQ_CONFIG`
    /// 2. `./wrq.toml`
    pub fn load() -> Result<Self, SettingsError> {
        if let Ok(path) = env::var("WRQ_CONFIG") {
            return Self::from_file(&path);
        }

        let local_config = PathBuf::from("wrq.toml");
        if local_config.exists() {
            return Self::from_file(&local_config);
        }

        Ok(Settings::default())
    }

    /// Get a data source by name.
    pub fn get_data_source(&self, name: &str) -> Result<&DataSourceSettings, SettingsError> {
        self.data_sources
            .get(name)
            .ok_or_else(|| SettingsError::DataSourceNotFound(name.to_string()))
    }

    /// Catalog location, resolved against the directory of the config file.
    pub fn catalog_path(&self, config_file: &Path) -> Result<PathBuf, SettingsError> {
        let catalog = PathBuf::from(expand_env_vars(&self.catalog)?);
        if catalog.is_absolute() {
            return Ok(catalog);
        }
        Ok(config_file
            .parent()
            .map(|dir| dir.join(&catalog))
            .unwrap_or(catalog))
    }
}

/// Expand environment variables in a string.
///
/// Supports `${VAR}` and `$VAR` syntax.
pub fn expand_env_vars(s: &str) -> Result<String, SettingsError> {
    let mut result = String::with_capacity(s.len());
    let mut chars = s.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '$' {
            result.push(c);
            continue;
        }
        let var_name: String = if chars.peek() == Some(&'{') {
            chars.next();
            chars.by_ref().take_while(|ch| *ch != '}').collect()
        } else {
            let mut name = String::new();
            while let Some(ch) = chars.next_if(|ch| ch.is_alphanumeric() || *ch == '_') {
                name.push(ch);
            }
            if name.is_empty() {
                // Just a lone $, keep it
                result.push('$');
                continue;
            }
            name
        };
        let value =
            env::var(&var_name).map_err(|_| SettingsError::MissingEnvVar(var_name.clone()))?;
        result.push_str(&value);
    }

    Ok(result)
}
