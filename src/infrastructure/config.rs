//! Configuration infrastructure
//!
//! Settings are layered with the `config` crate: built-in defaults, then an
//! optional TOML/JSON file, then `CATALOG_SYNC_*` environment variables
//! (nested keys joined with `__`, e.g. `CATALOG_SYNC_SCRAPING__RETRY_ATTEMPTS`).
//! The result is validated once before anything uses it.
//!
//! The field selection lives in its own JSON file, managed by
//! [`FieldSelectionStore`].

#![allow(clippy::uninlined_format_args)]

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tokio::fs;
use tracing::{info, warn};

use crate::domain::fields::FieldSelection;

/// Directory name used under the platform config/data directories
pub const APP_DIR_NAME: &str = "catalog-sync";

/// Environment variable prefix for overrides
pub const ENV_PREFIX: &str = "CATALOG_SYNC";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to load config: {source}")]
    FileLoad {
        #[from]
        source: config::ConfigError,
    },

    #[error("Configuration validation failed: {message}")]
    Validation { message: String },

    #[error("Failed to access {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to serialize field selection: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Complete application configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AppConfig {
    pub scraping: ScrapingConfig,
    pub output: OutputConfig,
    pub fields: FieldsConfig,
    pub logging: LoggingConfig,
}

/// Page retrieval settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScrapingConfig {
    /// Catalog site root; product pages live at `{base}/{prefix}-{model}.html`
    pub site_base_url: String,

    /// Hard timeout for one page load
    pub page_load_timeout_secs: u64,

    /// How long to wait for the title element before calling the attempt failed
    pub element_wait_secs: u64,

    /// Retries after the first attempt
    pub retry_attempts: u32,

    /// Backoff after failed attempt `n` is `n * retry_base_delay_ms`
    pub retry_base_delay_ms: u64,

    /// Pause after every attempted row
    pub inter_row_delay_ms: u64,

    /// Pick a random user agent per session instead of the first one
    pub user_agent_rotation: bool,

    pub user_agents: Vec<String>,
}

/// Output spreadsheet settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OutputConfig {
    pub output_dir: PathBuf,

    /// Prepended to every output file name
    pub file_prefix: String,

    /// Row height applied to every data row, in points
    pub description_row_height: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FieldsConfig {
    /// Field selection JSON file
    pub selection_path: PathBuf,
}

/// Logging configuration settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LoggingConfig {
    /// Log level: "error", "warn", "info", "debug", "trace"
    pub level: String,

    /// Enable JSON formatted file logs
    pub json_format: bool,

    pub console_output: bool,

    pub file_output: bool,

    pub log_dir: PathBuf,

    /// Number of log files to keep (older files are deleted on startup)
    pub max_files: u32,

    pub auto_cleanup_logs: bool,

    /// Module-specific log level filters (e.g., "reqwest": "warn")
    pub module_filters: HashMap<String, String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            scraping: ScrapingConfig::default(),
            output: OutputConfig::default(),
            fields: FieldsConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for ScrapingConfig {
    fn default() -> Self {
        Self {
            site_base_url: katom::BASE_URL.to_string(),
            page_load_timeout_secs: defaults::PAGE_LOAD_TIMEOUT_SECS,
            element_wait_secs: defaults::ELEMENT_WAIT_SECS,
            retry_attempts: defaults::RETRY_ATTEMPTS,
            retry_base_delay_ms: defaults::RETRY_BASE_DELAY_MS,
            inter_row_delay_ms: defaults::INTER_ROW_DELAY_MS,
            user_agent_rotation: defaults::USER_AGENT_ROTATION,
            user_agents: defaults::USER_AGENTS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            output_dir: ConfigLoader::get_app_data_dir().join("completed"),
            file_prefix: defaults::OUTPUT_FILE_PREFIX.to_string(),
            description_row_height: defaults::DESCRIPTION_ROW_HEIGHT,
        }
    }
}

impl Default for FieldsConfig {
    fn default() -> Self {
        Self {
            selection_path: ConfigLoader::get_config_dir().join(defaults::FIELD_SELECTION_FILE),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: defaults::LOG_LEVEL.to_string(),
            json_format: defaults::LOG_JSON_FORMAT,
            console_output: defaults::LOG_CONSOLE_OUTPUT,
            file_output: defaults::LOG_FILE_OUTPUT,
            log_dir: ConfigLoader::get_app_data_dir().join("logs"),
            max_files: defaults::LOG_MAX_FILES,
            auto_cleanup_logs: defaults::LOG_AUTO_CLEANUP,
            module_filters: {
                let mut filters = HashMap::new();
                filters.insert("reqwest".to_string(), "info".to_string());
                filters.insert("hyper".to_string(), "warn".to_string());
                filters.insert("html5ever".to_string(), "warn".to_string());
                filters.insert("selectors".to_string(), "warn".to_string());
                filters.insert("calamine".to_string(), "warn".to_string());
                filters
            },
        }
    }
}

impl ScrapingConfig {
    pub fn page_load_timeout(&self) -> Duration {
        Duration::from_secs(self.page_load_timeout_secs)
    }

    pub fn element_wait(&self) -> Duration {
        Duration::from_secs(self.element_wait_secs)
    }

    pub fn retry_base_delay(&self) -> Duration {
        Duration::from_millis(self.retry_base_delay_ms)
    }

    pub fn inter_row_delay(&self) -> Duration {
        Duration::from_millis(self.inter_row_delay_ms)
    }

    /// Total page loads per row, first attempt included
    pub fn max_attempts(&self) -> u32 {
        self.retry_attempts.saturating_add(1)
    }
}

impl AppConfig {
    /// Check invariants the rest of the crate relies on
    pub fn validate(&self) -> Result<(), ConfigError> {
        let scraping = &self.scraping;

        if scraping.page_load_timeout_secs == 0 {
            return Err(ConfigError::Validation {
                message: "page_load_timeout_secs must be greater than 0".to_string(),
            });
        }

        if scraping.element_wait_secs == 0 {
            return Err(ConfigError::Validation {
                message: "element_wait_secs must be greater than 0".to_string(),
            });
        }

        if scraping.retry_attempts > defaults::MAX_RETRY_ATTEMPTS {
            return Err(ConfigError::Validation {
                message: format!(
                    "retry_attempts must be at most {}",
                    defaults::MAX_RETRY_ATTEMPTS
                ),
            });
        }

        if scraping.user_agents.iter().all(|ua| ua.trim().is_empty()) {
            return Err(ConfigError::Validation {
                message: "at least one user agent is required".to_string(),
            });
        }

        if url::Url::parse(&scraping.site_base_url).is_err() {
            return Err(ConfigError::Validation {
                message: format!("site_base_url is not a valid URL: {}", scraping.site_base_url),
            });
        }

        let row_height = self.output.description_row_height;
        if row_height.is_nan() || row_height <= 0.0 {
            return Err(ConfigError::Validation {
                message: "description_row_height must be positive".to_string(),
            });
        }

        if !self.logging.console_output && !self.logging.file_output {
            return Err(ConfigError::Validation {
                message: "at least one logging output must be enabled".to_string(),
            });
        }

        Ok(())
    }
}

/// Loads [`AppConfig`] from defaults, an optional file and the environment
#[derive(Debug, Clone, Default)]
pub struct ConfigLoader {
    config_path: Option<PathBuf>,
    required: bool,
}

impl ConfigLoader {
    /// Loader that reads `config.toml` from the user config directory if present
    pub fn new() -> Self {
        Self {
            config_path: Some(Self::get_config_dir().join(defaults::CONFIG_FILE)),
            required: false,
        }
    }

    /// Loader reading an explicit file; the file must exist
    pub fn with_file(path: impl Into<PathBuf>) -> Self {
        Self {
            config_path: Some(path.into()),
            required: true,
        }
    }

    /// Loader that ignores configuration files entirely
    pub fn defaults_only() -> Self {
        Self {
            config_path: None,
            required: false,
        }
    }

    /// Get the application configuration directory
    pub fn get_config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(APP_DIR_NAME)
    }

    /// Get application data directory
    pub fn get_app_data_dir() -> PathBuf {
        dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(APP_DIR_NAME)
    }

    pub fn config_path(&self) -> Option<&Path> {
        self.config_path.as_deref()
    }

    pub fn load(&self) -> Result<AppConfig, ConfigError> {
        let defaults = config::Config::try_from(&AppConfig::default())?;
        let mut builder = config::Config::builder().add_source(defaults);

        if let Some(path) = &self.config_path {
            builder =
                builder.add_source(config::File::from(path.as_path()).required(self.required));
            info!("Configuration file: {:?} (required: {})", path, self.required);
        }

        let settings = builder
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("scraping.user_agents"),
            )
            .build()?;

        let config: AppConfig = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }
}

/// Reads and writes the field selection JSON
#[derive(Debug, Clone)]
pub struct FieldSelectionStore {
    path: PathBuf,
}

impl FieldSelectionStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the selection. A missing or unreadable file yields the built-in
    /// default selection.
    pub async fn load(&self) -> FieldSelection {
        let content = match fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) => {
                warn!(
                    "Field selection {:?} unavailable ({}), using default field set",
                    self.path, e
                );
                return FieldSelection::default();
            }
        };

        match FieldSelection::from_json(&content) {
            Ok(selection) => {
                info!(
                    "Loaded field selection from {:?}: {} selected, {} custom",
                    self.path,
                    selection.selected().count(),
                    selection.custom().count()
                );
                selection
            }
            Err(e) => {
                warn!(
                    "Field selection {:?} is invalid ({}), using default field set",
                    self.path, e
                );
                FieldSelection::default()
            }
        }
    }

    pub async fn save(&self, selection: &FieldSelection) -> Result<(), ConfigError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|source| ConfigError::Io {
                    path: parent.to_path_buf(),
                    source,
                })?;
        }

        let content = selection.to_json()?;
        fs::write(&self.path, content)
            .await
            .map_err(|source| ConfigError::Io {
                path: self.path.clone(),
                source,
            })?;

        info!("Saved field selection to: {:?}", self.path);
        Ok(())
    }
}

/// Catalog site constants
pub mod katom {
    /// Base URL of the catalog site
    pub const BASE_URL: &str = "https://www.katom.com";
}

/// Default configuration values
pub mod defaults {
    pub const CONFIG_FILE: &str = "config.toml";

    pub const FIELD_SELECTION_FILE: &str = "field_selector_config.json";

    pub const PAGE_LOAD_TIMEOUT_SECS: u64 = 30;

    pub const ELEMENT_WAIT_SECS: u64 = 10;

    pub const RETRY_ATTEMPTS: u32 = 2;

    /// Upper bound accepted by validation
    pub const MAX_RETRY_ATTEMPTS: u32 = 10;

    pub const RETRY_BASE_DELAY_MS: u64 = 2000;

    pub const INTER_ROW_DELAY_MS: u64 = 500;

    pub const USER_AGENT_ROTATION: bool = true;

    pub const USER_AGENTS: &[&str] = &[
        "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
        "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
        "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:121.0) Gecko/20100101 Firefox/121.0",
        "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.1 Safari/605.1.15",
        "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    ];

    pub const OUTPUT_FILE_PREFIX: &str = "final_";

    pub const DESCRIPTION_ROW_HEIGHT: f64 = 15.0;

    pub const LOG_LEVEL: &str = "info";

    pub const LOG_JSON_FORMAT: bool = false;

    pub const LOG_CONSOLE_OUTPUT: bool = true;

    pub const LOG_FILE_OUTPUT: bool = true;

    pub const LOG_MAX_FILES: u32 = 5;

    pub const LOG_AUTO_CLEANUP: bool = true;
}
