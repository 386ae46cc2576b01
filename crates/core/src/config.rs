use std::env;
use std::fs;
use std::path::PathBuf;

use rust_decimal::Decimal;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::ledger::ItemBounds;
use crate::policy::ReviewPolicy;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub server: ServerConfig,
    pub engine: EngineConfig,
    pub crm: CrmConfig,
    pub drafts: DraftsConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub bind_address: String,
    pub port: u16,
    pub graceful_shutdown_secs: u64,
}

/// Pricing bounds and review thresholds. These feed `ItemBounds` and
/// `ReviewPolicy` directly.
#[derive(Clone, Debug)]
pub struct EngineConfig {
    pub default_currency: String,
    pub margin_min_percent: Decimal,
    pub margin_max_percent: Decimal,
    pub tax_rate_max: Decimal,
    pub review_margin_floor_percent: Decimal,
    pub review_total_threshold: Option<Decimal>,
}

impl EngineConfig {
    pub fn item_bounds(&self) -> ItemBounds {
        ItemBounds {
            margin_min_percent: self.margin_min_percent,
            margin_max_percent: self.margin_max_percent,
            tax_rate_max: self.tax_rate_max,
        }
    }

    pub fn review_policy(&self) -> ReviewPolicy {
        ReviewPolicy {
            margin_floor_percent: self.review_margin_floor_percent,
            total_review_threshold: self.review_total_threshold,
        }
    }
}

#[derive(Clone, Debug)]
pub struct CrmConfig {
    pub enabled: bool,
    pub base_url: Option<String>,
    pub api_key: Option<SecretString>,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct DraftsConfig {
    pub enabled: bool,
    pub callback_base_url: Option<String>,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub database_url: Option<String>,
    pub log_level: Option<String>,
    pub bind_address: Option<String>,
    pub port: Option<u16>,
    pub crm_enabled: Option<bool>,
    pub crm_base_url: Option<String>,
    pub crm_api_key: Option<String>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig {
                url: "sqlite://quoteflow.db".to_string(),
                max_connections: 5,
                timeout_secs: 30,
            },
            server: ServerConfig {
                bind_address: "127.0.0.1".to_string(),
                port: 8080,
                graceful_shutdown_secs: 15,
            },
            engine: EngineConfig {
                default_currency: "USD".to_string(),
                margin_min_percent: Decimal::ZERO,
                margin_max_percent: Decimal::from(500),
                tax_rate_max: Decimal::ONE,
                review_margin_floor_percent: Decimal::from(10),
                review_total_threshold: None,
            },
            crm: CrmConfig { enabled: false, base_url: None, api_key: None, timeout_secs: 10 },
            drafts: DraftsConfig { enabled: false, callback_base_url: None },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

// File-facing mirror of AppConfig; every field optional so partial files
// layer over the defaults.
#[derive(Debug, Default, Deserialize)]
struct FileConfig {
    database: Option<FileDatabase>,
    server: Option<FileServer>,
    engine: Option<FileEngine>,
    crm: Option<FileCrm>,
    drafts: Option<FileDrafts>,
    logging: Option<FileLogging>,
}

#[derive(Debug, Default, Deserialize)]
struct FileDatabase {
    url: Option<String>,
    max_connections: Option<u32>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct FileServer {
    bind_address: Option<String>,
    port: Option<u16>,
    graceful_shutdown_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct FileEngine {
    default_currency: Option<String>,
    margin_min_percent: Option<Decimal>,
    margin_max_percent: Option<Decimal>,
    tax_rate_max: Option<Decimal>,
    review_margin_floor_percent: Option<Decimal>,
    review_total_threshold: Option<Decimal>,
}

#[derive(Debug, Default, Deserialize)]
struct FileCrm {
    enabled: Option<bool>,
    base_url: Option<String>,
    api_key: Option<String>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct FileDrafts {
    enabled: Option<bool>,
    callback_base_url: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct FileLogging {
    level: Option<String>,
    format: Option<LogFormat>,
}

const DEFAULT_CONFIG_FILE: &str = "quoteflow.toml";

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        let path = options
            .config_path
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));
        match fs::read_to_string(&path) {
            Ok(raw) => {
                let file: FileConfig = toml::from_str(&raw)
                    .map_err(|source| ConfigError::ParseFile { path: path.clone(), source })?;
                config.apply_file(file);
            }
            Err(source) if source.kind() == std::io::ErrorKind::NotFound => {
                if options.require_file || options.config_path.is_some() {
                    return Err(ConfigError::MissingConfigFile(path));
                }
            }
            Err(source) => return Err(ConfigError::ReadFile { path, source }),
        }

        config.apply_env()?;
        config.apply_overrides(&options.overrides);
        config.validate()?;
        Ok(config)
    }

    fn apply_file(&mut self, file: FileConfig) {
        if let Some(database) = file.database {
            apply(&mut self.database.url, database.url);
            apply(&mut self.database.max_connections, database.max_connections);
            apply(&mut self.database.timeout_secs, database.timeout_secs);
        }
        if let Some(server) = file.server {
            apply(&mut self.server.bind_address, server.bind_address);
            apply(&mut self.server.port, server.port);
            apply(&mut self.server.graceful_shutdown_secs, server.graceful_shutdown_secs);
        }
        if let Some(engine) = file.engine {
            apply(&mut self.engine.default_currency, engine.default_currency);
            apply(&mut self.engine.margin_min_percent, engine.margin_min_percent);
            apply(&mut self.engine.margin_max_percent, engine.margin_max_percent);
            apply(&mut self.engine.tax_rate_max, engine.tax_rate_max);
            apply(
                &mut self.engine.review_margin_floor_percent,
                engine.review_margin_floor_percent,
            );
            if engine.review_total_threshold.is_some() {
                self.engine.review_total_threshold = engine.review_total_threshold;
            }
        }
        if let Some(crm) = file.crm {
            apply(&mut self.crm.enabled, crm.enabled);
            if crm.base_url.is_some() {
                self.crm.base_url = crm.base_url;
            }
            if let Some(api_key) = crm.api_key {
                self.crm.api_key = Some(api_key.into());
            }
            apply(&mut self.crm.timeout_secs, crm.timeout_secs);
        }
        if let Some(drafts) = file.drafts {
            apply(&mut self.drafts.enabled, drafts.enabled);
            if drafts.callback_base_url.is_some() {
                self.drafts.callback_base_url = drafts.callback_base_url;
            }
        }
        if let Some(logging) = file.logging {
            apply(&mut self.logging.level, logging.level);
            apply(&mut self.logging.format, logging.format);
        }
    }

    fn apply_env(&mut self) -> Result<(), ConfigError> {
        if let Ok(url) = env::var("QUOTEFLOW_DATABASE_URL") {
            self.database.url = url;
        }
        if let Ok(level) = env::var("QUOTEFLOW_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Ok(bind) = env::var("QUOTEFLOW_BIND_ADDRESS") {
            self.server.bind_address = bind;
        }
        if let Ok(port) = env::var("QUOTEFLOW_PORT") {
            self.server.port = port.parse().map_err(|_| ConfigError::InvalidEnvOverride {
                key: "QUOTEFLOW_PORT".to_string(),
                value: port,
            })?;
        }
        if let Ok(enabled) = env::var("QUOTEFLOW_CRM_ENABLED") {
            self.crm.enabled = match enabled.as_str() {
                "true" | "1" => true,
                "false" | "0" => false,
                _ => {
                    return Err(ConfigError::InvalidEnvOverride {
                        key: "QUOTEFLOW_CRM_ENABLED".to_string(),
                        value: enabled,
                    });
                }
            };
        }
        if let Ok(base_url) = env::var("QUOTEFLOW_CRM_BASE_URL") {
            self.crm.base_url = Some(base_url);
        }
        if let Ok(api_key) = env::var("QUOTEFLOW_CRM_API_KEY") {
            self.crm.api_key = Some(api_key.into());
        }
        Ok(())
    }

    fn apply_overrides(&mut self, overrides: &ConfigOverrides) {
        if let Some(url) = &overrides.database_url {
            self.database.url = url.clone();
        }
        if let Some(level) = &overrides.log_level {
            self.logging.level = level.clone();
        }
        if let Some(bind) = &overrides.bind_address {
            self.server.bind_address = bind.clone();
        }
        if let Some(port) = overrides.port {
            self.server.port = port;
        }
        if let Some(enabled) = overrides.crm_enabled {
            self.crm.enabled = enabled;
        }
        if let Some(base_url) = &overrides.crm_base_url {
            self.crm.base_url = Some(base_url.clone());
        }
        if let Some(api_key) = &overrides.crm_api_key {
            self.crm.api_key = Some(api_key.clone().into());
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.database.url.is_empty() {
            return Err(ConfigError::Validation("database.url must not be empty".to_string()));
        }
        if self.engine.margin_min_percent > self.engine.margin_max_percent {
            return Err(ConfigError::Validation(format!(
                "engine.margin_min_percent ({}) exceeds engine.margin_max_percent ({})",
                self.engine.margin_min_percent, self.engine.margin_max_percent,
            )));
        }
        if self.engine.tax_rate_max < Decimal::ZERO {
            return Err(ConfigError::Validation(
                "engine.tax_rate_max must not be negative".to_string(),
            ));
        }
        if self.engine.default_currency.len() != 3 {
            return Err(ConfigError::Validation(format!(
                "engine.default_currency must be a 3-letter code, got `{}`",
                self.engine.default_currency,
            )));
        }
        if self.crm.enabled && self.crm.base_url.is_none() {
            return Err(ConfigError::Validation(
                "crm.base_url is required when crm.enabled = true".to_string(),
            ));
        }
        Ok(())
    }

    /// Effective values with secrets redacted, for the `config` CLI command.
    pub fn redacted_summary(&self) -> Vec<(String, String)> {
        vec![
            ("database.url".to_string(), self.database.url.clone()),
            ("database.max_connections".to_string(), self.database.max_connections.to_string()),
            ("server.bind_address".to_string(), self.server.bind_address.clone()),
            ("server.port".to_string(), self.server.port.to_string()),
            ("engine.default_currency".to_string(), self.engine.default_currency.clone()),
            (
                "engine.review_margin_floor_percent".to_string(),
                self.engine.review_margin_floor_percent.to_string(),
            ),
            (
                "engine.review_total_threshold".to_string(),
                self.engine
                    .review_total_threshold
                    .map(|threshold| threshold.to_string())
                    .unwrap_or_else(|| "disabled".to_string()),
            ),
            ("crm.enabled".to_string(), self.crm.enabled.to_string()),
            (
                "crm.api_key".to_string(),
                match &self.crm.api_key {
                    Some(key) if !key.expose_secret().is_empty() => "***redacted***".to_string(),
                    _ => "unset".to_string(),
                },
            ),
            ("logging.level".to_string(), self.logging.level.clone()),
        ]
    }
}

fn apply<T>(target: &mut T, value: Option<T>) {
    if let Some(value) = value {
        *target = value;
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use rust_decimal::Decimal;

    use super::{AppConfig, ConfigError, ConfigOverrides, LoadOptions, LogFormat};

    fn load_from_str(raw: &str) -> Result<AppConfig, ConfigError> {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        file.write_all(raw.as_bytes()).expect("write config");
        AppConfig::load(LoadOptions {
            config_path: Some(file.path().to_path_buf()),
            ..LoadOptions::default()
        })
    }

    #[test]
    fn defaults_apply_without_a_config_file() {
        let config = AppConfig::load(LoadOptions::default()).expect("defaults");
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.engine.default_currency, "USD");
        assert_eq!(config.logging.format, LogFormat::Compact);
        assert!(!config.crm.enabled);
    }

    #[test]
    fn missing_explicit_config_file_is_an_error() {
        let result = AppConfig::load(LoadOptions {
            config_path: Some("/nonexistent/quoteflow.toml".into()),
            ..LoadOptions::default()
        });
        assert!(matches!(result, Err(ConfigError::MissingConfigFile(_))));
    }

    #[test]
    fn file_values_layer_over_defaults() {
        let config = load_from_str(
            r#"
            [database]
            url = "sqlite://custom.db"

            [engine]
            review_margin_floor_percent = "12.5"
            review_total_threshold = "50000"

            [logging]
            level = "debug"
            format = "json"
            "#,
        )
        .expect("valid file");

        assert_eq!(config.database.url, "sqlite://custom.db");
        assert_eq!(config.engine.review_margin_floor_percent, Decimal::new(125, 1));
        assert_eq!(config.engine.review_total_threshold, Some(Decimal::from(50_000)));
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.logging.format, LogFormat::Json);
        // untouched section keeps defaults
        assert_eq!(config.server.port, 8080);
    }

    #[test]
    fn programmatic_overrides_win_over_file() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        file.write_all(b"[database]\nurl = \"sqlite://file.db\"\n").expect("write");

        let config = AppConfig::load(LoadOptions {
            config_path: Some(file.path().to_path_buf()),
            overrides: ConfigOverrides {
                database_url: Some("sqlite::memory:".to_string()),
                ..ConfigOverrides::default()
            },
            ..LoadOptions::default()
        })
        .expect("load");

        assert_eq!(config.database.url, "sqlite::memory:");
    }

    #[test]
    fn inverted_margin_bounds_fail_validation() {
        let result = load_from_str(
            r#"
            [engine]
            margin_min_percent = "50"
            margin_max_percent = "20"
            "#,
        );
        assert!(matches!(result, Err(ConfigError::Validation(_))));
    }

    #[test]
    fn enabled_crm_requires_base_url() {
        let result = load_from_str("[crm]\nenabled = true\n");
        assert!(matches!(result, Err(ConfigError::Validation(_))));

        let config = load_from_str(
            "[crm]\nenabled = true\nbase_url = \"http://crm.internal\"\napi_key = \"k\"\n",
        )
        .expect("valid crm block");
        assert!(config.crm.enabled);
    }

    #[test]
    fn summary_redacts_the_api_key() {
        let config = load_from_str(
            "[crm]\nenabled = true\nbase_url = \"http://crm.internal\"\napi_key = \"s3cret\"\n",
        )
        .expect("load");

        let summary = config.redacted_summary();
        let api_key = summary
            .iter()
            .find(|(key, _)| key == "crm.api_key")
            .map(|(_, value)| value.as_str());
        assert_eq!(api_key, Some("***redacted***"));
        assert!(!summary.iter().any(|(_, value)| value.contains("s3cret")));
    }

    #[test]
    fn malformed_toml_is_a_parse_error() {
        let result = load_from_str("[database\nurl=");
        assert!(matches!(result, Err(ConfigError::ParseFile { .. })));
    }
}
