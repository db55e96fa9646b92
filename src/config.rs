use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::env;
use std::path::Path;
use thiserror::Error;
use tracing::info;
use validator::{Validate, ValidationError};

/// Default values for configuration
const DEFAULT_LOG_LEVEL: &str = "info";
const DEFAULT_ENV: &str = "development";
const DEFAULT_PORT: u16 = 8080;
const CONFIG_DIR: &str = "config";
const DEFAULT_DOMESTIC_GL_CODE: &str = "GL-5100-DOM";
const DEFAULT_INTERNATIONAL_GL_CODE: &str = "GL-5200-INTL";
const DEFAULT_DRAFT_TTL_HOURS: i64 = 72;

/// Application configuration structure with validation
#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct AppConfig {
    /// Database connection URL
    #[validate(length(min = 1))]
    pub database_url: String,

    /// Server host address
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Application environment
    #[validate(length(min = 1))]
    pub environment: String,

    #[serde(default = "default_log_level")]
    #[validate(custom = "validate_log_level")]
    pub log_level: String,

    /// Log in JSON format (structured logging)
    #[serde(default)]
    pub log_json: bool,

    /// Whether to run database migrations on startup
    #[serde(default)]
    pub auto_migrate: bool,

    /// DB pool: max connections
    #[serde(default = "default_db_max_connections")]
    pub db_max_connections: u32,

    /// DB pool: min connections
    #[serde(default = "default_db_min_connections")]
    pub db_min_connections: u32,

    /// DB timeouts (seconds)
    #[serde(default = "default_db_connect_timeout_secs")]
    pub db_connect_timeout_secs: u64,
    #[serde(default = "default_db_idle_timeout_secs")]
    pub db_idle_timeout_secs: u64,
    #[serde(default = "default_db_acquire_timeout_secs")]
    pub db_acquire_timeout_secs: u64,

    /// Event channel capacity for async event processing
    #[serde(default = "default_event_channel_capacity")]
    #[validate(custom = "validate_event_channel_capacity")]
    pub event_channel_capacity: usize,

    /// GL code stamped on consignments whose consignor and delivery countries match
    #[serde(default = "default_domestic_gl_code")]
    #[validate(length(min = 1))]
    pub domestic_gl_code: String,

    /// GL code for cross-border consignments
    #[serde(default = "default_international_gl_code")]
    #[validate(length(min = 1))]
    pub international_gl_code: String,

    /// Drafts untouched for longer than this are purged by the janitor job
    #[serde(default = "default_draft_ttl_hours")]
    #[validate(range(min = 1))]
    pub draft_ttl_hours: i64,

    /// Root directory for uploaded compliance documents
    #[serde(default = "default_document_storage_dir")]
    pub document_storage_dir: String,

    /// Per-request timeout for HTTP handlers (seconds)
    #[serde(default = "default_request_timeout_secs")]
    #[validate(range(min = 1))]
    pub request_timeout_secs: u64,
}

impl AppConfig {
    /// Creates a configuration with every tunable at its default
    pub fn new(database_url: String, host: String, port: u16, environment: String) -> Self {
        Self {
            database_url,
            host,
            port,
            environment,
            log_level: default_log_level(),
            log_json: false,
            auto_migrate: false,
            db_max_connections: default_db_max_connections(),
            db_min_connections: default_db_min_connections(),
            db_connect_timeout_secs: default_db_connect_timeout_secs(),
            db_idle_timeout_secs: default_db_idle_timeout_secs(),
            db_acquire_timeout_secs: default_db_acquire_timeout_secs(),
            event_channel_capacity: default_event_channel_capacity(),
            domestic_gl_code: default_domestic_gl_code(),
            international_gl_code: default_international_gl_code(),
            draft_ttl_hours: default_draft_ttl_hours(),
            document_storage_dir: default_document_storage_dir(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }

    pub fn database_url(&self) -> &str {
        &self.database_url
    }

    /// Checks if running in production environment
    pub fn is_production(&self) -> bool {
        self.environment.eq_ignore_ascii_case("production")
    }

    pub fn log_level(&self) -> &str {
        &self.log_level
    }

    /// Age after which an untouched draft consignment is considered stale
    pub fn draft_ttl(&self) -> chrono::Duration {
        chrono::Duration::hours(self.draft_ttl_hours)
    }

    pub fn gl_codes(&self) -> GlCodes {
        GlCodes {
            domestic: self.domestic_gl_code.clone(),
            international: self.international_gl_code.clone(),
        }
    }
}

/// GL account pair used by the document builder.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GlCodes {
    pub domestic: String,
    pub international: String,
}

impl GlCodes {
    /// Domestic when both countries are known and equal, international otherwise.
    pub fn select(&self, consignor_country: Option<&str>, delivery_country: Option<&str>) -> &str {
        match (consignor_country, delivery_country) {
            (Some(from), Some(to)) if from.trim().eq_ignore_ascii_case(to.trim()) => {
                &self.domestic
            }
            _ => &self.international,
        }
    }
}

impl Default for GlCodes {
    fn default() -> Self {
        Self {
            domestic: default_domestic_gl_code(),
            international: default_international_gl_code(),
        }
    }
}

/// Configuration loading errors
#[derive(Debug, Error)]
pub enum AppConfigError {
    #[error("Configuration loading failed: {0}")]
    Load(#[from] ConfigError),
    #[error("Configuration validation failed: {0}")]
    Validation(#[from] validator::ValidationErrors),
}

fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_db_max_connections() -> u32 {
    16
}

fn default_db_min_connections() -> u32 {
    2
}

fn default_db_connect_timeout_secs() -> u64 {
    30
}

fn default_db_idle_timeout_secs() -> u64 {
    600
}

fn default_db_acquire_timeout_secs() -> u64 {
    8
}

fn default_event_channel_capacity() -> usize {
    1024
}

fn default_domestic_gl_code() -> String {
    DEFAULT_DOMESTIC_GL_CODE.to_string()
}

fn default_international_gl_code() -> String {
    DEFAULT_INTERNATIONAL_GL_CODE.to_string()
}

fn default_draft_ttl_hours() -> i64 {
    DEFAULT_DRAFT_TTL_HOURS
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_document_storage_dir() -> String {
    "storage/documents".to_string()
}

/// Validates log level values
fn validate_log_level(level: &str) -> Result<(), ValidationError> {
    let valid_levels = ["trace", "debug", "info", "warn", "error"];
    if valid_levels.contains(&level.to_lowercase().as_str()) {
        Ok(())
    } else {
        let mut err = ValidationError::new("log_level");
        err.message = Some("Must be one of: trace, debug, info, warn, error".into());
        Err(err)
    }
}

fn validate_event_channel_capacity(capacity: usize) -> Result<(), ValidationError> {
    if capacity == 0 {
        let mut err = ValidationError::new("event_channel_capacity");
        err.message = Some("event_channel_capacity must be greater than 0".into());
        return Err(err);
    }
    Ok(())
}

/// Initializes tracing using the provided log level as the default filter
pub fn init_tracing(level: &str, json: bool) {
    use tracing_subscriber::{fmt, EnvFilter};

    let default_directive = format!("consignment_api={},tower_http=debug", level);
    let filter_directive = env::var("RUST_LOG")
        .ok()
        .filter(|s| !s.trim().is_empty())
        .unwrap_or(default_directive);

    if json {
        let _ = fmt()
            .with_env_filter(EnvFilter::new(filter_directive))
            .json()
            .try_init();
    } else {
        let _ = fmt()
            .with_env_filter(EnvFilter::new(filter_directive))
            .try_init();
    }
}

/// Loads application configuration
///
/// Layers configuration sources in this order:
/// 1. Built-in defaults
/// 2. Default config (config/default.toml)
/// 3. Environment-specific config (config/{env}.toml)
/// 4. Environment variables (APP__*)
pub fn load_config() -> Result<AppConfig, AppConfigError> {
    load_config_from(Path::new(CONFIG_DIR))
}

/// Same layering as [`load_config`] but reading files from `config_dir`.
pub fn load_config_from(config_dir: &Path) -> Result<AppConfig, AppConfigError> {
    let run_env = env::var("RUN_ENV")
        .or_else(|_| env::var("APP_ENV"))
        .unwrap_or_else(|_| DEFAULT_ENV.to_string());

    info!("Loading configuration for environment: {}", run_env);

    if !config_dir.exists() {
        info!(
            "Config directory '{}' not found; relying on built-in defaults and environment variables",
            config_dir.display()
        );
    }

    let config = Config::builder()
        .set_default("database_url", "sqlite://consignments.db?mode=rwc")?
        .set_default("host", "0.0.0.0")?
        .set_default("port", DEFAULT_PORT as i64)?
        .set_default("environment", DEFAULT_ENV)?
        .set_default("log_level", DEFAULT_LOG_LEVEL)?
        .set_default("log_json", false)?
        .add_source(File::from(config_dir.join("default")).required(false))
        .add_source(File::from(config_dir.join(&run_env)).required(false))
        .add_source(Environment::with_prefix("APP").separator("__"))
        .build()?;

    let app_config: AppConfig = config.try_deserialize()?;
    app_config.validate()?;

    info!(
        environment = %app_config.environment,
        auto_migrate = app_config.auto_migrate,
        "Configuration loaded"
    );

    Ok(app_config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File as StdFile;
    use std::io::Write;
    use tempfile::TempDir;

    fn write_config(dir: &TempDir, filename: &str, content: &str) {
        let mut file = StdFile::create(dir.path().join(filename)).unwrap();
        writeln!(file, "{}", content).unwrap();
    }

    #[test]
    fn test_load_config_from_file() {
        let dir = TempDir::new().unwrap();
        write_config(
            &dir,
            "default.toml",
            r#"
            database_url = "sqlite::memory:"
            host = "127.0.0.1"
            port = 9090
            environment = "test"
            domestic_gl_code = "GL-DOM-TEST"
            draft_ttl_hours = 12
            "#,
        );

        let config = load_config_from(dir.path()).unwrap();

        assert_eq!(config.database_url, "sqlite::memory:");
        assert_eq!(config.port, 9090);
        assert_eq!(config.domestic_gl_code, "GL-DOM-TEST");
        assert_eq!(config.international_gl_code, DEFAULT_INTERNATIONAL_GL_CODE);
        assert_eq!(config.draft_ttl(), chrono::Duration::hours(12));
    }

    #[test]
    fn test_validation_failure() {
        let dir = TempDir::new().unwrap();
        write_config(
            &dir,
            "default.toml",
            r#"
            database_url = "sqlite::memory:"
            host = "127.0.0.1"
            environment = "test"
            log_level = "verbose"
            event_channel_capacity = 0
            "#,
        );

        let result = load_config_from(dir.path());
        assert!(matches!(result, Err(AppConfigError::Validation(_))));

        if let Err(AppConfigError::Validation(errors)) = result {
            assert!(errors.field_errors().contains_key("log_level"));
            assert!(errors.field_errors().contains_key("event_channel_capacity"));
        }
    }

    #[test]
    fn test_gl_code_selection() {
        let codes = GlCodes::default();
        assert_eq!(codes.select(Some("DE"), Some("de")), DEFAULT_DOMESTIC_GL_CODE);
        assert_eq!(
            codes.select(Some("DE"), Some("NL")),
            DEFAULT_INTERNATIONAL_GL_CODE
        );
        assert_eq!(codes.select(None, Some("NL")), DEFAULT_INTERNATIONAL_GL_CODE);
    }
}
