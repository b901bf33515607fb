use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::env;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use tracing::{error, info, warn};
use validator::{Validate, ValidationError, ValidationErrors};

const CONFIG_DIR: &str = "config";

mod defaults {
    pub const ENVIRONMENT: &str = "development";
    pub const DATABASE_URL: &str = "sqlite://harvest.db?mode=rwc";
    pub const HOST: &str = "0.0.0.0";

    pub fn port() -> u16 {
        8080
    }
    pub fn log_level() -> String {
        "info".to_string()
    }
    pub fn db_max_connections() -> u32 {
        10
    }
    pub fn db_min_connections() -> u32 {
        1
    }
    pub fn db_connect_timeout_secs() -> u64 {
        10
    }
    pub fn db_idle_timeout_secs() -> u64 {
        300
    }
    pub fn db_acquire_timeout_secs() -> u64 {
        10
    }
    pub fn listing_cache_ttl_secs() -> u64 {
        30
    }
    pub fn max_body_size() -> usize {
        2 * 1024 * 1024
    }
}

/// Service settings, layered from `config/*.toml` and `APP__*` variables
#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
#[validate(schema(function = "validate_consistency"))]
pub struct AppConfig {
    #[validate(length(min = 1))]
    pub database_url: String,
    pub host: String,
    #[serde(default = "defaults::port")]
    #[validate(range(min = 1))]
    pub port: u16,
    /// Selects `config/{environment}.toml`; `development` relaxes CORS
    #[validate(length(min = 1))]
    pub environment: String,

    #[serde(default = "defaults::log_level")]
    #[validate(custom = "validate_log_level")]
    pub log_level: String,
    /// Emit JSON log lines instead of the human-readable format
    #[serde(default)]
    pub log_json: bool,

    /// Apply pending migrations before serving
    #[serde(default)]
    pub auto_migrate: bool,

    /// Comma-separated list of allowed origins
    #[serde(default)]
    pub cors_allowed_origins: Option<String>,
    #[serde(default)]
    pub cors_allow_any_origin: bool,
    #[serde(default)]
    pub cors_allow_credentials: bool,

    #[serde(default = "defaults::db_max_connections")]
    #[validate(range(min = 1))]
    pub db_max_connections: u32,
    #[serde(default = "defaults::db_min_connections")]
    pub db_min_connections: u32,
    #[serde(default = "defaults::db_connect_timeout_secs")]
    pub db_connect_timeout_secs: u64,
    #[serde(default = "defaults::db_idle_timeout_secs")]
    pub db_idle_timeout_secs: u64,
    #[serde(default = "defaults::db_acquire_timeout_secs")]
    pub db_acquire_timeout_secs: u64,

    /// Seconds the active description listing is served from memory; 0 disables
    #[serde(default = "defaults::listing_cache_ttl_secs")]
    #[validate(range(max = 3600))]
    pub listing_cache_ttl_secs: u64,

    #[serde(default = "defaults::max_body_size")]
    #[validate(range(min = 1024))]
    pub max_body_size: usize,
}

impl AppConfig {
    /// Settings with defaults for everything but the essentials
    pub fn new(database_url: String, host: String, port: u16, environment: String) -> Self {
        Self {
            database_url,
            host,
            port,
            environment,
            log_level: defaults::log_level(),
            log_json: false,
            auto_migrate: false,
            cors_allowed_origins: None,
            cors_allow_any_origin: false,
            cors_allow_credentials: false,
            db_max_connections: defaults::db_max_connections(),
            db_min_connections: defaults::db_min_connections(),
            db_connect_timeout_secs: defaults::db_connect_timeout_secs(),
            db_idle_timeout_secs: defaults::db_idle_timeout_secs(),
            db_acquire_timeout_secs: defaults::db_acquire_timeout_secs(),
            listing_cache_ttl_secs: defaults::listing_cache_ttl_secs(),
            max_body_size: defaults::max_body_size(),
        }
    }

    pub fn is_development(&self) -> bool {
        self.environment.eq_ignore_ascii_case("development")
    }

    /// Configured CORS origins, trimmed, blanks dropped
    pub fn cors_origins(&self) -> Vec<String> {
        self.cors_allowed_origins
            .iter()
            .flat_map(|raw| raw.split(','))
            .map(str::trim)
            .filter(|origin| !origin.is_empty())
            .map(str::to_string)
            .collect()
    }

    pub fn should_allow_permissive_cors(&self) -> bool {
        self.is_development() || self.cors_allow_any_origin
    }

    /// TTL for the cached description listing; `None` disables caching
    pub fn listing_cache_ttl(&self) -> Option<Duration> {
        (self.listing_cache_ttl_secs > 0).then(|| Duration::from_secs(self.listing_cache_ttl_secs))
    }
}

fn validate_consistency(cfg: &AppConfig) -> Result<(), ValidationError> {
    if !cfg.should_allow_permissive_cors() && cfg.cors_origins().is_empty() {
        let mut err = ValidationError::new("cors_allowed_origins_required");
        err.message = Some(
            "set APP__CORS_ALLOWED_ORIGINS outside development, or opt in with APP__CORS_ALLOW_ANY_ORIGIN=true".into(),
        );
        return Err(err);
    }
    if cfg.db_min_connections > cfg.db_max_connections {
        let mut err = ValidationError::new("db_min_connections");
        err.message = Some("db_min_connections must not exceed db_max_connections".into());
        return Err(err);
    }
    Ok(())
}

fn validate_log_level(level: &str) -> Result<(), ValidationError> {
    match level.to_ascii_lowercase().as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => {
            let mut err = ValidationError::new("log_level");
            err.message = Some("Must be one of: trace, debug, info, warn, error".into());
            Err(err)
        }
    }
}

#[derive(Debug, Error)]
pub enum AppConfigError {
    #[error("Configuration loading failed: {0}")]
    Load(#[from] ConfigError),

    #[error("Configuration validation failed: {0}")]
    Validation(#[from] ValidationErrors),
}

/// Installs the global subscriber. `RUST_LOG` wins over `level` when set.
pub fn init_tracing(level: &str, json: bool) {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = env::var("RUST_LOG")
        .ok()
        .filter(|s| !s.trim().is_empty())
        .map(EnvFilter::new)
        .unwrap_or_else(|| EnvFilter::new(format!("harvest_api={level},tower_http=info,sqlx=warn")));

    let builder = fmt().with_env_filter(filter).with_target(false);
    // try_init: tests and the migration binary may install twice
    let _ = if json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
}

/// Loads settings: built-in defaults, then `config/default.toml`, then
/// `config/{RUN_ENV}.toml`, then `APP__*` environment variables.
pub fn load_config() -> Result<AppConfig, AppConfigError> {
    load_config_from(CONFIG_DIR)
}

pub fn load_config_from(config_dir: &str) -> Result<AppConfig, AppConfigError> {
    let run_env = env::var("RUN_ENV")
        .or_else(|_| env::var("APP_ENV"))
        .unwrap_or_else(|_| defaults::ENVIRONMENT.to_string());
    if !Path::new(config_dir).exists() {
        warn!(config_dir, "config directory not found; using defaults and environment");
    }

    let app_config: AppConfig = Config::builder()
        .set_default("database_url", defaults::DATABASE_URL)?
        .set_default("host", defaults::HOST)?
        .set_default("environment", run_env.as_str())?
        .add_source(File::with_name(&format!("{config_dir}/default")).required(false))
        .add_source(File::with_name(&format!("{config_dir}/{run_env}")).required(false))
        .add_source(Environment::with_prefix("APP").separator("__"))
        .build()?
        .try_deserialize()?;

    app_config.validate().map_err(|e| {
        error!(errors = ?e, "configuration rejected");
        AppConfigError::Validation(e)
    })?;

    info!(environment = %app_config.environment, "configuration loaded");
    Ok(app_config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn base_config() -> AppConfig {
        AppConfig::new(
            "sqlite::memory:".into(),
            "127.0.0.1".into(),
            8080,
            "production".into(),
        )
    }

    #[test]
    fn non_dev_requires_cors_origins() {
        let cfg = base_config();
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn non_dev_allows_override_flag() {
        let mut cfg = base_config();
        cfg.cors_allow_any_origin = true;
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn non_dev_with_origins_passes() {
        let mut cfg = base_config();
        cfg.cors_allowed_origins = Some(" https://example.com , ,https://garden.test".into());
        assert!(cfg.validate().is_ok());
        assert_eq!(
            cfg.cors_origins(),
            vec!["https://example.com", "https://garden.test"]
        );
    }

    #[test]
    fn development_allows_permissive_by_default() {
        let mut cfg = base_config();
        cfg.environment = "development".into();
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn min_connections_above_max_is_rejected() {
        let mut cfg = base_config();
        cfg.environment = "development".into();
        cfg.db_min_connections = 20;
        cfg.db_max_connections = 5;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn zero_ttl_disables_listing_cache() {
        let mut cfg = base_config();
        assert_eq!(cfg.listing_cache_ttl(), Some(Duration::from_secs(30)));
        cfg.listing_cache_ttl_secs = 0;
        assert_eq!(cfg.listing_cache_ttl(), None);
    }

    #[test]
    fn invalid_log_level_fails_validation() {
        let mut cfg = base_config();
        cfg.log_level = "loud".into();
        let errors = cfg.validate().unwrap_err();
        assert!(errors.field_errors().contains_key("log_level"));
    }

    #[test]
    fn load_config_reads_default_file() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("default.toml"),
            r#"
database_url = "sqlite::memory:"
port = 9191
listing_cache_ttl_secs = 5
"#,
        )
        .unwrap();

        let cfg = load_config_from(dir.path().to_str().unwrap()).unwrap();
        assert_eq!(cfg.database_url, "sqlite::memory:");
        assert_eq!(cfg.port, 9191);
        assert_eq!(cfg.listing_cache_ttl_secs, 5);
    }

    #[test]
    fn load_config_rejects_unknown_keys() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("default.toml"), "jwt_secret = \"nope\"\n").unwrap();

        let result = load_config_from(dir.path().to_str().unwrap());
        assert!(matches!(result, Err(AppConfigError::Load(_))));
    }
}
