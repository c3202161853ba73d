use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

/// Application configuration.
///
/// Values are layered: built-in defaults, then an optional
/// `config/{run_mode}` file, then `SHIPTRACK_*` environment overrides.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    pub db_max_connections: u32,
    pub db_min_connections: u32,
    pub log_level: String,
    pub environment: String,
}

impl AppConfig {
    /// Construct a configuration directly, bypassing file/env layering.
    /// Used by tests and tooling that provision their own database.
    pub fn new(database_url: String, environment: String) -> Self {
        Self {
            database_url,
            db_max_connections: 10,
            db_min_connections: 1,
            log_level: "info".to_string(),
            environment,
        }
    }

    pub fn load() -> Result<Self, ConfigError> {
        let run_mode =
            std::env::var("SHIPTRACK_ENV").unwrap_or_else(|_| "development".to_string());

        Config::builder()
            .set_default("database_url", "sqlite://shiptrack.db?mode=rwc")?
            .set_default("db_max_connections", 10i64)?
            .set_default("db_min_connections", 1i64)?
            .set_default("log_level", "info")?
            .set_default("environment", run_mode.as_str())?
            .add_source(File::with_name(&format!("config/{run_mode}")).required(false))
            .add_source(Environment::with_prefix("SHIPTRACK"))
            .build()?
            .try_deserialize()
    }

    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }
}
