use crate::error::AppError;
use dotenvy::dotenv;
use secrecy::Secret;
use serde::Deserialize;
use std::env;

#[derive(Deserialize, Clone, Debug)]
pub struct EngineConfig {
    pub database: DatabaseConfig,
    pub service_name: String,
    pub log_level: String,
    /// When false, a rule posting failure is surfaced to the caller
    /// instead of being logged and recorded for remediation.
    pub continue_on_posting_failure: bool,
}

#[derive(Deserialize, Clone, Debug)]
pub struct DatabaseConfig {
    pub url: Secret<String>,
    pub max_connections: u32,
    pub min_connections: u32,
}

impl EngineConfig {
    pub fn from_env() -> Result<Self, AppError> {
        dotenv().ok();

        let db_url = env::var("ENGINE_DATABASE_URL").map_err(|_| {
            AppError::ConfigError(anyhow::anyhow!("ENGINE_DATABASE_URL must be set"))
        })?;
        let max_connections = env::var("ENGINE_DATABASE_MAX_CONNECTIONS")
            .unwrap_or_else(|_| "10".to_string())
            .parse()?;
        let min_connections = env::var("ENGINE_DATABASE_MIN_CONNECTIONS")
            .unwrap_or_else(|_| "1".to_string())
            .parse()?;

        let log_level = env::var("ENGINE_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());
        let continue_on_posting_failure = env::var("ENGINE_CONTINUE_ON_POSTING_FAILURE")
            .unwrap_or_else(|_| "true".to_string())
            .parse()
            .unwrap_or(true);

        Ok(Self {
            database: DatabaseConfig {
                url: Secret::new(db_url),
                max_connections,
                min_connections,
            },
            service_name: "posting-engine".to_string(),
            log_level,
            continue_on_posting_failure,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_env_reads_database_settings() {
        std::env::set_var("ENGINE_DATABASE_URL", "postgres://localhost/posting_test");
        std::env::set_var("ENGINE_DATABASE_MAX_CONNECTIONS", "5");
        std::env::remove_var("ENGINE_DATABASE_MIN_CONNECTIONS");
        std::env::remove_var("ENGINE_CONTINUE_ON_POSTING_FAILURE");

        let config = EngineConfig::from_env().expect("config should load");
        assert_eq!(config.database.max_connections, 5);
        assert_eq!(config.database.min_connections, 1);
        assert_eq!(config.service_name, "posting-engine");
        assert!(config.continue_on_posting_failure);
    }
}
