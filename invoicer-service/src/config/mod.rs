//! Configuration for invoicer-service.

use anyhow::{Context, Result};
use dotenvy::dotenv;
use invoicer_core::config::Config as CoreConfig;
use secrecy::Secret;
use std::env;

#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub common: CoreConfig,
    pub service_name: String,
    pub log_level: String,
    pub otlp_endpoint: Option<String>,
    pub database: DatabaseConfig,
}

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: Secret<String>,
    pub max_connections: u32,
    pub min_connections: u32,
}

impl ServiceConfig {
    pub fn from_env() -> Result<Self> {
        dotenv().ok();

        let host = env::var("INVOICER_HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
        let port = env::var("INVOICER_PORT")
            .unwrap_or_else(|_| "7400".to_string())
            .parse()
            .context("INVOICER_PORT must be a valid port number")?;

        let db_url =
            env::var("INVOICER_DATABASE_URL").context("INVOICER_DATABASE_URL must be set")?;
        let max_connections = env::var("INVOICER_DB_MAX_CONNECTIONS")
            .unwrap_or_else(|_| "10".to_string())
            .parse()
            .context("INVOICER_DB_MAX_CONNECTIONS must be an integer")?;
        let min_connections = env::var("INVOICER_DB_MIN_CONNECTIONS")
            .unwrap_or_else(|_| "1".to_string())
            .parse()
            .context("INVOICER_DB_MIN_CONNECTIONS must be an integer")?;

        let log_level = env::var("INVOICER_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());
        let otlp_endpoint = env::var("INVOICER_OTLP_ENDPOINT").ok();

        Ok(Self {
            common: CoreConfig { host, port },
            service_name: "invoicer-service".to_string(),
            log_level,
            otlp_endpoint,
            database: DatabaseConfig {
                url: Secret::new(db_url),
                max_connections,
                min_connections,
            },
        })
    }
}
