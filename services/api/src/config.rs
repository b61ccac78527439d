//! services/api/src/config.rs
//!
//! Defines the application's configuration structure and loading logic.
//!
//! All configuration is loaded from environment variables at startup. The `.env`
//! file is used for local development.

use std::net::SocketAddr;
use tracing::Level;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing the environment variable {0}")]
    MissingVar(String),
    #[error("Invalid value for the environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub bind_address: SocketAddr,
    pub database_url: String,
    pub db_max_connections: u32,
    pub log_level: Level,
    pub cors_origin: String,
    /// Base URL of the edge functions fronting the blockchain testnet.
    pub blockchain_functions_url: String,
    pub blockchain_api_key: Option<String>,
    /// Lets callers credit coin rewards to their own ledger. Off unless set.
    pub allow_self_rewards: bool,
    /// How often idle sessions are swept from memory.
    pub session_sweep_secs: u64,
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    /// It will look for a `.env` file in the current directory for development,
    /// but this is skipped in test environments to ensure tests are hermetic.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Only load from .env in non-test mode to avoid contamination.
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }

        // --- Load Server and Database Settings ---
        let bind_address_str =
            std::env::var("BIND_ADDRESS").unwrap_or_else(|_| "0.0.0.0:3000".to_string());
        let bind_address = bind_address_str.parse::<SocketAddr>().map_err(|e| {
            ConfigError::InvalidValue("BIND_ADDRESS".to_string(), e.to_string())
        })?;

        let database_url = std::env::var("DATABASE_URL")
            .map_err(|_| ConfigError::MissingVar("DATABASE_URL".to_string()))?;

        let db_max_connections = match std::env::var("DB_MAX_CONNECTIONS") {
            Ok(raw) => raw.parse::<u32>().map_err(|e| {
                ConfigError::InvalidValue("DB_MAX_CONNECTIONS".to_string(), e.to_string())
            })?,
            Err(_) => 5,
        };

        let log_level_str = std::env::var("RUST_LOG").unwrap_or_else(|_| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        let cors_origin =
            std::env::var("CORS_ORIGIN").unwrap_or_else(|_| "http://localhost:3000".to_string());

        // --- Load Blockchain Gateway Settings ---
        let blockchain_functions_url = std::env::var("BLOCKCHAIN_FUNCTIONS_URL")
            .unwrap_or_else(|_| "http://localhost:54321/functions/v1".to_string())
            .trim_end_matches('/')
            .to_string();
        let blockchain_api_key = std::env::var("BLOCKCHAIN_API_KEY").ok();
        let allow_self_rewards = match std::env::var("ALLOW_SELF_REWARDS") {
            Ok(raw) => raw.parse::<bool>().map_err(|e| {
                ConfigError::InvalidValue("ALLOW_SELF_REWARDS".to_string(), e.to_string())
            })?,
            Err(_) => false,
        };

        // --- Load Session Settings ---
        let session_sweep_secs = match std::env::var("SESSION_SWEEP_SECS") {
            Ok(raw) => raw.parse::<u64>().ok().filter(|secs| *secs > 0).ok_or_else(|| {
                ConfigError::InvalidValue(
                    "SESSION_SWEEP_SECS".to_string(),
                    format!("'{}' is not a positive number of seconds", raw),
                )
            })?,
            Err(_) => 600,
        };

        Ok(Self {
            bind_address,
            database_url,
            db_max_connections,
            log_level,
            cors_origin,
            blockchain_functions_url,
            blockchain_api_key,
            allow_self_rewards,
            session_sweep_secs,
        })
    }
}
