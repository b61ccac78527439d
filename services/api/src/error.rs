//! services/api/src/error.rs
//!
//! Defines the primary error type for the entire API service, and the mapping
//! of core errors onto HTTP responses.

use axum::http::StatusCode;
use tracing::error;
use vidmart_core::{AddressError, CheckoutError, PortError, RewardError};

use crate::config::ConfigError;

/// The primary error type for the `api` service.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Represents an error that occurred during configuration loading.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Represents an error that propagated up from one of the core service ports.
    #[error("Service Port Error: {0}")]
    Port(#[from] PortError),

    /// Represents an error from the underlying database library.
    #[error("Database Error: {0}")]
    Database(#[from] sqlx::Error),

    /// Represents an error from running the embedded migrations.
    #[error("Migration Error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// Represents a standard Input/Output error (e.g., binding to a network socket).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A catch-all for any other unexpected errors.
    #[error("An unexpected internal error occurred: {0}")]
    Internal(String),
}

/// The error half of every handler's return type.
pub type HttpError = (StatusCode, String);

/// Maps a port error onto a status code. Server-side failures are logged and
/// their details kept out of the response body.
pub fn port_to_http(e: PortError) -> HttpError {
    match e {
        PortError::NotFound(what) => (StatusCode::NOT_FOUND, what),
        PortError::Unauthorized => (StatusCode::FORBIDDEN, "Forbidden".to_string()),
        PortError::Gateway(message) => {
            error!("Blockchain gateway error: {}", message);
            (StatusCode::BAD_GATEWAY, message)
        }
        PortError::Unexpected(message) => {
            error!("Unexpected port error: {}", message);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error".to_string(),
            )
        }
    }
}

pub fn checkout_to_http(e: CheckoutError) -> HttpError {
    match e {
        CheckoutError::Validation(message) => (StatusCode::BAD_REQUEST, message),
        CheckoutError::Port(e) => port_to_http(e),
    }
}

pub fn address_to_http(e: AddressError) -> HttpError {
    match e {
        AddressError::Validation(message) => (StatusCode::BAD_REQUEST, message),
        AddressError::Port(e) => port_to_http(e),
    }
}

pub fn reward_to_http(e: RewardError) -> HttpError {
    match e {
        RewardError::InvalidAmount => (StatusCode::BAD_REQUEST, e.to_string()),
        RewardError::Port(e) => port_to_http(e),
    }
}
