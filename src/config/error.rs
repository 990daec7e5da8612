//! Configuration error types

use thiserror::Error;

/// Errors that can occur during configuration loading
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration loading failed: {0}")]
    LoadError(#[from] config::ConfigError),

    #[error("Validation failed: {0}")]
    ValidationFailed(#[from] ValidationError),
}

/// Errors that can occur during configuration validation
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Required configuration missing: {0}")]
    MissingRequired(&'static str),

    #[error("Invalid port number")]
    InvalidPort,

    #[error("Invalid socket address: {0}")]
    InvalidSocketAddr(String),

    #[error("Invalid Redis URL format")]
    InvalidRedisUrl,

    #[error("JWT secret must be at least 32 bytes in production")]
    JwtSecretTooShort,

    #[error("Ping interval must be shorter than the pong timeout")]
    PingIntervalTooLong,

    #[error("Timeout '{0}' must be greater than zero")]
    ZeroTimeout(&'static str),

    #[error("Maximum message size must be greater than zero")]
    InvalidMessageSize,

    #[error("An origin allowlist is required in production")]
    OriginAllowlistRequired,
}
