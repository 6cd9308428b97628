//! Configuration validation.
//!
//! Validates configuration at startup to catch common errors early.

use super::Config;
use thiserror::Error;

/// Upper bound for `manager.max_retries`.
pub const MAX_RETRIES_LIMIT: u32 = 100;

/// Validation errors for configuration.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("connection.host is required")]
    MissingHost,
    #[error("connection.port must be non-zero")]
    InvalidPort,
    #[error("connection.scheme must be http or https, got '{0}'")]
    InvalidScheme(String),
    #[error("connection.database '{0}' is not a valid CouchDB database name")]
    InvalidDatabaseName(String),
    #[error("connection.password is set without connection.username")]
    PasswordWithoutUsername,
    #[error("connection.timeout_secs must be non-zero")]
    InvalidTimeout,
    #[error("manager.max_retries must be at most 100, got {0}")]
    TooManyRetries(u32),
}

/// Validate a configuration, returning all errors found.
pub fn validate(config: &Config) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();
    let conn = &config.connection;

    if conn.host.trim().is_empty() {
        errors.push(ValidationError::MissingHost);
    }
    if conn.port == 0 {
        errors.push(ValidationError::InvalidPort);
    }
    if !matches!(conn.scheme.as_str(), "http" | "https") {
        errors.push(ValidationError::InvalidScheme(conn.scheme.clone()));
    }
    if !is_valid_database_name(&conn.database) {
        errors.push(ValidationError::InvalidDatabaseName(conn.database.clone()));
    }
    if conn.password.is_some() && conn.username.is_none() {
        errors.push(ValidationError::PasswordWithoutUsername);
    }
    if conn.timeout_secs == 0 {
        errors.push(ValidationError::InvalidTimeout);
    }

    if config.manager.max_retries > MAX_RETRIES_LIMIT {
        errors.push(ValidationError::TooManyRetries(config.manager.max_retries));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// CouchDB rule: `^[a-z][a-z0-9_$()+/-]*$`.
fn is_valid_database_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) if first.is_ascii_lowercase() => chars.all(|c| {
            c.is_ascii_lowercase() || c.is_ascii_digit() || "_$()+/-".contains(c)
        }),
        _ => false,
    }
}
