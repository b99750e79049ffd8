use std::collections::BTreeMap;

use thiserror::Error;

use crate::upstream::UpstreamError;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Redis error: {0}")]
    RedisError(#[from] redis::RedisError),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Email error: {0}")]
    EmailError(String),

    #[error("Token error: {0}")]
    TokenError(#[from] jsonwebtoken::errors::Error),

    #[error("Access token required")]
    MissingToken,

    #[error("Invalid access token")]
    InvalidToken,

    #[error("User not found")]
    UserNotFound,

    #[error("Refresh token required")]
    MissingRefreshToken,

    #[error("Refresh token expired or invalid")]
    InvalidRefreshToken,

    #[error("{0}")]
    InvalidOtp(String),

    #[error("Too many requests. Please try again later.")]
    RateLimitExceeded,

    #[error("Validation failed")]
    Validation(BTreeMap<String, String>),

    #[error("Either city name or coordinates (lat, lon) are required")]
    MissingParameters,

    #[error("Location already saved")]
    LocationExists,

    #[error("Maximum number of saved locations reached ({0})")]
    LocationLimit(usize),

    #[error("Location not found")]
    LocationNotFound,

    #[error(transparent)]
    Upstream(#[from] UpstreamError),

    #[error("Route Not Found")]
    RouteNotFound,

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Storage error: {0}")]
    StorageError(String),
}

impl AppError {
    /// Single-field validation failure, formatted as `field: message`.
    pub fn invalid_field(field: &str, message: &str) -> Self {
        let mut errors = BTreeMap::new();
        errors.insert(field.to_string(), format!("{}: {}", field, message));
        AppError::Validation(errors)
    }
}
