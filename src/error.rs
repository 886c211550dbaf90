use thiserror::Error;

use crate::models::validation::ValidationError;

/// Application-wide error types.
#[derive(Debug, Error)]
pub enum AppError {
    /// The client sent something unusable: bad id, bad body, wrong content type.
    #[error("Malformed data: {0}")]
    MalformedData(String),

    /// A resource lookup came back empty. Carries the client-facing message.
    #[error("{0}")]
    NotFound(String),

    /// No route matched the request.
    #[error("Page not found")]
    PageNotFound,

    /// A document was still present after being deleted.
    #[error("{0}")]
    NotDeleted(String),

    #[error("Search backend error: {0}")]
    Search(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<ValidationError> for AppError {
    fn from(err: ValidationError) -> Self {
        AppError::MalformedData(err.to_string())
    }
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::Config(err.to_string())
    }
}
