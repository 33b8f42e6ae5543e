//! Error types for Skillswap

use hyper::StatusCode;

use crate::exchange::TermsError;

/// Main error type for marketplace operations
#[derive(Debug, thiserror::Error)]
pub enum MarketError {
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl MarketError {
    /// Convert error to HTTP status code
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::Database(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Machine-readable error code for JSON error bodies
    pub fn code(&self) -> &'static str {
        match self {
            Self::BadRequest(_) => "BAD_REQUEST",
            Self::Unauthorized(_) => "UNAUTHORIZED",
            Self::Forbidden(_) => "FORBIDDEN",
            Self::NotFound(_) => "NOT_FOUND",
            Self::Conflict(_) => "CONFLICT",
            Self::Database(_) => "DB_ERROR",
            Self::Config(_) => "CONFIG_ERROR",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Convert to status code and body tuple for HTTP response
    pub fn into_status_code_and_body(self) -> (StatusCode, String) {
        let status = self.status_code();
        let body = self.to_string();
        (status, body)
    }
}

impl From<std::io::Error> for MarketError {
    fn from(err: std::io::Error) -> Self {
        Self::Internal(err.to_string())
    }
}

impl From<serde_json::Error> for MarketError {
    fn from(err: serde_json::Error) -> Self {
        Self::BadRequest(format!("JSON error: {}", err))
    }
}

impl From<hyper::Error> for MarketError {
    fn from(err: hyper::Error) -> Self {
        Self::Internal(format!("HTTP error: {}", err))
    }
}

impl From<mongodb::error::Error> for MarketError {
    fn from(err: mongodb::error::Error) -> Self {
        Self::Database(err.to_string())
    }
}

impl From<bson::oid::Error> for MarketError {
    fn from(err: bson::oid::Error) -> Self {
        Self::BadRequest(format!("Invalid ID: {}", err))
    }
}

impl From<jsonwebtoken::errors::Error> for MarketError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        Self::Unauthorized(format!("Session error: {}", err))
    }
}

impl From<TermsError> for MarketError {
    fn from(err: TermsError) -> Self {
        match err {
            TermsError::FieldsNotEditable { .. } => Self::Forbidden(err.to_string()),
            TermsError::Locked(_) => Self::Conflict(err.to_string()),
            TermsError::Empty | TermsError::InvalidValue(_) => Self::BadRequest(err.to_string()),
        }
    }
}

/// Result type alias for marketplace operations
pub type Result<T> = std::result::Result<T, MarketError>;
