use std::fmt::{Debug, Display, Formatter};

use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use serde::Deserialize;
use serde_json::json;
use thiserror::Error;
use tracing::error;

#[derive(Debug)]
pub struct PoolInitializationError(pub String);

impl Display for PoolInitializationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.pad(&self.0)
    }
}

/// Runtime configuration, sourced from environment variables (after `dotenv`
/// has loaded `.env`). Every key has a development-friendly default.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub bind_address: String,
    pub database_url: String,
    pub jwt_secret: String,
    pub environment: String,
    pub admin_password: String,
    pub resend_api_key: Option<String>,
    pub email_owner: Option<String>,
    pub send_email_on_guest_create: bool,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, config::ConfigError> {
        config::Config::builder()
            .set_default("bind_address", "127.0.0.1:8080")?
            .set_default("database_url", "data/wedding.db")?
            .set_default("jwt_secret", "wedding-secret-2026")?
            .set_default("environment", "development")?
            .set_default("admin_password", "admin")?
            .set_default("send_email_on_guest_create", false)?
            .add_source(config::Environment::default().try_parsing(true))
            .build()?
            .try_deserialize()
    }

    /// Seeding and reset endpoints are refused outside of dev mode.
    pub fn is_dev(&self) -> bool {
        self.environment != "production"
    }
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error("database error: {0}")]
    Database(#[from] diesel::result::Error),
    #[error("connection pool error: {0}")]
    Pool(String),
    #[error("password hash error: {0}")]
    PasswordHash(String),
}

/// Caller-visible error taxonomy. Every route returns
/// `Result<HttpResponse, ApiError>`; the `ResponseError` impl renders the
/// `{"success": false, "error": ..., "message": ...}` envelope.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    Unauthorized(String),
    #[error("{0}")]
    Forbidden(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Conflict(String),
    #[error("{0}")]
    Database(String),
    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    fn label(&self) -> &'static str {
        match self {
            ApiError::Validation(_) => "Validation error",
            ApiError::Unauthorized(_) => "Unauthorized",
            ApiError::Forbidden(_) => "Forbidden",
            ApiError::NotFound(_) => "Not found",
            ApiError::Conflict(_) => "Conflict",
            ApiError::Database(_) => "Database error",
            ApiError::Internal(_) => "Internal server error",
        }
    }
}

impl From<diesel::result::Error> for ApiError {
    fn from(err: diesel::result::Error) -> Self {
        use diesel::result::{DatabaseErrorKind, Error};

        match err {
            Error::NotFound => ApiError::NotFound("Record not found".to_owned()),
            Error::DatabaseError(DatabaseErrorKind::UniqueViolation, info) => {
                ApiError::Conflict(info.message().to_owned())
            }
            other => ApiError::Database(other.to_string()),
        }
    }
}

impl From<actix::MailboxError> for ApiError {
    fn from(err: actix::MailboxError) -> Self {
        ApiError::Internal(format!("database actor unavailable: {err}"))
    }
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Database(_) | ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        if self.status_code() == StatusCode::INTERNAL_SERVER_ERROR {
            error!(error = %self, "request failed");
        }
        HttpResponse::build(self.status_code()).json(json!({
            "success": false,
            "error": self.label(),
            "message": self.to_string(),
        }))
    }
}
