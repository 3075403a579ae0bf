//! Application error types.
//!
//! Every layer (configuration, connection, adapter, gate) reports failures through
//! [`AppError`]. Variants carry the context a caller needs to act on the failure:
//! the configuration name, the backend kind, the offending keyword or the native
//! driver message.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

use crate::models::connection::BackendKind;
use crate::response::ApiResponse;

/// Result alias used across all crates.
pub type AppResult<T> = Result<T, AppError>;

/// Unified error taxonomy.
#[derive(Debug, Error)]
pub enum AppError {
    // ---- configuration layer ----
    /// The configuration source does not exist.
    #[error("configuration file not found: {path}")]
    ConfigNotFound { path: String },

    /// The configuration source could not be parsed.
    #[error("configuration file is malformed: {0}")]
    ConfigMalformed(String),

    /// An entry lacks required fields or declares an unsupported kind.
    #[error("invalid configuration: {0}")]
    ConfigInvalid(String),

    /// No configuration with the requested name.
    #[error("configuration '{0}' does not exist")]
    ConfigNameUnknown(String),

    /// A `${TOKEN}` field references an undefined environment variable.
    #[error("environment variable {var} is not defined (config '{config}', field '{field}')")]
    MissingEnvironmentValue {
        config: String,
        field: String,
        var: String,
    },

    // ---- connection layer ----
    /// The backend driver was compiled out of this build.
    #[error("{kind} driver is not installed (config '{config}'); rebuild with the `{feature}` feature")]
    DriverMissing {
        config: String,
        kind: BackendKind,
        feature: &'static str,
    },

    /// The backend refused or did not answer the connection attempt.
    #[error("failed to connect to '{config}' ({kind}): {message}")]
    ConnectionFailed {
        config: String,
        kind: BackendKind,
        message: String,
    },

    // ---- adapter layer ----
    /// A statement failed on the backend.
    #[error("{kind} statement failed on '{config}': {message}")]
    BackendExecutionFailed {
        config: String,
        kind: BackendKind,
        message: String,
    },

    // ---- gate layer ----
    /// The statement does not start with SELECT.
    #[error("NotASelect: only SELECT statements are allowed")]
    NotASelect,

    /// The statement contains a forbidden keyword.
    #[error("ForbiddenKeyword: {0}")]
    ForbiddenKeyword(String),

    /// A table name failed the identifier allow-list.
    #[error("invalid identifier: {0}")]
    InvalidIdentifier(String),

    /// Request validation failed.
    #[error("validation error: {0}")]
    Validation(String),

    /// Internal error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Stable error code for API clients.
    pub fn code(&self) -> &'static str {
        match self {
            AppError::ConfigNotFound { .. } => "CONFIG_NOT_FOUND",
            AppError::ConfigMalformed(_) => "CONFIG_MALFORMED",
            AppError::ConfigInvalid(_) => "CONFIG_INVALID",
            AppError::ConfigNameUnknown(_) => "CONFIG_NAME_UNKNOWN",
            AppError::MissingEnvironmentValue { .. } => "MISSING_ENVIRONMENT_VALUE",
            AppError::DriverMissing { .. } => "DRIVER_MISSING",
            AppError::ConnectionFailed { .. } => "CONNECTION_FAILED",
            AppError::BackendExecutionFailed { .. } => "BACKEND_EXECUTION_FAILED",
            AppError::NotASelect => "NOT_A_SELECT",
            AppError::ForbiddenKeyword(_) => "FORBIDDEN_KEYWORD",
            AppError::InvalidIdentifier(_) => "INVALID_IDENTIFIER",
            AppError::Validation(_) => "VALIDATION_ERROR",
            AppError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// HTTP status for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::ConfigNameUnknown(_) => StatusCode::NOT_FOUND,
            AppError::NotASelect
            | AppError::ForbiddenKeyword(_)
            | AppError::InvalidIdentifier(_)
            | AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::DriverMissing { .. } => StatusCode::NOT_IMPLEMENTED,
            AppError::ConnectionFailed { .. } => StatusCode::BAD_GATEWAY,
            AppError::BackendExecutionFailed { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::ConfigNotFound { .. }
            | AppError::ConfigMalformed(_)
            | AppError::ConfigInvalid(_)
            | AppError::MissingEnvironmentValue { .. }
            | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Whether the error was raised by the query gate.
    pub fn is_gate_rejection(&self) -> bool {
        matches!(self, AppError::NotASelect | AppError::ForbiddenKeyword(_))
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        AppError::Validation(errors.to_string())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(code = self.code(), error = %self, "request failed");
        } else if self.is_gate_rejection() {
            // Already logged with its config by the service.
            tracing::debug!(code = self.code(), error = %self, "query rejected");
        } else {
            tracing::warn!(code = self.code(), error = %self, "request rejected");
        }
        let body = ApiResponse::err(self.code(), self.to_string());
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_forbidden_keyword_message() {
        let err = AppError::ForbiddenKeyword("DELETE".into());
        assert_eq!(err.to_string(), "ForbiddenKeyword: DELETE");
        assert!(err.is_gate_rejection());
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_connection_failed_carries_context() {
        let err = AppError::ConnectionFailed {
            config: "default".into(),
            kind: BackendKind::MySql,
            message: "Connection refused (os error 111)".into(),
        };
        let text = err.to_string();
        assert!(text.contains("default"));
        assert!(text.contains("mysql"));
        assert!(text.contains("Connection refused"));
        assert_eq!(err.code(), "CONNECTION_FAILED");
        assert!(!err.is_gate_rejection());
    }
}
