//! Error type system for Warden
//!
//! This module provides the service-wide error type with:
//! - Domain error classification (validation, duplicate user, credentials, session)
//! - HTTP status code mapping
//! - Uniform JSON error bodies carrying the request trace ID
//! - Generic client messages for internal failures

use crate::api::middleware::trace::current_trace_id;
use crate::api::validation::FieldError;
use crate::auth::jwt::TokenError;
use crate::shield::DenialReason;
use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Main error type for the Warden service
#[derive(Debug, thiserror::Error)]
pub enum WardenError {
    // Storage errors
    #[error("Database error: {0}")]
    DatabaseError(#[from] rusqlite::Error),

    #[error("Storage error: {0}")]
    StorageError(String),

    // Request errors
    #[error("Validation failed")]
    ValidationError(Vec<FieldError>),

    // Account errors
    #[error("User with email '{0}' already exists")]
    DuplicateUser(String),

    #[error("Invalid email or password")]
    InvalidCredentials,

    #[error("Session rejected: {0}")]
    Token(#[from] TokenError),

    #[error("Authentication required")]
    Unauthenticated,

    // Security gate errors
    #[error("Request denied: {reason}")]
    Forbidden {
        reason: DenialReason,
        /// Seconds until a rate-limited client may retry
        retry_after: Option<u64>,
    },

    #[error("Security gate unavailable: {0}")]
    GateUnavailable(String),

    // Crypto errors
    #[error("Password hashing failed: {0}")]
    HashError(String),

    // I/O errors
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Task error: {0}")]
    TaskError(String),
}

impl WardenError {
    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            // 400 Bad Request
            WardenError::ValidationError(_) => StatusCode::BAD_REQUEST,

            // 401 Unauthorized
            WardenError::InvalidCredentials
            | WardenError::Token(_)
            | WardenError::Unauthenticated => StatusCode::UNAUTHORIZED,

            // 403 Forbidden
            WardenError::Forbidden { .. } => StatusCode::FORBIDDEN,

            // 409 Conflict
            WardenError::DuplicateUser(_) => StatusCode::CONFLICT,

            // 503 Service Unavailable
            WardenError::GateUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,

            // 500 Internal Server Error
            WardenError::DatabaseError(_)
            | WardenError::StorageError(_)
            | WardenError::HashError(_)
            | WardenError::IoError(_)
            | WardenError::TaskError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Get the error type name for API responses
    pub fn error_type(&self) -> &'static str {
        match self {
            WardenError::DatabaseError(_) => "DatabaseError",
            WardenError::StorageError(_) => "StorageError",
            WardenError::ValidationError(_) => "ValidationError",
            WardenError::DuplicateUser(_) => "DuplicateUserError",
            WardenError::InvalidCredentials => "InvalidCredentialsError",
            WardenError::Token(_) => "TokenError",
            WardenError::Unauthenticated => "AuthenticationError",
            WardenError::Forbidden { .. } => "Forbidden",
            WardenError::GateUnavailable(_) => "SecurityGateUnavailable",
            WardenError::HashError(_) => "HashError",
            WardenError::IoError(_) => "IoError",
            WardenError::TaskError(_) => "TaskError",
        }
    }

    /// Whether the error is an unexpected internal failure
    pub fn is_internal(&self) -> bool {
        self.status_code().is_server_error() && !matches!(self, WardenError::GateUnavailable(_))
    }

    /// Message safe to hand back to the client.
    ///
    /// Internal failures collapse to a generic sentence, and every session
    /// failure reads the same whether the token expired or was forged.
    pub fn public_message(&self) -> String {
        match self {
            WardenError::Token(_) => "Invalid or expired session".to_string(),
            WardenError::Forbidden { reason, .. } => reason.message().to_string(),
            WardenError::GateUnavailable(_) => {
                "Request could not be verified, try again later".to_string()
            }
            e if e.is_internal() => "Internal server error".to_string(),
            e => e.to_string(),
        }
    }

    fn details(&self) -> Option<serde_json::Value> {
        match self {
            WardenError::ValidationError(errors) => serde_json::to_value(errors).ok(),
            _ => None,
        }
    }
}

/// Error response structure for API endpoints
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Error type identifier
    pub error: String,
    /// Human-readable error message
    pub message: String,
    /// Optional additional details
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
    /// Why the security gate turned the request away
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<DenialReason>,
    /// Trace ID of the request that failed
    pub trace_id: String,
}

impl ErrorResponse {
    /// Create a new error response tagged with the current request's trace ID
    pub fn new(error: String, message: String) -> Self {
        Self {
            error,
            message,
            details: None,
            reason: None,
            trace_id: current_trace_id().unwrap_or_else(|| Uuid::new_v4().to_string()),
        }
    }

    /// Create an error response from a WardenError
    pub fn from_error(error: &WardenError) -> Self {
        let mut response = Self::new(error.error_type().to_string(), error.public_message());
        response.details = error.details();
        if let WardenError::Forbidden { reason, .. } = error {
            response.reason = Some(*reason);
        }
        response
    }
}

impl fmt::Display for ErrorResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {} (trace_id: {})",
            self.error, self.message, self.trace_id
        )
    }
}

/// Implement IntoResponse for WardenError to enable automatic error handling in Axum
impl IntoResponse for WardenError {
    fn into_response(self) -> Response {
        let status_code = self.status_code();
        let error_response = ErrorResponse::from_error(&self);

        if self.is_internal() {
            tracing::error!(
                error_type = self.error_type(),
                trace_id = %error_response.trace_id,
                status_code = %status_code,
                error = ?self,
                "Request failed: {}",
                self
            );
        } else {
            tracing::warn!(
                error_type = self.error_type(),
                trace_id = %error_response.trace_id,
                status_code = %status_code,
                "Request rejected: {}",
                self
            );
        }

        let mut response = (status_code, Json(error_response)).into_response();
        if let WardenError::Forbidden {
            retry_after: Some(seconds),
            ..
        } = self
        {
            if let Ok(value) = HeaderValue::from_str(&seconds.to_string()) {
                response.headers_mut().insert(header::RETRY_AFTER, value);
            }
        }
        response
    }
}

/// Result type alias for operations that can fail with WardenError
pub type Result<T> = std::result::Result<T, WardenError>;
