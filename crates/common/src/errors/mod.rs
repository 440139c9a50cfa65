//! Error types for FinSight services
//!
//! Provides:
//! - Distinct error types for different failure modes
//! - HTTP status code mapping
//! - Structured error responses
//! - Error codes for client handling

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias using AppError
pub type Result<T> = std::result::Result<T, AppError>;

/// Error codes for machine-readable error identification
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // Validation errors (1xxx)
    ValidationError,
    MissingField,
    InvalidFormat,
    PayloadTooLarge,

    // Resource errors (4xxx)
    NotFound,
    ConversationNotFound,
    DocumentNotFound,

    // Collaborator errors (8xxx)
    CollaboratorError,
    CollaboratorTimeout,
    CollaboratorAuth,
    CollaboratorMalformed,

    // Extraction errors (85xx)
    ExtractionFailed,

    // Storage errors (7xxx)
    StoreError,
    StaleVersion,

    // Internal errors (9xxx)
    InternalError,
    ConfigurationError,
    SerializationError,
}

impl ErrorCode {
    /// Get the numeric code for this error
    pub fn as_code(&self) -> u16 {
        match self {
            // Validation (1xxx)
            ErrorCode::ValidationError => 1001,
            ErrorCode::MissingField => 1002,
            ErrorCode::InvalidFormat => 1003,
            ErrorCode::PayloadTooLarge => 1004,

            // Resources (4xxx)
            ErrorCode::NotFound => 4001,
            ErrorCode::ConversationNotFound => 4002,
            ErrorCode::DocumentNotFound => 4003,

            // Storage (7xxx)
            ErrorCode::StoreError => 7001,
            ErrorCode::StaleVersion => 7002,

            // Collaborator (8xxx)
            ErrorCode::CollaboratorError => 8001,
            ErrorCode::CollaboratorTimeout => 8002,
            ErrorCode::CollaboratorAuth => 8003,
            ErrorCode::CollaboratorMalformed => 8004,
            ErrorCode::ExtractionFailed => 8501,

            // Internal (9xxx)
            ErrorCode::InternalError => 9001,
            ErrorCode::ConfigurationError => 9002,
            ErrorCode::SerializationError => 9003,
        }
    }
}

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    // Validation errors
    #[error("Validation failed: {message}")]
    Validation {
        message: String,
        field: Option<String>,
    },

    #[error("Required field missing: {field}")]
    MissingField { field: String },

    #[error("Invalid format: {message}")]
    InvalidFormat { message: String },

    #[error("Payload too large: {size} bytes exceeds limit of {limit} bytes")]
    PayloadTooLarge { size: usize, limit: usize },

    // Resource errors
    #[error("Resource not found: {resource_type} with id {id}")]
    NotFound { resource_type: String, id: String },

    #[error("Conversation not found: {id}")]
    ConversationNotFound { id: String },

    #[error("Document not found: {id}")]
    DocumentNotFound { id: String },

    // Collaborator errors
    #[error("Collaborator error: {message}")]
    Collaborator { message: String },

    #[error("Collaborator timed out after {timeout_ms}ms")]
    CollaboratorTimeout { timeout_ms: u64 },

    #[error("Collaborator authentication failed: {message}")]
    CollaboratorAuth { message: String },

    #[error("Collaborator returned malformed output: {message}")]
    CollaboratorMalformed { message: String },

    // Extraction errors
    #[error("Extraction failed for document {document_id}: {message}")]
    ExtractionFailed {
        document_id: String,
        message: String,
    },

    // Storage errors
    #[error("Store error: {message}")]
    Store { message: String },

    #[error("Stale version for conversation {id}: expected {expected}, found {found}")]
    StaleVersion {
        id: String,
        expected: u64,
        found: u64,
    },

    #[error("HTTP client error: {0}")]
    HttpClient(#[from] reqwest::Error),

    // Internal errors
    #[error("Internal server error: {message}")]
    Internal { message: String },

    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // Generic
    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl AppError {
    /// Get the error code for this error
    pub fn code(&self) -> ErrorCode {
        match self {
            AppError::Validation { .. } => ErrorCode::ValidationError,
            AppError::MissingField { .. } => ErrorCode::MissingField,
            AppError::InvalidFormat { .. } => ErrorCode::InvalidFormat,
            AppError::PayloadTooLarge { .. } => ErrorCode::PayloadTooLarge,
            AppError::NotFound { .. } => ErrorCode::NotFound,
            AppError::ConversationNotFound { .. } => ErrorCode::ConversationNotFound,
            AppError::DocumentNotFound { .. } => ErrorCode::DocumentNotFound,
            AppError::Collaborator { .. } => ErrorCode::CollaboratorError,
            AppError::CollaboratorTimeout { .. } => ErrorCode::CollaboratorTimeout,
            AppError::CollaboratorAuth { .. } => ErrorCode::CollaboratorAuth,
            AppError::CollaboratorMalformed { .. } => ErrorCode::CollaboratorMalformed,
            AppError::ExtractionFailed { .. } => ErrorCode::ExtractionFailed,
            AppError::Store { .. } => ErrorCode::StoreError,
            AppError::StaleVersion { .. } => ErrorCode::StaleVersion,
            AppError::HttpClient(_) => ErrorCode::CollaboratorError,
            AppError::Internal { .. } => ErrorCode::InternalError,
            AppError::Configuration { .. } => ErrorCode::ConfigurationError,
            AppError::Serialization(_) => ErrorCode::SerializationError,
            AppError::Other(_) => ErrorCode::InternalError,
        }
    }

    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            // 400 Bad Request
            AppError::Validation { .. }
            | AppError::MissingField { .. }
            | AppError::InvalidFormat { .. } => StatusCode::BAD_REQUEST,

            // 404 Not Found
            AppError::NotFound { .. }
            | AppError::ConversationNotFound { .. }
            | AppError::DocumentNotFound { .. } => StatusCode::NOT_FOUND,

            // 409 Conflict
            AppError::StaleVersion { .. } => StatusCode::CONFLICT,

            // 413 Payload Too Large
            AppError::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,

            // 500 Internal Server Error
            AppError::Store { .. }
            | AppError::ExtractionFailed { .. }
            | AppError::Internal { .. }
            | AppError::Configuration { .. }
            | AppError::Serialization(_)
            | AppError::Other(_) => StatusCode::INTERNAL_SERVER_ERROR,

            // 502 Bad Gateway
            AppError::Collaborator { .. }
            | AppError::CollaboratorAuth { .. }
            | AppError::CollaboratorMalformed { .. }
            | AppError::HttpClient(_) => StatusCode::BAD_GATEWAY,

            // 504 Gateway Timeout
            AppError::CollaboratorTimeout { .. } => StatusCode::GATEWAY_TIMEOUT,
        }
    }

    /// Check if this error is a collaborator failure recoverable within a turn
    pub fn is_collaborator_error(&self) -> bool {
        matches!(
            self,
            AppError::Collaborator { .. }
                | AppError::CollaboratorTimeout { .. }
                | AppError::CollaboratorAuth { .. }
                | AppError::CollaboratorMalformed { .. }
                | AppError::HttpClient(_)
        )
    }

    /// Check if this error should be logged at error level
    pub fn is_server_error(&self) -> bool {
        self.status_code().is_server_error()
    }

    /// Check if this error is a client error
    pub fn is_client_error(&self) -> bool {
        self.status_code().is_client_error()
    }
}

/// Structured error response for API
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: ErrorDetails,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorDetails {
    pub code: ErrorCode,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let code = self.code();
        let message = self.to_string();

        // Log based on severity
        if self.is_server_error() {
            tracing::error!(
                error = %message,
                code = ?code,
                status = status.as_u16(),
                "Server error"
            );
        } else if self.is_client_error() {
            tracing::warn!(
                error = %message,
                code = ?code,
                status = status.as_u16(),
                "Client error"
            );
        }

        let body = ErrorResponse {
            error: ErrorDetails {
                code,
                message,
                details: None,
            },
        };

        (status, Json(body)).into_response()
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::Internal {
            message: err.to_string(),
        }
    }
}
