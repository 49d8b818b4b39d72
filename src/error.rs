//! Error types for a3s-ingest

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

/// Errors that can occur while ingesting, publishing, or auditing events
#[derive(Debug, Error)]
pub enum IngestError {
    /// A directly-submitted event is missing a required field
    #[error("missing required field: {field}")]
    Validation { field: &'static str },

    /// Request body matches no known payload shape, or fails to parse as the detected one
    #[error("invalid payload format: {0}")]
    Format(String),

    /// Variable type outside the supported set
    #[error("unsupported variable type: {0}")]
    UnsupportedVariableType(String),

    /// Variable command outside the supported set
    #[error("unsupported command: {0}")]
    UnsupportedCommand(String),

    /// Mutation payload does not match the variable's declared type
    #[error("{0}")]
    Parse(String),

    /// Variable is not declared for the hub
    #[error("variable '{name}' not found in hub '{hub}'")]
    VariableNotFound { hub: String, name: String },

    /// Publish failure
    #[error("failed to publish event to subject '{subject}': {reason}")]
    Publish { subject: String, reason: String },

    /// Caller cancelled the operation
    #[error("operation cancelled: {0}")]
    Cancelled(String),

    /// Caller deadline exceeded
    #[error("operation timed out: {0}")]
    Timeout(String),

    /// Serialization/deserialization failure
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Backend connection failure
    #[error("connection error: {0}")]
    Connection(String),

    /// Key-value or audit backend failure
    #[error("store error: {0}")]
    Store(String),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// HTTP server failure (bind, serve)
    #[error("server error: {0}")]
    Server(String),

    /// Several independent failures from one batch
    #[error("{}", join_errors(.0))]
    Batch(Vec<IngestError>),
}

fn join_errors(errors: &[IngestError]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

impl IngestError {
    /// True for cancellation and deadline signals, which abort a publish batch
    pub fn is_cancellation(&self) -> bool {
        matches!(self, IngestError::Cancelled(_) | IngestError::Timeout(_))
    }

    /// Join accumulated errors; `None` when there are none
    pub fn join(mut errors: Vec<IngestError>) -> Option<IngestError> {
        match errors.len() {
            0 => None,
            1 => errors.pop(),
            _ => Some(IngestError::Batch(errors)),
        }
    }

    /// HTTP status this error maps to at the API boundary
    pub fn status_code(&self) -> StatusCode {
        match self {
            IngestError::Validation { .. }
            | IngestError::Format(_)
            | IngestError::UnsupportedVariableType(_)
            | IngestError::UnsupportedCommand(_)
            | IngestError::Parse(_)
            | IngestError::Serialization(_) => StatusCode::BAD_REQUEST,
            IngestError::VariableNotFound { .. } => StatusCode::NOT_FOUND,
            IngestError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<redis::RedisError> for IngestError {
    fn from(err: redis::RedisError) -> Self {
        IngestError::Store(err.to_string())
    }
}

impl IntoResponse for IngestError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::warn!(status = %status, error = %self, "Request failed");
        }
        let body = serde_json::json!({ "error": self.to_string() });
        (status, axum::Json(body)).into_response()
    }
}

/// Result type alias for ingest operations
pub type Result<T> = std::result::Result<T, IngestError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cancellation_classification() {
        assert!(IngestError::Cancelled("client gone".into()).is_cancellation());
        assert!(IngestError::Timeout("deadline".into()).is_cancellation());
        assert!(!IngestError::Publish {
            subject: "events.a.b".into(),
            reason: "nats down".into(),
        }
        .is_cancellation());
    }

    #[test]
    fn test_join_errors() {
        assert!(IngestError::join(vec![]).is_none());

        let single = IngestError::join(vec![IngestError::Parse("int expected".into())]).unwrap();
        assert_eq!(single.to_string(), "int expected");

        let joined = IngestError::join(vec![
            IngestError::Parse("a".into()),
            IngestError::Parse("b".into()),
        ])
        .unwrap();
        assert_eq!(joined.to_string(), "a; b");
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(
            IngestError::Validation { field: "name" }.status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            IngestError::VariableNotFound {
                hub: "h".into(),
                name: "v".into()
            }
            .status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            IngestError::Store("redis down".into()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
