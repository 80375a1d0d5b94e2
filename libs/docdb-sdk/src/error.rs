//! Error types for document database clients.

use std::time::Duration;

use thiserror::Error;

/// Errors returned by [`DocDbClient`](crate::DocDbClient) implementations.
///
/// Service-side failures are classified by HTTP status so callers can match
/// on the expected outcomes (`NotFound`, `Conflict`) without parsing messages.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum DocDbError {
    /// The addressed resource does not exist (HTTP 404).
    #[error("resource not found: {resource}")]
    NotFound { resource: String },

    /// A resource with the same id already exists (HTTP 409).
    #[error("resource already exists: {resource}")]
    Conflict { resource: String },

    /// The credential is valid but does not grant this operation (HTTP 403).
    #[error("forbidden: {message}")]
    Forbidden { message: String },

    /// The credential was rejected (HTTP 401).
    #[error("unauthorized: {message}")]
    Unauthorized { message: String },

    /// The request was malformed (HTTP 400).
    #[error("bad request: {message}")]
    BadRequest { message: String },

    /// Any other non-success status returned by the service.
    #[error("service error {status}: {message}")]
    Service {
        status: u16,
        code: Option<String>,
        message: String,
    },

    /// No resource token in the session covers the requested resource.
    #[error("no resource token covers '{resource}'")]
    MissingResourceToken { resource: String },

    /// The request could not be built locally.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Network or protocol failure before a response was received.
    #[error("transport error: {0}")]
    Transport(String),

    /// The request did not complete within the configured timeout.
    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    /// Request or response body could not be (de)serialized.
    #[error("serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl DocDbError {
    /// Classify a non-success service response.
    #[must_use]
    pub fn from_status(
        status: u16,
        code: Option<String>,
        message: String,
        resource: impl Into<String>,
    ) -> Self {
        match status {
            400 => Self::BadRequest { message },
            401 => Self::Unauthorized { message },
            403 => Self::Forbidden { message },
            404 => Self::NotFound {
                resource: resource.into(),
            },
            409 => Self::Conflict {
                resource: resource.into(),
            },
            _ => Self::Service {
                status,
                code,
                message,
            },
        }
    }

    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    #[must_use]
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }

    #[must_use]
    pub fn is_forbidden(&self) -> bool {
        matches!(self, Self::Forbidden { .. })
    }

    /// Fixed, message-free label of the error class.
    #[must_use]
    pub fn category(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => "not found",
            Self::Conflict { .. } => "already exists",
            Self::Forbidden { .. } => "forbidden",
            Self::Unauthorized { .. } => "unauthorized",
            Self::BadRequest { .. } => "bad request",
            Self::Service { .. } => "service error",
            Self::MissingResourceToken { .. } => "missing resource token",
            Self::InvalidRequest(_) => "invalid request",
            Self::Transport(_) => "transport error",
            Self::Timeout(_) => "timed out",
            Self::Serialization(_) => "serialization failed",
        }
    }

    /// HTTP status this error corresponds to, when it came from the service.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::BadRequest { .. } => Some(400),
            Self::Unauthorized { .. } => Some(401),
            Self::Forbidden { .. } => Some(403),
            Self::NotFound { .. } => Some(404),
            Self::Conflict { .. } => Some(409),
            Self::Service { status, .. } => Some(*status),
            _ => None,
        }
    }
}
