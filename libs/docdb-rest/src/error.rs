use std::time::Duration;

use docdb_sdk::DocDbError;
use thiserror::Error;

/// Failures below the REST protocol: building, sending or receiving a request.
///
/// A response with a non-success status is not an `HttpError`; the client
/// classifies it into [`DocDbError`] from the status code.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum HttpError {
    #[error("could not build request: {0}")]
    RequestBuild(#[from] http::Error),

    /// No response (or no complete body) within the configured timeout
    #[error("no response within {0:?}")]
    Timeout(Duration),

    /// Connection, protocol or body read failure
    #[error("request failed: {0}")]
    Transport(#[source] Box<dyn std::error::Error + Send + Sync>),

    #[error("TLS setup failed: {0}")]
    Tls(#[source] Box<dyn std::error::Error + Send + Sync>),

    #[error("response body exceeds {limit} bytes (read {actual})")]
    BodyTooLarge { limit: usize, actual: usize },

    /// The endpoint scheme is not allowed by the transport security mode
    #[error("endpoint scheme '{scheme}' rejected: {reason}")]
    InvalidScheme { scheme: String, reason: String },
}

impl From<hyper_util::client::legacy::Error> for HttpError {
    fn from(err: hyper_util::client::legacy::Error) -> Self {
        Self::Transport(Box::new(err))
    }
}

impl From<HttpError> for DocDbError {
    fn from(err: HttpError) -> Self {
        match err {
            HttpError::Timeout(after) => Self::Timeout(after),
            HttpError::RequestBuild(_) | HttpError::InvalidScheme { .. } => {
                Self::InvalidRequest(err.to_string())
            }
            HttpError::Transport(_) | HttpError::Tls(_) | HttpError::BodyTooLarge { .. } => {
                Self::Transport(err.to_string())
            }
        }
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    #[test]
    fn transport_failure_keeps_its_source() {
        let io = std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "refused");
        let err = HttpError::Transport(Box::new(io));

        let source = std::error::Error::source(&err).unwrap();
        assert_eq!(source.to_string(), "refused");
        assert!(matches!(DocDbError::from(err), DocDbError::Transport(msg) if msg.contains("refused")));
    }

    #[test]
    fn timeout_keeps_its_duration() {
        let err: DocDbError = HttpError::Timeout(Duration::from_secs(3)).into();
        assert!(matches!(err, DocDbError::Timeout(d) if d == Duration::from_secs(3)));
    }

    #[test]
    fn rejected_scheme_is_a_local_request_error() {
        let err: DocDbError = HttpError::InvalidScheme {
            scheme: "http".to_owned(),
            reason: "https required".to_owned(),
        }
        .into();
        assert!(matches!(err, DocDbError::InvalidRequest(msg) if msg.contains("'http'")));
        let oversized: DocDbError = HttpError::BodyTooLarge { limit: 1, actual: 2 }.into();
        assert!(oversized.status().is_none());
    }
}
