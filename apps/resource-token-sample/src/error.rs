use docdb_sdk::DocDbError;
use thiserror::Error;

/// Failures that stop the sample.
///
/// Errors of individual scoped operations are not listed here: they are
/// reported as [`Outcome`](crate::operations::Outcome)s and never abort a run.
#[derive(Debug, Error)]
pub enum SampleError {
    /// Configuration could not be loaded or is incomplete
    #[error("configuration error: {0}")]
    Config(String),

    /// Logging could not be installed
    #[error("logging setup failed: {0}")]
    Logging(String),

    /// An entity could be neither created nor fetched
    #[error("could not resolve {entity} '{id}': {source}")]
    Setup {
        entity: &'static str,
        id: String,
        #[source]
        source: DocDbError,
    },

    /// The resolved permission did not carry a resource token
    #[error("permission '{permission}' carries no resource token")]
    MissingToken { permission: String },

    /// Any other client failure outside the scoped operations
    #[error(transparent)]
    Client(#[from] DocDbError),
}

impl From<figment::Error> for SampleError {
    fn from(err: figment::Error) -> Self {
        Self::Config(err.to_string())
    }
}
