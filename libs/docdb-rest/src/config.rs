use std::time::Duration;

use url::Url;

/// Default User-Agent header value
pub const DEFAULT_USER_AGENT: &str = concat!("cf-docdb-rest/", env!("CARGO_PKG_VERSION"));

/// REST API version sent in `x-ms-version`.
pub const DEFAULT_API_VERSION: &str = "2018-12-31";

/// Which endpoint schemes the transport accepts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TransportSecurity {
    /// `https` endpoints only
    #[default]
    TlsOnly,
    /// `http` endpoints are accepted as well; master-key signatures and
    /// tokens then travel in clear text. Local emulators and mock servers only.
    AllowInsecureHttp,
}

/// Configuration of a REST session against one account endpoint.
#[derive(Debug, Clone)]
pub struct RestClientConfig {
    /// Account endpoint, e.g. `https://myaccount.documents.azure.com:443/`
    pub endpoint: Url,

    /// Deadline for the response head and again for the body (default 30s)
    pub request_timeout: Duration,

    /// Largest response body read into memory (default 10 MiB)
    pub max_body_size: usize,

    /// User-Agent header value
    pub user_agent: String,

    /// Value of the `x-ms-version` header
    pub api_version: String,

    pub transport: TransportSecurity,

    /// Requested lifetime of resource tokens minted on permission reads.
    ///
    /// `None` leaves the service default in place.
    pub token_expiry: Option<Duration>,

    /// Maximum number of items per feed page (`x-ms-max-item-count`).
    pub max_item_count: Option<u32>,
}

impl RestClientConfig {
    /// Configuration with defaults for `endpoint`.
    #[must_use]
    pub fn new(endpoint: Url) -> Self {
        Self {
            endpoint,
            request_timeout: Duration::from_secs(30),
            max_body_size: 10 * 1024 * 1024,
            user_agent: DEFAULT_USER_AGENT.to_owned(),
            api_version: DEFAULT_API_VERSION.to_owned(),
            transport: TransportSecurity::TlsOnly,
            token_expiry: None,
            max_item_count: None,
        }
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    #[must_use]
    pub fn with_token_expiry(mut self, expiry: Option<Duration>) -> Self {
        self.token_expiry = expiry;
        self
    }

    #[must_use]
    pub fn with_max_item_count(mut self, count: Option<u32>) -> Self {
        self.max_item_count = count;
        self
    }

    /// Accept `http` endpoints.
    ///
    /// Available in debug builds, or in release builds with the
    /// `allow-insecure-http` feature.
    #[must_use]
    #[cfg(any(debug_assertions, feature = "allow-insecure-http"))]
    pub fn allow_insecure_http(mut self) -> Self {
        tracing::warn!(
            target: "docdb_rest::security",
            endpoint = %self.endpoint,
            "plain HTTP allowed; credentials will be sent unencrypted"
        );
        self.transport = TransportSecurity::AllowInsecureHttp;
        self
    }
}
