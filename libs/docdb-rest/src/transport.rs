//! Pooled hyper transport shared by every request of a session.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use http::{HeaderMap, Request, StatusCode, Uri};
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper_rustls::HttpsConnector;
use hyper_util::client::legacy::Client;
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::rt::{TokioExecutor, TokioTimer};

use crate::config::{RestClientConfig, TransportSecurity};
use crate::error::HttpError;

/// Response with its body fully read.
#[derive(Debug)]
pub struct RawResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl RawResponse {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }
}

/// Thin wrapper over the hyper legacy client.
///
/// `send()` returns `Ok` for every HTTP status; only transport failures,
/// timeouts and oversized bodies are errors.
#[derive(Clone)]
pub struct Transport {
    client: Client<HttpsConnector<HttpConnector>, Full<Bytes>>,
    request_timeout: Duration,
    max_body_size: usize,
    transport_security: TransportSecurity,
}

impl Transport {
    pub fn new(config: &RestClientConfig) -> Result<Self, HttpError> {
        if config.transport == TransportSecurity::AllowInsecureHttp {
            tracing::warn!(endpoint = %config.endpoint, "transport accepts plain http");
        }

        let https = build_https_connector(config.transport)?;

        // pool_timer is required for pool_idle_timeout to take effect
        let mut builder = Client::builder(TokioExecutor::new());
        builder
            .pool_timer(TokioTimer::new())
            .pool_idle_timeout(Duration::from_secs(90));
        let client = builder.build::<_, Full<Bytes>>(https);

        Ok(Self {
            client,
            request_timeout: config.request_timeout,
            max_body_size: config.max_body_size,
            transport_security: config.transport,
        })
    }

    pub async fn send(&self, request: Request<Full<Bytes>>) -> Result<RawResponse, HttpError> {
        self.check_scheme(request.uri())?;

        let timeout = self.request_timeout;
        let response = tokio::time::timeout(timeout, self.client.request(request))
            .await
            .map_err(|_elapsed| HttpError::Timeout(timeout))??;

        let (parts, body) = response.into_parts();
        let body = tokio::time::timeout(timeout, read_body_limited(body, self.max_body_size))
            .await
            .map_err(|_elapsed| HttpError::Timeout(timeout))??;

        Ok(RawResponse {
            status: parts.status,
            headers: parts.headers,
            body,
        })
    }

    fn check_scheme(&self, uri: &Uri) -> Result<(), HttpError> {
        match (uri.scheme_str(), self.transport_security) {
            (Some("https"), _) | (Some("http"), TransportSecurity::AllowInsecureHttp) => Ok(()),
            (scheme, _) => Err(HttpError::InvalidScheme {
                scheme: scheme.unwrap_or_default().to_owned(),
                reason: "only https endpoints are allowed".to_owned(),
            }),
        }
    }
}

/// The process-wide rustls provider if one is installed, else a private
/// aws-lc-rs provider.
fn crypto_provider() -> Arc<rustls::crypto::CryptoProvider> {
    rustls::crypto::CryptoProvider::get_default()
        .cloned()
        .unwrap_or_else(|| Arc::new(rustls::crypto::aws_lc_rs::default_provider()))
}

/// HTTPS connector with bundled webpki roots; ALPN advertises h2 and http/1.1.
fn build_https_connector(
    transport: TransportSecurity,
) -> Result<HttpsConnector<HttpConnector>, HttpError> {
    let builder = hyper_rustls::HttpsConnectorBuilder::new()
        .with_provider_and_webpki_roots(crypto_provider())
        .map_err(|e| HttpError::Tls(Box::new(e)))?;

    let connector = match transport {
        TransportSecurity::AllowInsecureHttp => {
            builder.https_or_http().enable_all_versions().build()
        }
        TransportSecurity::TlsOnly => builder.https_only().enable_all_versions().build(),
    };
    Ok(connector)
}

async fn read_body_limited(body: Incoming, limit: usize) -> Result<Bytes, HttpError> {
    let mut collected = Vec::new();
    let mut body = std::pin::pin!(body);

    while let Some(frame) = body.frame().await {
        let frame = frame.map_err(|e| HttpError::Transport(Box::new(e)))?;
        if let Some(chunk) = frame.data_ref() {
            if collected.len() + chunk.len() > limit {
                return Err(HttpError::BodyTooLarge {
                    limit,
                    actual: collected.len() + chunk.len(),
                });
            }
            collected.extend_from_slice(chunk);
        }
    }

    Ok(Bytes::from(collected))
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use url::Url;

    fn config() -> RestClientConfig {
        RestClientConfig::new(Url::parse("https://acct.example.com/").unwrap())
    }

    #[tokio::test]
    async fn test_plain_http_rejected_when_tls_only() {
        let transport = Transport::new(&config()).unwrap();
        let request = Request::get("http://localhost:1/dbs")
            .body(Full::new(Bytes::new()))
            .unwrap();

        let err = transport.send(request).await.unwrap_err();
        assert!(matches!(err, HttpError::InvalidScheme { ref scheme, .. } if scheme == "http"));
    }

    #[tokio::test]
    async fn test_connection_refused_is_transport_error() {
        let transport = Transport::new(&config().allow_insecure_http()).unwrap();
        // Port 1 is reserved and closed on test hosts
        let request = Request::get("http://127.0.0.1:1/dbs")
            .body(Full::new(Bytes::new()))
            .unwrap();

        let err = transport.send(request).await.unwrap_err();
        assert!(matches!(err, HttpError::Transport(_)), "got {err:?}");
    }
}
