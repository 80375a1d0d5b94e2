//! `authorization` header construction.
//!
//! Master-key requests carry an HMAC-SHA256 signature over the verb, resource
//! type, resource link and date. Resource-token requests carry the token of
//! the permission covering the target resource.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use docdb_sdk::{Credential, DocDbError, ResourceLink, ResourceTokens, ResourceType};
use hmac::{Hmac, Mac};
use secrecy::ExposeSecret;
use sha2::Sha256;
use zeroize::Zeroizing;

type HmacSha256 = Hmac<Sha256>;

/// Signing material derived from a [`Credential`] once per session.
pub enum Authorizer {
    MasterKey(Zeroizing<Vec<u8>>),
    ResourceTokens(ResourceTokens),
}

impl std::fmt::Debug for Authorizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MasterKey(_) => f.write_str("Authorizer::MasterKey([REDACTED])"),
            Self::ResourceTokens(tokens) => f
                .debug_tuple("Authorizer::ResourceTokens")
                .field(tokens)
                .finish(),
        }
    }
}

impl Authorizer {
    /// Decode the credential.
    ///
    /// # Errors
    ///
    /// Returns [`DocDbError::InvalidRequest`] if the master key is not valid base64.
    pub fn new(credential: Credential) -> Result<Self, DocDbError> {
        match credential {
            Credential::MasterKey(key) => {
                let decoded = STANDARD.decode(key.expose_secret().trim()).map_err(|_| {
                    DocDbError::InvalidRequest("master key is not valid base64".to_owned())
                })?;
                Ok(Self::MasterKey(Zeroizing::new(decoded)))
            }
            Credential::ResourceTokens(tokens) => Ok(Self::ResourceTokens(tokens)),
        }
    }

    /// Build the URL-encoded `authorization` header value.
    ///
    /// `signing_link` is the link named in the signature (the parent link for
    /// feed requests, empty for the account root). `target` is the resource
    /// whose permission must cover the request when using resource tokens.
    ///
    /// # Errors
    ///
    /// Returns [`DocDbError::MissingResourceToken`] when no token covers `target`.
    pub fn header_value(
        &self,
        verb: &http::Method,
        resource_type: ResourceType,
        signing_link: &str,
        target: Option<&ResourceLink>,
        date: &str,
    ) -> Result<String, DocDbError> {
        let token = match self {
            Self::MasterKey(key) => {
                let signature = sign(key, verb, resource_type, signing_link, date)?;
                format!("type=master&ver=1.0&sig={signature}")
            }
            Self::ResourceTokens(tokens) => {
                let missing = || DocDbError::MissingResourceToken {
                    resource: target.map_or_else(|| signing_link.to_owned(), ToString::to_string),
                };
                let link = target.ok_or_else(missing)?;
                tokens
                    .resolve(link)
                    .ok_or_else(missing)?
                    .expose_secret()
                    .to_owned()
            }
        };

        Ok(urlencoding::encode(&token).into_owned())
    }
}

/// Base64 HMAC-SHA256 of the canonical request description.
pub fn sign(
    key: &[u8],
    verb: &http::Method,
    resource_type: ResourceType,
    resource_link: &str,
    date: &str,
) -> Result<String, DocDbError> {
    let payload = format!(
        "{}\n{}\n{}\n{}\n\n",
        verb.as_str().to_lowercase(),
        resource_type.segment(),
        resource_link,
        date.to_lowercase()
    );

    let mut mac = HmacSha256::new_from_slice(key)
        .map_err(|e| DocDbError::InvalidRequest(format!("invalid signing key: {e}")))?;
    mac.update(payload.as_bytes());

    Ok(STANDARD.encode(mac.finalize().into_bytes()))
}
