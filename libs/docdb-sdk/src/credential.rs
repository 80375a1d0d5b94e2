//! Credentials used to open a client session.

use std::collections::BTreeMap;

use secrecy::SecretString;

use crate::link::ResourceLink;

/// Credential a session authenticates with.
#[derive(Debug, Clone)]
pub enum Credential {
    /// Full account access via the account master key (base64).
    MasterKey(SecretString),
    /// Scoped access via resource tokens minted from permissions.
    ResourceTokens(ResourceTokens),
}

impl Credential {
    #[must_use]
    pub fn master_key(key: impl Into<String>) -> Self {
        Self::MasterKey(SecretString::from(key.into()))
    }

    #[must_use]
    pub fn is_master_key(&self) -> bool {
        matches!(self, Self::MasterKey(_))
    }
}

/// Resource tokens keyed by container id or by full resource link.
///
/// `Debug` output never includes token values.
#[derive(Debug, Clone, Default)]
pub struct ResourceTokens {
    tokens: BTreeMap<String, SecretString>,
}

impl ResourceTokens {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `token` under `key`, returning any token previously stored there.
    pub fn insert(&mut self, key: impl Into<String>, token: SecretString) -> Option<SecretString> {
        self.tokens.insert(key.into(), token)
    }

    #[must_use]
    pub fn with_token(mut self, key: impl Into<String>, token: SecretString) -> Self {
        self.insert(key, token);
        self
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.tokens.keys().map(String::as_str)
    }

    /// Find the token to present for a request on `link`.
    ///
    /// Lookup order: the link itself, each ancestor link, then the id of the
    /// container the link lives in.
    #[must_use]
    pub fn resolve(&self, link: &ResourceLink) -> Option<&SecretString> {
        let mut current = Some(link.clone());
        while let Some(candidate) = current {
            if let Some(token) = self.tokens.get(&candidate.to_string()) {
                return Some(token);
            }
            current = candidate.parent();
        }

        link.container_id().and_then(|id| self.tokens.get(id))
    }
}
