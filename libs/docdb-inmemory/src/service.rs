use std::sync::Arc;
use std::time::Duration;

use docdb_sdk::{Credential, DocDbClient, DocDbConnector, DocDbError};
use parking_lot::Mutex;
use secrecy::SecretString;

use crate::client::InMemoryClient;
use crate::store::Store;

/// Default lifetime of minted resource tokens.
pub const DEFAULT_TOKEN_TTL: Duration = Duration::from_secs(3600);

/// A document database account held in memory.
///
/// Every session opened through [`DocDbConnector::connect`] shares the same
/// state, so an admin session and a token-scoped session see each other's
/// writes. Sessions are checked the way the hosted service checks them:
/// master-key sessions may do anything, resource-token sessions are limited
/// to the mode, resource and partition key of the permission their token was
/// minted for.
#[derive(Debug, Clone)]
pub struct InMemoryService {
    store: Arc<Mutex<Store>>,
    master_key: SecretString,
    token_ttl: Duration,
}

impl InMemoryService {
    /// Empty account accepting `master_key`.
    #[must_use]
    pub fn new(master_key: impl Into<String>) -> Self {
        Self {
            store: Arc::new(Mutex::new(Store::default())),
            master_key: SecretString::from(master_key.into()),
            token_ttl: DEFAULT_TOKEN_TTL,
        }
    }

    /// Lifetime of tokens minted by permission create and read calls.
    #[must_use]
    pub fn with_token_ttl(mut self, ttl: Duration) -> Self {
        self.token_ttl = ttl;
        self
    }

    /// Open a session for `credential`.
    #[must_use]
    pub fn client(&self, credential: Credential) -> InMemoryClient {
        InMemoryClient::new(
            Arc::clone(&self.store),
            self.master_key.clone(),
            self.token_ttl,
            credential,
        )
    }

    /// Number of resource tokens currently honoured.
    #[must_use]
    pub fn active_tokens(&self) -> usize {
        let mut store = self.store.lock();
        store.prune_grants();
        store.grants.len()
    }
}

impl DocDbConnector for InMemoryService {
    fn connect(&self, credential: Credential) -> Result<Arc<dyn DocDbClient>, DocDbError> {
        tracing::debug!(
            master_key = credential.is_master_key(),
            "opening in-memory session"
        );
        Ok(Arc::new(self.client(credential)))
    }
}
