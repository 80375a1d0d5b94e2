use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use docdb_sdk::{
    ContainerProperties, ContainerRef, Credential, DatabaseProperties, DocDbClient, DocDbError,
    Document, PartitionKey, PermissionDefinition, PermissionProperties, QuerySpec, ResourceLink,
    UserProperties, document_id,
};
use parking_lot::Mutex;
use secrecy::{ExposeSecret, SecretString};
use serde_json::Value;

use crate::query::Query;
use crate::store::{
    ContainerEntry, DatabaseEntry, PermissionEntry, Store, UserEntry, conflict, not_found,
    partition_slot, stamp, system_properties,
};

/// Session against an [`InMemoryService`](crate::InMemoryService), bound to one credential.
pub struct InMemoryClient {
    store: Arc<Mutex<Store>>,
    master_key: SecretString,
    token_ttl: Duration,
    credential: Credential,
}

impl std::fmt::Debug for InMemoryClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryClient")
            .field("credential", &self.credential)
            .field("token_ttl", &self.token_ttl)
            .finish_non_exhaustive()
    }
}

impl InMemoryClient {
    pub(crate) fn new(
        store: Arc<Mutex<Store>>,
        master_key: SecretString,
        token_ttl: Duration,
        credential: Credential,
    ) -> Self {
        Self {
            store,
            master_key,
            token_ttl,
            credential,
        }
    }

    /// Admit account-management calls, which only the master key may make.
    fn require_master(&self, target: &ResourceLink) -> Result<(), DocDbError> {
        match &self.credential {
            Credential::MasterKey(key) => self.check_master_key(key),
            Credential::ResourceTokens(tokens) => {
                if tokens.resolve(target).is_none() {
                    return Err(DocDbError::MissingResourceToken {
                        resource: target.to_string(),
                    });
                }
                tracing::debug!(resource = %target, "resource token used for a master-key operation");
                Err(DocDbError::Forbidden {
                    message: format!("operation on '{target}' requires the master key"),
                })
            }
        }
    }

    fn check_master_key(&self, key: &SecretString) -> Result<(), DocDbError> {
        if key.expose_secret() == self.master_key.expose_secret() {
            Ok(())
        } else {
            Err(DocDbError::Unauthorized {
                message: "the master key does not match the account".to_owned(),
            })
        }
    }

    /// Check a data-plane call against the session's credential.
    ///
    /// Returns the partition-key values the caller is confined to when the
    /// request itself names none.
    fn authorize(
        &self,
        store: &Store,
        target: &ResourceLink,
        write: bool,
        partition_key: Option<&PartitionKey>,
    ) -> Result<Option<Vec<Value>>, DocDbError> {
        let tokens = match &self.credential {
            Credential::MasterKey(key) => return self.check_master_key(key).map(|()| None),
            Credential::ResourceTokens(tokens) => tokens,
        };

        let token = tokens
            .resolve(target)
            .ok_or_else(|| DocDbError::MissingResourceToken {
                resource: target.to_string(),
            })?;
        let grant = store.grants.get(token.expose_secret()).ok_or_else(|| {
            DocDbError::Unauthorized {
                message: "the resource token is not recognised".to_owned(),
            }
        })?;
        if grant.expires_at <= Instant::now() {
            return Err(DocDbError::Unauthorized {
                message: "the resource token has expired".to_owned(),
            });
        }
        let permission = store
            .permission(&grant.database, &grant.user, &grant.permission)
            .map_err(|_| DocDbError::Unauthorized {
                message: "the permission behind the resource token no longer exists".to_owned(),
            })?;

        let deny = |reason: &str| {
            tracing::debug!(
                resource = %target,
                permission = %permission.id,
                reason,
                "request denied"
            );
            DocDbError::Forbidden {
                message: format!(
                    "permission '{}' does not allow this request on '{target}': {reason}",
                    permission.id
                ),
            }
        };

        if !permission.resource.covers(target) {
            return Err(deny("resource is outside the permission scope"));
        }
        let mode_allows = if write {
            permission.mode.allows_write()
        } else {
            permission.mode.allows_read()
        };
        if !mode_allows {
            return Err(deny(&format!("permission mode is {}", permission.mode)));
        }

        match (&permission.partition_key, partition_key) {
            (None, _) => Ok(None),
            (Some(allowed), Some(requested)) if requested.to_json_array() == *allowed => Ok(None),
            (Some(_), Some(_)) => Err(deny("partition key is outside the permission scope")),
            (Some(allowed), None) => Ok(Some(allowed.clone())),
        }
    }

    fn write_item(
        &self,
        container: &ContainerRef,
        partition_key: &PartitionKey,
        item: &Document,
        replace: bool,
    ) -> Result<Document, DocDbError> {
        let id = document_id(item)
            .ok_or_else(|| DocDbError::BadRequest {
                message: "the document has no string 'id' property".to_owned(),
            })?
            .to_owned();
        let link = container.item_link(&id);

        let mut store = self.store.lock();
        self.authorize(&store, &link, true, Some(partition_key))?;
        let entry = store.container_mut(&container.database, &container.container)?;

        if entry.props.partition_key.value_of(item) != *partition_key.value() {
            return Err(DocDbError::BadRequest {
                message: "partition key extracted from the document does not match the one \
                          specified for the request"
                    .to_owned(),
            });
        }

        let partition = entry
            .partitions
            .entry(partition_slot(partition_key.value()))
            .or_default();
        if !replace && partition.contains_key(&id) {
            return Err(conflict(&link));
        }

        let mut stored = item.clone();
        stamp(&mut stored, &link);
        partition.insert(id, stored.clone());
        Ok(stored)
    }

    fn scan(
        &self,
        container: &ContainerRef,
        partition_key: Option<&PartitionKey>,
        mut keep: impl FnMut(&Document) -> Result<bool, DocDbError>,
    ) -> Result<Vec<Document>, DocDbError> {
        let store = self.store.lock();
        let confined = self.authorize(&store, &container.link(), false, partition_key)?;
        let entry = store.container(&container.database, &container.container)?;

        let slots: Option<Vec<String>> = match (partition_key, confined) {
            (Some(pk), _) => Some(vec![partition_slot(pk.value())]),
            (None, Some(values)) => Some(values.iter().map(partition_slot).collect()),
            (None, None) => None,
        };

        let mut found = Vec::new();
        let candidates: Box<dyn Iterator<Item = &Document> + '_> = match &slots {
            Some(slots) => Box::new(
                slots
                    .iter()
                    .flat_map(|slot| entry.items_in(Some(slot.as_str()))),
            ),
            None => Box::new(entry.items_in(None)),
        };
        for document in candidates {
            if keep(document)? {
                found.push(document.clone());
            }
        }
        Ok(found)
    }
}

#[async_trait]
impl DocDbClient for InMemoryClient {
    async fn create_database(&self, id: &str) -> Result<DatabaseProperties, DocDbError> {
        let link = ResourceLink::database(id);
        self.require_master(&link)?;

        let mut store = self.store.lock();
        if store.databases.contains_key(id) {
            return Err(conflict(&link));
        }
        let props = DatabaseProperties {
            id: id.to_owned(),
            system: system_properties(&link),
        };
        store.databases.insert(
            id.to_owned(),
            DatabaseEntry {
                props: props.clone(),
                containers: BTreeMap::new(),
                users: BTreeMap::new(),
            },
        );
        tracing::debug!(database = id, "database created");
        Ok(props)
    }

    async fn read_database(&self, id: &str) -> Result<DatabaseProperties, DocDbError> {
        let store = self.store.lock();
        self.authorize(&store, &ResourceLink::database(id), false, None)?;
        Ok(store.database(id)?.props.clone())
    }

    async fn delete_database(&self, id: &str) -> Result<(), DocDbError> {
        let link = ResourceLink::database(id);
        self.require_master(&link)?;

        let mut store = self.store.lock();
        store.databases.remove(id).ok_or_else(|| not_found(&link))?;
        store.prune_grants();
        tracing::debug!(database = id, "database deleted");
        Ok(())
    }

    async fn create_container(
        &self,
        database: &str,
        properties: &ContainerProperties,
    ) -> Result<ContainerProperties, DocDbError> {
        let link = ResourceLink::container(database, properties.id.as_str());
        self.require_master(&link)?;
        if properties.partition_key.paths.len() != 1
            || !properties.partition_key.paths[0].starts_with('/')
        {
            return Err(DocDbError::BadRequest {
                message: "a container needs exactly one partition key path starting with '/'"
                    .to_owned(),
            });
        }

        let mut store = self.store.lock();
        let db = store.database_mut(database)?;
        if db.containers.contains_key(&properties.id) {
            return Err(conflict(&link));
        }
        let mut props = properties.clone();
        props.system = system_properties(&link);
        db.containers
            .insert(props.id.clone(), ContainerEntry::new(props.clone()));
        tracing::debug!(container = %link, "container created");
        Ok(props)
    }

    async fn read_container(
        &self,
        database: &str,
        id: &str,
    ) -> Result<ContainerProperties, DocDbError> {
        let store = self.store.lock();
        self.authorize(&store, &ResourceLink::container(database, id), false, None)?;
        Ok(store.container(database, id)?.props.clone())
    }

    async fn create_user(&self, database: &str, id: &str) -> Result<UserProperties, DocDbError> {
        let link = ResourceLink::user(database, id);
        self.require_master(&link)?;

        let mut store = self.store.lock();
        let db = store.database_mut(database)?;
        if db.users.contains_key(id) {
            return Err(conflict(&link));
        }
        let props = UserProperties {
            id: id.to_owned(),
            system: system_properties(&link),
        };
        db.users.insert(
            id.to_owned(),
            UserEntry {
                props: props.clone(),
                permissions: BTreeMap::new(),
            },
        );
        tracing::debug!(user = %link, "user created");
        Ok(props)
    }

    async fn read_user(&self, database: &str, id: &str) -> Result<UserProperties, DocDbError> {
        self.require_master(&ResourceLink::user(database, id))?;
        let store = self.store.lock();
        Ok(store.user(database, id)?.props.clone())
    }

    async fn create_permission(
        &self,
        database: &str,
        user: &str,
        definition: &PermissionDefinition,
    ) -> Result<PermissionProperties, DocDbError> {
        let link = ResourceLink::permission(database, user, definition.id.as_str());
        self.require_master(&link)?;

        let resource = ResourceLink::parse(&definition.resource).map_err(|e| {
            DocDbError::BadRequest {
                message: format!("invalid permission resource: {e}"),
            }
        })?;
        if resource.database_id() != database {
            return Err(DocDbError::BadRequest {
                message: format!(
                    "permission resource '{resource}' is outside database '{database}'"
                ),
            });
        }

        let mut store = self.store.lock();
        let owner = store.user_mut(database, user)?;
        if owner.permissions.contains_key(&definition.id) {
            return Err(conflict(&link));
        }
        let entry = PermissionEntry {
            id: definition.id.clone(),
            mode: definition.permission_mode,
            resource,
            partition_key: definition.resource_partition_key.clone(),
            system: system_properties(&link),
        };
        owner.permissions.insert(entry.id.clone(), entry.clone());
        tracing::debug!(permission = %link, mode = %entry.mode, "permission created");

        Ok(store.mint_token(database, user, &entry, self.token_ttl))
    }

    async fn read_permission(
        &self,
        database: &str,
        user: &str,
        id: &str,
    ) -> Result<PermissionProperties, DocDbError> {
        self.require_master(&ResourceLink::permission(database, user, id))?;

        let mut store = self.store.lock();
        let entry = store.permission(database, user, id)?.clone();
        store.prune_grants();
        Ok(store.mint_token(database, user, &entry, self.token_ttl))
    }

    async fn read_item(
        &self,
        container: &ContainerRef,
        id: &str,
        partition_key: &PartitionKey,
    ) -> Result<Document, DocDbError> {
        let link = container.item_link(id);
        let store = self.store.lock();
        self.authorize(&store, &link, false, Some(partition_key))?;
        store
            .container(&container.database, &container.container)?
            .partitions
            .get(&partition_slot(partition_key.value()))
            .and_then(|items| items.get(id))
            .cloned()
            .ok_or_else(|| not_found(&link))
    }

    async fn create_item(
        &self,
        container: &ContainerRef,
        partition_key: &PartitionKey,
        item: &Document,
    ) -> Result<Document, DocDbError> {
        self.write_item(container, partition_key, item, false)
    }

    async fn upsert_item(
        &self,
        container: &ContainerRef,
        partition_key: &PartitionKey,
        item: &Document,
    ) -> Result<Document, DocDbError> {
        self.write_item(container, partition_key, item, true)
    }

    async fn delete_item(
        &self,
        container: &ContainerRef,
        id: &str,
        partition_key: &PartitionKey,
    ) -> Result<(), DocDbError> {
        let link = container.item_link(id);
        let mut store = self.store.lock();
        self.authorize(&store, &link, true, Some(partition_key))?;
        store
            .container_mut(&container.database, &container.container)?
            .partitions
            .get_mut(&partition_slot(partition_key.value()))
            .and_then(|items| items.remove(id))
            .map(|_| ())
            .ok_or_else(|| not_found(&link))
    }

    async fn query_items(
        &self,
        container: &ContainerRef,
        query: &QuerySpec,
        partition_key: Option<&PartitionKey>,
    ) -> Result<Vec<Document>, DocDbError> {
        let parsed = Query::parse(&query.query)?;
        self.scan(container, partition_key, |document| {
            parsed.matches(document, &query.parameters)
        })
    }

    async fn read_all_items(
        &self,
        container: &ContainerRef,
        partition_key: Option<&PartitionKey>,
    ) -> Result<Vec<Document>, DocDbError> {
        self.scan(container, partition_key, |_| Ok(true))
    }
}
