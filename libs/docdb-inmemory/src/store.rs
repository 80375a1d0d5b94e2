//! Account state held by the emulator.

use std::collections::{BTreeMap, HashMap};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use docdb_sdk::{
    ContainerProperties, DatabaseProperties, DocDbError, Document, PermissionMode,
    PermissionProperties, ResourceLink, SystemProperties, UserProperties,
};
use secrecy::SecretString;
use serde_json::Value;
use uuid::Uuid;

#[derive(Debug, Default)]
pub struct Store {
    pub databases: BTreeMap<String, DatabaseEntry>,
    /// Minted resource tokens by token string.
    pub grants: HashMap<String, Grant>,
}

#[derive(Debug)]
pub struct DatabaseEntry {
    pub props: DatabaseProperties,
    pub containers: BTreeMap<String, ContainerEntry>,
    pub users: BTreeMap<String, UserEntry>,
}

#[derive(Debug)]
pub struct ContainerEntry {
    pub props: ContainerProperties,
    /// Items by canonical partition-key value, then by id.
    pub partitions: BTreeMap<String, BTreeMap<String, Document>>,
}

#[derive(Debug)]
pub struct UserEntry {
    pub props: UserProperties,
    pub permissions: BTreeMap<String, PermissionEntry>,
}

#[derive(Debug, Clone)]
pub struct PermissionEntry {
    pub id: String,
    pub mode: PermissionMode,
    pub resource: ResourceLink,
    pub partition_key: Option<Vec<Value>>,
    pub system: SystemProperties,
}

/// Permission a minted token stands for.
#[derive(Debug, Clone)]
pub struct Grant {
    pub database: String,
    pub user: String,
    pub permission: String,
    pub expires_at: Instant,
}

impl Store {
    pub fn database(&self, id: &str) -> Result<&DatabaseEntry, DocDbError> {
        self.databases.get(id).ok_or_else(|| not_found(&ResourceLink::database(id)))
    }

    pub fn database_mut(&mut self, id: &str) -> Result<&mut DatabaseEntry, DocDbError> {
        self.databases
            .get_mut(id)
            .ok_or_else(|| not_found(&ResourceLink::database(id)))
    }

    pub fn container(&self, database: &str, id: &str) -> Result<&ContainerEntry, DocDbError> {
        self.database(database)?
            .containers
            .get(id)
            .ok_or_else(|| not_found(&ResourceLink::container(database, id)))
    }

    pub fn container_mut(
        &mut self,
        database: &str,
        id: &str,
    ) -> Result<&mut ContainerEntry, DocDbError> {
        self.database_mut(database)?
            .containers
            .get_mut(id)
            .ok_or_else(|| not_found(&ResourceLink::container(database, id)))
    }

    pub fn user(&self, database: &str, id: &str) -> Result<&UserEntry, DocDbError> {
        self.database(database)?
            .users
            .get(id)
            .ok_or_else(|| not_found(&ResourceLink::user(database, id)))
    }

    pub fn user_mut(&mut self, database: &str, id: &str) -> Result<&mut UserEntry, DocDbError> {
        self.database_mut(database)?
            .users
            .get_mut(id)
            .ok_or_else(|| not_found(&ResourceLink::user(database, id)))
    }

    pub fn permission(
        &self,
        database: &str,
        user: &str,
        id: &str,
    ) -> Result<&PermissionEntry, DocDbError> {
        self.user(database, user)?
            .permissions
            .get(id)
            .ok_or_else(|| not_found(&ResourceLink::permission(database, user, id)))
    }

    /// Issue a fresh token for a permission.
    pub fn mint_token(
        &mut self,
        database: &str,
        user: &str,
        entry: &PermissionEntry,
        ttl: Duration,
    ) -> PermissionProperties {
        let token = format!("type=resource&ver=1.0&sig={}", Uuid::new_v4().simple());
        self.grants.insert(
            token.clone(),
            Grant {
                database: database.to_owned(),
                user: user.to_owned(),
                permission: entry.id.clone(),
                expires_at: Instant::now() + ttl,
            },
        );

        PermissionProperties {
            id: entry.id.clone(),
            permission_mode: entry.mode,
            resource: entry.resource.to_string(),
            resource_partition_key: entry.partition_key.clone(),
            token: Some(SecretString::from(token)),
            system: entry.system.clone(),
        }
    }

    /// Drop tokens whose permission no longer exists or that have expired.
    pub fn prune_grants(&mut self) {
        let now = Instant::now();
        let databases = &self.databases;
        self.grants.retain(|_, grant| {
            grant.expires_at > now
                && databases
                    .get(&grant.database)
                    .and_then(|db| db.users.get(&grant.user))
                    .is_some_and(|user| user.permissions.contains_key(&grant.permission))
        });
    }
}

impl ContainerEntry {
    pub fn new(props: ContainerProperties) -> Self {
        Self {
            props,
            partitions: BTreeMap::new(),
        }
    }

    /// Items of one partition slot (or all of them), in slot then id order.
    pub fn items_in<'a>(
        &'a self,
        partition: Option<&'a str>,
    ) -> impl Iterator<Item = &'a Document> + 'a {
        self.partitions
            .iter()
            .filter(move |(key, _)| partition.is_none_or(|p| p == key.as_str()))
            .flat_map(|(_, items)| items.values())
    }
}

/// Canonical string form of a partition-key value, used as a map key.
pub fn partition_slot(value: &Value) -> String {
    value.to_string()
}

pub fn system_properties(link: &ResourceLink) -> SystemProperties {
    SystemProperties {
        rid: Some(Uuid::new_v4().simple().to_string()),
        self_link: Some(format!("{link}/")),
        etag: Some(format!("\"{}\"", Uuid::new_v4())),
        ts: Some(unix_now()),
    }
}

/// Stamp the service-maintained fields onto an item.
pub fn stamp(document: &mut Document, link: &ResourceLink) {
    let system = system_properties(link);
    if let Value::Object(map) = document {
        map.insert("_rid".to_owned(), Value::from(system.rid));
        map.insert("_self".to_owned(), Value::from(system.self_link));
        map.insert("_etag".to_owned(), Value::from(system.etag));
        map.insert("_ts".to_owned(), Value::from(system.ts));
    }
}

fn unix_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| i64::try_from(d.as_secs()).unwrap_or(i64::MAX))
}

pub fn not_found(link: &ResourceLink) -> DocDbError {
    DocDbError::NotFound {
        resource: link.to_string(),
    }
}

pub fn conflict(link: &ResourceLink) -> DocDbError {
    DocDbError::Conflict {
        resource: link.to_string(),
    }
}
