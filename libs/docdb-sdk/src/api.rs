//! Public API traits for document database clients.
//!
//! Adapters (REST, in-memory) implement [`DocDbClient`] for a single
//! authenticated session and [`DocDbConnector`] to open such sessions.

use std::sync::Arc;

use async_trait::async_trait;

use crate::credential::Credential;
use crate::error::DocDbError;
use crate::link::ContainerRef;
use crate::models::{
    ContainerProperties, DatabaseProperties, Document, PartitionKey, PermissionDefinition,
    PermissionProperties, QuerySpec, UserProperties,
};

/// Operations available on an authenticated session.
///
/// The client performs no authorization checks of its own: whether a call is
/// permitted is decided by the service from the session's credential.
///
/// ```ignore
/// let admin = connector.connect(Credential::master_key(key))?;
/// match admin.create_database("app").await {
///     Ok(db) => println!("created {}", db.id),
///     Err(e) if e.is_conflict() => println!("already there"),
///     Err(e) => return Err(e.into()),
/// }
/// ```
#[async_trait]
pub trait DocDbClient: Send + Sync {
    /// Create a database.
    ///
    /// # Errors
    ///
    /// - `Conflict` if a database with this id already exists
    async fn create_database(&self, id: &str) -> Result<DatabaseProperties, DocDbError>;

    /// Fetch a database by id.
    ///
    /// # Errors
    ///
    /// - `NotFound` if the database does not exist
    async fn read_database(&self, id: &str) -> Result<DatabaseProperties, DocDbError>;

    /// Delete a database and everything it contains.
    ///
    /// # Errors
    ///
    /// - `NotFound` if the database does not exist
    async fn delete_database(&self, id: &str) -> Result<(), DocDbError>;

    /// Create a container in `database`.
    ///
    /// # Errors
    ///
    /// - `Conflict` if the container already exists
    /// - `NotFound` if the database does not exist
    async fn create_container(
        &self,
        database: &str,
        properties: &ContainerProperties,
    ) -> Result<ContainerProperties, DocDbError>;

    /// Fetch a container by id.
    ///
    /// # Errors
    ///
    /// - `NotFound` if the database or container does not exist
    async fn read_container(
        &self,
        database: &str,
        id: &str,
    ) -> Result<ContainerProperties, DocDbError>;

    /// Create a user in `database`.
    ///
    /// # Errors
    ///
    /// - `Conflict` if the user already exists
    async fn create_user(&self, database: &str, id: &str) -> Result<UserProperties, DocDbError>;

    /// Fetch a user by id.
    ///
    /// # Errors
    ///
    /// - `NotFound` if the user does not exist
    async fn read_user(&self, database: &str, id: &str) -> Result<UserProperties, DocDbError>;

    /// Create a permission for `user`; the response carries a fresh resource token.
    ///
    /// # Errors
    ///
    /// - `Conflict` if the permission already exists
    async fn create_permission(
        &self,
        database: &str,
        user: &str,
        definition: &PermissionDefinition,
    ) -> Result<PermissionProperties, DocDbError>;

    /// Fetch a permission by id; the response carries a fresh resource token.
    ///
    /// # Errors
    ///
    /// - `NotFound` if the permission does not exist
    async fn read_permission(
        &self,
        database: &str,
        user: &str,
        id: &str,
    ) -> Result<PermissionProperties, DocDbError>;

    /// Read a single item.
    ///
    /// # Errors
    ///
    /// - `NotFound` if no item with `id` exists in the partition
    async fn read_item(
        &self,
        container: &ContainerRef,
        id: &str,
        partition_key: &PartitionKey,
    ) -> Result<Document, DocDbError>;

    /// Create an item.
    ///
    /// # Errors
    ///
    /// - `Conflict` if an item with the same id exists in the partition
    async fn create_item(
        &self,
        container: &ContainerRef,
        partition_key: &PartitionKey,
        item: &Document,
    ) -> Result<Document, DocDbError>;

    /// Insert the item, or replace it if an item with the same id exists.
    ///
    /// # Errors
    ///
    /// Returns the service error for the request.
    async fn upsert_item(
        &self,
        container: &ContainerRef,
        partition_key: &PartitionKey,
        item: &Document,
    ) -> Result<Document, DocDbError>;

    /// Delete a single item.
    ///
    /// # Errors
    ///
    /// - `NotFound` if no item with `id` exists in the partition
    async fn delete_item(
        &self,
        container: &ContainerRef,
        id: &str,
        partition_key: &PartitionKey,
    ) -> Result<(), DocDbError>;

    /// Run a query, following continuations until every page is read.
    ///
    /// With `partition_key` the query is scoped to that partition; without it
    /// the query fans out across partitions. Result order is not guaranteed.
    ///
    /// # Errors
    ///
    /// Returns the service error for the first failing page.
    async fn query_items(
        &self,
        container: &ContainerRef,
        query: &QuerySpec,
        partition_key: Option<&PartitionKey>,
    ) -> Result<Vec<Document>, DocDbError>;

    /// Read every item of the container (or of one partition).
    ///
    /// # Errors
    ///
    /// Returns the service error for the first failing page.
    async fn read_all_items(
        &self,
        container: &ContainerRef,
        partition_key: Option<&PartitionKey>,
    ) -> Result<Vec<Document>, DocDbError>;
}

/// Opens client sessions against one account.
pub trait DocDbConnector: Send + Sync {
    /// Open a session authenticated with `credential`.
    ///
    /// # Errors
    ///
    /// Returns an error if the session cannot be set up (e.g. TLS
    /// initialization or a malformed master key).
    fn connect(&self, credential: Credential) -> Result<Arc<dyn DocDbClient>, DocDbError>;
}
