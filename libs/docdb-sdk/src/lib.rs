//! Document database client SDK
//!
//! This crate provides the public API shared by every document database
//! adapter in the workspace:
//!
//! - [`DocDbClient`] - typed operations on databases, containers, users,
//!   permissions and items
//! - [`DocDbConnector`] - opens a client session for a [`Credential`]
//! - [`Credential`], [`ResourceTokens`] - master-key and resource-token credentials
//! - [`ResourceLink`], [`ContainerRef`] - id-based resource addressing
//! - [`DocDbError`] - error taxonomy mirrored from service status codes
//!
//! ## Usage
//!
//! ```ignore
//! use docdb_sdk::{Credential, DocDbConnector, PartitionKey, ContainerRef};
//!
//! let admin = connector.connect(Credential::master_key(key))?;
//! let db = admin.create_database("app").await?;
//!
//! let scoped = connector.connect(Credential::ResourceTokens(tokens))?;
//! let item = scoped
//!     .read_item(&ContainerRef::new("app", "items"), "1", &PartitionKey::from("1"))
//!     .await?;
//! ```
#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

pub mod api;
pub mod credential;
pub mod error;
pub mod link;
pub mod models;

pub use api::{DocDbClient, DocDbConnector};
pub use credential::{Credential, ResourceTokens};
pub use error::DocDbError;
pub use link::{ContainerRef, ResourceLink, ResourceType};
pub use models::{
    ContainerProperties, DatabaseProperties, Document, PartitionKey, PartitionKeyDefinition,
    PartitionKind, PermissionDefinition, PermissionMode, PermissionProperties, QueryParameter,
    QuerySpec, SystemProperties, UserProperties, document_id,
};
