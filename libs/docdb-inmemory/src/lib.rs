#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

//! In-memory document database service
//!
//! [`InMemoryService`] implements [`docdb_sdk::DocDbConnector`] without any
//! network. It keeps databases, containers, users, permissions and items in
//! process memory, mints resource tokens for permissions and enforces them on
//! every request:
//!
//! - permission mode (`All` allows writes, `Read` allows reads only)
//! - resource scope (the permission's resource link must cover the target)
//! - partition-key restriction
//!
//! Queries are evaluated for a small SQL subset, see [`Query`].
//!
//! ```ignore
//! let service = InMemoryService::new("master-key");
//! let admin = service.connect(Credential::master_key("master-key"))?;
//! ```

mod client;
mod query;
mod service;
mod store;

pub use client::InMemoryClient;
pub use query::Query;
pub use service::{DEFAULT_TOKEN_TTL, InMemoryService};
