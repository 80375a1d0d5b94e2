#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
#![warn(warnings)]

//! REST adapter for the document database SDK
//!
//! This crate implements [`docdb_sdk::DocDbClient`] over the service's HTTPS
//! API using a pooled hyper client:
//! - TLS via rustls with bundled webpki roots (HTTPS only by default)
//! - Master-key request signing (HMAC-SHA256) or resource-token authorization
//! - Per-request timeout and response body size limit
//! - Feed paging via continuation tokens
//!
//! # Example
//!
//! ```ignore
//! use docdb_rest::{RestClientConfig, RestConnector};
//! use docdb_sdk::{Credential, DocDbConnector};
//!
//! let connector = RestConnector::new(RestClientConfig::new(endpoint));
//! let admin = connector.connect(Credential::master_key(key))?;
//! admin.create_database("app").await?;
//! ```

mod auth;
mod client;
mod config;
mod error;
pub mod headers;
mod transport;

pub use client::{DocDbRestClient, RestConnector};
pub use config::{DEFAULT_API_VERSION, DEFAULT_USER_AGENT, RestClientConfig, TransportSecurity};
pub use error::HttpError;
