#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

//! Resource-token access sample
//!
//! With the account master key the sample resolves a database, a container,
//! a user and a permission scoped to one partition key (creating each one or
//! fetching it if it already exists). It then reads the resource token off the
//! permission and opens a second session that holds only that token. Item
//! operations issued through the second session succeed for the permitted
//! partition and are rejected by the service for any other.
//!
//! The run targets either a real account over REST ([`docdb_rest`]) or the
//! in-process emulator ([`docdb_inmemory`]).

pub mod config;
pub mod error;
pub mod logging;
pub mod operations;
pub mod setup;
pub mod token;
pub mod workflow;

pub use config::{CliOverrides, SampleConfig, WorkflowConfig};
pub use error::SampleError;
pub use operations::{Operation, OperationReport, Outcome, OutcomeKind, ScopedOperations};
pub use setup::{Resolution, get_or_create, setup};
pub use token::resource_tokens;
pub use workflow::{Report, run};
