//! Service-specific header names.

pub const DATE: &str = "x-ms-date";
pub const VERSION: &str = "x-ms-version";
pub const PARTITION_KEY: &str = "x-ms-documentdb-partitionkey";
pub const IS_UPSERT: &str = "x-ms-documentdb-is-upsert";
pub const IS_QUERY: &str = "x-ms-documentdb-isquery";
pub const ENABLE_CROSS_PARTITION: &str = "x-ms-documentdb-query-enablecrosspartition";
pub const CONTINUATION: &str = "x-ms-continuation";
pub const MAX_ITEM_COUNT: &str = "x-ms-max-item-count";
pub const TOKEN_EXPIRY: &str = "x-ms-documentdb-expiry-seconds";
pub const REQUEST_CHARGE: &str = "x-ms-request-charge";
pub const ACTIVITY_ID: &str = "x-ms-activity-id";

pub const CONTENT_TYPE_JSON: &str = "application/json";
pub const CONTENT_TYPE_QUERY: &str = "application/query+json";
