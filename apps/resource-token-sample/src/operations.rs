//! Item operations issued through the restricted session.
//!
//! Every call is issued once and its result is folded into an [`Outcome`].
//! Expected conditions (`NotFound` for read and delete, `AlreadyExists` for
//! create) get their own variant; anything else is [`Outcome::Failed`]. No
//! outcome aborts the run.

use std::fmt;
use std::sync::Arc;

use docdb_sdk::{
    ContainerRef, DocDbClient, DocDbError, Document, PartitionKey, PartitionKeyDefinition,
    QuerySpec,
};
use serde_json::{Map, Value, json};
use tracing::instrument;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Read,
    Upsert,
    Delete,
    Create,
    Query,
    ReadAll,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Read => "read",
            Self::Upsert => "upsert",
            Self::Delete => "delete",
            Self::Create => "create",
            Self::Query => "query",
            Self::ReadAll => "read all",
        })
    }
}

/// Result of one scoped operation.
#[derive(Debug)]
pub enum Outcome<T> {
    Succeeded(T),
    NotFound,
    AlreadyExists,
    Failed(DocDbError),
}

/// [`Outcome`] without its payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutcomeKind {
    Succeeded,
    NotFound,
    AlreadyExists,
    Failed,
}

impl fmt::Display for OutcomeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Succeeded => "succeeded",
            Self::NotFound => "not found",
            Self::AlreadyExists => "already exists",
            Self::Failed => "failed",
        })
    }
}

impl<T> Outcome<T> {
    fn any_failure(result: Result<T, DocDbError>) -> Self {
        result.map_or_else(Self::Failed, Self::Succeeded)
    }

    fn not_found_or_failure(result: Result<T, DocDbError>) -> Self {
        match result {
            Ok(value) => Self::Succeeded(value),
            Err(e) if e.is_not_found() => Self::NotFound,
            Err(e) => Self::Failed(e),
        }
    }

    fn conflict_or_failure(result: Result<T, DocDbError>) -> Self {
        match result {
            Ok(value) => Self::Succeeded(value),
            Err(e) if e.is_conflict() => Self::AlreadyExists,
            Err(e) => Self::Failed(e),
        }
    }

    #[must_use]
    pub fn kind(&self) -> OutcomeKind {
        match self {
            Self::Succeeded(_) => OutcomeKind::Succeeded,
            Self::NotFound => OutcomeKind::NotFound,
            Self::AlreadyExists => OutcomeKind::AlreadyExists,
            Self::Failed(_) => OutcomeKind::Failed,
        }
    }

    #[must_use]
    pub fn succeeded(self) -> Option<T> {
        match self {
            Self::Succeeded(value) => Some(value),
            _ => None,
        }
    }

    /// The service error behind a [`Outcome::Failed`].
    #[must_use]
    pub fn error(&self) -> Option<&DocDbError> {
        match self {
            Self::Failed(e) => Some(e),
            _ => None,
        }
    }

    /// Summarize for the run report. `describe` renders a success payload;
    /// a failure only carries its error category, the full error is logged.
    #[must_use]
    pub fn report(
        &self,
        operation: Operation,
        describe: impl FnOnce(&T) -> String,
    ) -> OperationReport {
        let detail = match self {
            Self::Succeeded(value) => Some(describe(value)),
            Self::Failed(e) => Some(e.category().to_owned()),
            Self::NotFound | Self::AlreadyExists => None,
        };
        OperationReport {
            operation,
            outcome: self.kind(),
            detail,
        }
    }

    fn log(&self, operation: Operation) {
        match self {
            Self::Succeeded(_) => tracing::info!(%operation, "operation succeeded"),
            Self::NotFound => tracing::info!(%operation, "item not found"),
            Self::AlreadyExists => tracing::info!(%operation, "item already exists"),
            Self::Failed(e) => tracing::warn!(%operation, error = %e, "operation failed"),
        }
    }
}

/// One line of the run report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationReport {
    pub operation: Operation,
    pub outcome: OutcomeKind,
    pub detail: Option<String>,
}

impl fmt::Display for OperationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.operation, self.outcome)?;
        if let Some(detail) = &self.detail {
            write!(f, " ({detail})")?;
        }
        Ok(())
    }
}

/// Item operations against one container and one partition.
#[derive(Clone)]
pub struct ScopedOperations {
    client: Arc<dyn DocDbClient>,
    container: ContainerRef,
    partition_key_path: PartitionKeyDefinition,
    partition_key: PartitionKey,
}

impl fmt::Debug for ScopedOperations {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScopedOperations")
            .field("container", &self.container)
            .field("partition_key", &self.partition_key)
            .finish_non_exhaustive()
    }
}

impl ScopedOperations {
    #[must_use]
    pub fn new(
        client: Arc<dyn DocDbClient>,
        container: ContainerRef,
        partition_key_path: &str,
        partition_key: PartitionKey,
    ) -> Self {
        Self {
            client,
            container,
            partition_key_path: PartitionKeyDefinition::hash(partition_key_path),
            partition_key,
        }
    }

    /// Same session, targeting another partition.
    #[must_use]
    pub fn for_partition(&self, partition_key: PartitionKey) -> Self {
        Self {
            partition_key,
            ..self.clone()
        }
    }

    #[must_use]
    pub fn partition_key(&self) -> &PartitionKey {
        &self.partition_key
    }

    /// A sample item with `id` in this partition.
    ///
    /// The partition value is placed at the key path, nesting objects for
    /// paths like `/address/city`.
    #[must_use]
    pub fn item(&self, id: &str) -> Document {
        let mut value = self.partition_key.value().clone();
        for segment in self.partition_key_path.field_path().iter().rev() {
            let mut object = Map::new();
            object.insert((*segment).to_owned(), value);
            value = Value::Object(object);
        }

        let mut item = json!({
            "id": id,
            "description": "item written through a resource token",
        });
        if let (Value::Object(item), Value::Object(key)) = (&mut item, value) {
            item.extend(key);
        }
        item
    }

    /// `SELECT * FROM c WHERE c.<key path> = <partition value>`
    #[must_use]
    pub fn partition_query(&self) -> QuerySpec {
        let field = self.partition_key_path.field_path().join(".");
        QuerySpec::new(format!(
            "SELECT * FROM c WHERE c.{field} = {}",
            self.partition_key.value()
        ))
    }

    #[instrument(skip(self), fields(partition = %self.partition_key.value()))]
    pub async fn read(&self, id: &str) -> Outcome<Document> {
        let outcome = Outcome::not_found_or_failure(
            self.client
                .read_item(&self.container, id, &self.partition_key)
                .await,
        );
        outcome.log(Operation::Read);
        outcome
    }

    #[instrument(skip_all, fields(partition = %self.partition_key.value()))]
    pub async fn upsert(&self, item: &Document) -> Outcome<Document> {
        let outcome = Outcome::any_failure(
            self.client
                .upsert_item(&self.container, &self.partition_key, item)
                .await,
        );
        outcome.log(Operation::Upsert);
        outcome
    }

    #[instrument(skip(self), fields(partition = %self.partition_key.value()))]
    pub async fn delete(&self, id: &str) -> Outcome<()> {
        let outcome = Outcome::not_found_or_failure(
            self.client
                .delete_item(&self.container, id, &self.partition_key)
                .await,
        );
        outcome.log(Operation::Delete);
        outcome
    }

    #[instrument(skip_all, fields(partition = %self.partition_key.value()))]
    pub async fn create(&self, item: &Document) -> Outcome<Document> {
        let outcome = Outcome::conflict_or_failure(
            self.client
                .create_item(&self.container, &self.partition_key, item)
                .await,
        );
        outcome.log(Operation::Create);
        outcome
    }

    /// Run [`Self::partition_query`] within this partition.
    #[instrument(skip(self), fields(partition = %self.partition_key.value()))]
    pub async fn query(&self) -> Outcome<Vec<Document>> {
        let query = self.partition_query();
        tracing::debug!(query = %query.query, "querying");
        let outcome = Outcome::any_failure(
            self.client
                .query_items(&self.container, &query, Some(&self.partition_key))
                .await,
        );
        outcome.log(Operation::Query);
        outcome
    }

    /// Every item the token can see, without naming a partition.
    #[instrument(skip(self))]
    pub async fn read_all(&self) -> Outcome<Vec<Document>> {
        let outcome = Outcome::any_failure(self.client.read_all_items(&self.container, None).await);
        outcome.log(Operation::ReadAll);
        outcome
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use docdb_inmemory::InMemoryService;
    use docdb_sdk::{ContainerProperties, Credential, DocDbConnector};

    const KEY: &str = "a2V5";

    async fn operations(path: &str) -> ScopedOperations {
        let service = InMemoryService::new(KEY);
        let client = service.connect(Credential::master_key(KEY)).unwrap();
        client.create_database("db").await.unwrap();
        client
            .create_container(
                "db",
                &ContainerProperties::new("items", PartitionKeyDefinition::hash(path)),
            )
            .await
            .unwrap();
        ScopedOperations::new(
            client,
            ContainerRef::new("db", "items"),
            path,
            PartitionKey::from("1"),
        )
    }

    #[tokio::test]
    async fn item_nests_partition_value_along_the_path() {
        let flat = operations("/key").await;
        assert_eq!(flat.item("a")["key"], "1");

        let nested = operations("/address/city").await;
        let item = nested.item("a");
        assert_eq!(item["address"]["city"], "1");
        assert_eq!(item["id"], "a");
        assert_eq!(
            nested.partition_query().query,
            r#"SELECT * FROM c WHERE c.address.city = "1""#
        );
    }

    #[tokio::test]
    async fn expected_conditions_get_their_own_outcome() {
        let ops = operations("/key").await;

        assert_eq!(ops.read("missing").await.kind(), OutcomeKind::NotFound);
        assert_eq!(ops.delete("missing").await.kind(), OutcomeKind::NotFound);

        let item = ops.item("1");
        assert_eq!(ops.create(&item).await.kind(), OutcomeKind::Succeeded);
        assert_eq!(ops.create(&item).await.kind(), OutcomeKind::AlreadyExists);
        assert_eq!(ops.upsert(&item).await.kind(), OutcomeKind::Succeeded);

        let found = ops.query().await.succeeded().unwrap();
        assert_eq!(found.len(), 1);
    }

    #[tokio::test]
    async fn other_errors_are_failures() {
        let ops = operations("/key").await;
        // The item lacks the partition field, which the service rejects.
        let outcome = ops.create(&json!({ "id": "x" })).await;

        assert_eq!(outcome.kind(), OutcomeKind::Failed);
        assert!(outcome.error().is_some());
    }

    #[test]
    fn report_lines_render_details() {
        let outcome: Outcome<Vec<Document>> = Outcome::Succeeded(vec![json!({}), json!({})]);
        let line = outcome.report(Operation::Query, |docs| format!("{} item(s)", docs.len()));
        assert_eq!(line.to_string(), "query: succeeded (2 item(s))");

        let line = Outcome::<()>::NotFound.report(Operation::Delete, |_| String::new());
        assert_eq!(line.to_string(), "delete: not found");
    }

    #[test]
    fn failure_lines_omit_the_service_message() {
        let outcome: Outcome<()> = Outcome::Failed(DocDbError::Forbidden {
            message: "permission scoped to partition [\"1\"]".to_owned(),
        });
        let line = outcome.report(Operation::Upsert, |_| String::new());
        assert_eq!(line.to_string(), "upsert: failed (forbidden)");
    }
}
