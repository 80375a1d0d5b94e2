//! The end-to-end run: admin setup, token extraction, scoped operations.

use std::fmt;

use docdb_sdk::{
    ContainerRef, Credential, DocDbClient, DocDbConnector, Document, PermissionMode,
    PermissionProperties, document_id,
};
use tracing::instrument;

use crate::config::WorkflowConfig;
use crate::error::SampleError;
use crate::operations::{Operation, OperationReport, ScopedOperations};
use crate::setup::{Resolution, Resolved, grant, setup};
use crate::token::resource_tokens;

/// How one setup entity was resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetupReport {
    pub entity: &'static str,
    pub id: String,
    pub resolution: Resolution,
}

impl fmt::Display for SetupReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} '{}': {}", self.entity, self.id, self.resolution)
    }
}

/// Everything a run did, in order.
#[derive(Debug, Clone, Default)]
pub struct Report {
    pub setup: Vec<SetupReport>,
    pub operations: Vec<OperationReport>,
    /// Present when the read-only scenario ran.
    pub read_only: Option<Vec<OperationReport>>,
    pub cleaned_up: bool,
}

impl Report {
    /// Outcome of the first scoped operation of kind `operation`.
    #[must_use]
    pub fn operation(&self, operation: Operation) -> Option<&OperationReport> {
        self.operations.iter().find(|r| r.operation == operation)
    }
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "setup:")?;
        for line in &self.setup {
            writeln!(f, "  {line}")?;
        }
        writeln!(f, "resource token operations:")?;
        for line in &self.operations {
            writeln!(f, "  {line}")?;
        }
        if let Some(read_only) = &self.read_only {
            writeln!(f, "read-only resource token operations:")?;
            for line in read_only {
                writeln!(f, "  {line}")?;
            }
        }
        if self.cleaned_up {
            writeln!(f, "cleanup: database deleted")?;
        }
        Ok(())
    }
}

fn setup_line<T>(entity: &'static str, id: &str, resolved: &Resolved<T>) -> SetupReport {
    SetupReport {
        entity,
        id: id.to_owned(),
        resolution: resolved.resolution,
    }
}

/// Run the whole sample against `connector`.
///
/// Setup failures stop the run; failures of the scoped operations are
/// recorded in the report.
///
/// # Errors
///
/// Returns a [`SampleError`] if a session cannot be opened, an entity cannot
/// be resolved, the permission carries no token, or cleanup fails.
#[instrument(skip_all, fields(database = %config.database, container = %config.container))]
pub async fn run(
    connector: &dyn DocDbConnector,
    master: Credential,
    config: &WorkflowConfig,
) -> Result<Report, SampleError> {
    let admin = connector.connect(master)?;
    let entities = setup(admin.as_ref(), config).await?;

    let mut report = Report {
        setup: entities
            .resolutions()
            .into_iter()
            .map(|(entity, id, resolution)| SetupReport {
                entity,
                id: id.to_owned(),
                resolution,
            })
            .collect(),
        ..Report::default()
    };

    let scoped = restricted_session(connector, config, &entities.permission.value)?;
    report.operations = scoped_operations(&scoped, &config.item_id).await;

    if config.read_only_scenario {
        let (user, permission) = grant(
            admin.as_ref(),
            config,
            &config.read_only_user,
            &config.read_only_permission,
            PermissionMode::Read,
        )
        .await?;
        report.setup.push(setup_line("user", &config.read_only_user, &user));
        report
            .setup
            .push(setup_line("permission", &config.read_only_permission, &permission));

        let reader = restricted_session(connector, config, &permission.value)?;
        report.read_only = Some(read_only_operations(&reader, &config.item_id).await);
    }

    if config.cleanup {
        cleanup(admin.as_ref(), &config.database).await?;
        report.cleaned_up = true;
    }

    Ok(report)
}

fn restricted_session(
    connector: &dyn DocDbConnector,
    config: &WorkflowConfig,
    permission: &PermissionProperties,
) -> Result<ScopedOperations, SampleError> {
    let tokens = resource_tokens(permission, &config.container)?;
    let client = connector.connect(Credential::ResourceTokens(tokens))?;
    Ok(ScopedOperations::new(
        client,
        ContainerRef::new(config.database.as_str(), config.container.as_str()),
        &config.partition_key_path,
        config.partition_key(),
    ))
}

/// Read, upsert, delete, create, query and read-all, each issued once.
pub async fn scoped_operations(ops: &ScopedOperations, item_id: &str) -> Vec<OperationReport> {
    let item = ops.item(item_id);
    let describe_item =
        |doc: &Document| format!("item '{}'", document_id(doc).unwrap_or_default());
    let describe_items = |docs: &Vec<Document>| format!("{} item(s)", docs.len());

    vec![
        ops.read(item_id).await.report(Operation::Read, describe_item),
        ops.upsert(&item).await.report(Operation::Upsert, describe_item),
        ops.delete(item_id)
            .await
            .report(Operation::Delete, |_| format!("item '{item_id}'")),
        ops.create(&item).await.report(Operation::Create, describe_item),
        ops.query().await.report(Operation::Query, describe_items),
        ops.read_all().await.report(Operation::ReadAll, describe_items),
    ]
}

/// Read succeeds; upsert and delete are expected to be rejected.
async fn read_only_operations(ops: &ScopedOperations, item_id: &str) -> Vec<OperationReport> {
    let item = ops.item(item_id);
    vec![
        ops.read(item_id)
            .await
            .report(Operation::Read, |_| format!("item '{item_id}'")),
        ops.upsert(&item)
            .await
            .report(Operation::Upsert, |_| format!("item '{item_id}'")),
        ops.delete(item_id)
            .await
            .report(Operation::Delete, |_| format!("item '{item_id}'")),
    ]
}

async fn cleanup(admin: &dyn DocDbClient, database: &str) -> Result<(), SampleError> {
    admin.delete_database(database).await?;
    tracing::info!(database, "deleted database");
    Ok(())
}
