#![allow(clippy::unwrap_used, clippy::expect_used)]

//! End-to-end runs of the sample against the in-process emulator.

use std::sync::Arc;

use docdb_inmemory::InMemoryService;
use docdb_sdk::{
    ContainerRef, Credential, DocDbClient, DocDbConnector, DocDbError, PartitionKey,
    document_id,
};
use resource_token_sample::{
    Operation, OperationReport, OutcomeKind, Resolution, SampleError, ScopedOperations,
    WorkflowConfig, resource_tokens, run, setup,
};
use serde_json::json;

const KEY: &str = "dGVzdC1rZXk=";

fn config() -> WorkflowConfig {
    WorkflowConfig {
        read_only_scenario: false,
        ..WorkflowConfig::default()
    }
}

fn admin(service: &InMemoryService) -> Arc<dyn DocDbClient> {
    service.connect(Credential::master_key(KEY)).unwrap()
}

/// Session holding only the resource token of the configured permission.
async fn scoped(service: &InMemoryService, config: &WorkflowConfig) -> ScopedOperations {
    let entities = setup(admin(service).as_ref(), config).await.unwrap();
    let tokens = resource_tokens(&entities.permission.value, &config.container).unwrap();
    let client = service.connect(Credential::ResourceTokens(tokens)).unwrap();
    ScopedOperations::new(
        client,
        ContainerRef::new(config.database.as_str(), config.container.as_str()),
        &config.partition_key_path,
        config.partition_key(),
    )
}

fn outcomes(reports: &[OperationReport]) -> Vec<(Operation, OutcomeKind)> {
    reports.iter().map(|r| (r.operation, r.outcome)).collect()
}

#[tokio::test]
async fn second_run_fetches_every_entity() {
    let service = InMemoryService::new(KEY);
    let config = config();

    let first = run(&service, Credential::master_key(KEY), &config).await.unwrap();
    assert!(
        first
            .setup
            .iter()
            .all(|line| line.resolution == Resolution::Created),
        "{first}"
    );

    let second = run(&service, Credential::master_key(KEY), &config).await.unwrap();
    let entities: Vec<_> = second.setup.iter().map(|line| line.entity).collect();
    assert_eq!(entities, ["database", "container", "user", "permission"]);
    assert!(
        second
            .setup
            .iter()
            .all(|line| line.resolution == Resolution::Fetched),
        "{second}"
    );
}

#[tokio::test]
async fn scoped_operations_run_in_order() {
    let service = InMemoryService::new(KEY);
    let config = config();

    let first = run(&service, Credential::master_key(KEY), &config).await.unwrap();
    assert_eq!(
        outcomes(&first.operations),
        [
            (Operation::Read, OutcomeKind::NotFound),
            (Operation::Upsert, OutcomeKind::Succeeded),
            (Operation::Delete, OutcomeKind::Succeeded),
            (Operation::Create, OutcomeKind::Succeeded),
            (Operation::Query, OutcomeKind::Succeeded),
            (Operation::ReadAll, OutcomeKind::Succeeded),
        ]
    );
    assert_eq!(
        first.operation(Operation::Query).unwrap().detail.as_deref(),
        Some("1 item(s)")
    );

    // The item created by the first run is there for the second.
    let second = run(&service, Credential::master_key(KEY), &config).await.unwrap();
    assert_eq!(
        second.operation(Operation::Read).unwrap().outcome,
        OutcomeKind::Succeeded
    );
    assert!(first.read_only.is_none());
    assert!(!second.cleaned_up);
}

#[tokio::test]
async fn token_is_rejected_outside_its_partition() {
    let service = InMemoryService::new(KEY);
    let config = config();

    let ops = scoped(&service, &config).await;
    let other = ops.for_partition(PartitionKey::from("2"));
    let item = other.item("2");

    let outcomes = [
        other.read("2").await.kind(),
        other.create(&item).await.kind(),
        other.upsert(&item).await.kind(),
        other.delete("2").await.kind(),
        other.query().await.kind(),
    ];
    assert!(outcomes.iter().all(|k| *k == OutcomeKind::Failed), "{outcomes:?}");

    let err = other.upsert(&item).await;
    assert!(err.error().unwrap().is_forbidden(), "{err:?}");

    // Nothing was written to partition "2".
    let container = ContainerRef::new(config.database.as_str(), config.container.as_str());
    let missing = admin(&service)
        .read_item(&container, "2", &PartitionKey::from("2"))
        .await
        .unwrap_err();
    assert!(missing.is_not_found());
}

#[tokio::test]
async fn duplicate_create_is_already_exists() {
    let service = InMemoryService::new(KEY);
    let ops = scoped(&service, &config()).await;
    let item = ops.item("dup");

    assert_eq!(ops.create(&item).await.kind(), OutcomeKind::Succeeded);
    assert_eq!(ops.create(&item).await.kind(), OutcomeKind::AlreadyExists);
}

#[tokio::test]
async fn missing_item_is_not_found() {
    let service = InMemoryService::new(KEY);
    let ops = scoped(&service, &config()).await;

    assert_eq!(ops.read("nope").await.kind(), OutcomeKind::NotFound);
    assert_eq!(ops.delete("nope").await.kind(), OutcomeKind::NotFound);
}

#[tokio::test]
async fn partition_query_returns_exactly_that_partition() {
    let service = InMemoryService::new(KEY);
    let config = config();
    let ops = scoped(&service, &config).await;

    let container = ContainerRef::new(config.database.as_str(), config.container.as_str());
    let admin = admin(&service);
    for (id, key) in [("a", "1"), ("b", "2"), ("c", "1"), ("d", "3")] {
        admin
            .create_item(&container, &PartitionKey::from(key), &json!({ "id": id, "key": key }))
            .await
            .unwrap();
    }

    let found = ops.query().await.succeeded().unwrap();
    let mut ids: Vec<_> = found.iter().filter_map(document_id).collect();
    ids.sort_unstable();
    assert_eq!(ids, ["a", "c"]);

    let visible = ops.read_all().await.succeeded().unwrap();
    assert_eq!(visible.len(), 2);
}

#[tokio::test]
async fn read_only_permission_reads_but_cannot_write() {
    let service = InMemoryService::new(KEY);
    let config = WorkflowConfig::default();
    assert!(config.read_only_scenario);

    let report = run(&service, Credential::master_key(KEY), &config).await.unwrap();
    let read_only = report.read_only.as_deref().unwrap();
    assert_eq!(
        outcomes(read_only),
        [
            (Operation::Read, OutcomeKind::Succeeded),
            (Operation::Upsert, OutcomeKind::Failed),
            (Operation::Delete, OutcomeKind::Failed),
        ]
    );
    assert_eq!(read_only[1].detail.as_deref(), Some("forbidden"), "{report}");
    assert_eq!(report.setup.len(), 6);
}

#[tokio::test]
async fn cleanup_deletes_the_database() {
    let service = InMemoryService::new(KEY);
    let config = WorkflowConfig {
        cleanup: true,
        ..config()
    };

    let report = run(&service, Credential::master_key(KEY), &config).await.unwrap();
    assert!(report.cleaned_up);
    assert!(report.to_string().contains("cleanup: database deleted"));

    let err = admin(&service)
        .read_database(&config.database)
        .await
        .unwrap_err();
    assert!(matches!(err, DocDbError::NotFound { .. }), "{err:?}");
}

#[tokio::test]
async fn wrong_master_key_stops_the_run() {
    let service = InMemoryService::new(KEY);
    let err = run(&service, Credential::master_key("d3Jvbmc="), &config())
        .await
        .unwrap_err();
    assert!(
        matches!(
            err,
            SampleError::Setup { entity: "database", source: DocDbError::Unauthorized { .. }, .. }
        ),
        "{err}"
    );
}
