//! Idempotent creation of the entities the resource token depends on.

use std::fmt;
use std::future::Future;

use docdb_sdk::{
    ContainerProperties, DatabaseProperties, DocDbClient, DocDbError, PartitionKey,
    PartitionKeyDefinition, PermissionDefinition, PermissionMode, PermissionProperties,
    ResourceLink, UserProperties,
};
use tracing::instrument;

use crate::config::WorkflowConfig;
use crate::error::SampleError;

/// How an entity was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    Created,
    /// It already existed and was fetched by id.
    Fetched,
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Created => f.write_str("created"),
            Self::Fetched => f.write_str("fetched"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Resolved<T> {
    pub value: T,
    pub resolution: Resolution,
}

/// Try `create`; when the service answers that the entity already exists,
/// `fetch` it instead. Any other failure is returned as [`SampleError::Setup`].
///
/// # Errors
///
/// Returns [`SampleError::Setup`] when creation fails for a reason other than
/// a conflict, or when the fallback fetch fails.
pub async fn get_or_create<T, C, CF, F, FF>(
    entity: &'static str,
    id: &str,
    create: C,
    fetch: F,
) -> Result<Resolved<T>, SampleError>
where
    C: FnOnce() -> CF,
    CF: Future<Output = Result<T, DocDbError>>,
    F: FnOnce() -> FF,
    FF: Future<Output = Result<T, DocDbError>>,
{
    let setup_error = |source| SampleError::Setup {
        entity,
        id: id.to_owned(),
        source,
    };

    match create().await {
        Ok(value) => {
            tracing::info!(entity, id, "created");
            Ok(Resolved {
                value,
                resolution: Resolution::Created,
            })
        }
        Err(e) if e.is_conflict() => {
            tracing::info!(entity, id, "already exists, fetching");
            let value = fetch().await.map_err(setup_error)?;
            Ok(Resolved {
                value,
                resolution: Resolution::Fetched,
            })
        }
        Err(e) => Err(setup_error(e)),
    }
}

/// Everything the admin session sets up for the scoped session.
#[derive(Debug, Clone)]
pub struct Entities {
    pub database: Resolved<DatabaseProperties>,
    pub container: Resolved<ContainerProperties>,
    pub user: Resolved<UserProperties>,
    pub permission: Resolved<PermissionProperties>,
}

impl Entities {
    /// `(entity, id, resolution)` for each entity, in setup order.
    #[must_use]
    pub fn resolutions(&self) -> [(&'static str, &str, Resolution); 4] {
        [
            ("database", self.database.value.id.as_str(), self.database.resolution),
            ("container", self.container.value.id.as_str(), self.container.resolution),
            ("user", self.user.value.id.as_str(), self.user.resolution),
            ("permission", self.permission.value.id.as_str(), self.permission.resolution),
        ]
    }
}

/// Resolve database, container, user and permission with the admin session.
///
/// # Errors
///
/// Returns [`SampleError::Setup`] for the first entity that cannot be resolved.
#[instrument(skip_all, fields(database = %config.database, container = %config.container))]
pub async fn setup(
    admin: &dyn DocDbClient,
    config: &WorkflowConfig,
) -> Result<Entities, SampleError> {
    let database = get_or_create(
        "database",
        &config.database,
        || admin.create_database(&config.database),
        || admin.read_database(&config.database),
    )
    .await?;

    let properties = ContainerProperties::new(
        config.container.as_str(),
        PartitionKeyDefinition::hash(config.partition_key_path.as_str()),
    );
    let container = get_or_create(
        "container",
        &config.container,
        || admin.create_container(&config.database, &properties),
        || admin.read_container(&config.database, &config.container),
    )
    .await?;

    let (user, permission) = grant(
        admin,
        config,
        &config.user,
        &config.permission,
        config.permission_mode,
    )
    .await?;

    Ok(Entities {
        database,
        container,
        user,
        permission,
    })
}

/// Resolve `user` and a permission for it on the configured container,
/// restricted to the configured partition key.
///
/// # Errors
///
/// Returns [`SampleError::Setup`] if the user or permission cannot be resolved.
pub async fn grant(
    admin: &dyn DocDbClient,
    config: &WorkflowConfig,
    user: &str,
    permission: &str,
    mode: PermissionMode,
) -> Result<(Resolved<UserProperties>, Resolved<PermissionProperties>), SampleError> {
    let user_props = get_or_create(
        "user",
        user,
        || admin.create_user(&config.database, user),
        || admin.read_user(&config.database, user),
    )
    .await?;

    let definition = PermissionDefinition::new(
        permission,
        mode,
        &ResourceLink::container(config.database.as_str(), config.container.as_str()),
    )
    .with_partition_key(&PartitionKey::from(config.partition_key.as_str()));

    let permission_props = get_or_create(
        "permission",
        permission,
        || admin.create_permission(&config.database, user, &definition),
        || admin.read_permission(&config.database, user, permission),
    )
    .await?;

    Ok((user_props, permission_props))
}
