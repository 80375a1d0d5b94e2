//! Id-based resource addressing.
//!
//! Every resource is addressed by the chain of ids leading to it, e.g.
//! `dbs/app/colls/items/docs/1`. The same string is used in request paths,
//! in master-key signatures and as the `resource` of a permission.

use std::fmt;

use crate::error::DocDbError;

/// Kind of resource addressed by a [`ResourceLink`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceType {
    Database,
    Container,
    Document,
    User,
    Permission,
}

impl ResourceType {
    /// Path segment naming this resource type (`dbs`, `colls`, ...).
    #[must_use]
    pub fn segment(self) -> &'static str {
        match self {
            Self::Database => "dbs",
            Self::Container => "colls",
            Self::Document => "docs",
            Self::User => "users",
            Self::Permission => "permissions",
        }
    }
}

impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.segment())
    }
}

/// Link to a single resource.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ResourceLink {
    Database {
        database: String,
    },
    Container {
        database: String,
        container: String,
    },
    Document {
        database: String,
        container: String,
        id: String,
    },
    User {
        database: String,
        user: String,
    },
    Permission {
        database: String,
        user: String,
        permission: String,
    },
}

impl ResourceLink {
    #[must_use]
    pub fn database(database: impl Into<String>) -> Self {
        Self::Database {
            database: database.into(),
        }
    }

    #[must_use]
    pub fn container(database: impl Into<String>, container: impl Into<String>) -> Self {
        Self::Container {
            database: database.into(),
            container: container.into(),
        }
    }

    #[must_use]
    pub fn document(
        database: impl Into<String>,
        container: impl Into<String>,
        id: impl Into<String>,
    ) -> Self {
        Self::Document {
            database: database.into(),
            container: container.into(),
            id: id.into(),
        }
    }

    #[must_use]
    pub fn user(database: impl Into<String>, user: impl Into<String>) -> Self {
        Self::User {
            database: database.into(),
            user: user.into(),
        }
    }

    #[must_use]
    pub fn permission(
        database: impl Into<String>,
        user: impl Into<String>,
        permission: impl Into<String>,
    ) -> Self {
        Self::Permission {
            database: database.into(),
            user: user.into(),
            permission: permission.into(),
        }
    }

    /// Parse an id-based link such as `dbs/app/colls/items`.
    ///
    /// Leading and trailing slashes are ignored.
    ///
    /// # Errors
    ///
    /// Returns [`DocDbError::InvalidRequest`] when the link does not name a
    /// known resource chain.
    pub fn parse(link: &str) -> Result<Self, DocDbError> {
        let segments: Vec<&str> = link.trim_matches('/').split('/').collect();
        let invalid = || DocDbError::InvalidRequest(format!("invalid resource link '{link}'"));

        if segments.iter().any(|s| s.is_empty()) {
            return Err(invalid());
        }

        match segments.as_slice() {
            ["dbs", db] => Ok(Self::database(*db)),
            ["dbs", db, "colls", coll] => Ok(Self::container(*db, *coll)),
            ["dbs", db, "colls", coll, "docs", id] => Ok(Self::document(*db, *coll, *id)),
            ["dbs", db, "users", user] => Ok(Self::user(*db, *user)),
            ["dbs", db, "users", user, "permissions", perm] => {
                Ok(Self::permission(*db, *user, *perm))
            }
            _ => Err(invalid()),
        }
    }

    #[must_use]
    pub fn resource_type(&self) -> ResourceType {
        match self {
            Self::Database { .. } => ResourceType::Database,
            Self::Container { .. } => ResourceType::Container,
            Self::Document { .. } => ResourceType::Document,
            Self::User { .. } => ResourceType::User,
            Self::Permission { .. } => ResourceType::Permission,
        }
    }

    #[must_use]
    pub fn database_id(&self) -> &str {
        match self {
            Self::Database { database }
            | Self::Container { database, .. }
            | Self::Document { database, .. }
            | Self::User { database, .. }
            | Self::Permission { database, .. } => database,
        }
    }

    /// Id of the container this link lives in, for containers and documents.
    #[must_use]
    pub fn container_id(&self) -> Option<&str> {
        match self {
            Self::Container { container, .. } | Self::Document { container, .. } => {
                Some(container)
            }
            _ => None,
        }
    }

    /// Id of the addressed resource itself (last segment).
    #[must_use]
    pub fn id(&self) -> &str {
        match self {
            Self::Database { database } => database,
            Self::Container { container, .. } => container,
            Self::Document { id, .. } => id,
            Self::User { user, .. } => user,
            Self::Permission { permission, .. } => permission,
        }
    }

    /// Link of the owning resource; `None` for databases.
    #[must_use]
    pub fn parent(&self) -> Option<Self> {
        match self {
            Self::Database { .. } => None,
            Self::Container { database, .. } | Self::User { database, .. } => {
                Some(Self::database(database.clone()))
            }
            Self::Document {
                database,
                container,
                ..
            } => Some(Self::container(database.clone(), container.clone())),
            Self::Permission { database, user, .. } => {
                Some(Self::user(database.clone(), user.clone()))
            }
        }
    }

    /// Returns `true` if `other` is this resource or lives underneath it.
    #[must_use]
    pub fn covers(&self, other: &ResourceLink) -> bool {
        let mut current = Some(other.clone());
        while let Some(link) = current {
            if &link == self {
                return true;
            }
            current = link.parent();
        }
        false
    }
}

impl fmt::Display for ResourceLink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Database { database } => write!(f, "dbs/{database}"),
            Self::Container {
                database,
                container,
            } => write!(f, "dbs/{database}/colls/{container}"),
            Self::Document {
                database,
                container,
                id,
            } => write!(f, "dbs/{database}/colls/{container}/docs/{id}"),
            Self::User { database, user } => write!(f, "dbs/{database}/users/{user}"),
            Self::Permission {
                database,
                user,
                permission,
            } => write!(f, "dbs/{database}/users/{user}/permissions/{permission}"),
        }
    }
}

/// Reference to a container within a database.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ContainerRef {
    pub database: String,
    pub container: String,
}

impl ContainerRef {
    #[must_use]
    pub fn new(database: impl Into<String>, container: impl Into<String>) -> Self {
        Self {
            database: database.into(),
            container: container.into(),
        }
    }

    #[must_use]
    pub fn link(&self) -> ResourceLink {
        ResourceLink::container(self.database.clone(), self.container.clone())
    }

    #[must_use]
    pub fn item_link(&self, id: &str) -> ResourceLink {
        ResourceLink::document(self.database.clone(), self.container.clone(), id)
    }
}

impl fmt::Display for ContainerRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "dbs/{}/colls/{}", self.database, self.container)
    }
}
