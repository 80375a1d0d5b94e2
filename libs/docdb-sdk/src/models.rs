//! Resource models exchanged with the document database service.

use std::fmt;

use secrecy::SecretString;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::link::ResourceLink;

/// Items are schemaless JSON documents.
pub type Document = Value;

/// Returns the `id` field of a document, if present and a string.
#[must_use]
pub fn document_id(document: &Document) -> Option<&str> {
    document.get("id").and_then(Value::as_str)
}

/// Properties the service stamps onto every resource.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SystemProperties {
    #[serde(rename = "_rid", default, skip_serializing_if = "Option::is_none")]
    pub rid: Option<String>,
    #[serde(rename = "_self", default, skip_serializing_if = "Option::is_none")]
    pub self_link: Option<String>,
    #[serde(rename = "_etag", default, skip_serializing_if = "Option::is_none")]
    pub etag: Option<String>,
    #[serde(rename = "_ts", default, skip_serializing_if = "Option::is_none")]
    pub ts: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseProperties {
    pub id: String,
    #[serde(flatten)]
    pub system: SystemProperties,
}

/// Partitioning scheme of a container.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum PartitionKind {
    #[default]
    Hash,
}

/// Partition-key definition of a container.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartitionKeyDefinition {
    pub paths: Vec<String>,
    #[serde(default)]
    pub kind: PartitionKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<u8>,
}

impl PartitionKeyDefinition {
    /// Single-path hash partitioning, e.g. `PartitionKeyDefinition::hash("/key")`.
    #[must_use]
    pub fn hash(path: impl Into<String>) -> Self {
        Self {
            paths: vec![path.into()],
            kind: PartitionKind::Hash,
            version: Some(2),
        }
    }

    /// Field names making up the first partition-key path (`/a/b` -> `["a", "b"]`).
    #[must_use]
    pub fn field_path(&self) -> Vec<&str> {
        self.paths
            .first()
            .map(|p| p.split('/').filter(|s| !s.is_empty()).collect())
            .unwrap_or_default()
    }

    /// Extract the partition-key value from a document.
    ///
    /// A document without the field belongs to the `null` partition.
    #[must_use]
    pub fn value_of(&self, document: &Document) -> Value {
        let mut current = document;
        for field in self.field_path() {
            match current.get(field) {
                Some(next) => current = next,
                None => return Value::Null,
            }
        }
        current.clone()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerProperties {
    pub id: String,
    #[serde(rename = "partitionKey")]
    pub partition_key: PartitionKeyDefinition,
    #[serde(flatten)]
    pub system: SystemProperties,
}

impl ContainerProperties {
    #[must_use]
    pub fn new(id: impl Into<String>, partition_key: PartitionKeyDefinition) -> Self {
        Self {
            id: id.into(),
            partition_key,
            system: SystemProperties::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProperties {
    pub id: String,
    #[serde(flatten)]
    pub system: SystemProperties,
}

/// Access mode granted by a permission.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PermissionMode {
    /// Read, write and delete.
    #[default]
    All,
    /// Read and query only.
    Read,
    /// No access.
    None,
}

impl PermissionMode {
    /// Whether the mode allows mutating items.
    #[must_use]
    pub fn allows_write(self) -> bool {
        matches!(self, Self::All)
    }

    /// Whether the mode allows reading items.
    #[must_use]
    pub fn allows_read(self) -> bool {
        matches!(self, Self::All | Self::Read)
    }
}

impl fmt::Display for PermissionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::All => "All",
            Self::Read => "Read",
            Self::None => "None",
        };
        f.write_str(s)
    }
}

/// Value of a single-path partition key, e.g. `"1"`.
#[derive(Debug, Clone, PartialEq)]
pub struct PartitionKey(Value);

impl PartitionKey {
    #[must_use]
    pub fn new(value: impl Into<Value>) -> Self {
        Self(value.into())
    }

    #[must_use]
    pub fn value(&self) -> &Value {
        &self.0
    }

    /// JSON array form used on the wire (`["1"]`).
    #[must_use]
    pub fn to_json_array(&self) -> Vec<Value> {
        vec![self.0.clone()]
    }

    /// Header form of the key (`["1"]` serialized).
    #[must_use]
    pub fn to_header_value(&self) -> String {
        Value::Array(self.to_json_array()).to_string()
    }
}

impl From<&str> for PartitionKey {
    fn from(value: &str) -> Self {
        Self(Value::String(value.to_owned()))
    }
}

impl From<String> for PartitionKey {
    fn from(value: String) -> Self {
        Self(Value::String(value))
    }
}

impl From<i64> for PartitionKey {
    fn from(value: i64) -> Self {
        Self(Value::from(value))
    }
}

impl fmt::Display for PartitionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Body of a create-permission request.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PermissionDefinition {
    pub id: String,
    pub permission_mode: PermissionMode,
    /// Id-based link of the resource the permission targets.
    pub resource: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource_partition_key: Option<Vec<Value>>,
}

impl PermissionDefinition {
    #[must_use]
    pub fn new(id: impl Into<String>, mode: PermissionMode, resource: &ResourceLink) -> Self {
        Self {
            id: id.into(),
            permission_mode: mode,
            resource: resource.to_string(),
            resource_partition_key: None,
        }
    }

    /// Restrict the permission to a single partition-key value.
    #[must_use]
    pub fn with_partition_key(mut self, key: &PartitionKey) -> Self {
        self.resource_partition_key = Some(key.to_json_array());
        self
    }
}

/// Permission as returned by the service, including its resource token.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PermissionProperties {
    pub id: String,
    pub permission_mode: PermissionMode,
    pub resource: String,
    #[serde(default)]
    pub resource_partition_key: Option<Vec<Value>>,
    /// Scoped token minted for this permission.
    #[serde(rename = "_token", default, deserialize_with = "deserialize_token")]
    pub token: Option<SecretString>,
    #[serde(flatten)]
    pub system: SystemProperties,
}

fn deserialize_token<'de, D>(deserializer: D) -> Result<Option<SecretString>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.map(SecretString::from))
}

/// Named parameter of a [`QuerySpec`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryParameter {
    pub name: String,
    pub value: Value,
}

/// SQL-like query with optional named parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuerySpec {
    pub query: String,
    #[serde(default)]
    pub parameters: Vec<QueryParameter>,
}

impl QuerySpec {
    #[must_use]
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            parameters: Vec::new(),
        }
    }

    /// Bind `@name` to `value`. The leading `@` is added when missing.
    #[must_use]
    pub fn with_parameter(mut self, name: &str, value: impl Into<Value>) -> Self {
        let name = if name.starts_with('@') {
            name.to_owned()
        } else {
            format!("@{name}")
        };
        self.parameters.push(QueryParameter {
            name,
            value: value.into(),
        });
        self
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use secrecy::ExposeSecret;
    use serde_json::json;

    use super::*;

    #[test]
    fn permission_definition_wire_shape() {
        let link = ResourceLink::container("app", "items");
        let def = PermissionDefinition::new("p1", PermissionMode::Read, &link)
            .with_partition_key(&PartitionKey::from("1"));

        assert_eq!(
            serde_json::to_value(&def).unwrap(),
            json!({
                "id": "p1",
                "permissionMode": "Read",
                "resource": "dbs/app/colls/items",
                "resourcePartitionKey": ["1"]
            })
        );
    }

    #[test]
    fn permission_properties_carry_token() {
        let props: PermissionProperties = serde_json::from_value(json!({
            "id": "p1",
            "permissionMode": "All",
            "resource": "dbs/app/colls/items",
            "_token": "type=resource&ver=1.0&sig=abc",
            "_rid": "rid==",
            "_etag": "\"0001\"",
            "_ts": 1_700_000_000
        }))
        .unwrap();

        assert_eq!(props.permission_mode, PermissionMode::All);
        assert_eq!(
            props.token.as_ref().map(ExposeSecret::expose_secret),
            Some("type=resource&ver=1.0&sig=abc")
        );
        assert_eq!(props.system.ts, Some(1_700_000_000));
        assert!(!format!("{props:?}").contains("sig=abc"));
    }

    #[test]
    fn container_properties_wire_shape() {
        let props = ContainerProperties::new("items", PartitionKeyDefinition::hash("/key"));
        assert_eq!(
            serde_json::to_value(&props).unwrap(),
            json!({
                "id": "items",
                "partitionKey": { "paths": ["/key"], "kind": "Hash", "version": 2 }
            })
        );
    }

    #[test]
    fn partition_value_follows_nested_path() {
        let def = PartitionKeyDefinition::hash("/owner/tenant");
        let doc = json!({ "id": "1", "owner": { "tenant": "acme" } });

        assert_eq!(def.value_of(&doc), json!("acme"));
        assert_eq!(def.value_of(&json!({ "id": "2" })), Value::Null);
    }

    #[test]
    fn partition_key_header_is_json_array() {
        assert_eq!(PartitionKey::from("1").to_header_value(), r#"["1"]"#);
        assert_eq!(PartitionKey::from(7).to_header_value(), "[7]");
    }

    #[test]
    fn query_parameters_are_prefixed() {
        let spec = QuerySpec::new("SELECT * FROM c WHERE c.key = @key").with_parameter("key", "1");
        assert_eq!(spec.parameters[0].name, "@key");
    }
}
