use docdb_sdk::{PermissionProperties, ResourceTokens};

use crate::error::SampleError;

/// Build the restricted session's credential: the permission's token keyed by
/// `container`.
///
/// # Errors
///
/// Returns [`SampleError::MissingToken`] if the permission carries no `_token`.
pub fn resource_tokens(
    permission: &PermissionProperties,
    container: &str,
) -> Result<ResourceTokens, SampleError> {
    let token = permission
        .token
        .clone()
        .ok_or_else(|| SampleError::MissingToken {
            permission: permission.id.clone(),
        })?;

    tracing::debug!(permission = %permission.id, container, "extracted resource token");
    Ok(ResourceTokens::new().with_token(container, token))
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use docdb_sdk::{PermissionMode, ResourceLink};
    use secrecy::ExposeSecret;
    use serde_json::json;

    fn permission(token: Option<&str>) -> PermissionProperties {
        let mut body = json!({
            "id": "p",
            "permissionMode": "All",
            "resource": "dbs/app/colls/items",
            "resourcePartitionKey": ["1"],
        });
        if let Some(token) = token {
            body["_token"] = json!(token);
        }
        serde_json::from_value(body).unwrap()
    }

    #[test]
    fn token_is_keyed_by_container() {
        let tokens = resource_tokens(&permission(Some("type=resource&sig=x")), "items").unwrap();

        assert_eq!(tokens.keys().collect::<Vec<_>>(), ["items"]);
        let resolved = tokens
            .resolve(&ResourceLink::document("app", "items", "1"))
            .unwrap();
        assert_eq!(resolved.expose_secret(), "type=resource&sig=x");
    }

    #[test]
    fn permission_without_token_is_an_error() {
        let props = permission(None);
        assert_eq!(props.permission_mode, PermissionMode::All);

        let err = resource_tokens(&props, "items").unwrap_err();
        assert!(matches!(err, SampleError::MissingToken { ref permission } if permission == "p"));
    }
}
