use std::sync::Arc;
use std::time::SystemTime;

use async_trait::async_trait;
use bytes::Bytes;
use docdb_sdk::{
    ContainerProperties, ContainerRef, Credential, DatabaseProperties, DocDbClient,
    DocDbConnector, DocDbError, Document, PartitionKey, PermissionDefinition,
    PermissionProperties, QuerySpec, ResourceLink, ResourceType, UserProperties,
};
use http::{Method, Request};
use http_body_util::Full;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::json;
use tracing::instrument;

use crate::auth::Authorizer;
use crate::config::RestClientConfig;
use crate::error::HttpError;
use crate::headers;
use crate::transport::{RawResponse, Transport};

/// Maximum number of error body bytes carried into error messages.
const ERROR_BODY_PREVIEW_LIMIT: usize = 8 * 1024;

/// Session against the service's REST API, bound to one credential.
///
/// The client is `Send + Sync`; the underlying connection pool is shared by
/// every request of the session.
pub struct DocDbRestClient {
    transport: Transport,
    authorizer: Authorizer,
    config: Arc<RestClientConfig>,
}

impl DocDbRestClient {
    /// Open a session for `credential`.
    ///
    /// # Errors
    ///
    /// Returns an error if the master key is malformed or TLS setup fails.
    pub fn new(config: RestClientConfig, credential: Credential) -> Result<Self, DocDbError> {
        let transport = Transport::new(&config)?;
        let authorizer = Authorizer::new(credential)?;
        tracing::debug!(
            endpoint = %config.endpoint,
            authorizer = ?authorizer,
            "opened REST session"
        );
        Ok(Self {
            transport,
            authorizer,
            config: Arc::new(config),
        })
    }

    fn url(&self, path: &str) -> Result<String, DocDbError> {
        let mut url = self.config.endpoint.clone();
        url.path_segments_mut()
            .map_err(|()| {
                DocDbError::InvalidRequest(format!("invalid endpoint '{}'", self.config.endpoint))
            })?
            .pop_if_empty()
            .extend(path.split('/'));
        Ok(url.into())
    }

    #[instrument(
        skip_all,
        fields(method = %call.method, resource = %call.subject)
    )]
    async fn execute(&self, call: &Call) -> Result<RawResponse, DocDbError> {
        let date = httpdate::fmt_http_date(SystemTime::now());
        let authorization = self.authorizer.header_value(
            &call.method,
            call.resource_type,
            &call.signing_link,
            call.target.as_ref(),
            &date,
        )?;

        let mut builder = Request::builder()
            .method(call.method.clone())
            .uri(self.url(&call.path)?)
            .header(http::header::ACCEPT, headers::CONTENT_TYPE_JSON)
            .header(http::header::USER_AGENT, self.config.user_agent.as_str())
            .header(headers::DATE, date.as_str())
            .header(headers::VERSION, self.config.api_version.as_str())
            .header(http::header::AUTHORIZATION, authorization);

        for (name, value) in &call.headers {
            builder = builder.header(*name, value.as_str());
        }
        if let Some(content_type) = call.content_type {
            builder = builder.header(http::header::CONTENT_TYPE, content_type);
        }

        let request = builder
            .body(Full::new(call.body.clone()))
            .map_err(HttpError::RequestBuild)?;

        let response = self.transport.send(request).await?;

        tracing::debug!(
            status = response.status.as_u16(),
            request_charge = response.header(headers::REQUEST_CHARGE).unwrap_or("-"),
            activity_id = response.header(headers::ACTIVITY_ID).unwrap_or("-"),
            "request completed"
        );

        if response.status.is_success() {
            Ok(response)
        } else {
            Err(service_error(&response, &call.subject))
        }
    }

    async fn execute_json<T: DeserializeOwned>(&self, call: &Call) -> Result<T, DocDbError> {
        let response = self.execute(call).await?;
        Ok(serde_json::from_slice(&response.body)?)
    }

    /// Read every page of a document feed.
    async fn read_feed(&self, mut call: Call) -> Result<Vec<Document>, DocDbError> {
        if let Some(count) = self.config.max_item_count {
            call.headers.push((headers::MAX_ITEM_COUNT, count.to_string()));
        }

        let mut documents = Vec::new();
        let mut pages = 0_usize;
        loop {
            let response = self.execute(&call).await?;
            let page: DocumentFeed = serde_json::from_slice(&response.body)?;
            documents.extend(page.documents);
            pages += 1;

            match response.header(headers::CONTINUATION) {
                Some(token) if !token.is_empty() => {
                    let token = token.to_owned();
                    call.headers.retain(|(name, _)| *name != headers::CONTINUATION);
                    call.headers.push((headers::CONTINUATION, token));
                }
                _ => break,
            }
        }

        tracing::debug!(pages, count = documents.len(), "feed drained");
        Ok(documents)
    }

    fn token_expiry_header(&self, call: Call) -> Call {
        match self.config.token_expiry {
            Some(expiry) => call.header(headers::TOKEN_EXPIRY, expiry.as_secs().to_string()),
            None => call,
        }
    }
}

#[async_trait]
impl DocDbClient for DocDbRestClient {
    async fn create_database(&self, id: &str) -> Result<DatabaseProperties, DocDbError> {
        let call = Call::feed(Method::POST, None, ResourceType::Database)
            .subject(ResourceLink::database(id))
            .json(&json!({ "id": id }))?;
        self.execute_json(&call).await
    }

    async fn read_database(&self, id: &str) -> Result<DatabaseProperties, DocDbError> {
        let call = Call::resource(Method::GET, ResourceLink::database(id));
        self.execute_json(&call).await
    }

    async fn delete_database(&self, id: &str) -> Result<(), DocDbError> {
        let call = Call::resource(Method::DELETE, ResourceLink::database(id));
        self.execute(&call).await.map(|_| ())
    }

    async fn create_container(
        &self,
        database: &str,
        properties: &ContainerProperties,
    ) -> Result<ContainerProperties, DocDbError> {
        let call = Call::feed(
            Method::POST,
            Some(ResourceLink::database(database)),
            ResourceType::Container,
        )
        .subject(ResourceLink::container(database, properties.id.as_str()))
        .json(properties)?;
        self.execute_json(&call).await
    }

    async fn read_container(
        &self,
        database: &str,
        id: &str,
    ) -> Result<ContainerProperties, DocDbError> {
        let call = Call::resource(Method::GET, ResourceLink::container(database, id));
        self.execute_json(&call).await
    }

    async fn create_user(&self, database: &str, id: &str) -> Result<UserProperties, DocDbError> {
        let call = Call::feed(
            Method::POST,
            Some(ResourceLink::database(database)),
            ResourceType::User,
        )
        .subject(ResourceLink::user(database, id))
        .json(&json!({ "id": id }))?;
        self.execute_json(&call).await
    }

    async fn read_user(&self, database: &str, id: &str) -> Result<UserProperties, DocDbError> {
        let call = Call::resource(Method::GET, ResourceLink::user(database, id));
        self.execute_json(&call).await
    }

    async fn create_permission(
        &self,
        database: &str,
        user: &str,
        definition: &PermissionDefinition,
    ) -> Result<PermissionProperties, DocDbError> {
        let call = Call::feed(
            Method::POST,
            Some(ResourceLink::user(database, user)),
            ResourceType::Permission,
        )
        .subject(ResourceLink::permission(database, user, definition.id.as_str()))
        .json(definition)?;
        let call = self.token_expiry_header(call);
        self.execute_json(&call).await
    }

    async fn read_permission(
        &self,
        database: &str,
        user: &str,
        id: &str,
    ) -> Result<PermissionProperties, DocDbError> {
        let call = Call::resource(Method::GET, ResourceLink::permission(database, user, id));
        let call = self.token_expiry_header(call);
        self.execute_json(&call).await
    }

    async fn read_item(
        &self,
        container: &ContainerRef,
        id: &str,
        partition_key: &PartitionKey,
    ) -> Result<Document, DocDbError> {
        let call = Call::resource(Method::GET, container.item_link(id))
            .header(headers::PARTITION_KEY, partition_key.to_header_value());
        self.execute_json(&call).await
    }

    async fn create_item(
        &self,
        container: &ContainerRef,
        partition_key: &PartitionKey,
        item: &Document,
    ) -> Result<Document, DocDbError> {
        let call = item_call(container, partition_key, item)?;
        self.execute_json(&call).await
    }

    async fn upsert_item(
        &self,
        container: &ContainerRef,
        partition_key: &PartitionKey,
        item: &Document,
    ) -> Result<Document, DocDbError> {
        let call = item_call(container, partition_key, item)?.header(headers::IS_UPSERT, "True");
        self.execute_json(&call).await
    }

    async fn delete_item(
        &self,
        container: &ContainerRef,
        id: &str,
        partition_key: &PartitionKey,
    ) -> Result<(), DocDbError> {
        let call = Call::resource(Method::DELETE, container.item_link(id))
            .header(headers::PARTITION_KEY, partition_key.to_header_value());
        self.execute(&call).await.map(|_| ())
    }

    async fn query_items(
        &self,
        container: &ContainerRef,
        query: &QuerySpec,
        partition_key: Option<&PartitionKey>,
    ) -> Result<Vec<Document>, DocDbError> {
        let mut call = Call::feed(
            Method::POST,
            Some(container.link()),
            ResourceType::Document,
        )
        .header(headers::IS_QUERY, "True")
        .json(query)?;
        call.content_type = Some(headers::CONTENT_TYPE_QUERY);

        let call = match partition_key {
            Some(pk) => call.header(headers::PARTITION_KEY, pk.to_header_value()),
            None => call.header(headers::ENABLE_CROSS_PARTITION, "True"),
        };
        self.read_feed(call).await
    }

    async fn read_all_items(
        &self,
        container: &ContainerRef,
        partition_key: Option<&PartitionKey>,
    ) -> Result<Vec<Document>, DocDbError> {
        let call = Call::feed(Method::GET, Some(container.link()), ResourceType::Document);
        let call = match partition_key {
            Some(pk) => call.header(headers::PARTITION_KEY, pk.to_header_value()),
            None => call,
        };
        self.read_feed(call).await
    }
}

/// Opens [`DocDbRestClient`] sessions against one endpoint.
#[derive(Debug, Clone)]
pub struct RestConnector {
    config: RestClientConfig,
}

impl RestConnector {
    #[must_use]
    pub fn new(config: RestClientConfig) -> Self {
        Self { config }
    }
}

impl DocDbConnector for RestConnector {
    fn connect(&self, credential: Credential) -> Result<Arc<dyn DocDbClient>, DocDbError> {
        Ok(Arc::new(DocDbRestClient::new(self.config.clone(), credential)?))
    }
}

/// One request against the REST API.
#[derive(Debug, Clone)]
struct Call {
    method: Method,
    resource_type: ResourceType,
    /// Link named in the master-key signature.
    signing_link: String,
    /// Resource whose permission must cover the request.
    target: Option<ResourceLink>,
    /// Path relative to the endpoint.
    path: String,
    /// Resource named in logs and in `NotFound`/`Conflict` errors.
    subject: String,
    headers: Vec<(&'static str, String)>,
    content_type: Option<&'static str>,
    body: Bytes,
}

impl Call {
    /// Request on a single resource.
    fn resource(method: Method, link: ResourceLink) -> Self {
        let path = link.to_string();
        Self {
            method,
            resource_type: link.resource_type(),
            signing_link: path.clone(),
            subject: path.clone(),
            path,
            target: Some(link),
            headers: Vec::new(),
            content_type: None,
            body: Bytes::new(),
        }
    }

    /// Request on the `child` feed of `parent` (the account root when `None`).
    fn feed(method: Method, parent: Option<ResourceLink>, child: ResourceType) -> Self {
        let signing_link = parent.as_ref().map(ToString::to_string).unwrap_or_default();
        let path = if signing_link.is_empty() {
            child.segment().to_owned()
        } else {
            format!("{signing_link}/{}", child.segment())
        };
        Self {
            method,
            resource_type: child,
            signing_link,
            subject: path.clone(),
            path,
            target: parent,
            headers: Vec::new(),
            content_type: None,
            body: Bytes::new(),
        }
    }

    fn subject(mut self, link: ResourceLink) -> Self {
        self.subject = link.to_string();
        self
    }

    fn header(mut self, name: &'static str, value: impl Into<String>) -> Self {
        self.headers.push((name, value.into()));
        self
    }

    fn json<T: Serialize + ?Sized>(mut self, body: &T) -> Result<Self, DocDbError> {
        self.body = Bytes::from(serde_json::to_vec(body)?);
        self.content_type = Some(headers::CONTENT_TYPE_JSON);
        Ok(self)
    }
}

fn item_call(
    container: &ContainerRef,
    partition_key: &PartitionKey,
    item: &Document,
) -> Result<Call, DocDbError> {
    let mut call = Call::feed(Method::POST, Some(container.link()), ResourceType::Document)
        .header(headers::PARTITION_KEY, partition_key.to_header_value())
        .json(item)?;
    if let Some(id) = docdb_sdk::document_id(item) {
        call = call.subject(container.item_link(id));
    }
    Ok(call)
}

#[derive(serde::Deserialize)]
struct DocumentFeed {
    #[serde(rename = "Documents", default)]
    documents: Vec<Document>,
}

#[derive(serde::Deserialize)]
struct ServiceErrorBody {
    code: Option<String>,
    message: Option<String>,
}

fn service_error(response: &RawResponse, subject: &str) -> DocDbError {
    let preview = &response.body[..response.body.len().min(ERROR_BODY_PREVIEW_LIMIT)];
    let parsed = serde_json::from_slice::<ServiceErrorBody>(preview).ok();

    let (code, message) = match parsed {
        Some(body) => (
            body.code,
            body.message
                .unwrap_or_else(|| String::from_utf8_lossy(preview).into_owned()),
        ),
        None => (None, String::from_utf8_lossy(preview).into_owned()),
    };

    tracing::debug!(
        status = response.status.as_u16(),
        code = code.as_deref().unwrap_or("-"),
        "service returned an error"
    );

    DocDbError::from_status(response.status.as_u16(), code, message, subject)
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    #[test]
    fn feed_on_account_root_signs_empty_link() {
        let call = Call::feed(Method::POST, None, ResourceType::Database);
        assert_eq!(call.path, "dbs");
        assert_eq!(call.signing_link, "");
        assert!(call.target.is_none());
    }

    #[test]
    fn feed_on_container_signs_parent_link() {
        let call = Call::feed(
            Method::GET,
            Some(ResourceLink::container("app", "items")),
            ResourceType::Document,
        );
        assert_eq!(call.path, "dbs/app/colls/items/docs");
        assert_eq!(call.signing_link, "dbs/app/colls/items");
        assert_eq!(call.resource_type, ResourceType::Document);
    }

    #[test]
    fn resource_call_signs_own_link() {
        let call = Call::resource(Method::DELETE, ResourceLink::document("app", "items", "1"));
        assert_eq!(call.signing_link, "dbs/app/colls/items/docs/1");
        assert_eq!(call.path, call.signing_link);
    }

    #[test]
    fn item_call_names_item_in_errors() {
        let container = ContainerRef::new("app", "items");
        let call = item_call(
            &container,
            &PartitionKey::from("1"),
            &json!({ "id": "42", "key": "1" }),
        )
        .unwrap();
        assert_eq!(call.subject, "dbs/app/colls/items/docs/42");
        assert_eq!(call.content_type, Some(headers::CONTENT_TYPE_JSON));
    }
}
