//! Layered configuration.
//!
//! Sources, lowest precedence first:
//! 1. built-in defaults
//! 2. YAML file given with `--config`
//! 3. environment variables prefixed `DOCDB_SAMPLE__`, nested with `__`
//!    (e.g. `DOCDB_SAMPLE__SAMPLE__DATABASE=demo`)
//! 4. command-line overrides (`--endpoint`/`ACCOUNT_URI`, `--key`/`ACCOUNT_KEY`,
//!    `--emulator`, `-v`)

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use docdb_inmemory::InMemoryService;
use docdb_rest::{RestClientConfig, RestConnector};
use docdb_sdk::{Credential, DocDbConnector, PartitionKey, PermissionMode};
use figment::Figment;
use figment::providers::{Env, Format, Serialized, Yaml};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use url::Url;

use crate::error::SampleError;
use crate::logging::LoggingConfig;

/// Prefix of configuration environment variables.
pub const ENV_PREFIX: &str = "DOCDB_SAMPLE__";

/// Key the built-in emulator accepts when none is configured.
pub const EMULATOR_KEY: &str = "ZW11bGF0b3ItbWFzdGVyLWtleQ==";

const REDACTED: &str = "***REDACTED***";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SampleConfig {
    pub account: AccountConfig,
    pub sample: WorkflowConfig,
    pub http: HttpConfig,
    pub logging: LoggingConfig,
}

/// Where the sample connects and with which master key.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AccountConfig {
    /// Account endpoint, e.g. `https://myaccount.documents.azure.com:443/`
    pub endpoint: Option<String>,
    /// Base64 account master key
    #[serde(
        serialize_with = "serialize_redacted",
        deserialize_with = "deserialize_secret"
    )]
    pub key: Option<SecretString>,
    /// Run against the in-process emulator instead of `endpoint`
    pub emulator: bool,
}

/// Names and scope used by the workflow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WorkflowConfig {
    #[serde(deserialize_with = "deserialize_id")]
    pub database: String,
    #[serde(deserialize_with = "deserialize_id")]
    pub container: String,
    /// Partition key path of the container, e.g. `/key`
    pub partition_key_path: String,
    /// Partition key value the permission is restricted to
    #[serde(deserialize_with = "deserialize_id")]
    pub partition_key: String,
    #[serde(deserialize_with = "deserialize_id")]
    pub item_id: String,
    #[serde(deserialize_with = "deserialize_id")]
    pub user: String,
    #[serde(deserialize_with = "deserialize_id")]
    pub permission: String,
    pub permission_mode: PermissionMode,
    /// Requested resource token lifetime; service default when unset
    pub token_expiry_secs: Option<u64>,
    /// Also demonstrate a read-only permission on the same partition
    pub read_only_scenario: bool,
    #[serde(deserialize_with = "deserialize_id")]
    pub read_only_user: String,
    #[serde(deserialize_with = "deserialize_id")]
    pub read_only_permission: String,
    /// Delete the database once the run is over
    pub cleanup: bool,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            database: "resource-token-db".to_owned(),
            container: "resource-token-items".to_owned(),
            partition_key_path: "/key".to_owned(),
            partition_key: "1".to_owned(),
            item_id: "1".to_owned(),
            user: "resource-token-user".to_owned(),
            permission: "resource-token-permission".to_owned(),
            permission_mode: PermissionMode::All,
            token_expiry_secs: None,
            read_only_scenario: true,
            read_only_user: "resource-token-reader".to_owned(),
            read_only_permission: "resource-token-read-permission".to_owned(),
            cleanup: false,
        }
    }
}

impl WorkflowConfig {
    #[must_use]
    pub fn partition_key(&self) -> PartitionKey {
        PartitionKey::from(self.partition_key.as_str())
    }

    fn validate(&self) -> Result<(), SampleError> {
        let ids = [
            ("sample.database", &self.database),
            ("sample.container", &self.container),
            ("sample.item_id", &self.item_id),
            ("sample.user", &self.user),
            ("sample.permission", &self.permission),
            ("sample.read_only_user", &self.read_only_user),
            ("sample.read_only_permission", &self.read_only_permission),
        ];
        for (field, id) in ids {
            if id.is_empty() || id.contains(['/', '\\', '?', '#']) {
                return Err(SampleError::Config(format!(
                    "{field} must be a non-empty id without '/', '\\', '?' or '#'"
                )));
            }
        }

        let path = self.partition_key_path.trim_start_matches('/');
        if !self.partition_key_path.starts_with('/') || path.is_empty() {
            return Err(SampleError::Config(format!(
                "sample.partition_key_path must look like '/field', got '{}'",
                self.partition_key_path
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HttpConfig {
    pub timeout_secs: u64,
    pub user_agent: Option<String>,
    /// Maximum items per feed page
    pub max_item_count: Option<u32>,
    /// Permit `http://` endpoints (local emulators only)
    pub allow_insecure_http: bool,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            user_agent: None,
            max_item_count: None,
            allow_insecure_http: false,
        }
    }
}

/// Values taken from the command line or the legacy environment variables.
#[derive(Debug, Default)]
pub struct CliOverrides {
    pub endpoint: Option<String>,
    pub key: Option<SecretString>,
    pub emulator: bool,
    pub verbose: u8,
}

impl SampleConfig {
    /// Load defaults, the optional YAML file and `DOCDB_SAMPLE__*` variables.
    ///
    /// # Errors
    ///
    /// Returns [`SampleError::Config`] if a source cannot be read or a value
    /// has the wrong type.
    pub fn load(path: Option<&Path>) -> Result<Self, SampleError> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));
        if let Some(path) = path {
            figment = figment.merge(Yaml::file(path));
        }
        figment = figment.merge(Env::prefixed(ENV_PREFIX).split("__"));

        let config: Self = figment.extract()?;
        Ok(config)
    }

    pub fn apply_cli_overrides(&mut self, overrides: &CliOverrides) {
        if let Some(endpoint) = &overrides.endpoint {
            self.account.endpoint = Some(endpoint.clone());
        }
        if let Some(key) = &overrides.key {
            self.account.key = Some(key.clone());
        }
        if overrides.emulator {
            self.account.emulator = true;
        }
        match overrides.verbose {
            0 => {}
            1 => "info".clone_into(&mut self.logging.level),
            2 => "debug".clone_into(&mut self.logging.level),
            _ => "trace".clone_into(&mut self.logging.level),
        }
    }

    /// Check that the configuration is complete enough to run.
    ///
    /// # Errors
    ///
    /// Returns [`SampleError::Config`] naming the first problem found.
    pub fn validate(&self) -> Result<(), SampleError> {
        self.sample.validate()?;
        if self.account.emulator {
            return Ok(());
        }

        let endpoint = self.account.endpoint.as_deref().ok_or_else(|| {
            SampleError::Config(
                "account.endpoint is required (set ACCOUNT_URI or pass --endpoint)".to_owned(),
            )
        })?;
        let url = Url::parse(endpoint)
            .map_err(|e| SampleError::Config(format!("invalid account.endpoint: {e}")))?;
        match url.scheme() {
            "https" => {}
            "http" if self.http.allow_insecure_http => {}
            other => {
                return Err(SampleError::Config(format!(
                    "account.endpoint scheme '{other}' is not allowed; use https"
                )));
            }
        }

        if self.account.key.is_none() {
            return Err(SampleError::Config(
                "account.key is required (set ACCOUNT_KEY or pass --key)".to_owned(),
            ));
        }
        Ok(())
    }

    /// Connector for the configured target and the master-key credential
    /// for the admin session.
    ///
    /// # Errors
    ///
    /// Returns [`SampleError::Config`] if the configuration does not validate.
    pub fn connect_target(
        &self,
    ) -> Result<(Arc<dyn DocDbConnector>, Credential), SampleError> {
        self.validate()?;

        if self.account.emulator {
            let key = self
                .account
                .key
                .as_ref()
                .map_or_else(|| EMULATOR_KEY.to_owned(), |k| k.expose_secret().to_owned());
            let mut service = InMemoryService::new(key.clone());
            if let Some(secs) = self.sample.token_expiry_secs {
                service = service.with_token_ttl(Duration::from_secs(secs));
            }
            tracing::info!("using the in-process emulator");
            return Ok((Arc::new(service), Credential::master_key(key)));
        }

        let (Some(endpoint), Some(key)) = (&self.account.endpoint, &self.account.key) else {
            return Err(SampleError::Config("account endpoint and key are required".to_owned()));
        };
        let url = Url::parse(endpoint)
            .map_err(|e| SampleError::Config(format!("invalid account.endpoint: {e}")))?;

        let mut rest = RestClientConfig::new(url)
            .with_timeout(Duration::from_secs(self.http.timeout_secs))
            .with_token_expiry(self.sample.token_expiry_secs.map(Duration::from_secs))
            .with_max_item_count(self.http.max_item_count);
        if let Some(user_agent) = &self.http.user_agent {
            rest = rest.with_user_agent(user_agent.clone());
        }
        if self.http.allow_insecure_http {
            rest = allow_insecure_http(rest)?;
        }

        tracing::info!(endpoint = %rest.endpoint, "using the REST endpoint");
        Ok((
            Arc::new(RestConnector::new(rest)),
            Credential::MasterKey(key.clone()),
        ))
    }

    /// Effective configuration as YAML, with the key redacted.
    ///
    /// # Errors
    ///
    /// Returns [`SampleError::Config`] if serialization fails.
    pub fn to_yaml(&self) -> Result<String, SampleError> {
        serde_saphyr::to_string(self).map_err(|e| SampleError::Config(e.to_string()))
    }
}

#[cfg(any(debug_assertions, feature = "allow-insecure-http"))]
#[allow(clippy::unnecessary_wraps)] // fallible in release builds
fn allow_insecure_http(config: RestClientConfig) -> Result<RestClientConfig, SampleError> {
    Ok(config.allow_insecure_http())
}

#[cfg(not(any(debug_assertions, feature = "allow-insecure-http")))]
fn allow_insecure_http(_config: RestClientConfig) -> Result<RestClientConfig, SampleError> {
    Err(SampleError::Config(
        "http.allow_insecure_http needs a debug build or the allow-insecure-http feature"
            .to_owned(),
    ))
}

#[allow(clippy::ref_option)] // signature required by serde
fn serialize_redacted<S>(value: &Option<SecretString>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    match value {
        Some(_) => serializer.serialize_some(REDACTED),
        None => serializer.serialize_none(),
    }
}

fn deserialize_secret<'de, D>(deserializer: D) -> Result<Option<SecretString>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.map(SecretString::from))
}

/// Scalar form an id may arrive in: environment variables and unquoted YAML
/// turn `1` into a number and `true` into a bool.
#[derive(Deserialize)]
#[serde(untagged)]
enum IdValue {
    Text(String),
    Unsigned(u64),
    Signed(i64),
    Float(f64),
    Bool(bool),
}

fn deserialize_id<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match IdValue::deserialize(deserializer)? {
        IdValue::Text(text) => text,
        IdValue::Unsigned(n) => n.to_string(),
        IdValue::Signed(n) => n.to_string(),
        IdValue::Float(n) => n.to_string(),
        IdValue::Bool(b) => b.to_string(),
    })
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use std::io::Write;

    fn without_env<R>(f: impl FnOnce() -> R) -> R {
        temp_env::with_vars_unset(
            [
                "DOCDB_SAMPLE__ACCOUNT__ENDPOINT",
                "DOCDB_SAMPLE__ACCOUNT__KEY",
                "DOCDB_SAMPLE__SAMPLE__DATABASE",
                "DOCDB_SAMPLE__LOGGING__LEVEL",
            ],
            f,
        )
    }

    #[test]
    fn defaults_match_documented_names() {
        let config = without_env(|| SampleConfig::load(None)).unwrap();
        assert_eq!(config.sample.partition_key, "1");
        assert_eq!(config.sample.item_id, "1");
        assert_eq!(config.sample.partition_key_path, "/key");
        assert_eq!(config.sample.permission_mode, PermissionMode::All);
        assert_eq!(config.logging.level, "info");
        assert!(config.account.endpoint.is_none());
    }

    #[test]
    fn yaml_then_env_then_cli() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "account:\n  endpoint: https://yaml.example.com/\nsample:\n  database: from-yaml\n  container: yaml-items\nlogging:\n  level: warn"
        )
        .unwrap();

        let mut config = temp_env::with_vars(
            [
                ("DOCDB_SAMPLE__SAMPLE__DATABASE", Some("from-env")),
                ("DOCDB_SAMPLE__ACCOUNT__KEY", Some("ZW52LWtleQ==")),
            ],
            || SampleConfig::load(Some(file.path())),
        )
        .unwrap();

        assert_eq!(config.sample.database, "from-env");
        assert_eq!(config.sample.container, "yaml-items");
        assert_eq!(config.logging.level, "warn");
        assert_eq!(
            config.account.key.as_ref().unwrap().expose_secret(),
            "ZW52LWtleQ=="
        );

        config.apply_cli_overrides(&CliOverrides {
            endpoint: Some("https://cli.example.com/".to_owned()),
            key: None,
            emulator: false,
            verbose: 2,
        });
        assert_eq!(
            config.account.endpoint.as_deref(),
            Some("https://cli.example.com/")
        );
        assert_eq!(config.logging.level, "debug");
        config.validate().unwrap();
    }

    #[test]
    fn numeric_ids_from_env_and_yaml_are_kept_as_text() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "sample:\n  database: 7\n  user: true\n  partition_key: 1").unwrap();

        let config = temp_env::with_vars(
            [
                ("DOCDB_SAMPLE__SAMPLE__PARTITION_KEY", Some("2")),
                ("DOCDB_SAMPLE__SAMPLE__ITEM_ID", Some("42")),
                ("DOCDB_SAMPLE__SAMPLE__PERMISSION", Some("-3")),
                ("DOCDB_SAMPLE__SAMPLE__DATABASE", None),
            ],
            || SampleConfig::load(Some(file.path())),
        )
        .unwrap();

        assert_eq!(config.sample.partition_key, "2");
        assert_eq!(config.sample.item_id, "42");
        assert_eq!(config.sample.permission, "-3");
        assert_eq!(config.sample.database, "7");
        assert_eq!(config.sample.user, "true");
        assert_eq!(config.sample.partition_key(), PartitionKey::from("2"));
        config.sample.validate().unwrap();
    }

    #[test]
    fn unknown_yaml_keys_are_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "sample:\n  databse: typo").unwrap();

        let err = without_env(|| SampleConfig::load(Some(file.path()))).unwrap_err();
        assert!(matches!(err, SampleError::Config(_)));
    }

    #[test]
    fn endpoint_and_key_required_unless_emulated() {
        let mut config = SampleConfig::default();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("ACCOUNT_URI"), "{err}");

        config.account.endpoint = Some("https://acct.example.com/".to_owned());
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("ACCOUNT_KEY"), "{err}");

        let emulated = SampleConfig {
            account: AccountConfig {
                emulator: true,
                ..AccountConfig::default()
            },
            ..SampleConfig::default()
        };
        emulated.validate().unwrap();
    }

    #[test]
    fn plain_http_needs_opt_in() {
        let mut config = SampleConfig::default();
        config.account.endpoint = Some("http://localhost:8081/".to_owned());
        config.account.key = Some(SecretString::from("a2V5".to_owned()));
        assert!(config.validate().is_err());

        config.http.allow_insecure_http = true;
        config.validate().unwrap();
    }

    #[test]
    fn bad_partition_path_is_rejected() {
        let mut config = SampleConfig::default();
        config.account.emulator = true;
        config.sample.partition_key_path = "key".to_owned();
        assert!(config.validate().is_err());
    }

    #[test]
    fn yaml_output_redacts_key() {
        let mut config = SampleConfig::default();
        config.account.key = Some(SecretString::from("c3VwZXItc2VjcmV0".to_owned()));

        let yaml = config.to_yaml().unwrap();
        assert!(!yaml.contains("c3VwZXItc2VjcmV0"));
        assert!(yaml.contains(REDACTED));
    }

    #[test]
    fn emulator_target_needs_no_endpoint() {
        let mut config = SampleConfig::default();
        config.account.emulator = true;
        let (_connector, credential) = config.connect_target().unwrap();
        assert!(credential.is_master_key());
    }
}
