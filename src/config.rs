//! TOML configuration.
//!
//! One file wires the whole process: where the repository lives, how
//! notifications name their headers, which backends are active, how the
//! HTTP endpoint listens, and how logs are emitted. See
//! `config/indexer.example.toml` for a complete example.

use anyhow::{bail, Context, Result};
use reqwest::Url;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

const REPOSITORY_NAMESPACE: &str = "http://fedora.info/definitions/v4/repository#";

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub repository: RepositoryConfig,
    #[serde(default)]
    pub notifications: NotificationConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub dispatch: DispatchConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub backends: BackendsConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct RepositoryConfig {
    /// Base URL resources are addressed under, e.g. `http://localhost:8080/rest`.
    pub base_url: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Extra attempts after a 429, 5xx, or network failure.
    #[serde(default)]
    pub max_retries: u32,
    /// Predicate whose literal value names a resource's indexing transform.
    #[serde(default = "default_transform_predicate")]
    pub transform_predicate: String,
}

fn default_timeout_secs() -> u64 {
    30
}
fn default_transform_predicate() -> String {
    format!("{}hasIndexingTransformation", REPOSITORY_NAMESPACE)
}

#[derive(Debug, Deserialize, Clone)]
pub struct NotificationConfig {
    #[serde(default = "default_identifier_header")]
    pub identifier_header: String,
    #[serde(default = "default_event_type_header")]
    pub event_type_header: String,
    /// Event-type codes that mean the resource was removed. Anything else
    /// is an update.
    #[serde(default = "default_removal_event_types")]
    pub removal_event_types: Vec<String>,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            identifier_header: default_identifier_header(),
            event_type_header: default_event_type_header(),
            removal_event_types: default_removal_event_types(),
        }
    }
}

fn default_identifier_header() -> String {
    format!("{}identifier", REPOSITORY_NAMESPACE)
}
fn default_event_type_header() -> String {
    format!("{}eventType", REPOSITORY_NAMESPACE)
}
fn default_removal_event_types() -> Vec<String> {
    vec![format!("{}NODE_REMOVED", REPOSITORY_NAMESPACE)]
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
    /// Shared secret for `X-Indexer-Signature`. Unsigned requests are
    /// accepted when unset.
    #[serde(default)]
    pub secret: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            secret: None,
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:9090".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct DispatchConfig {
    #[serde(default = "default_timeout_secs")]
    pub backend_timeout_secs: u64,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            backend_timeout_secs: default_timeout_secs(),
        }
    }
}

#[derive(Debug, Deserialize, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    /// Human-readable single-line output.
    #[default]
    Compact,
    /// Structured JSON for log shippers.
    Json,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    #[serde(default = "default_log_filter")]
    pub filter: String,
    #[serde(default)]
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: default_log_filter(),
            format: LogFormat::default(),
        }
    }
}

fn default_log_filter() -> String {
    "info".to_string()
}

/// Backend instances by type, then by instance name.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct BackendsConfig {
    #[serde(default)]
    pub solr: BTreeMap<String, SolrBackendConfig>,
    #[serde(default)]
    pub sparql: BTreeMap<String, SparqlBackendConfig>,
    #[serde(default)]
    pub sqlite: BTreeMap<String, SqliteBackendConfig>,
}

impl BackendsConfig {
    pub fn is_empty(&self) -> bool {
        self.solr.is_empty() && self.sparql.is_empty() && self.sqlite.is_empty()
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct SolrBackendConfig {
    /// Core URL, e.g. `http://localhost:8983/solr/repo`.
    pub url: String,
    #[serde(default = "default_unique_key")]
    pub unique_key: String,
}

fn default_unique_key() -> String {
    "id".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct SparqlBackendConfig {
    /// Graph Store Protocol endpoint, e.g. `http://localhost:3030/ds/data`.
    pub graph_store_url: String,
    /// Prepended to the resource URL to name the graph.
    #[serde(default)]
    pub graph_prefix: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SqliteBackendConfig {
    pub path: PathBuf,
}

impl RepositoryConfig {
    /// Absolute URL of a repository resource.
    ///
    /// Joins with exactly one `/` regardless of how the base and the
    /// identifier are slashed.
    pub fn resource_url(&self, resource_id: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            resource_id.trim_start_matches('/')
        )
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    parse_config(&content)
}

/// Parse and validate configuration text.
pub fn parse_config(content: &str) -> Result<Config> {
    let config: Config = toml::from_str(content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

fn validate(config: &Config) -> Result<()> {
    // Validate repository
    check_http_url("repository.base_url", &config.repository.base_url)?;
    if config.repository.timeout_secs == 0 {
        bail!("repository.timeout_secs must be > 0");
    }
    let predicate = &config.repository.transform_predicate;
    match predicate.rfind(['#', '/']) {
        Some(idx) if idx + 1 < predicate.len() => {}
        _ => bail!(
            "repository.transform_predicate must be an IRI ending in a local name: '{}'",
            predicate
        ),
    }

    // Validate notifications
    if config.notifications.identifier_header.trim().is_empty() {
        bail!("notifications.identifier_header must not be empty");
    }
    if config.notifications.event_type_header.trim().is_empty() {
        bail!("notifications.event_type_header must not be empty");
    }
    if config.notifications.removal_event_types.is_empty() {
        bail!("notifications.removal_event_types must list at least one code");
    }

    if config.dispatch.backend_timeout_secs == 0 {
        bail!("dispatch.backend_timeout_secs must be > 0");
    }

    // Validate backends
    for (name, cfg) in &config.backends.solr {
        check_http_url(&format!("backends.solr.{}.url", name), &cfg.url)?;
        if cfg.unique_key.trim().is_empty() {
            bail!("backends.solr.{}.unique_key must not be empty", name);
        }
    }
    for (name, cfg) in &config.backends.sparql {
        check_http_url(
            &format!("backends.sparql.{}.graph_store_url", name),
            &cfg.graph_store_url,
        )?;
    }

    Ok(())
}

fn check_http_url(field: &str, value: &str) -> Result<()> {
    let url = Url::parse(value).with_context(|| format!("{} is not a valid URL: '{}'", field, value))?;
    match url.scheme() {
        "http" | "https" => Ok(()),
        other => bail!("{} must use http or https, not '{}'", field, other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
[repository]
base_url = "http://localhost:8080/rest"
"#;

    #[test]
    fn test_minimal_config_fills_defaults() {
        let config = parse_config(MINIMAL).unwrap();
        assert_eq!(config.repository.timeout_secs, 30);
        assert_eq!(config.repository.max_retries, 0);
        assert_eq!(
            config.repository.transform_predicate,
            "http://fedora.info/definitions/v4/repository#hasIndexingTransformation"
        );
        assert_eq!(
            config.notifications.removal_event_types,
            vec!["http://fedora.info/definitions/v4/repository#NODE_REMOVED".to_string()]
        );
        assert_eq!(config.server.bind, "127.0.0.1:9090");
        assert_eq!(config.logging.format, LogFormat::Compact);
        assert!(config.backends.is_empty());
    }

    #[test]
    fn test_backends_parse_by_type_and_name() {
        let config = parse_config(
            r#"
[repository]
base_url = "http://localhost:8080/rest/"

[backends.solr.main]
url = "http://localhost:8983/solr/repo"

[backends.sparql.triples]
graph_store_url = "http://localhost:3030/ds/data"

[backends.sqlite.local]
path = "/tmp/index.sqlite"

[logging]
format = "json"
"#,
        )
        .unwrap();
        assert_eq!(config.backends.solr["main"].unique_key, "id");
        assert_eq!(config.backends.sparql["triples"].graph_prefix, "");
        assert_eq!(config.backends.sqlite.len(), 1);
        assert_eq!(config.logging.format, LogFormat::Json);
    }

    #[test]
    fn test_resource_url_joins_with_single_slash() {
        let config = parse_config(MINIMAL).unwrap();
        assert_eq!(
            config.repository.resource_url("obj1"),
            "http://localhost:8080/rest/obj1"
        );
        assert_eq!(
            config.repository.resource_url("/coll/obj1"),
            "http://localhost:8080/rest/coll/obj1"
        );
    }

    #[test]
    fn test_rejects_non_http_base_url() {
        let err = parse_config(
            r#"
[repository]
base_url = "ftp://example.org/rest"
"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("http or https"));
    }

    #[test]
    fn test_rejects_empty_removal_codes() {
        let err = parse_config(
            r#"
[repository]
base_url = "http://localhost:8080/rest"

[notifications]
removal_event_types = []
"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("removal_event_types"));
    }

    #[test]
    fn test_rejects_predicate_without_local_name() {
        let err = parse_config(
            r#"
[repository]
base_url = "http://localhost:8080/rest"
transform_predicate = "http://example.org/ns#"
"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("transform_predicate"));
    }
}
