//! Wiring configured backends into a [`Dispatcher`].
//!
//! Each `[backends.<type>.<name>]` table becomes one backend instance named
//! `<type>:<name>`. Instances are registered in a stable order: solr, then
//! sparql, then sqlite, each sorted by name.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use repo_indexer_core::backend::BackendRegistry;
use reqwest::Client;
use tracing::info;

use crate::backend_solr::SolrBackend;
use crate::backend_sparql::SparqlBackend;
use crate::backend_sqlite::SqliteBackend;
use crate::config::Config;
use crate::dispatcher::Dispatcher;
use crate::retriever::Repository;

/// Build every backend named in the config.
pub async fn registry_from_config(config: &Config) -> Result<BackendRegistry> {
    let client = Client::builder()
        .timeout(Duration::from_secs(config.dispatch.backend_timeout_secs))
        .user_agent(concat!("repo-indexer/", env!("CARGO_PKG_VERSION")))
        .build()?;

    let mut registry = BackendRegistry::new();

    for (name, cfg) in &config.backends.solr {
        registry.register(Arc::new(SolrBackend::new(
            format!("solr:{}", name),
            cfg,
            client.clone(),
        )));
    }
    for (name, cfg) in &config.backends.sparql {
        registry.register(Arc::new(SparqlBackend::new(
            format!("sparql:{}", name),
            cfg,
            config.repository.clone(),
            client.clone(),
        )));
    }
    for (name, cfg) in &config.backends.sqlite {
        let backend = SqliteBackend::open(format!("sqlite:{}", name), &cfg.path)
            .await
            .with_context(|| format!("Failed to open backend sqlite:{}", name))?;
        registry.register(Arc::new(backend));
    }

    Ok(registry)
}

/// Build a dispatcher over the configured repository and backends.
pub async fn dispatcher_from_config(config: &Config) -> Result<Dispatcher> {
    let client = Repository::build_client(&config.repository)?;
    let repository = Repository::new(config.repository.clone(), client)?;
    let backends = registry_from_config(config).await?;

    if backends.is_empty() {
        tracing::warn!("no backends configured; notifications will be acknowledged and dropped");
    }
    for backend in backends.backends() {
        info!(backend = backend.name(), kind = %backend.content_kind(), "registered backend");
    }

    Ok(Dispatcher::new(
        repository,
        backends,
        Duration::from_secs(config.dispatch.backend_timeout_secs),
    ))
}
