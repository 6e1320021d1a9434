//! SPARQL 1.1 Graph Store backend.
//!
//! Keeps one named graph per resource. The graph IRI is the configured
//! `graph_prefix` followed by the resource's repository URL.
//!
//! - update: `PUT {graph_store_url}?graph={iri}` with the RDF/XML body,
//!   replacing whatever the graph held.
//! - remove: `DELETE {graph_store_url}?graph={iri}`. A 404 means the graph
//!   was already gone and counts as success.

use async_trait::async_trait;
use repo_indexer_core::backend::{BackendResponse, IndexBackend};
use repo_indexer_core::error::BackendError;
use repo_indexer_core::models::ContentKind;
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, StatusCode};

use crate::config::{RepositoryConfig, SparqlBackendConfig};
use crate::retriever::RDF_XML;

pub struct SparqlBackend {
    name: String,
    graph_store_url: String,
    graph_prefix: String,
    repository: RepositoryConfig,
    client: Client,
}

impl SparqlBackend {
    pub fn new(
        name: impl Into<String>,
        config: &SparqlBackendConfig,
        repository: RepositoryConfig,
        client: Client,
    ) -> Self {
        Self {
            name: name.into(),
            graph_store_url: config.graph_store_url.clone(),
            graph_prefix: config.graph_prefix.clone(),
            repository,
            client,
        }
    }

    pub fn graph_iri(&self, resource_id: &str) -> String {
        format!("{}{}", self.graph_prefix, self.repository.resource_url(resource_id))
    }

    async fn check(response: reqwest::Response) -> Result<BackendResponse, BackendError> {
        let status = response.status();
        if status.is_success() {
            return Ok(BackendResponse::with_detail(status.to_string()));
        }
        let body = response.text().await.unwrap_or_default();
        let message = if body.trim().is_empty() {
            status.to_string()
        } else {
            format!("{}: {}", status, body.trim())
        };
        Err(BackendError::Rejected {
            status: i64::from(status.as_u16()),
            message,
        })
    }
}

#[async_trait]
impl IndexBackend for SparqlBackend {
    fn name(&self) -> &str {
        &self.name
    }

    fn content_kind(&self) -> ContentKind {
        ContentKind::Rdf
    }

    async fn update(&self, resource_id: &str, content: &[u8]) -> Result<BackendResponse, BackendError> {
        let graph = self.graph_iri(resource_id);
        let response = self
            .client
            .put(&self.graph_store_url)
            .query(&[("graph", graph.as_str())])
            .header(CONTENT_TYPE, RDF_XML)
            .body(content.to_vec())
            .send()
            .await
            .map_err(|e| BackendError::Transport(e.to_string()))?;
        Self::check(response).await
    }

    async fn remove(&self, resource_id: &str) -> Result<BackendResponse, BackendError> {
        let graph = self.graph_iri(resource_id);
        let response = self
            .client
            .delete(&self.graph_store_url)
            .query(&[("graph", graph.as_str())])
            .send()
            .await
            .map_err(|e| BackendError::Transport(e.to_string()))?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(BackendResponse::with_detail("graph not present"));
        }
        Self::check(response).await
    }
}
