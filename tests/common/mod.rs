//! Shared fixtures: a fake repository served by axum on a random port.

#![allow(dead_code)]

use axum::{
    extract::State,
    http::{header::ACCEPT, HeaderMap, StatusCode, Uri},
    response::IntoResponse,
    Router,
};
use repo_indexer::config::RepositoryConfig;
use repo_indexer::retriever::Repository;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

pub const TRANSFORM_PREDICATE: &str =
    "http://fedora.info/definitions/v4/repository#hasIndexingTransformation";

#[derive(Clone, Default)]
struct FakeState {
    resources: Arc<Mutex<HashMap<String, (u16, Vec<u8>)>>>,
    hits: Arc<Mutex<HashMap<String, usize>>>,
    accepts: Arc<Mutex<Vec<(String, Option<String>)>>>,
}

/// A repository serving canned responses under `/rest`.
pub struct FakeRepository {
    pub addr: SocketAddr,
    state: FakeState,
}

impl FakeRepository {
    /// Start with nothing served; every path answers 404 until [`put`].
    ///
    /// [`put`]: FakeRepository::put
    pub async fn start() -> Self {
        let state = FakeState::default();

        let app = Router::new().fallback(serve).with_state(state.clone());
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self { addr, state }
    }

    /// Serve `body` with `status` at `path` (relative to `/rest`).
    pub fn put(&self, path: &str, status: u16, body: impl Into<Vec<u8>>) {
        self.state
            .resources
            .lock()
            .unwrap()
            .insert(format!("/rest/{}", path), (status, body.into()));
    }

    /// Serve a resource whose RDF carries the transformation marker `key`,
    /// and the named fields `fields` at its transform endpoint.
    pub fn put_transformable(&self, id: &str, key: &str, fields: &str) {
        self.put(id, 200, rdf(&self.url(id), Some(key)));
        self.put(&format!("{}/transform/{}", id, key), 200, fields);
    }

    pub fn base_url(&self) -> String {
        format!("http://{}/rest", self.addr)
    }

    pub fn url(&self, id: &str) -> String {
        format!("{}/{}", self.base_url(), id)
    }

    /// Requests seen for `path` (relative to `/rest`).
    pub fn hits(&self, path: &str) -> usize {
        let hits = self.state.hits.lock().unwrap();
        hits.get(&format!("/rest/{}", path)).copied().unwrap_or(0)
    }

    pub fn total_hits(&self) -> usize {
        self.state.hits.lock().unwrap().values().sum()
    }

    /// `Accept` header sent with each request to `path`.
    pub fn accepts(&self, path: &str) -> Vec<Option<String>> {
        let full = format!("/rest/{}", path);
        self.state
            .accepts
            .lock()
            .unwrap()
            .iter()
            .filter(|(p, _)| *p == full)
            .map(|(_, a)| a.clone())
            .collect()
    }

    pub fn repository_config(&self) -> RepositoryConfig {
        RepositoryConfig {
            base_url: self.base_url(),
            timeout_secs: 5,
            max_retries: 0,
            transform_predicate: TRANSFORM_PREDICATE.to_string(),
        }
    }

    pub fn repository(&self) -> Repository {
        self.repository_with_retries(0)
    }

    /// Like [`repository`](FakeRepository::repository), retrying retryable
    /// failures `max_retries` times.
    pub fn repository_with_retries(&self, max_retries: u32) -> Repository {
        let config = RepositoryConfig {
            max_retries,
            ..self.repository_config()
        };
        let client = Repository::build_client(&config).unwrap();
        Repository::new(config, client).unwrap()
    }
}

async fn serve(State(state): State<FakeState>, uri: Uri, headers: HeaderMap) -> impl IntoResponse {
    let path = uri.path().to_string();
    *state.hits.lock().unwrap().entry(path.clone()).or_default() += 1;
    state.accepts.lock().unwrap().push((
        path.clone(),
        headers
            .get(ACCEPT)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string),
    ));

    let resources = state.resources.lock().unwrap();
    match resources.get(&path) {
        Some((status, body)) => (StatusCode::from_u16(*status).unwrap(), body.clone()),
        None => (StatusCode::NOT_FOUND, Vec::new()),
    }
}

/// RDF/XML describing `url`, with the transformation marker when `key` is
/// given.
pub fn rdf(url: &str, key: Option<&str>) -> Vec<u8> {
    let marker = key
        .map(|k| format!("    <fedora:hasIndexingTransformation>{}</fedora:hasIndexingTransformation>\n", k))
        .unwrap_or_default();
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<rdf:RDF xmlns:rdf="http://www.w3.org/1999/02/22-rdf-syntax-ns#"
         xmlns:dc="http://purl.org/dc/elements/1.1/"
         xmlns:fedora="http://fedora.info/definitions/v4/repository#">
  <rdf:Description rdf:about="{url}">
    <dc:title>500 Easy Microwave Meals</dc:title>
{marker}  </rdf:Description>
</rdf:RDF>
"#
    )
    .into_bytes()
}
