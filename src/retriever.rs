//! Content retrieval from the repository.
//!
//! A [`ContentRetriever`] fetches one [`Representation`] of one resource and
//! memoizes it for its own lifetime. The dispatcher fetches each
//! representation once per notification and hands the outcome to every
//! backend that needs it, so the repository is asked once.
//!
//! # Strategies
//!
//! - **RDF**: `GET {resource}` with `Accept: application/rdf+xml`.
//! - **Named fields**: the RDF fetch above, a scan for the transformation
//!   marker (see [`crate::rdf`]), then `GET {resource}/transform/{key}`.
//!   No marker → [`RetrievalError::NotTransformable`].
//!
//! # Memoization
//!
//! State is `NotFetched | Fetched | Failed` behind an async mutex. The
//! mutex is held across the network call, so a second caller waits for an
//! in-flight fetch rather than racing a duplicate one. A failed fetch is
//! remembered for inspection but not served: the next call tries again.
//!
//! # Retry Strategy
//!
//! HTTP 429 / 5xx and network errors retry with exponential backoff (1s,
//! 2s, 4s, ... capped at 2^5) up to `repository.max_retries`; other
//! statuses fail immediately.

use std::sync::Arc;
use std::time::Duration;

use repo_indexer_core::error::RetrievalError;
use repo_indexer_core::models::{Representation, RetrievalResult};
use reqwest::header::ACCEPT;
use reqwest::Client;
use tokio::sync::Mutex;
use tracing::{debug, instrument};

use crate::config::RepositoryConfig;
use crate::rdf::{find_transform_key, Predicate};

pub const RDF_XML: &str = "application/rdf+xml";

/// Shared, read-only view of the repository for building retrievers.
///
/// Cloning is cheap: the `reqwest::Client` is a handle onto one
/// connection pool.
#[derive(Clone)]
pub struct Repository {
    config: Arc<RepositoryConfig>,
    client: Client,
    predicate: Arc<Predicate>,
}

impl Repository {
    pub fn new(config: RepositoryConfig, client: Client) -> anyhow::Result<Self> {
        let predicate = Predicate::parse(&config.transform_predicate).ok_or_else(|| {
            anyhow::anyhow!(
                "transform predicate has no local name: {}",
                config.transform_predicate
            )
        })?;
        Ok(Self {
            config: Arc::new(config),
            client,
            predicate: Arc::new(predicate),
        })
    }

    /// Build the HTTP client used for every repository request.
    pub fn build_client(config: &RepositoryConfig) -> anyhow::Result<Client> {
        Ok(Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(concat!("repo-indexer/", env!("CARGO_PKG_VERSION")))
            .build()?)
    }

    pub fn resource_url(&self, resource_id: &str) -> String {
        self.config.resource_url(resource_id)
    }

    /// A fresh retriever scoped to one resource and one representation.
    pub fn retriever(&self, resource_id: &str, representation: Representation) -> ContentRetriever {
        ContentRetriever {
            url: self.resource_url(resource_id),
            representation,
            repository: self.clone(),
            state: Mutex::new(RetrieverState::NotFetched),
        }
    }
}

/// Memo state of a [`ContentRetriever`].
#[derive(Debug, Clone)]
pub enum RetrieverState {
    NotFetched,
    Fetched(RetrievalResult),
    Failed(RetrievalError),
}

/// Fetches one representation of one resource, at most once on success.
pub struct ContentRetriever {
    url: String,
    representation: Representation,
    repository: Repository,
    state: Mutex<RetrieverState>,
}

impl ContentRetriever {
    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn representation(&self) -> Representation {
        self.representation
    }

    /// Return the memoized result, fetching it first if needed.
    #[instrument(skip(self), fields(url = %self.url, representation = %self.representation))]
    pub async fn fetch(&self) -> Result<RetrievalResult, RetrievalError> {
        let mut state = self.state.lock().await;
        if let RetrieverState::Fetched(result) = &*state {
            debug!("serving cached content");
            return Ok(result.clone());
        }

        let fetched = match self.representation {
            Representation::Rdf => self.fetch_rdf().await,
            Representation::NamedFields => self.fetch_named_fields().await,
        };

        match fetched {
            Ok(bytes) => {
                let result = RetrievalResult::new(bytes, self.representation);
                debug!(bytes = result.len(), "fetched");
                *state = RetrieverState::Fetched(result.clone());
                Ok(result)
            }
            Err(err) => {
                *state = RetrieverState::Failed(err.clone());
                Err(err)
            }
        }
    }

    /// Snapshot of the memo state.
    pub async fn state(&self) -> RetrieverState {
        self.state.lock().await.clone()
    }

    async fn fetch_rdf(&self) -> Result<Vec<u8>, RetrievalError> {
        self.get(&self.url, Some(RDF_XML)).await
    }

    async fn fetch_named_fields(&self) -> Result<Vec<u8>, RetrievalError> {
        debug!("retrieving RDF to find the indexing transformation");
        let rdf = self.fetch_rdf().await?;

        let key = find_transform_key(&rdf, &self.url, &self.repository.predicate)
            .map_err(|reason| RetrievalError::InvalidRdf {
                url: self.url.clone(),
                reason,
            })?
            .ok_or_else(|| RetrievalError::NotTransformable {
                url: self.url.clone(),
            })?;

        debug!(transform = %key, "discovered transform key");
        let transform_url = format!("{}/transform/{}", self.url.trim_end_matches('/'), key);
        self.get(&transform_url, None).await
    }

    async fn get(&self, url: &str, accept: Option<&str>) -> Result<Vec<u8>, RetrievalError> {
        let max_retries = self.repository.config.max_retries;
        let mut last_err = None;

        for attempt in 0..=max_retries {
            if attempt > 0 {
                // Exponential backoff: 1s, 2s, 4s, 8s, ...
                let delay = Duration::from_secs(1 << (attempt - 1).min(5));
                tokio::time::sleep(delay).await;
            }

            let mut request = self.repository.client.get(url);
            if let Some(accept) = accept {
                request = request.header(ACCEPT, accept);
            }

            match request.send().await {
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() {
                        return response
                            .bytes()
                            .await
                            .map(|b| b.to_vec())
                            .map_err(|e| transport(url, None, e.to_string()));
                    }

                    let err = transport(url, Some(status.as_u16()), status.to_string());
                    // Rate limited or server error, retry
                    if status.as_u16() == 429 || status.is_server_error() {
                        last_err = Some(err);
                        continue;
                    }
                    return Err(err);
                }
                Err(e) => {
                    last_err = Some(transport(url, None, e.to_string()));
                    continue;
                }
            }
        }

        Err(last_err.unwrap_or_else(|| transport(url, None, "no attempt made".to_string())))
    }
}

fn transport(url: &str, status: Option<u16>, reason: String) -> RetrievalError {
    RetrievalError::Transport {
        url: url.to_string(),
        status,
        reason,
    }
}
