//! Solr backend.
//!
//! Talks to a Solr core's JSON update handler:
//!
//! | Call | Request |
//! |------|---------|
//! | update | `POST {url}/update` with `[{...fields, unique_key: id}]`, then commit |
//! | remove | `POST {url}/update` with `{"delete":{"id":id}}`, then commit |
//!
//! Solr reports the outcome in `responseHeader.status`. The commit is only
//! issued when that status is `0`; any other status is returned as
//! [`BackendError::Rejected`] with Solr's error message. A success response
//! without a `responseHeader` (an HTML page at a wrong core URL, say) is
//! rejected too, quoting the start of the body.

use async_trait::async_trait;
use repo_indexer_core::backend::{BackendResponse, IndexBackend};
use repo_indexer_core::error::BackendError;
use repo_indexer_core::models::ContentKind;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;

use crate::config::SolrBackendConfig;
use crate::fields::parse_fields;

pub struct SolrBackend {
    name: String,
    update_url: String,
    unique_key: String,
    client: Client,
}

#[derive(Debug, Deserialize)]
struct SolrResponse {
    #[serde(rename = "responseHeader", default)]
    header: Option<ResponseHeader>,
    #[serde(default)]
    error: Option<SolrErrorBody>,
}

#[derive(Debug, Deserialize)]
struct ResponseHeader {
    #[serde(default)]
    status: i64,
    #[serde(rename = "QTime", default)]
    qtime: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct SolrErrorBody {
    #[serde(default)]
    msg: Option<String>,
}

/// A response that carried Solr's `responseHeader`.
#[derive(Debug)]
struct SolrReply {
    status: i64,
    qtime: Option<i64>,
    message: Option<String>,
}

/// Longest body excerpt quoted in an error.
const SNIPPET_LEN: usize = 120;

impl SolrBackend {
    pub fn new(name: impl Into<String>, config: &SolrBackendConfig, client: Client) -> Self {
        Self {
            name: name.into(),
            update_url: format!("{}/update", config.url.trim_end_matches('/')),
            unique_key: config.unique_key.clone(),
            client,
        }
    }

    /// Build the document Solr receives for `resource_id`.
    ///
    /// The unique key always carries the resource identifier, replacing any
    /// value the transformation produced for that field.
    pub fn document(&self, resource_id: &str, content: &[u8]) -> Result<Value, BackendError> {
        let mut fields = parse_fields(resource_id, content)?;
        fields.insert(self.unique_key.clone(), Value::String(resource_id.to_string()));
        Ok(Value::Object(fields))
    }

    /// POST `body`, then commit when Solr accepts it.
    async fn submit(&self, body: &Value) -> Result<BackendResponse, BackendError> {
        let reply = self.post(body).await?;
        debug!(status = reply.status, qtime = ?reply.qtime, "solr answered");
        if reply.status != 0 {
            return Err(rejected(reply));
        }

        let commit = self.post(&json!({ "commit": {} })).await?;
        if commit.status != 0 {
            return Err(rejected(commit));
        }

        Ok(match reply.qtime {
            Some(qtime) => BackendResponse::with_detail(format!("QTime={}ms", qtime)),
            None => BackendResponse::ok(),
        })
    }

    async fn post(&self, body: &Value) -> Result<SolrReply, BackendError> {
        let response = self
            .client
            .post(&self.update_url)
            .query(&[("wt", "json")])
            .json(body)
            .send()
            .await
            .map_err(|e| BackendError::Transport(e.to_string()))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| BackendError::Transport(e.to_string()))?;
        let parsed = serde_json::from_str::<SolrResponse>(&text).ok();
        let message = parsed
            .as_ref()
            .and_then(|r| r.error.as_ref())
            .and_then(|e| e.msg.clone());

        match parsed.and_then(|r| r.header) {
            Some(header) if status.is_success() => Ok(SolrReply {
                status: header.status,
                qtime: header.qtime,
                message,
            }),
            // Anything without a responseHeader is not Solr talking
            None if status.is_success() => Err(BackendError::Rejected {
                status: i64::from(status.as_u16()),
                message: format!("not a Solr response: {}", snippet(&text)),
            }),
            header => {
                // Solr puts its own status in the body; fall back to HTTP's
                let code = match header.map(|h| h.status) {
                    Some(code) if code != 0 => code,
                    _ => i64::from(status.as_u16()),
                };
                Err(BackendError::Rejected {
                    status: code,
                    message: message.unwrap_or_else(|| status.to_string()),
                })
            }
        }
    }
}

fn snippet(text: &str) -> String {
    let text = text.trim();
    match text.char_indices().nth(SNIPPET_LEN) {
        Some((end, _)) => format!("{}...", &text[..end]),
        None => text.to_string(),
    }
}

fn rejected(reply: SolrReply) -> BackendError {
    BackendError::Rejected {
        status: reply.status,
        message: reply
            .message
            .unwrap_or_else(|| "update not accepted".to_string()),
    }
}

#[async_trait]
impl IndexBackend for SolrBackend {
    fn name(&self) -> &str {
        &self.name
    }

    fn content_kind(&self) -> ContentKind {
        ContentKind::NamedFields
    }

    async fn update(&self, resource_id: &str, content: &[u8]) -> Result<BackendResponse, BackendError> {
        let doc = self.document(resource_id, content)?;
        self.submit(&json!([doc])).await
    }

    async fn remove(&self, resource_id: &str) -> Result<BackendResponse, BackendError> {
        self.submit(&json!({ "delete": { "id": resource_id } })).await
    }
}
