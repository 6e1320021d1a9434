//! HTTP notification endpoint.
//!
//! Lets any message source that can make an HTTP request feed the
//! dispatcher. The request body is the message's header map as a JSON
//! object; the configured identifier and event-type header names are
//! looked up in it exactly as they would be on a broker message.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `POST` | `/notifications` | Dispatch one notification (`?wait=true` to drain) |
//! | `GET`  | `/backends` | Registered backends and their content kinds |
//! | `GET`  | `/health` | Health check (returns version) |
//!
//! `POST /notifications` answers `202 Accepted` once every backend has been
//! invoked, with the per-backend dispatch report. With `?wait=true` it
//! waits for every backend to finish and answers `200 OK` with the final
//! outcomes instead.
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "malformed_notification", "message": "missing header: ..." } }
//! ```
//!
//! Error codes: `bad_request` (400), `malformed_notification` (400),
//! `unauthorized` (401).
//!
//! # Signing
//!
//! When `[server].secret` is set, every `POST` must carry
//! `X-Indexer-Signature: sha256=<hex>` over the raw body (see
//! [`crate::signature`]).

use axum::{
    body::Bytes,
    extract::{rejection::QueryRejection, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::config::{Config, NotificationConfig};
use crate::dispatcher::{Dispatcher, DispatchReport};
use crate::notification::parse_notification;
use crate::registry::dispatcher_from_config;
use crate::signature::{verify_signature, SIGNATURE_HEADER};

#[derive(Clone)]
struct AppState {
    dispatcher: Arc<Dispatcher>,
    notifications: Arc<NotificationConfig>,
    secret: Option<Arc<str>>,
}

/// Build the router around an existing dispatcher.
pub fn app(
    dispatcher: Arc<Dispatcher>,
    notifications: NotificationConfig,
    secret: Option<String>,
) -> Router {
    let state = AppState {
        dispatcher,
        notifications: Arc::new(notifications),
        secret: secret.map(Arc::from),
    };

    Router::new()
        .route("/notifications", post(handle_notification))
        .route("/backends", get(handle_backends))
        .route("/health", get(handle_health))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serve the endpoint on `[server].bind` until Ctrl-C.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let dispatcher = Arc::new(dispatcher_from_config(config).await?);
    if config.server.secret.is_none() {
        warn!("server.secret is not set; accepting unsigned notifications");
    }

    let router = app(
        dispatcher,
        config.notifications.clone(),
        config.server.secret.clone(),
    );

    let listener = tokio::net::TcpListener::bind(&config.server.bind).await?;
    info!(bind = %config.server.bind, "notification endpoint listening");

    axum::serve(listener, router)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("shutting down");
        })
        .await?;

    Ok(())
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

struct AppError {
    status: StatusCode,
    code: &'static str,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code.to_string(),
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

fn bad_request(code: &'static str, message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        code,
        message: message.into(),
    }
}

fn unauthorized(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::UNAUTHORIZED,
        code: "unauthorized",
        message: message.into(),
    }
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// ============ GET /backends ============

#[derive(Serialize)]
struct BackendInfo {
    name: String,
    kind: repo_indexer_core::models::ContentKind,
}

async fn handle_backends(State(state): State<AppState>) -> Json<Vec<BackendInfo>> {
    Json(
        state
            .dispatcher
            .backends()
            .backends()
            .iter()
            .map(|b| BackendInfo {
                name: b.name().to_string(),
                kind: b.content_kind(),
            })
            .collect(),
    )
}

// ============ POST /notifications ============

#[derive(Debug, Default, Deserialize)]
struct NotifyParams {
    #[serde(default)]
    wait: bool,
}

async fn handle_notification(
    State(state): State<AppState>,
    params: Result<Query<NotifyParams>, QueryRejection>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<(StatusCode, Json<DispatchReport>), AppError> {
    if let Some(secret) = &state.secret {
        let signature = headers
            .get(SIGNATURE_HEADER)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| unauthorized("missing X-Indexer-Signature header"))?;
        if !verify_signature(&body, signature, secret.as_bytes()) {
            return Err(unauthorized("signature does not match request body"));
        }
    }

    let Query(params) = params.map_err(|e| bad_request("bad_request", e.body_text()))?;

    let message: BTreeMap<String, String> = serde_json::from_slice(&body).map_err(|e| {
        bad_request(
            "bad_request",
            format!("body must be a JSON object of string headers: {}", e),
        )
    })?;

    let notification = parse_notification(&message, &state.notifications).map_err(|e| {
        warn!(error = %e, "rejecting malformed notification");
        bad_request("malformed_notification", e.to_string())
    })?;

    let dispatch = state.dispatcher.handle(&notification).await;
    if params.wait {
        Ok((StatusCode::OK, Json(dispatch.drain().await)))
    } else {
        Ok((StatusCode::ACCEPTED, Json(dispatch.report())))
    }
}
