//! HTTP surface: `GET /get-data`, `POST /save-data`, `/health`, `/metrics`.
//!
//! Handlers stay thin. They resolve the connector, hand the blocking store
//! work to `spawn_blocking` and map `SyncError` onto status codes.

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{rejection::BytesRejection, DefaultBodyLimit, State},
    http::{Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{any, get},
    Json, Router,
};
use metrics_exporter_prometheus::PrometheusHandle;
use serde::Serialize;
use uuid::Uuid;

use finsync_core::AggregateState;

use crate::{
    aggregator::ReadAggregator,
    error::SyncError,
    replacer::WriteReplacer,
    storage::{StorageError, StoreConnector},
};

/// Largest accepted `/save-data` body unless configured otherwise.
pub const DEFAULT_BODY_LIMIT: usize = 6 * 1024 * 1024;

#[derive(Clone)]
pub struct AppState {
    connector: Option<Arc<dyn StoreConnector>>,
    metrics: Option<PrometheusHandle>,
    body_limit: usize,
}

impl AppState {
    /// `None` means no connection string was configured; every data request
    /// then fails with a configuration error.
    pub fn new(connector: Option<Arc<dyn StoreConnector>>) -> Self {
        Self {
            connector,
            metrics: None,
            body_limit: DEFAULT_BODY_LIMIT,
        }
    }

    pub fn with_body_limit(mut self, bytes: usize) -> Self {
        self.body_limit = bytes;
        self
    }

    pub fn with_metrics(mut self, handle: PrometheusHandle) -> Self {
        self.metrics = Some(handle);
        self
    }

    fn connector(&self) -> Result<Arc<dyn StoreConnector>, SyncError> {
        self.connector.clone().ok_or_else(|| {
            tracing::error!("Database connection string not configured");
            SyncError::Configuration
        })
    }
}

pub fn router(state: AppState) -> Router {
    let body_limit = state.body_limit;
    // Both data routes take any method so a wrong one still gets the JSON envelope.
    Router::new()
        .route("/get-data", any(get_data))
        .route("/save-data", any(save_data))
        .route("/health", get(health))
        .route("/metrics", get(render_metrics))
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(state)
}

#[derive(Serialize)]
struct SavedBody {
    message: &'static str,
}

async fn get_data(State(state): State<AppState>, method: Method) -> Response {
    let request_id = Uuid::new_v4();
    let span = tracing::info_span!("get_data", %request_id, %method);

    let result = read(&state, &method, span.clone()).await;

    let outcome = match &result {
        Ok(_) => "ok",
        Err(SyncError::MethodNotAllowed) => "rejected",
        Err(_) => "error",
    };
    metrics::increment_counter!("finsync_reads_total", "outcome" => outcome);

    match result {
        Ok(aggregate) => (StatusCode::OK, Json(aggregate)).into_response(),
        Err(e) => {
            span.in_scope(|| tracing::debug!(status = %e.status(), "Read rejected"));
            e.into_response()
        }
    }
}

async fn read(state: &AppState, method: &Method, span: tracing::Span) -> Result<AggregateState, SyncError> {
    if *method != Method::GET && *method != Method::HEAD {
        return Err(SyncError::MethodNotAllowed);
    }
    let connector = span.in_scope(|| state.connector())?;

    tokio::task::spawn_blocking(move || span.in_scope(|| ReadAggregator::new(connector).read()))
        .await
        .unwrap_or_else(|e| Err(SyncError::Retrieval(StorageError::Other(e.to_string()))))
}

async fn save_data(
    State(state): State<AppState>,
    method: Method,
    body: Result<Bytes, BytesRejection>,
) -> Response {
    let request_id = Uuid::new_v4();
    let span = tracing::info_span!("save_data", %request_id, %method);

    let result = save(&state, &method, body, span.clone()).await;

    let outcome = match &result {
        Ok(()) => "ok",
        Err(SyncError::MethodNotAllowed | SyncError::BadRequest(_) | SyncError::UnreadableBody(_)) => "rejected",
        Err(_) => "error",
    };
    metrics::increment_counter!("finsync_writes_total", "outcome" => outcome);

    match result {
        Ok(()) => (
            StatusCode::OK,
            Json(SavedBody {
                message: "All data successfully saved.",
            }),
        )
            .into_response(),
        Err(e) => {
            span.in_scope(|| tracing::debug!(status = %e.status(), "Save rejected"));
            e.into_response()
        }
    }
}

async fn save(
    state: &AppState,
    method: &Method,
    body: Result<Bytes, BytesRejection>,
    span: tracing::Span,
) -> Result<(), SyncError> {
    if *method != Method::POST {
        return Err(SyncError::MethodNotAllowed);
    }
    let body = body.map_err(|e| {
        span.in_scope(|| tracing::warn!(error = %e, "Failed to read save request body"));
        SyncError::UnreadableBody(e)
    })?;
    let aggregate = span.in_scope(|| WriteReplacer::parse(&body))?;
    let connector = span.in_scope(|| state.connector())?;

    tokio::task::spawn_blocking(move || span.in_scope(|| WriteReplacer::new(connector).replace(&aggregate)))
        .await
        .unwrap_or_else(|e| Err(SyncError::Save(StorageError::Other(e.to_string()))))
}

async fn health() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

async fn render_metrics(State(state): State<AppState>) -> Response {
    match state.metrics {
        Some(handle) => (StatusCode::OK, handle.render()).into_response(),
        None => (StatusCode::NOT_FOUND, "metrics exporter not installed").into_response(),
    }
}
