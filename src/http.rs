//! HTTP API.
//!
//! JSON endpoints for searching harvested packs, requesting downloads and
//! watching transfers, plus `/metrics` for Prometheus scraping. Runs on its
//! own task and stops when the shutdown token is cancelled.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::json;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use xdcc_proto::{PackageRecord, Request};

use crate::config::Config;
use crate::db::{BotRecord, Database, StoreError};
use crate::error::RequestError;
use crate::tracker::RequestTracker;
use crate::transfer::{TransferPool, TransferSnapshot};

/// Shared state behind every handler.
#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub tracker: Arc<RequestTracker>,
    pub pool: Arc<TransferPool>,
    pub config: Arc<Config>,
}

/// `{"status":"error","reason":...}` with a status code.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    reason: String,
}

impl ApiError {
    fn bad_request(reason: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            reason: reason.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(json!({ "status": "error", "reason": self.reason }));
        (self.status, body).into_response()
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        error!(error = %err, "Storage error while serving request");
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            reason: err.to_string(),
        }
    }
}

impl From<RequestError> for ApiError {
    fn from(err: RequestError) -> Self {
        let status = match &err {
            RequestError::InvalidPath(_) => StatusCode::BAD_REQUEST,
            RequestError::UnknownServer(_) => StatusCode::NOT_FOUND,
            RequestError::Session(_) => StatusCode::SERVICE_UNAVAILABLE,
            RequestError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self {
            status,
            reason: err.to_string(),
        }
    }
}

/// Parse a JSON body, answering 400 with the parser's message on failure.
fn parse_body<T: DeserializeOwned>(body: &Bytes) -> Result<T, ApiError> {
    serde_json::from_slice(body).map_err(|e| ApiError::bad_request(e.to_string()))
}

#[derive(Debug, Deserialize)]
struct SearchBody {
    filter: String,
}

#[derive(Debug, Deserialize)]
struct DownloadBody {
    path: String,
}

#[derive(Debug, Deserialize)]
struct RequestsQuery {
    #[serde(default)]
    query: String,
}

/// POST /xdcc/packages/search
async fn search_packages(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<Vec<PackageRecord>>, ApiError> {
    let SearchBody { filter } = parse_body(&body)?;
    let started = Instant::now();
    let records = state.db.packages().search(&filter)?;
    info!(filter = %filter, results = records.len(), elapsed = ?started.elapsed(), "xdcc search");
    Ok(Json(records))
}

/// POST /xdcc/download
async fn download(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<Request>, ApiError> {
    let DownloadBody { path } = parse_body(&body)?;
    let request = state.tracker.request_package(&path).await?;
    Ok(Json(request))
}

/// GET /xdcc/requests?query=<prefix>
async fn list_requests(
    State(state): State<AppState>,
    Query(params): Query<RequestsQuery>,
) -> Result<Json<Vec<Request>>, ApiError> {
    Ok(Json(state.db.requests().scan(&params.query)?))
}

/// GET /xdcc/bots
async fn list_bots(State(state): State<AppState>) -> Result<Json<Vec<BotRecord>>, ApiError> {
    Ok(Json(state.db.offers().list()?))
}

/// GET /xdcc/transfers
async fn list_transfers(State(state): State<AppState>) -> Json<Vec<TransferSnapshot>> {
    Json(state.pool.snapshot())
}

/// DELETE /xdcc/transfers/:id
async fn cancel_transfer(State(state): State<AppState>, Path(id): Path<u64>) -> StatusCode {
    if state.pool.cancel(id) {
        StatusCode::NO_CONTENT
    } else {
        StatusCode::NOT_FOUND
    }
}

/// GET /sys/config
async fn show_config(State(state): State<AppState>) -> Json<Config> {
    Json(state.config.as_ref().clone())
}

/// Handler for GET /metrics - returns Prometheus metrics in text format.
async fn metrics_handler() -> String {
    crate::metrics::gather_metrics()
}

/// Build the API router.
pub fn router(state: AppState) -> Router {
    let mut router = Router::new()
        .route("/xdcc/packages/search", post(search_packages))
        .route("/xdcc/download", post(download))
        .route("/xdcc/requests", get(list_requests))
        .route("/xdcc/bots", get(list_bots))
        .route("/xdcc/transfers", get(list_transfers))
        .route("/xdcc/transfers/:id", delete(cancel_transfer))
        .route("/sys/config", get(show_config));
    if state.config.http.metrics {
        router = router.route("/metrics", get(metrics_handler));
    }
    router.with_state(state)
}

/// Serve the API on an already bound listener until `shutdown` fires.
pub async fn serve(
    listener: TcpListener,
    state: AppState,
    shutdown: CancellationToken,
) -> std::io::Result<()> {
    axum::serve(listener, router(state))
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await
}

/// Run the HTTP API.
///
/// This is a long-running task that should be spawned in the background.
pub async fn run_http_server(addr: SocketAddr, state: AppState, shutdown: CancellationToken) {
    let listener = match TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(e) => {
            error!("Failed to bind HTTP server on {}: {}", addr, e);
            return;
        }
    };
    info!("HTTP API listening on {}", addr);

    if let Err(e) = serve(listener, state, shutdown).await {
        error!("HTTP server error: {}", e);
    }
}
