//! HTTP interface to the metric store.
//!
//! | Method | Path | Description |
//! |---|---|---|
//! | POST | `/metrics` | Ingest one data point, `201 Created` on success |
//! | GET | `/metrics?name=..&key=..` | All data points of a series, in insertion order |

use std::{net::SocketAddr, sync::Arc};

use axum::{
    body::Bytes,
    extract::{rejection::QueryRejection, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use log::{error, info};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

use crate::{
    metric::{DataPoint, Row},
    storage::{Storage, StorageError},
};

#[derive(Clone)]
pub struct ApiState {
    pub storage: Arc<Storage>,
}

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("missing query parameter {0:?}")]
    MissingQueryParameter(&'static str),
    #[error("storage error: {0}")]
    Storage(StorageError),
}

impl From<StorageError> for ApiError {
    fn from(e: StorageError) -> Self {
        match e {
            StorageError::InvalidInput(msg) => ApiError::InvalidInput(msg.to_string()),
            e => ApiError::Storage(e),
        }
    }
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::InvalidInput(_) | ApiError::MissingQueryParameter(_) => {
                StatusCode::BAD_REQUEST
            }
            ApiError::Storage(e) => {
                error!("request failed: {}", e);
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        (
            status,
            Json(ErrorResponse {
                error: self.to_string(),
            }),
        )
            .into_response()
    }
}

/// Body of `POST /metrics`. `metric` is accepted in place of `name`.
#[derive(Debug, Deserialize)]
pub struct IngestRequest {
    #[serde(alias = "metric")]
    pub name: String,
    pub key: String,
    pub timestamp: u64,
    pub value: f64,
}

#[derive(Debug, Deserialize)]
pub struct SeriesQuery {
    pub name: Option<String>,
    pub key: Option<String>,
}

pub fn build_router(storage: Arc<Storage>) -> Router {
    Router::new()
        .route("/metrics", get(query_metrics).post(ingest_metric))
        .layer(TraceLayer::new_for_http())
        .with_state(ApiState { storage })
}

pub async fn serve<F>(
    listener: TcpListener,
    storage: Arc<Storage>,
    shutdown: F,
) -> std::io::Result<()>
where
    F: std::future::Future<Output = ()> + Send + 'static,
{
    let addr: Option<SocketAddr> = listener.local_addr().ok();
    info!("listening on {:?}", addr);
    axum::serve(listener, build_router(storage))
        .with_graceful_shutdown(shutdown)
        .await
}

/// POST /metrics
///
/// The body is parsed by hand so that every malformed request, including a
/// missing or mistyped field, is answered with 400.
pub async fn ingest_metric(
    State(state): State<ApiState>,
    body: Bytes,
) -> Result<StatusCode, ApiError> {
    let req: IngestRequest =
        serde_json::from_slice(&body).map_err(|e| ApiError::InvalidInput(e.to_string()))?;

    state.storage.ingest(&Row {
        name: &req.name,
        key: &req.key,
        data_point: DataPoint {
            timestamp: req.timestamp,
            value: req.value,
        },
    })?;
    Ok(StatusCode::CREATED)
}

/// GET /metrics?name=..&key=..
pub async fn query_metrics(
    State(state): State<ApiState>,
    query: Result<Query<SeriesQuery>, QueryRejection>,
) -> Result<Json<Vec<DataPoint>>, ApiError> {
    let Query(params) = query.map_err(|e| ApiError::InvalidInput(e.body_text()))?;
    let name = required(params.name, "name")?;
    let key = required(params.key, "key")?;
    Ok(Json(state.storage.query(&name, &key)?))
}

// Empty values can never match a series since ingestion rejects them.
fn required(param: Option<String>, name: &'static str) -> Result<String, ApiError> {
    match param {
        Some(value) if !value.is_empty() => Ok(value),
        _ => Err(ApiError::MissingQueryParameter(name)),
    }
}
