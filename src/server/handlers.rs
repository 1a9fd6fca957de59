//! HTTP request handlers for the tile API.
//!
//! This module contains the Axum handlers for serving tiles, dataset
//! metadata and health checks.
//!
//! # Endpoints
//!
//! - `GET /tiles/{route}/tile/{z}/{x}/{y}` - Serve a tile
//! - `GET /tiles/{route}/` - Dataset metadata
//! - `GET /datasets` - List registered datasets
//! - `GET /health` - Health check endpoint

use std::sync::Arc;

use axum::{
    body::Body,
    extract::{Path, State},
    http::{header, HeaderMap, HeaderName, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use tracing::{debug, error, warn};

use crate::error::TileError;
use crate::tile::{DatasetMetadata, TileResponse, TileService, TileTarget};

/// Response header reporting whether the tile came from the cache.
pub const TILE_CACHE_HIT: HeaderName = HeaderName::from_static("x-tile-cache-hit");

/// Default Cache-Control max-age: one day.
pub const DEFAULT_CACHE_MAX_AGE: u32 = 86_400;

// =============================================================================
// Application State
// =============================================================================

/// Shared application state containing the tile service.
///
/// This is passed to all handlers via Axum's State extractor.
#[derive(Clone)]
pub struct AppState {
    /// The tile service for processing tile requests
    pub tile_service: Arc<TileService>,

    /// Cache-Control max-age in seconds for tile responses
    pub cache_max_age: u32,
}

impl AppState {
    /// Create a new application state with the given tile service.
    pub fn new(tile_service: Arc<TileService>) -> Self {
        Self::with_cache_max_age(tile_service, DEFAULT_CACHE_MAX_AGE)
    }

    /// Create a new application state with custom cache max-age.
    pub fn with_cache_max_age(tile_service: Arc<TileService>, cache_max_age: u32) -> Self {
        Self {
            tile_service,
            cache_max_age,
        }
    }
}

// =============================================================================
// Response Types
// =============================================================================

/// JSON error response returned for all error conditions.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Error type identifier (e.g., "unknown_dataset", "invalid_coordinates")
    pub error: String,

    /// Human-readable error message
    pub message: String,

    /// HTTP status code (included for convenience)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
}

impl ErrorResponse {
    /// Create a new error response with status code.
    pub fn with_status(
        error: impl Into<String>,
        message: impl Into<String>,
        status: StatusCode,
    ) -> Self {
        Self {
            error: error.into(),
            message: message.into(),
            status: Some(status.as_u16()),
        }
    }
}

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Service status
    pub status: String,

    /// Service version
    pub version: String,

    /// Number of registered datasets
    pub datasets: usize,
}

/// Response from the datasets list endpoint.
#[derive(Debug, Serialize)]
pub struct DatasetsResponse {
    pub datasets: Vec<DatasetMetadata>,
}

// =============================================================================
// Error Mapping
// =============================================================================

/// Convert TileError to HTTP response.
///
/// Misses (404) are logged at DEBUG, malformed requests at WARN and store
/// failures at ERROR. Store failures are logged in full but answered with an
/// opaque message that never carries file-system paths.
impl IntoResponse for TileError {
    fn into_response(self) -> Response {
        let (status, error_type, message) = match &self {
            TileError::UnknownDataset { path } => (
                StatusCode::NOT_FOUND,
                "unknown_dataset",
                format!("No dataset is registered for {}", path),
            ),

            TileError::OutOfRange { level, col, row } => (
                StatusCode::NOT_FOUND,
                "tile_out_of_range",
                format!(
                    "Tile {}/{}/{} is outside the dataset's pyramid",
                    level, col, row
                ),
            ),

            TileError::TileAbsent { level, col, row } => (
                StatusCode::NOT_FOUND,
                "tile_not_found",
                format!("No tile is stored at {}/{}/{}", level, col, row),
            ),

            TileError::InvalidCoordinates { message } => (
                StatusCode::BAD_REQUEST,
                "invalid_coordinates",
                format!("Invalid tile coordinates: {}", message),
            ),

            TileError::Store { dataset, .. } => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "store_error",
                format!("Failed to read tile from dataset '{}'", dataset),
            ),
        };

        if status.is_server_error() {
            // Full error (with file paths) goes to the log only
            error!(
                error_type = error_type,
                status = status.as_u16(),
                error = %self,
                "Server error: {}",
                message
            );
        } else if status == StatusCode::NOT_FOUND {
            debug!(
                error_type = error_type,
                status = status.as_u16(),
                "Resource not found: {}",
                message
            );
        } else {
            warn!(
                error_type = error_type,
                status = status.as_u16(),
                "Client error: {}",
                message
            );
        }

        let error_response = ErrorResponse::with_status(error_type, message, status);

        (status, Json(error_response)).into_response()
    }
}

/// Wrapper for handler errors to implement IntoResponse.
pub struct HandlerError(pub TileError);

impl IntoResponse for HandlerError {
    fn into_response(self) -> Response {
        self.0.into_response()
    }
}

impl From<TileError> for HandlerError {
    fn from(err: TileError) -> Self {
        HandlerError(err)
    }
}

// =============================================================================
// Handlers
// =============================================================================

/// Handle every request under `/tiles/`.
///
/// # Endpoints
///
/// - `GET /tiles/{route}/tile/{z}/{x}/{y}`: the tile at level `z`, column
///   `x`, row `y`
/// - `GET /tiles/{route}/`: dataset metadata as JSON
///
/// # Response
///
/// - `200 OK`: tile bytes with the dataset's content type
/// - `304 Not Modified`: `If-None-Match` matches the tile's ETag
/// - `400 Bad Request`: malformed coordinates
/// - `404 Not Found`: unknown dataset, empty or out-of-range tile
/// - `500 Internal Server Error`: corrupt or unreadable tile store
///
/// # Headers
///
/// - `Content-Type`: from the dataset's codec
/// - `Cache-Control: public, max-age={cache_max_age}`
/// - `ETag`: strong tag of the payload
/// - `X-Tile-Cache-Hit: true|false`
pub async fn tiles_handler(
    State(state): State<AppState>,
    Path(path): Path<String>,
    headers: HeaderMap,
) -> Result<Response, HandlerError> {
    match state.tile_service.resolve(&path).await? {
        TileTarget::Dataset(entry) => Ok(Json(DatasetMetadata::from_entry(&entry)).into_response()),
        TileTarget::Tile {
            entry,
            level,
            col,
            row,
        } => {
            let tile = state
                .tile_service
                .read_tile(&entry, level, col, row)
                .await?;
            Ok(tile_response(tile, &headers, state.cache_max_age))
        }
    }
}

fn tile_response(tile: TileResponse, request_headers: &HeaderMap, cache_max_age: u32) -> Response {
    let cache_control = HeaderValue::from_str(&format!("public, max-age={}", cache_max_age))
        .unwrap_or(HeaderValue::from_static("public"));
    let etag = HeaderValue::from_str(&tile.etag).unwrap_or(HeaderValue::from_static("\"\""));
    let cache_hit = HeaderValue::from_static(if tile.cache_hit { "true" } else { "false" });

    if etag_matches(request_headers, &tile.etag) {
        return (
            StatusCode::NOT_MODIFIED,
            [
                (header::ETAG, etag),
                (header::CACHE_CONTROL, cache_control),
                (TILE_CACHE_HIT, cache_hit),
            ],
        )
            .into_response();
    }

    (
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, HeaderValue::from_static(tile.content_type)),
            (header::CACHE_CONTROL, cache_control),
            (header::ETAG, etag),
            (TILE_CACHE_HIT, cache_hit),
        ],
        Body::from(tile.data),
    )
        .into_response()
}

/// Whether an `If-None-Match` header matches a strong tag.
///
/// `If-None-Match` uses weak comparison, so a `W/` prefix is ignored.
pub fn etag_matches(headers: &HeaderMap, etag: &str) -> bool {
    headers
        .get_all(header::IF_NONE_MATCH)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(','))
        .map(str::trim)
        .any(|candidate| {
            candidate == "*" || candidate.strip_prefix("W/").unwrap_or(candidate) == etag
        })
}

/// Handle health check requests.
///
/// # Endpoint
///
/// `GET /health`
///
/// # Response
///
/// `200 OK` with JSON body:
/// ```json
/// {
///   "status": "healthy",
///   "version": "0.1.0",
///   "datasets": 12
/// }
/// ```
pub async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        datasets: state.tile_service.dataset_count().await,
    })
}

/// Handle dataset list requests.
///
/// # Endpoint
///
/// `GET /datasets`
///
/// Lists every registered dataset in route order with its geometry.
pub async fn datasets_handler(State(state): State<AppState>) -> Json<DatasetsResponse> {
    Json(DatasetsResponse {
        datasets: state.tile_service.datasets().await,
    })
}
