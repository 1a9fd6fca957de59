//! Router configuration for the MRF tile server.
//!
//! This module defines the HTTP routes and applies middleware for CORS and
//! request tracing.
//!
//! # Route Structure
//!
//! ```text
//! /health                              - Health check
//! /datasets                            - List registered datasets
//! /tiles/{route}/                      - Dataset metadata
//! /tiles/{route}/tile/{z}/{x}/{y}      - Tile endpoint
//! ```
//!
//! Route prefixes may span several path segments (`Tif/Gebco`), so the whole
//! remainder after `/tiles/` is captured and resolved against the registry.
//!
//! # Example
//!
//! ```ignore
//! use mrf_streamer::dataset::{RegistryConfig, RegistryHandle, Registry};
//! use mrf_streamer::server::{create_router, RouterConfig};
//! use mrf_streamer::tile::TileService;
//!
//! let config = RegistryConfig::new("/srv/webconf", "/srv/data");
//! let (registry, _report) = Registry::build(&config)?;
//! let tile_service = TileService::new(RegistryHandle::new(config, registry));
//!
//! let router = create_router(tile_service, RouterConfig::new());
//!
//! let listener = tokio::net::TcpListener::bind("0.0.0.0:3000").await?;
//! axum::serve(listener, router).await?;
//! ```

use std::sync::Arc;
use std::time::Duration;

use axum::{routing::get, Router};
use http::header::{CACHE_CONTROL, CONTENT_TYPE, ETAG, IF_NONE_MATCH};
use http::Method;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use super::handlers::{
    datasets_handler, health_handler, tiles_handler, AppState, DEFAULT_CACHE_MAX_AGE,
    TILE_CACHE_HIT,
};
use crate::tile::TileService;

// =============================================================================
// Router Configuration
// =============================================================================

/// Configuration for the HTTP router.
#[derive(Debug, Clone)]
pub struct RouterConfig {
    /// Allowed CORS origins (None = allow any origin)
    pub cors_origins: Option<Vec<String>>,

    /// Cache-Control max-age in seconds
    pub cache_max_age: u32,

    /// Whether to enable request tracing
    pub enable_tracing: bool,
}

impl RouterConfig {
    /// Create a new router configuration.
    ///
    /// By default:
    /// - CORS allows any origin
    /// - Cache max-age is 1 day (86400 seconds)
    /// - Tracing is enabled
    pub fn new() -> Self {
        Self {
            cors_origins: None,
            cache_max_age: DEFAULT_CACHE_MAX_AGE,
            enable_tracing: true,
        }
    }

    /// Set specific allowed CORS origins.
    ///
    /// Pass an empty vec to disallow all cross-origin requests.
    /// Pass None (or don't call this method) to allow any origin.
    pub fn with_cors_origins(mut self, origins: Vec<String>) -> Self {
        self.cors_origins = Some(origins);
        self
    }

    /// Allow any CORS origin.
    pub fn with_cors_any_origin(mut self) -> Self {
        self.cors_origins = None;
        self
    }

    /// Set the Cache-Control max-age in seconds.
    pub fn with_cache_max_age(mut self, seconds: u32) -> Self {
        self.cache_max_age = seconds;
        self
    }

    /// Enable or disable request tracing.
    pub fn with_tracing(mut self, enabled: bool) -> Self {
        self.enable_tracing = enabled;
        self
    }
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// Router Builder
// =============================================================================

/// Create the main application router.
///
/// This function builds the complete Axum router with:
/// - Health and dataset listing routes
/// - The tile API under `/tiles/`
/// - CORS configuration
/// - Request tracing (optional)
pub fn create_router(tile_service: TileService, config: RouterConfig) -> Router {
    create_router_shared(Arc::new(tile_service), config)
}

/// Create the router around a tile service that is also used elsewhere
/// (for example by a reload signal handler).
pub fn create_router_shared(tile_service: Arc<TileService>, config: RouterConfig) -> Router {
    let app_state = AppState::with_cache_max_age(tile_service, config.cache_max_age);
    let cors = build_cors_layer(&config);

    let router = Router::new()
        .route("/health", get(health_handler))
        .route("/datasets", get(datasets_handler))
        .route("/tiles/{*path}", get(tiles_handler))
        .with_state(app_state)
        .layer(cors);

    if config.enable_tracing {
        router.layer(TraceLayer::new_for_http())
    } else {
        router
    }
}

/// Build the CORS layer based on configuration.
fn build_cors_layer(config: &RouterConfig) -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::HEAD, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE, IF_NONE_MATCH])
        .expose_headers([ETAG, CACHE_CONTROL, TILE_CACHE_HIT])
        .max_age(Duration::from_secs(86400)); // 24 hours

    match &config.cors_origins {
        None => cors.allow_origin(Any),
        Some(origins) if origins.is_empty() => {
            // No origins allowed - this effectively disables CORS
            cors
        }
        Some(origins) => {
            let parsed_origins: Vec<_> = origins.iter().filter_map(|o| o.parse().ok()).collect();
            cors.allow_origin(parsed_origins)
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
