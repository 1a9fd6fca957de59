//! HTTP server layer for the MRF tile server.
//!
//! This module provides the HTTP API for serving tiles from registered
//! MRF datasets.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                         HTTP Layer                              │
//! │           GET /tiles/{route}/tile/{z}/{x}/{y}                   │
//! │                                                                 │
//! │  ┌──────────────────────────┐  ┌─────────────────────────────┐  │
//! │  │        handlers          │  │          routes             │  │
//! │  │ (tiles, metadata, errors)│  │  (router config, CORS)      │  │
//! │  └──────────────────────────┘  └─────────────────────────────┘  │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

pub mod handlers;
pub mod routes;

pub use handlers::{
    datasets_handler, etag_matches, health_handler, tiles_handler, AppState, DatasetsResponse,
    ErrorResponse, HandlerError, HealthResponse, DEFAULT_CACHE_MAX_AGE, TILE_CACHE_HIT,
};
pub use routes::{create_router, create_router_shared, RouterConfig};
