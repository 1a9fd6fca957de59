//! # MRF Streamer
//!
//! A tile configuration registry and static raster-tile server for MRF
//! (Meta Raster Format) pyramids.
//!
//! This library scans a tree of `.webconf` dataset descriptors, checks that
//! each descriptor's index/data pair exists on disk, and serves tiles over
//! HTTP with positional reads into the data file. Tiles are returned exactly
//! as stored; nothing is decoded or re-encoded.
//!
//! ## Features
//!
//! - **Self-correcting descriptors**: stale absolute paths are stripped and
//!   transposed `DataFile`/`IndexFile` entries are swapped back, then written
//!   to disk
//! - **Fallback lookup**: backing files are found under the nested
//!   `data/<dir>/<name>/` layout or its parent
//! - **Sparse pyramids**: empty index records are plain 404s
//! - **Tile caching**: size-bounded LRU of served tiles with strong ETags
//! - **Hot reload**: the registry is rebuilt off the request path and swapped
//!   in atomically
//! - **Apache output**: `genconf` emits `mod_mrf` `<Directory>` blocks for
//!   the same datasets
//!
//! ## Architecture
//!
//! The library is organized into several modules:
//!
//! - [`io`] - Positional file reads behind the `RangeReader` trait
//! - [`mod@format`] - Data file codecs and payload sniffing
//! - [`dataset`] - Descriptors, pyramid geometry, tile stores and the registry
//! - [`tile`] - Tile service, cache and dataset probe
//! - [`server`] - Axum-based HTTP server and routes
//! - [`apache`] - Apache configuration output
//! - [`config`] - CLI and configuration types
//!
//! ## Example
//!
//! ```rust,no_run
//! use mrf_streamer::{create_router, Registry, RegistryConfig, RegistryHandle, RouterConfig, TileService};
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = RegistryConfig::new("/srv/webconf", "/srv/data");
//!     let (registry, report) = Registry::build(&config).expect("registry");
//!     report.log_summary();
//!
//!     let service = TileService::new(RegistryHandle::new(config, registry));
//!     let router = create_router(service, RouterConfig::new());
//!
//!     let listener = tokio::net::TcpListener::bind("0.0.0.0:3000").await.unwrap();
//!     axum::serve(listener, router).await.unwrap();
//! }
//! ```

pub mod apache;
pub mod config;
pub mod dataset;
pub mod error;
pub mod format;
pub mod io;
pub mod server;
pub mod tile;

// Re-export commonly used types
pub use apache::{render as render_apache_config, ApacheConfig};
pub use config::{CheckConfig, Cli, Command, GenconfConfig, RegistryArgs, ServeConfig};
pub use dataset::{
    BuildReport, DatasetDescriptor, DatasetEntry, Descriptor, LevelInfo, PyramidGeometry,
    Registry, RegistryConfig, RegistryHandle, TileStore,
};
pub use error::{ConfigError, DescriptorError, IoError, StoreError, TileError};
pub use format::TileFormat;
pub use io::{LocalRangeReader, RangeReader};
pub use server::{
    create_router, create_router_shared, health_handler, tiles_handler, AppState, ErrorResponse,
    HealthResponse, RouterConfig,
};
pub use tile::{
    probe_registry, DatasetMetadata, ProbeStatus, TileCache, TileCacheKey, TileResponse,
    TileService, DEFAULT_TILE_CACHE_CAPACITY,
};
