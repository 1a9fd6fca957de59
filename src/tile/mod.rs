//! Tile service layer.
//!
//! This module resolves tile requests against the dataset registry and keeps
//! served tiles in a size-bounded cache.
//!
//! # Architecture
//!
//! The tile service sits between the HTTP layer and the dataset registry:
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │              HTTP Handlers              │
//! └────────────────────┬────────────────────┘
//!                      │
//!                      ▼
//! ┌─────────────────────────────────────────┐
//! │              Tile Service               │
//! │  ┌──────────────┐  ┌─────────────────┐  │
//! │  │  TileCache   │  │  resolve_path   │  │
//! │  │  (payload,   │  │  (route, z/x/y, │  │
//! │  │   ETag)      │  │   RegExp)       │  │
//! │  └──────────────┘  └─────────────────┘  │
//! └────────────────────┬────────────────────┘
//!                      │
//!                      ▼
//! ┌─────────────────────────────────────────┐
//! │            RegistryHandle               │
//! └─────────────────────────────────────────┘
//! ```
//!
//! # Components
//!
//! - [`TileService`]: Main entry point for tile requests
//! - [`TileCache`]: LRU cache for tile payloads with size-based eviction
//! - [`TileCacheKey`]: Composite key for tile identification (route, level, column, row)
//! - [`TileTarget`]: What a `/tiles/...` path resolves to
//! - [`probe_registry`]: Sample-tile health check used by `check --probe`
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use bytes::Bytes;
//! use mrf_streamer::tile::{CachedTile, TileCache, TileCacheKey};
//!
//! #[tokio::main]
//! async fn main() {
//!     // Create a cache with 50MB capacity
//!     let cache = TileCache::with_capacity(50 * 1024 * 1024);
//!
//!     let key = TileCacheKey::new("Tif/Gebco", 1, 3, 1, 2);
//!
//!     if cache.get(&key).await.is_none() {
//!         let tile = CachedTile {
//!             data: Bytes::from_static(&[0xFF, 0xD8, 0xFF]),
//!             content_type: "image/jpeg",
//!             etag: Arc::from("\"0\""),
//!         };
//!         cache.put(key.clone(), tile).await;
//!     }
//!
//!     assert!(cache.get(&key).await.is_some());
//! }
//! ```

mod cache;
mod probe;
mod service;

pub use cache::{CacheStats, CachedTile, TileCache, TileCacheKey, DEFAULT_TILE_CACHE_CAPACITY};
pub use probe::{
    probe_dataset, probe_registry, DatasetProbe, ProbeOutcome, ProbeStatus, PROBE_ADDRESSES,
};
pub use service::{
    compute_etag, resolve_path, DatasetMetadata, TileResponse, TileService, TileTarget,
    TILE_SEGMENT,
};
