//! Tile Service for resolving and serving tile requests.
//!
//! The TileService is the main entry point for tile requests. It orchestrates:
//! - Route lookup against the current registry snapshot
//! - Coordinate parsing
//! - Cache lookups
//! - Store reads and content-type resolution
//! - Result caching
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                         TileService                             │
//! │  ┌─────────────────────────────────────────────────────────┐    │
//! │  │                    get_tile()                           │    │
//! │  │  1. Match route       4. Read index record + payload    │    │
//! │  │  2. Parse z/x/y       5. Resolve content type, ETag     │    │
//! │  │  3. Check cache       6. Cache & return                 │    │
//! │  └─────────────────────────────────────────────────────────┘    │
//! │           │                    │                                │
//! │           ▼                    ▼                                │
//! │    ┌───────────┐      ┌────────────────┐                        │
//! │    │ TileCache │      │ RegistryHandle │                        │
//! │    └───────────┘      └────────────────┘                        │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

use std::sync::Arc;

use bytes::Bytes;
use serde::Serialize;
use sha2::{Digest, Sha256};
use tracing::info;

use crate::dataset::{BuildReport, DatasetEntry, LevelInfo, Registry, RegistryHandle, TILES_PATH};
use crate::error::{ConfigError, TileError};
use crate::format::TileFormat;

use super::cache::{CacheStats, CachedTile, TileCache, TileCacheKey};

/// Path segment separating a route prefix from tile coordinates.
pub const TILE_SEGMENT: &str = "tile";

// =============================================================================
// Request Resolution
// =============================================================================

/// What a path under `/tiles/` refers to.
#[derive(Debug, Clone)]
pub enum TileTarget {
    /// `/tiles/{route}/`: the dataset itself
    Dataset(Arc<DatasetEntry>),

    /// `/tiles/{route}/tile/{z}/{x}/{y}`
    Tile {
        entry: Arc<DatasetEntry>,
        level: u32,
        col: u32,
        row: u32,
    },
}

/// Resolve a path (the part after `/tiles/`) against a registry.
///
/// The route prefix is matched first, so an unknown dataset is reported as
/// such even when its coordinates are malformed.
pub fn resolve_path(registry: &Registry, path: &str) -> Result<TileTarget, TileError> {
    let unknown = || TileError::UnknownDataset {
        path: format!("{}/{}", TILES_PATH, path.trim_start_matches('/')),
    };

    let (entry, rest) = registry.route(path).ok_or_else(unknown)?;
    let entry = Arc::clone(entry);

    if rest.is_empty() {
        return Ok(TileTarget::Dataset(entry));
    }

    let mut segments = rest.split('/');
    if segments.next() != Some(TILE_SEGMENT) {
        return Err(unknown());
    }

    let coordinates: Vec<&str> = segments.collect();
    let [z, x, y] = coordinates.as_slice() else {
        return Err(TileError::InvalidCoordinates {
            message: format!(
                "expected {}/{{z}}/{{x}}/{{y}}, got {} segment(s) after '{}'",
                TILE_SEGMENT,
                coordinates.len(),
                TILE_SEGMENT
            ),
        });
    };

    let level = parse_coordinate("z", z)?;
    let col = parse_coordinate("x", x)?;
    let row = parse_coordinate("y", y)?;

    if !entry.accepts(&entry.tile_path(level, col, row)) {
        return Err(unknown());
    }

    Ok(TileTarget::Tile {
        entry,
        level,
        col,
        row,
    })
}

fn parse_coordinate(name: &str, value: &str) -> Result<u32, TileError> {
    // u32::from_str accepts a leading '+'
    if value.is_empty() || !value.bytes().all(|b| b.is_ascii_digit()) {
        return Err(TileError::InvalidCoordinates {
            message: format!("{} must be a non-negative integer, got '{}'", name, value),
        });
    }
    value.parse().map_err(|_| TileError::InvalidCoordinates {
        message: format!("{} is out of range: '{}'", name, value),
    })
}

/// Strong entity tag of a payload: truncated SHA-256, quoted.
pub fn compute_etag(data: &[u8]) -> String {
    let digest = Sha256::digest(data);
    format!("\"{}\"", hex::encode(&digest[..16]))
}

// =============================================================================
// Tile Response
// =============================================================================

/// Response from the tile service.
#[derive(Debug, Clone)]
pub struct TileResponse {
    /// The encoded tile data
    pub data: Bytes,

    /// `Content-Type` of the payload
    pub content_type: &'static str,

    /// Strong entity tag, quoted
    pub etag: Arc<str>,

    /// Whether this tile was served from cache
    pub cache_hit: bool,
}

// =============================================================================
// Dataset Metadata
// =============================================================================

/// Public description of a dataset. Never includes file-system paths.
#[derive(Debug, Clone, Serialize)]
pub struct DatasetMetadata {
    pub route: String,
    pub format: TileFormat,
    pub width: u32,
    pub height: u32,
    pub bands: u32,
    pub tile_width: u32,
    pub tile_height: u32,
    pub max_level: u32,
    pub skipped_levels: u32,
    pub tile_url: String,
    pub levels: Vec<LevelInfo>,
}

impl DatasetMetadata {
    pub fn from_entry(entry: &DatasetEntry) -> Self {
        let geometry = entry.geometry();
        let (tile_width, tile_height) = geometry.tile_size();
        Self {
            route: entry.route.clone(),
            format: entry.format(),
            width: geometry.width(),
            height: geometry.height(),
            bands: entry.descriptor.bands,
            tile_width,
            tile_height,
            max_level: geometry.max_level(),
            skipped_levels: geometry.skipped_levels(),
            tile_url: format!("{}/{}/tile/{{z}}/{{x}}/{{y}}", TILES_PATH, entry.route),
            levels: geometry.levels().to_vec(),
        }
    }
}

// =============================================================================
// Tile Service
// =============================================================================

/// Service for resolving and caching tiles.
///
/// # Example
///
/// ```ignore
/// use mrf_streamer::dataset::{Registry, RegistryConfig, RegistryHandle};
/// use mrf_streamer::tile::TileService;
///
/// let config = RegistryConfig::new("/srv/webconf", "/srv/data");
/// let (registry, _) = Registry::build(&config)?;
/// let service = TileService::new(RegistryHandle::new(config, registry));
///
/// let response = service.get_tile("Tif/Gebco/tile/0/0/0").await?;
/// println!("{} bytes of {}", response.data.len(), response.content_type);
/// ```
pub struct TileService {
    /// Current dataset registry
    registry: Arc<RegistryHandle>,

    /// Cache for served tiles
    cache: TileCache,
}

impl TileService {
    /// Create a new tile service with default cache settings.
    pub fn new(registry: RegistryHandle) -> Self {
        Self::with_shared_registry(Arc::new(registry), TileCache::new())
    }

    /// Create a tile service over a shared registry handle.
    pub fn with_shared_registry(registry: Arc<RegistryHandle>, cache: TileCache) -> Self {
        Self { registry, cache }
    }

    /// Resolve a path under `/tiles/` against the current registry.
    pub async fn resolve(&self, path: &str) -> Result<TileTarget, TileError> {
        let registry = self.registry.snapshot().await;
        resolve_path(&registry, path)
    }

    /// Serve a tile path, using cache when available.
    ///
    /// # Errors
    ///
    /// - `UnknownDataset` if no route matches or the entry's `RegExp` declines
    /// - `InvalidCoordinates` if z/x/y do not parse
    /// - `OutOfRange` / `TileAbsent` for addresses with no tile
    /// - `Store` if the index/data pair is corrupt or unreadable
    pub async fn get_tile(&self, path: &str) -> Result<TileResponse, TileError> {
        match self.resolve(path).await? {
            TileTarget::Tile {
                entry,
                level,
                col,
                row,
            } => self.read_tile(&entry, level, col, row).await,
            TileTarget::Dataset(_) => Err(TileError::InvalidCoordinates {
                message: "missing tile coordinates".to_string(),
            }),
        }
    }

    /// Read one tile of a resolved dataset through the cache.
    pub async fn read_tile(
        &self,
        entry: &DatasetEntry,
        level: u32,
        col: u32,
        row: u32,
    ) -> Result<TileResponse, TileError> {
        let cache_key =
            TileCacheKey::new(entry.route.as_str(), entry.generation, level, col, row);

        if let Some(cached) = self.cache.get(&cache_key).await {
            return Ok(TileResponse {
                data: cached.data,
                content_type: cached.content_type,
                etag: cached.etag,
                cache_hit: true,
            });
        }

        let stored = entry.store.read_tile(level, col, row).await?;
        let etag: Arc<str> = Arc::from(compute_etag(&stored.data));

        self.cache
            .put(
                cache_key,
                CachedTile {
                    data: stored.data.clone(),
                    content_type: stored.content_type,
                    etag: Arc::clone(&etag),
                },
            )
            .await;

        Ok(TileResponse {
            data: stored.data,
            content_type: stored.content_type,
            etag,
            cache_hit: false,
        })
    }

    /// Metadata of every registered dataset, in route order.
    pub async fn datasets(&self) -> Vec<DatasetMetadata> {
        let registry = self.registry.snapshot().await;
        registry
            .entries()
            .map(|entry| DatasetMetadata::from_entry(entry))
            .collect()
    }

    /// Number of registered datasets.
    pub async fn dataset_count(&self) -> usize {
        self.registry.snapshot().await.len()
    }

    /// Rebuild the registry and drop every cached tile.
    ///
    /// Requests still holding the previous snapshot may cache tiles after the
    /// clear; those keys carry the old generation and are never hit again.
    /// On error the current registry and cache are kept.
    pub async fn reload(&self) -> Result<BuildReport, ConfigError> {
        let report = self.registry.reload().await?;
        self.cache.clear().await;
        info!(datasets = report.registered.len(), "Registry reloaded");
        Ok(report)
    }

    /// Get tile cache statistics.
    pub async fn cache_stats(&self) -> CacheStats {
        self.cache.stats().await
    }

    /// Get a reference to the underlying registry handle.
    pub fn registry(&self) -> &Arc<RegistryHandle> {
        &self.registry
    }
}

// =============================================================================
// Tests
// =============================================================================
