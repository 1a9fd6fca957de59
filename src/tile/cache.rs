//! Tile cache for served tiles.
//!
//! This module provides an LRU cache of tile payloads so hot tiles skip the
//! index lookup and data read entirely.
//!
//! # Cache Key
//!
//! Tiles are cached by a composite key including:
//! - Dataset route
//! - Registry generation, so a reload never serves a replaced dataset's tiles
//! - Zoom level
//! - Tile column
//! - Tile row
//!
//! # Size-Based Eviction
//!
//! The cache tracks the total size of cached tiles in bytes and evicts
//! least-recently-used entries when the capacity is exceeded.

use std::num::NonZeroUsize;
use std::sync::Arc;

use bytes::Bytes;
use lru::LruCache;
use serde::Serialize;
use tokio::sync::RwLock;

/// Default cache capacity: 100MB
pub const DEFAULT_TILE_CACHE_CAPACITY: usize = 100 * 1024 * 1024;

/// Default maximum number of entries (to bound LRU overhead)
const DEFAULT_MAX_ENTRIES: usize = 10_000;

// =============================================================================
// Cache Key and Value
// =============================================================================

/// Cache key for a served tile.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TileCacheKey {
    /// Dataset route prefix
    pub route: Arc<str>,

    /// Generation of the registry that opened the dataset
    pub generation: u64,

    /// Zoom level
    pub level: u32,

    /// Tile column
    pub col: u32,

    /// Tile row
    pub row: u32,
}

impl TileCacheKey {
    /// Create a new cache key.
    pub fn new(
        route: impl Into<Arc<str>>,
        generation: u64,
        level: u32,
        col: u32,
        row: u32,
    ) -> Self {
        Self {
            route: route.into(),
            generation,
            level,
            col,
            row,
        }
    }
}

/// A tile as it is sent to clients.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedTile {
    /// Encoded payload
    pub data: Bytes,

    /// Response `Content-Type`
    pub content_type: &'static str,

    /// Strong entity tag, quoted
    pub etag: Arc<str>,
}

/// Point-in-time cache occupancy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub entries: usize,
    pub size_bytes: usize,
    pub capacity_bytes: usize,
}

// =============================================================================
// Tile Cache
// =============================================================================

/// LRU cache for served tiles with size-based capacity.
///
/// # Thread Safety
///
/// The cache is thread-safe and can be shared across async tasks via `Arc`.
/// Locks are only held for the map operation itself, never across I/O.
///
/// # Example
///
/// ```
/// use mrf_streamer::tile::{CachedTile, TileCache, TileCacheKey};
/// use bytes::Bytes;
///
/// #[tokio::main]
/// async fn main() {
///     let cache = TileCache::new();
///
///     let key = TileCacheKey::new("Tif/Gebco", 1, 0, 0, 0);
///     let tile = CachedTile {
///         data: Bytes::from(vec![0xFF, 0xD8, 0xFF, 0xE0]),
///         content_type: "image/jpeg",
///         etag: "\"abc\"".into(),
///     };
///
///     cache.put(key.clone(), tile.clone()).await;
///     assert_eq!(cache.get(&key).await, Some(tile));
/// }
/// ```
pub struct TileCache {
    /// The underlying LRU cache
    cache: RwLock<LruCache<TileCacheKey, CachedTile>>,

    /// Maximum total size in bytes
    max_size: usize,

    /// Current total size in bytes
    current_size: RwLock<usize>,
}

impl TileCache {
    /// Create a new tile cache with default capacity (100MB).
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_TILE_CACHE_CAPACITY)
    }

    /// Create a new tile cache with the specified capacity in bytes.
    ///
    /// A capacity of zero disables caching.
    pub fn with_capacity(max_size: usize) -> Self {
        Self::with_capacity_and_entries(max_size, DEFAULT_MAX_ENTRIES)
    }

    /// Create a new tile cache with specified capacity and maximum entries.
    ///
    /// # Arguments
    ///
    /// * `max_size` - Maximum total size of cached tiles in bytes
    /// * `max_entries` - Maximum number of entries in the cache
    pub fn with_capacity_and_entries(max_size: usize, max_entries: usize) -> Self {
        let max_entries = NonZeroUsize::new(max_entries).unwrap_or(NonZeroUsize::MIN);
        Self {
            cache: RwLock::new(LruCache::new(max_entries)),
            max_size,
            current_size: RwLock::new(0),
        }
    }

    /// Get a tile from the cache, marking it as recently used.
    pub async fn get(&self, key: &TileCacheKey) -> Option<CachedTile> {
        let mut cache = self.cache.write().await;
        cache.get(key).cloned()
    }

    /// Store a tile in the cache.
    ///
    /// If the cache is over capacity after insertion, least-recently-used
    /// entries are evicted until the cache is within capacity.
    pub async fn put(&self, key: TileCacheKey, tile: CachedTile) {
        let tile_size = tile.data.len();
        if tile_size > self.max_size {
            return;
        }

        let mut cache = self.cache.write().await;
        let mut current_size = self.current_size.write().await;

        // Returns either the replaced value for this key or the entry evicted
        // by the entry limit
        if let Some((_, evicted)) = cache.push(key, tile) {
            *current_size = current_size.saturating_sub(evicted.data.len());
        }
        *current_size += tile_size;

        while *current_size > self.max_size {
            if let Some((_, evicted)) = cache.pop_lru() {
                *current_size = current_size.saturating_sub(evicted.data.len());
            } else {
                break;
            }
        }
    }

    /// Clear all entries from the cache.
    pub async fn clear(&self) {
        let mut cache = self.cache.write().await;
        let mut current_size = self.current_size.write().await;
        cache.clear();
        *current_size = 0;
    }

    /// Get the current number of cached tiles.
    pub async fn len(&self) -> usize {
        let cache = self.cache.read().await;
        cache.len()
    }

    /// Check if the cache is empty.
    pub async fn is_empty(&self) -> bool {
        let cache = self.cache.read().await;
        cache.is_empty()
    }

    /// Get the current total size of cached tiles in bytes.
    pub async fn size(&self) -> usize {
        *self.current_size.read().await
    }

    pub async fn stats(&self) -> CacheStats {
        CacheStats {
            entries: self.len().await,
            size_bytes: self.size().await,
            capacity_bytes: self.max_size,
        }
    }
}

impl Default for TileCache {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// Tests
// =============================================================================
