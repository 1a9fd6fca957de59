//! Dataset layer: descriptors, pyramid geometry, tile stores and the registry.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │            RegistryHandle               │
//! │   (current snapshot, swap on reload)    │
//! └────────────────────┬────────────────────┘
//!                      │
//!                      ▼
//! ┌─────────────────────────────────────────┐
//! │               Registry                  │
//! │  (route prefix → DatasetEntry, built    │
//! │   from a descriptor tree)               │
//! └────────────────────┬────────────────────┘
//!                      │
//!          ┌───────────┴───────────┐
//!          ▼                       ▼
//! ┌─────────────────┐    ┌─────────────────────┐
//! │   Descriptor    │    │     TileStore       │
//! │ (.webconf text, │    │ (index + data pair, │
//! │  file resolve)  │    │  PyramidGeometry)   │
//! └─────────────────┘    └─────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use mrf_streamer::dataset::{Registry, RegistryConfig};
//!
//! let config = RegistryConfig::new("/srv/webconf", "/srv/data");
//! let (registry, report) = Registry::build(&config)?;
//! report.log_summary();
//!
//! if let Some((entry, rest)) = registry.route("Tif/Gebco/tile/0/0/0") {
//!     let tile = entry.store.read_tile(0, 0, 0).await?;
//! }
//! ```

mod descriptor;
mod geometry;
mod registry;
mod resolve;
mod store;

pub use descriptor::{DatasetDescriptor, Descriptor, FileNames, DEFAULT_PAGE_SIZE};
pub use geometry::{LevelInfo, PyramidGeometry, INDEX_RECORD_SIZE, MAX_ZOOM_LEVEL};
pub use registry::{
    BuildReport, DatasetEntry, Registry, RegistryConfig, RegistryHandle, SkippedDescriptor,
    DEFAULT_DESCRIPTOR_EXTENSION, TILES_PATH,
};
pub use resolve::{correct_transposition, is_transposed, resolve, Resolution};
pub use store::{StoredTile, TileRecord, TileStore, MAX_TILE_BYTES};
