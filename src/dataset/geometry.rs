//! Quad-pyramid geometry and MRF index addressing.
//!
//! A pyramid declares its full-resolution size, its tile size and the zoom
//! level of the full-resolution raster (`max_level`). Level `z` is a
//! `2^(max_level - z)` downsample:
//!
//! ```text
//! width(z)   = ceil(width  / 2^(max_level - z))
//! height(z)  = ceil(height / 2^(max_level - z))
//! tiles_x(z) = ceil(width(z)  / tile_width)
//! tiles_y(z) = ceil(height(z) / tile_height)
//! ```
//!
//! The index stores one 16-byte record per tile, full resolution first, then
//! each coarser level down to `skipped_levels`, row-major within a level.
//! The record offset of any address is therefore computed without reading
//! the index.

use serde::Serialize;

use super::descriptor::DatasetDescriptor;
use crate::error::DescriptorError;

// =============================================================================
// Constants
// =============================================================================

/// Size of one index record: big-endian u64 offset + big-endian u64 length.
pub const INDEX_RECORD_SIZE: u64 = 16;

/// Deepest zoom level accepted in a descriptor.
pub const MAX_ZOOM_LEVEL: u32 = 30;

// =============================================================================
// LevelInfo
// =============================================================================

/// One stored level of the pyramid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LevelInfo {
    /// Zoom level (higher is finer)
    pub level: u32,

    /// Level width in pixels
    pub width: u64,

    /// Level height in pixels
    pub height: u64,

    /// Number of tile columns
    pub tiles_x: u64,

    /// Number of tile rows
    pub tiles_y: u64,

    /// Index of this level's first record in the index file
    #[serde(skip)]
    pub first_record: u64,
}

impl LevelInfo {
    /// Total number of tiles at this level.
    pub fn tile_count(&self) -> u64 {
        self.tiles_x.saturating_mul(self.tiles_y)
    }

    /// Record number of a tile, or `None` when outside the level.
    pub fn record(&self, col: u32, row: u32) -> Option<u64> {
        let (col, row) = (u64::from(col), u64::from(row));
        if col >= self.tiles_x || row >= self.tiles_y {
            return None;
        }
        row.checked_mul(self.tiles_x)
            .and_then(|offset| offset.checked_add(col))
            .and_then(|offset| offset.checked_add(self.first_record))
    }
}

// =============================================================================
// PyramidGeometry
// =============================================================================

/// Declared geometry of a tile pyramid plus the per-level offset table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PyramidGeometry {
    width: u32,
    height: u32,
    tile_width: u32,
    tile_height: u32,
    max_level: u32,
    skipped_levels: u32,

    /// Stored levels, finest first
    levels: Vec<LevelInfo>,
}

impl PyramidGeometry {
    /// Build the geometry and its offset table.
    ///
    /// When `max_level` is `None` it is derived as the number of halvings
    /// needed for the whole raster to fit in one tile.
    pub fn new(
        width: u32,
        height: u32,
        tile_width: u32,
        tile_height: u32,
        max_level: Option<u32>,
        skipped_levels: u32,
    ) -> Result<Self, DescriptorError> {
        if width == 0 || height == 0 {
            return Err(invalid("Size", "width and height must be positive"));
        }
        if tile_width == 0 || tile_height == 0 {
            return Err(invalid("PageSize", "tile width and height must be positive"));
        }

        let max_level =
            max_level.unwrap_or_else(|| derive_max_level(width, height, tile_width, tile_height));
        if max_level > MAX_ZOOM_LEVEL {
            return Err(invalid(
                "Size",
                format!("max level {} exceeds {}", max_level, MAX_ZOOM_LEVEL),
            ));
        }
        if skipped_levels > max_level {
            return Err(invalid(
                "SkippedLevels",
                format!("{} exceeds max level {}", skipped_levels, max_level),
            ));
        }

        let mut levels = Vec::with_capacity((max_level - skipped_levels + 1) as usize);
        let mut first_record = 0u64;
        for level in (skipped_levels..=max_level).rev() {
            let shift = max_level - level;
            let level_width = u64::from(width).div_ceil(1 << shift);
            let level_height = u64::from(height).div_ceil(1 << shift);
            let info = LevelInfo {
                level,
                width: level_width,
                height: level_height,
                tiles_x: level_width.div_ceil(u64::from(tile_width)),
                tiles_y: level_height.div_ceil(u64::from(tile_height)),
                first_record,
            };
            first_record = first_record.saturating_add(info.tile_count());
            levels.push(info);
        }

        Ok(Self {
            width,
            height,
            tile_width,
            tile_height,
            max_level,
            skipped_levels,
            levels,
        })
    }

    /// Build the geometry declared by a validated descriptor.
    pub fn from_descriptor(descriptor: &DatasetDescriptor) -> Result<Self, DescriptorError> {
        Self::new(
            descriptor.width,
            descriptor.height,
            descriptor.tile_width,
            descriptor.tile_height,
            descriptor.max_level,
            descriptor.skipped_levels,
        )
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn tile_size(&self) -> (u32, u32) {
        (self.tile_width, self.tile_height)
    }

    pub fn max_level(&self) -> u32 {
        self.max_level
    }

    pub fn skipped_levels(&self) -> u32 {
        self.skipped_levels
    }

    /// Stored levels, finest first.
    pub fn levels(&self) -> &[LevelInfo] {
        &self.levels
    }

    /// Look up a stored level.
    pub fn level(&self, level: u32) -> Option<&LevelInfo> {
        if level < self.skipped_levels || level > self.max_level {
            return None;
        }
        self.levels.get((self.max_level - level) as usize)
    }

    /// Total number of records a complete index holds.
    pub fn record_count(&self) -> u64 {
        self.levels
            .iter()
            .fold(0u64, |total, level| total.saturating_add(level.tile_count()))
    }

    /// Byte offset of an address's record in the index file, or `None` when
    /// the address is outside the pyramid.
    pub fn index_offset(&self, level: u32, col: u32, row: u32) -> Option<u64> {
        self.level(level)?
            .record(col, row)
            .and_then(|record| record.checked_mul(INDEX_RECORD_SIZE))
    }
}

fn derive_max_level(width: u32, height: u32, tile_width: u32, tile_height: u32) -> u32 {
    let mut level = 0;
    let (mut w, mut h) = (u64::from(width), u64::from(height));
    while (w > u64::from(tile_width) || h > u64::from(tile_height)) && level < MAX_ZOOM_LEVEL {
        w = w.div_ceil(2);
        h = h.div_ceil(2);
        level += 1;
    }
    level
}

fn invalid(field: &'static str, message: impl Into<String>) -> DescriptorError {
    DescriptorError::InvalidField {
        field,
        message: message.into(),
    }
}
