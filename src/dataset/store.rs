//! Reading tiles from an MRF index/data pair.
//!
//! A read is two positional reads: the 16-byte index record at the offset
//! the geometry computes, then the payload range that record points at.
//! Nothing is loaded up front, so opening a store costs two `stat` calls.

use std::path::Path;

use bytes::Bytes;
use tracing::debug;

use super::geometry::{PyramidGeometry, INDEX_RECORD_SIZE};
use crate::error::{StoreError, TileError};
use crate::format::TileFormat;
use crate::io::{read_u64_be, LocalRangeReader, RangeReader};

/// Largest payload a single index record may declare.
pub const MAX_TILE_BYTES: u64 = 64 * 1024 * 1024;

/// Encoded tile payload with its response content type.
#[derive(Debug, Clone)]
pub struct StoredTile {
    pub data: Bytes,
    pub content_type: &'static str,
}

/// Location of a payload in the data file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileRecord {
    pub offset: u64,
    pub length: u64,
}

impl TileRecord {
    fn parse(bytes: &[u8]) -> Result<Self, StoreError> {
        if bytes.len() != INDEX_RECORD_SIZE as usize {
            return Err(StoreError::Corrupt(format!(
                "index record is {} bytes, expected {}",
                bytes.len(),
                INDEX_RECORD_SIZE
            )));
        }
        Ok(Self {
            offset: read_u64_be(&bytes[0..8]),
            length: read_u64_be(&bytes[8..16]),
        })
    }
}

/// An opened tile pyramid.
///
/// Generic over the reader so tests can run against in-memory data; the
/// server uses [`LocalRangeReader`]. Readers are shared handles, so any
/// number of concurrent reads may run against one store.
pub struct TileStore<R: RangeReader = LocalRangeReader> {
    name: String,
    geometry: PyramidGeometry,
    format: TileFormat,
    index: R,
    data: R,
}

impl TileStore<LocalRangeReader> {
    /// Open a store from files on disk.
    pub fn open_files(
        name: impl Into<String>,
        geometry: PyramidGeometry,
        data_file: &Path,
        index_file: &Path,
    ) -> Result<Self, StoreError> {
        let format = TileFormat::from_data_file(data_file);
        let index = LocalRangeReader::open(index_file)?;
        let data = LocalRangeReader::open(data_file)?;
        Self::open(name, geometry, format, index, data)
    }
}

impl<R: RangeReader> TileStore<R> {
    /// Wrap an index/data reader pair.
    ///
    /// The index must hold a whole number of records and the data file must
    /// not be empty. A short index is accepted; records past its end read as
    /// absent tiles.
    pub fn open(
        name: impl Into<String>,
        geometry: PyramidGeometry,
        format: TileFormat,
        index: R,
        data: R,
    ) -> Result<Self, StoreError> {
        if index.size() == 0 || index.size() % INDEX_RECORD_SIZE != 0 {
            return Err(StoreError::Corrupt(format!(
                "index {} is {} bytes, not a multiple of {}",
                index.identifier(),
                index.size(),
                INDEX_RECORD_SIZE
            )));
        }
        if data.size() == 0 {
            return Err(StoreError::Corrupt(format!(
                "data file {} is empty",
                data.identifier()
            )));
        }

        let name = name.into();
        if index.size() / INDEX_RECORD_SIZE < geometry.record_count() {
            debug!(
                dataset = %name,
                records = index.size() / INDEX_RECORD_SIZE,
                expected = geometry.record_count(),
                "Index is shorter than the pyramid, trailing tiles are absent"
            );
        }

        Ok(Self {
            name,
            geometry,
            format,
            index,
            data,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn geometry(&self) -> &PyramidGeometry {
        &self.geometry
    }

    pub fn format(&self) -> TileFormat {
        self.format
    }

    /// Look up the index record of an address.
    ///
    /// Returns `Ok(None)` when the address has no stored tile.
    pub async fn locate(
        &self,
        level: u32,
        col: u32,
        row: u32,
    ) -> Result<Option<TileRecord>, TileError> {
        let offset = self
            .geometry
            .index_offset(level, col, row)
            .ok_or(TileError::OutOfRange { level, col, row })?;

        if offset.saturating_add(INDEX_RECORD_SIZE) > self.index.size() {
            return Ok(None);
        }

        let bytes = self
            .index
            .read_exact_at(offset, INDEX_RECORD_SIZE as usize)
            .await
            .map_err(|e| self.store_error(e.into()))?;
        let record = TileRecord::parse(&bytes).map_err(|e| self.store_error(e))?;

        if record.length == 0 {
            return Ok(None);
        }
        Ok(Some(record))
    }

    /// Read the raw payload of a tile.
    pub async fn read(&self, level: u32, col: u32, row: u32) -> Result<Bytes, TileError> {
        let record = self
            .locate(level, col, row)
            .await?
            .ok_or(TileError::TileAbsent { level, col, row })?;

        if record.length > MAX_TILE_BYTES {
            return Err(self.store_error(StoreError::Corrupt(format!(
                "record ({}, {}, {}) declares {} bytes",
                level, col, row, record.length
            ))));
        }
        let in_bounds = record
            .offset
            .checked_add(record.length)
            .is_some_and(|end| end <= self.data.size());
        if !in_bounds {
            return Err(self.store_error(StoreError::Corrupt(format!(
                "record ({}, {}, {}) points past the end of the data file",
                level, col, row
            ))));
        }

        self.data
            .read_exact_at(record.offset, record.length as usize)
            .await
            .map_err(|e| self.store_error(e.into()))
    }

    /// Read a tile and resolve its content type.
    pub async fn read_tile(
        &self,
        level: u32,
        col: u32,
        row: u32,
    ) -> Result<StoredTile, TileError> {
        let data = self.read(level, col, row).await?;
        let content_type = self
            .format
            .content_type(&data)
            .map_err(|e| self.store_error(e))?;

        Ok(StoredTile { data, content_type })
    }

    fn store_error(&self, source: StoreError) -> TileError {
        TileError::Store {
            dataset: self.name.clone(),
            source,
        }
    }
}
