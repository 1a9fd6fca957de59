use std::path::PathBuf;

use thiserror::Error;

/// I/O errors that can occur when reading from a local tile store file
#[derive(Debug, Clone, Error)]
pub enum IoError {
    /// File is missing or cannot be opened
    #[error("File not found: {0}")]
    NotFound(String),

    /// Requested range exceeds file bounds
    #[error("Range out of bounds: requested {requested} bytes at offset {offset}, size is {size}")]
    RangeOutOfBounds {
        offset: u64,
        requested: u64,
        size: u64,
    },

    /// Positional read failed
    #[error("Read error on {path}: {message}")]
    Read { path: String, message: String },
}

/// Fatal errors raised while building the dataset registry.
///
/// Any of these aborts startup (or a reload, leaving the previous registry
/// in place).
#[derive(Debug, Clone, Error)]
pub enum ConfigError {
    /// The descriptor root directory does not exist
    #[error("Descriptor root not found: {}", .0.display())]
    RootNotFound(PathBuf),

    /// The descriptor root exists but could not be traversed
    #[error("Failed to scan descriptor root: {0}")]
    Walk(String),

    /// A configuration value is out of range
    #[error("Invalid configuration: {0}")]
    Invalid(String),

    /// The background build task did not complete
    #[error("Registry build task failed: {0}")]
    Task(String),
}

/// Per-descriptor errors.
///
/// These never abort a registry build: the offending descriptor is logged
/// and skipped, and the scan continues with the rest.
#[derive(Debug, Clone, Error)]
pub enum DescriptorError {
    /// Descriptor file could not be read
    #[error("Failed to read descriptor: {0}")]
    Read(String),

    /// A required directive is absent
    #[error("Missing required directive: {0}")]
    MissingField(&'static str),

    /// A directive is present but its value does not parse
    #[error("Invalid value for {field}: {message}")]
    InvalidField {
        field: &'static str,
        message: String,
    },

    /// The RegExp directive does not compile
    #[error("Invalid RegExp pattern: {0}")]
    InvalidPattern(String),

    /// Data or index file missing at both the nested and the fallback location
    #[error(
        "Backing files not found in {} or {}{hint}",
        expected.display(),
        fallback.display()
    )]
    MissingBackingFiles {
        expected: PathBuf,
        fallback: PathBuf,
        hint: String,
    },

    /// The corrected descriptor could not be written back
    #[error("Failed to rewrite descriptor: {0}")]
    Write(String),

    /// A resolved path cannot be written as a single descriptor token
    #[error("Resolved path contains whitespace: {}", .0.display())]
    UnsupportedPath(PathBuf),

    /// Another directory already serves this route prefix
    #[error("Route prefix '{route}' is already served from {}", existing.display())]
    RouteConflict { route: String, existing: PathBuf },

    /// The index/data pair failed to open
    #[error("Tile store rejected: {0}")]
    Store(#[from] StoreError),
}

/// Errors from a tile store whose files are present but unusable.
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    /// Underlying file I/O failed
    #[error("I/O error: {0}")]
    Io(#[from] IoError),

    /// Index or data file content is inconsistent
    #[error("Corrupt tile store: {0}")]
    Corrupt(String),
}

/// Outcomes of a tile request other than success.
#[derive(Debug, Clone, Error)]
pub enum TileError {
    /// No registered route prefix matches the request path
    #[error("Unknown dataset: {path}")]
    UnknownDataset { path: String },

    /// The z/x/y segments are not non-negative integers
    #[error("Invalid tile coordinates: {message}")]
    InvalidCoordinates { message: String },

    /// The address lies outside the stored pyramid
    #[error("Tile ({level}, {col}, {row}) is outside the pyramid")]
    OutOfRange { level: u32, col: u32, row: u32 },

    /// The index marks the address as empty (sparse pyramid)
    #[error("No tile stored at ({level}, {col}, {row})")]
    TileAbsent { level: u32, col: u32, row: u32 },

    /// The dataset's index/data pair is corrupt or unreadable
    #[error("Tile store error in dataset '{dataset}': {source}")]
    Store { dataset: String, source: StoreError },
}

impl TileError {
    /// Whether this outcome is an expected miss rather than a fault.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            TileError::UnknownDataset { .. }
                | TileError::OutOfRange { .. }
                | TileError::TileAbsent { .. }
        )
    }
}
