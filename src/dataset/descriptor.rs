//! Dataset descriptor files.
//!
//! A descriptor (`.webconf`) is a plain-text file with one directive per
//! line:
//!
//! ```text
//! RegExp ^/tiles/Tif/Gebco/tile/
//! Size 86400 43200 1 8
//! PageSize 512 512 1 8
//! DataFile /data/Tif/Gebco/Gebco.pjg
//! IndexFile /data/Tif/Gebco/Gebco.idx
//! SkippedLevels 0
//! ```
//!
//! [`Descriptor`] keeps the file line by line so that a rewrite only touches
//! the `DataFile` and `IndexFile` lines; comments and directives this server
//! does not interpret survive untouched. [`DatasetDescriptor`] is the typed,
//! validated view used for serving.

use std::path::{Path, PathBuf};

use crate::error::DescriptorError;

pub const REGEXP: &str = "RegExp";
pub const SIZE: &str = "Size";
pub const PAGE_SIZE: &str = "PageSize";
pub const DATA_FILE: &str = "DataFile";
pub const INDEX_FILE: &str = "IndexFile";
pub const SKIPPED_LEVELS: &str = "SkippedLevels";

/// Tile edge used when a descriptor has no `PageSize` line.
pub const DEFAULT_PAGE_SIZE: u32 = 512;

// =============================================================================
// Raw Descriptor
// =============================================================================

/// A descriptor file as text, directive lines addressable by key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Descriptor {
    lines: Vec<String>,
    trailing_newline: bool,
}

impl Descriptor {
    /// Parse descriptor text. Parsing never fails; missing or malformed
    /// directives are reported by the accessors that need them.
    pub fn parse(text: &str) -> Self {
        Self {
            lines: text.lines().map(str::to_string).collect(),
            trailing_newline: text.ends_with('\n'),
        }
    }

    /// Read and parse a descriptor file.
    pub fn load(path: &Path) -> Result<Self, DescriptorError> {
        std::fs::read_to_string(path)
            .map(|text| Self::parse(&text))
            .map_err(|e| DescriptorError::Read(format!("{}: {}", path.display(), e)))
    }

    /// Render the descriptor back to text.
    pub fn render(&self) -> String {
        let mut text = self.lines.join("\n");
        if self.trailing_newline {
            text.push('\n');
        }
        text
    }

    /// Value of the first line whose key matches (case-insensitive),
    /// everything after the key, trimmed.
    pub fn directive(&self, key: &str) -> Option<&str> {
        self.position(key).map(|i| {
            let line = self.lines[i].trim();
            line[line.find(char::is_whitespace).unwrap_or(line.len())..].trim()
        })
    }

    /// Second whitespace-delimited token of a directive line.
    pub fn token(&self, key: &str) -> Option<&str> {
        self.directive(key)
            .and_then(|value| value.split_whitespace().next())
    }

    fn position(&self, key: &str) -> Option<usize> {
        self.lines.iter().position(|line| {
            let line = line.trim();
            !line.starts_with('#')
                && line
                    .split_whitespace()
                    .next()
                    .is_some_and(|k| k.eq_ignore_ascii_case(key))
        })
    }

    /// Replace the first line for `key` with `key value`, appending the line
    /// if the directive is absent.
    pub fn set_directive(&mut self, key: &str, value: &str) {
        let line = format!("{} {}", key, value);
        match self.position(key) {
            Some(i) => self.lines[i] = line,
            None => {
                self.lines.push(line);
                self.trailing_newline = true;
            }
        }
    }

    /// Copy of this descriptor pointing at the given data and index files.
    pub fn with_paths(&self, data_file: &Path, index_file: &Path) -> Self {
        let mut normalized = self.clone();
        normalized.set_directive(DATA_FILE, &data_file.display().to_string());
        normalized.set_directive(INDEX_FILE, &index_file.display().to_string());
        normalized
    }

    /// File names referenced by `DataFile` and `IndexFile`, directory
    /// components stripped.
    pub fn file_names(&self) -> Result<FileNames, DescriptorError> {
        let data = self
            .token(DATA_FILE)
            .ok_or(DescriptorError::MissingField(DATA_FILE))?;
        let index = self
            .token(INDEX_FILE)
            .ok_or(DescriptorError::MissingField(INDEX_FILE))?;

        Ok(FileNames {
            data: base_name(DATA_FILE, data)?,
            index: base_name(INDEX_FILE, index)?,
        })
    }

    /// Validate the geometry directives and combine them with resolved file
    /// paths into a typed descriptor.
    pub fn validate(
        &self,
        data_file: PathBuf,
        index_file: PathBuf,
    ) -> Result<DatasetDescriptor, DescriptorError> {
        let size = self
            .directive(SIZE)
            .ok_or(DescriptorError::MissingField(SIZE))?;
        let size = parse_numbers(SIZE, size)?;
        if size.len() < 2 {
            return Err(DescriptorError::InvalidField {
                field: SIZE,
                message: "expected at least width and height".to_string(),
            });
        }

        let (tile_width, tile_height) = match self.directive(PAGE_SIZE) {
            Some(value) => {
                let page = parse_numbers(PAGE_SIZE, value)?;
                if page.len() < 2 {
                    return Err(DescriptorError::InvalidField {
                        field: PAGE_SIZE,
                        message: "expected tile width and height".to_string(),
                    });
                }
                (page[0], page[1])
            }
            None => (DEFAULT_PAGE_SIZE, DEFAULT_PAGE_SIZE),
        };

        let skipped_levels = match self.token(SKIPPED_LEVELS) {
            Some(value) => parse_number(SKIPPED_LEVELS, value)?,
            None => 0,
        };

        Ok(DatasetDescriptor {
            pattern: self.directive(REGEXP).map(str::to_string),
            width: size[0],
            height: size[1],
            bands: size.get(2).copied().unwrap_or(1),
            max_level: size.get(3).copied(),
            tile_width,
            tile_height,
            skipped_levels,
            data_file,
            index_file,
        })
    }
}

/// Base names of a descriptor's data and index files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileNames {
    pub data: PathBuf,
    pub index: PathBuf,
}

fn base_name(field: &'static str, value: &str) -> Result<PathBuf, DescriptorError> {
    Path::new(value)
        .file_name()
        .map(PathBuf::from)
        .ok_or_else(|| DescriptorError::InvalidField {
            field,
            message: format!("'{}' has no file name", value),
        })
}

fn parse_number(field: &'static str, value: &str) -> Result<u32, DescriptorError> {
    value
        .parse()
        .map_err(|e| DescriptorError::InvalidField {
            field,
            message: format!("'{}': {}", value, e),
        })
}

fn parse_numbers(field: &'static str, value: &str) -> Result<Vec<u32>, DescriptorError> {
    value
        .split_whitespace()
        .map(|token| parse_number(field, token))
        .collect()
}

// =============================================================================
// Validated Descriptor
// =============================================================================

/// Typed, validated descriptor of one served dataset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatasetDescriptor {
    /// URL pattern from `RegExp`, if declared
    pub pattern: Option<String>,

    /// Full-resolution raster width in pixels
    pub width: u32,

    /// Full-resolution raster height in pixels
    pub height: u32,

    /// Band count
    pub bands: u32,

    /// Zoom level of the full-resolution raster, if declared
    pub max_level: Option<u32>,

    /// Tile width in pixels
    pub tile_width: u32,

    /// Tile height in pixels
    pub tile_height: u32,

    /// Lowest stored zoom level
    pub skipped_levels: u32,

    /// Absolute path to the data file
    pub data_file: PathBuf,

    /// Absolute path to the index file
    pub index_file: PathBuf,
}
