//! Codec detection for MRF tile payloads.
//!
//! The extension of an MRF data file names its compression:
//!
//! | Extension | Codec                         | Content-Type               |
//! |-----------|-------------------------------|----------------------------|
//! | `.pjg`    | JPEG                          | `image/jpeg`               |
//! | `.ppg`    | PNG                           | `image/png`                |
//! | `.pjp`    | JPEG or PNG, chosen per tile  | sniffed from the payload   |
//! | other     | opaque (deflate, LERC, ...)   | `application/octet-stream` |

use std::path::Path;

use image::ImageFormat;
use serde::Serialize;

use crate::error::StoreError;

/// Extension of MRF index files.
pub const INDEX_EXTENSION: &str = "idx";

/// Extensions of MRF data files.
pub const DATA_EXTENSIONS: &[&str] = &["pjg", "ppg", "pjp", "pzp", "ptf", "lrc"];

const JPEG_MIME: &str = "image/jpeg";
const PNG_MIME: &str = "image/png";
const OPAQUE_MIME: &str = "application/octet-stream";

fn extension_of(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
}

/// Check whether a file name carries the index extension.
pub fn is_index_file(path: &Path) -> bool {
    extension_of(path).is_some_and(|e| e == INDEX_EXTENSION)
}

/// Check whether a file name carries one of the data extensions.
pub fn is_data_file(path: &Path) -> bool {
    extension_of(path).is_some_and(|e| DATA_EXTENSIONS.contains(&e.as_str()))
}

// =============================================================================
// Declared Format
// =============================================================================

/// Codec a dataset declares through its data file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TileFormat {
    /// Every tile is a JPEG stream
    Jpeg,

    /// Every tile is a PNG stream
    Png,

    /// Tiles are JPEG or PNG, chosen per tile by the converter
    Mixed,

    /// Any other compression; served as bytes
    Opaque,
}

impl TileFormat {
    /// Derive the declared format from a data file name.
    pub fn from_data_file(path: &Path) -> Self {
        match extension_of(path).as_deref() {
            Some("pjg") => TileFormat::Jpeg,
            Some("ppg") => TileFormat::Png,
            Some("pjp") => TileFormat::Mixed,
            _ => TileFormat::Opaque,
        }
    }

    /// Get a short name for the format.
    pub const fn name(&self) -> &'static str {
        match self {
            TileFormat::Jpeg => "jpeg",
            TileFormat::Png => "png",
            TileFormat::Mixed => "mixed",
            TileFormat::Opaque => "opaque",
        }
    }

    /// Resolve the `Content-Type` for a payload of this dataset.
    ///
    /// JPEG and PNG datasets must carry the matching signature; mixed
    /// datasets take the type of whichever signature the payload carries.
    /// A payload that contradicts its declaration is reported as corrupt.
    pub fn content_type(&self, payload: &[u8]) -> Result<&'static str, StoreError> {
        let sniffed = sniff_payload(payload);

        match (self, sniffed) {
            (TileFormat::Opaque, _) => Ok(OPAQUE_MIME),
            (TileFormat::Jpeg, Some(PayloadKind::Jpeg)) => Ok(JPEG_MIME),
            (TileFormat::Png, Some(PayloadKind::Png)) => Ok(PNG_MIME),
            (TileFormat::Mixed, Some(kind)) => Ok(kind.content_type()),
            (declared, sniffed) => Err(StoreError::Corrupt(format!(
                "payload of {} bytes is {} but dataset declares {}",
                payload.len(),
                sniffed.map(PayloadKind::name).unwrap_or("unrecognized"),
                declared.name()
            ))),
        }
    }
}

// =============================================================================
// Payload Sniffing
// =============================================================================

/// Container format detected from a payload's leading bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadKind {
    Jpeg,
    Png,
}

impl PayloadKind {
    pub const fn name(self) -> &'static str {
        match self {
            PayloadKind::Jpeg => "jpeg",
            PayloadKind::Png => "png",
        }
    }

    pub const fn content_type(self) -> &'static str {
        match self {
            PayloadKind::Jpeg => JPEG_MIME,
            PayloadKind::Png => PNG_MIME,
        }
    }
}

/// Detect whether a payload is a JPEG or PNG stream from its signature.
pub fn sniff_payload(payload: &[u8]) -> Option<PayloadKind> {
    match image::guess_format(payload) {
        Ok(ImageFormat::Jpeg) => Some(PayloadKind::Jpeg),
        Ok(ImageFormat::Png) => Some(PayloadKind::Png),
        _ => None,
    }
}
