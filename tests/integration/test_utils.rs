//! Test utilities for integration tests.
//!
//! This module builds descriptor/data trees on disk with real JPEG and PNG
//! tile payloads, plus an in-memory range reader that counts its reads.

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, Response};
use axum::Router;
use bytes::Bytes;
use http_body_util::BodyExt;
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::{ExtendedColorType, GrayImage, ImageEncoder, Luma};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tempfile::TempDir;
use tower::ServiceExt;

use mrf_streamer::dataset::{Registry, RegistryConfig, RegistryHandle};
use mrf_streamer::error::IoError;
use mrf_streamer::io::RangeReader;
use mrf_streamer::tile::TileService;
use mrf_streamer::{create_router, RouterConfig};

// =============================================================================
// Tile Payloads
// =============================================================================

/// Create a 64x64 grayscale JPEG whose pixels depend on `seed`.
pub fn create_test_jpeg(seed: u8) -> Vec<u8> {
    let img = GrayImage::from_fn(64, 64, |x, y| Luma([((x + y) as u8).wrapping_add(seed)]));
    let mut buf = Vec::new();
    let mut encoder = JpegEncoder::new_with_quality(&mut buf, 90);
    encoder.encode_image(&img).unwrap();
    buf
}

/// Create a 16x16 grayscale PNG filled with `seed`.
pub fn create_test_png(seed: u8) -> Vec<u8> {
    let pixels = vec![seed; 16 * 16];
    let mut buf = Vec::new();
    PngEncoder::new(&mut buf)
        .write_image(&pixels, 16, 16, ExtendedColorType::L8)
        .unwrap();
    buf
}

pub fn is_valid_jpeg(data: &[u8]) -> bool {
    data.len() >= 4 && data[..2] == [0xFF, 0xD8] && data[data.len() - 2..] == [0xFF, 0xD9]
}

pub fn is_valid_png(data: &[u8]) -> bool {
    data.starts_with(&[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A])
}

// =============================================================================
// Index / Data Pairs
// =============================================================================

/// One index record to write.
#[derive(Debug, Clone)]
pub enum Record {
    /// A stored tile payload
    Tile(Vec<u8>),
    /// Zero-length record (sparse pyramid)
    Empty,
    /// Record pointing far past the end of the data file
    Dangling,
}

/// Serialize records into (data, index) file contents.
pub fn build_pair(records: &[Record]) -> (Vec<u8>, Vec<u8>) {
    let mut data = Vec::new();
    let mut index = Vec::new();
    for record in records {
        let (offset, length) = match record {
            Record::Tile(payload) => {
                let offset = data.len() as u64;
                data.extend_from_slice(payload);
                (offset, payload.len() as u64)
            }
            Record::Empty => (0, 0),
            Record::Dangling => (1 << 40, 128),
        };
        index.extend_from_slice(&offset.to_be_bytes());
        index.extend_from_slice(&length.to_be_bytes());
    }
    if data.is_empty() {
        data.push(0);
    }
    (data, index)
}

// =============================================================================
// Descriptor Trees
// =============================================================================

/// A temporary `webconf/` + `data/` tree.
pub struct TestTree {
    dir: TempDir,
}

impl TestTree {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("webconf")).unwrap();
        fs::create_dir_all(dir.path().join("data")).unwrap();
        Self { dir }
    }

    pub fn webconf(&self) -> PathBuf {
        self.dir.path().join("webconf")
    }

    pub fn data(&self) -> PathBuf {
        self.dir.path().join("data")
    }

    pub fn registry_config(&self) -> RegistryConfig {
        RegistryConfig::new(self.webconf(), self.data())
    }

    /// Write a descriptor at `relative` under the descriptor root.
    pub fn write_descriptor(&self, relative: &str, contents: &str) -> PathBuf {
        let path = self.webconf().join(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, contents).unwrap();
        path
    }

    /// Write `name.{ext}` and `name.idx` into `relative_dir` under the data root.
    pub fn write_pair(&self, relative_dir: &str, name: &str, ext: &str, records: &[Record]) {
        let dir = self.data().join(relative_dir);
        fs::create_dir_all(&dir).unwrap();
        let (data, index) = build_pair(records);
        fs::write(dir.join(format!("{}.{}", name, ext)), data).unwrap();
        fs::write(dir.join(format!("{}.idx", name)), index).unwrap();
    }

    /// JPEG dataset `Tif/Gebco`, served at route `Tif`.
    ///
    /// 2048x1024 pixels in 512x512 tiles, levels 0..=2 (11 records). Level 2
    /// occupies records 0..8 (4x2), level 1 records 8..10 and level 0 record
    /// 10. Record 9 (level 1, column 1) is empty.
    pub fn add_gebco(&self) -> PathBuf {
        let records: Vec<Record> = (0..11u8)
            .map(|i| {
                if i == 9 {
                    Record::Empty
                } else {
                    Record::Tile(create_test_jpeg(i))
                }
            })
            .collect();
        self.write_pair("Tif/Gebco", "Gebco", "pjg", &records);
        self.write_descriptor(
            "Tif/Gebco.webconf",
            "Size 2048 1024 1 2\nPageSize 512 512 1 2\nDataFile Gebco.pjg\nIndexFile Gebco.idx\n",
        )
    }

    /// PNG dataset at the descriptor root, served at route `Shaded`.
    ///
    /// Single 256x256 tile at level 0.
    pub fn add_shaded(&self) -> PathBuf {
        self.write_pair("Shaded", "Shaded", "ppg", &[Record::Tile(create_test_png(7))]);
        self.write_descriptor(
            "Shaded.webconf",
            "Size 256 256 1 0\nPageSize 256 256 1 0\nDataFile Shaded.ppg\nIndexFile Shaded.idx\n",
        )
    }

    /// JPEG dataset `Broken/Broken` whose only record points past the data file.
    pub fn add_broken(&self) -> PathBuf {
        self.write_pair("Broken/Broken", "Broken", "pjg", &[Record::Dangling]);
        self.write_descriptor(
            "Broken/Broken.webconf",
            "Size 512 512 1 0\nPageSize 512 512 1 0\nDataFile Broken.pjg\nIndexFile Broken.idx\n",
        )
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }
}

// =============================================================================
// Service / Router Helpers
// =============================================================================

pub fn build_handle(config: RegistryConfig) -> RegistryHandle {
    let (registry, _) = Registry::build(&config).unwrap();
    RegistryHandle::new(config, registry)
}

pub fn build_service(tree: &TestTree) -> TileService {
    TileService::new(build_handle(tree.registry_config()))
}

pub fn build_router(tree: &TestTree) -> Router {
    create_router(build_service(tree), RouterConfig::new().with_tracing(false))
}

pub async fn get(router: Router, uri: &str) -> Response<Body> {
    let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
    router.oneshot(request).await.unwrap()
}

pub async fn body_bytes(response: Response<Body>) -> Bytes {
    response.into_body().collect().await.unwrap().to_bytes()
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    serde_json::from_slice(&body_bytes(response).await).unwrap()
}

// =============================================================================
// Mock Range Reader with Request Tracking
// =============================================================================

/// An in-memory range reader that counts reads.
#[derive(Clone)]
pub struct TrackingMockReader {
    data: Bytes,
    identifier: String,
    request_count: Arc<AtomicUsize>,
}

impl TrackingMockReader {
    pub fn new(data: Vec<u8>, identifier: impl Into<String>) -> Self {
        Self {
            data: Bytes::from(data),
            identifier: identifier.into(),
            request_count: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn request_count(&self) -> usize {
        self.request_count.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RangeReader for TrackingMockReader {
    async fn read_exact_at(&self, offset: u64, len: usize) -> Result<Bytes, IoError> {
        self.request_count.fetch_add(1, Ordering::SeqCst);
        let start = offset as usize;
        let end = start.checked_add(len).unwrap_or(usize::MAX);
        if end > self.data.len() {
            return Err(IoError::RangeOutOfBounds {
                offset,
                requested: len as u64,
                size: self.data.len() as u64,
            });
        }
        Ok(self.data.slice(start..end))
    }

    fn size(&self) -> u64 {
        self.data.len() as u64
    }

    fn identifier(&self) -> &str {
        &self.identifier
    }
}
