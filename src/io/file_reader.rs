use std::fs::File;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;

use super::RangeReader;
use crate::error::IoError;

/// Local-file implementation of RangeReader.
///
/// The file is opened once and its size captured on creation. Reads are
/// positional (`pread` on Unix, `seek_read` on Windows) and run on tokio's
/// blocking pool, so clones of one reader can be used from any number of
/// tasks at once.
#[derive(Clone)]
pub struct LocalRangeReader {
    file: Arc<File>,
    size: u64,
    identifier: String,
}

impl LocalRangeReader {
    /// Open a file for positional reads.
    ///
    /// Returns `IoError::NotFound` if the file does not exist.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, IoError> {
        let path = path.as_ref();
        let identifier = path.display().to_string();

        let file = File::open(path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => IoError::NotFound(identifier.clone()),
            _ => IoError::Read {
                path: identifier.clone(),
                message: e.to_string(),
            },
        })?;

        let metadata = file.metadata().map_err(|e| IoError::Read {
            path: identifier.clone(),
            message: e.to_string(),
        })?;

        if !metadata.is_file() {
            return Err(IoError::Read {
                path: identifier,
                message: "not a regular file".to_string(),
            });
        }

        Ok(Self {
            file: Arc::new(file),
            size: metadata.len(),
            identifier,
        })
    }
}

#[async_trait]
impl RangeReader for LocalRangeReader {
    async fn read_exact_at(&self, offset: u64, len: usize) -> Result<Bytes, IoError> {
        let out_of_bounds = || IoError::RangeOutOfBounds {
            offset,
            requested: len as u64,
            size: self.size,
        };

        let end = offset.checked_add(len as u64).ok_or_else(out_of_bounds)?;
        if end > self.size {
            return Err(out_of_bounds());
        }

        if len == 0 {
            return Ok(Bytes::new());
        }

        let file = Arc::clone(&self.file);
        let path = self.identifier.clone();

        tokio::task::spawn_blocking(move || {
            let mut buf = vec![0u8; len];
            read_exact_at(&file, &mut buf, offset).map_err(|e| IoError::Read {
                path,
                message: e.to_string(),
            })?;
            Ok(Bytes::from(buf))
        })
        .await
        .map_err(|e| IoError::Read {
            path: self.identifier.clone(),
            message: format!("read task failed: {}", e),
        })?
    }

    fn size(&self) -> u64 {
        self.size
    }

    fn identifier(&self) -> &str {
        &self.identifier
    }
}

#[cfg(unix)]
fn read_exact_at(file: &File, buf: &mut [u8], offset: u64) -> std::io::Result<()> {
    use std::os::unix::fs::FileExt;
    file.read_exact_at(buf, offset)
}

#[cfg(windows)]
fn read_exact_at(file: &File, mut buf: &mut [u8], mut offset: u64) -> std::io::Result<()> {
    use std::os::windows::fs::FileExt;
    while !buf.is_empty() {
        match file.seek_read(buf, offset) {
            Ok(0) => {
                return Err(std::io::Error::new(
                    std::io::ErrorKind::UnexpectedEof,
                    "failed to fill whole buffer",
                ))
            }
            Ok(n) => {
                buf = &mut buf[n..];
                offset += n as u64;
            }
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
    Ok(())
}
