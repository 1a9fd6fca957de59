//! Locating a descriptor's data and index files on disk.
//!
//! Converted datasets follow a nested layout: the files for descriptor
//! `webconf/Tif/Gebco.webconf` live in `data/Tif/Gebco/`. Older datasets were
//! written flat into `data/Tif/`, so that directory is tried second.

use std::path::{Path, PathBuf};

use tracing::info;

use super::descriptor::FileNames;
use crate::error::DescriptorError;
use crate::format::{is_data_file, is_index_file, INDEX_EXTENSION};

/// Where a descriptor's files were found.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    /// Directory holding both files
    pub directory: PathBuf,

    /// Absolute path of the data file
    pub data_file: PathBuf,

    /// Absolute path of the index file
    pub index_file: PathBuf,

    /// Files were found in the parent directory, not the nested one
    pub used_fallback: bool,

    /// `DataFile` and `IndexFile` were transposed in the descriptor
    pub swapped: bool,
}

/// Whether the descriptor names an index file as `DataFile` and a data
/// file as `IndexFile`.
///
/// Only this exact transposition is corrected; two index files, two data
/// files or unknown extensions are left for the existence check to reject.
pub fn is_transposed(names: &FileNames) -> bool {
    is_index_file(&names.data) && is_data_file(&names.index)
}

/// Swap transposed file names, reporting whether a swap happened.
pub fn correct_transposition(names: FileNames) -> (FileNames, bool) {
    if is_transposed(&names) {
        let FileNames { data, index } = names;
        (
            FileNames {
                data: index,
                index: data,
            },
            true,
        )
    } else {
        (names, false)
    }
}

/// Nested-convention directory: `data_root/relative_dir/stem`.
pub fn expected_directory(data_root: &Path, relative_dir: &Path, stem: &str) -> PathBuf {
    data_root.join(relative_dir).join(stem)
}

/// Flat-convention directory: `data_root/relative_dir`.
pub fn fallback_directory(data_root: &Path, relative_dir: &Path) -> PathBuf {
    data_root.join(relative_dir)
}

/// Find a descriptor's files, correcting a transposition and falling back to
/// the flat layout.
///
/// # Arguments
/// * `names` - Base names from the descriptor
/// * `data_root` - Absolute root of the data tree
/// * `relative_dir` - Descriptor directory relative to the descriptor root
/// * `stem` - Descriptor file name without extension
pub fn resolve(
    names: FileNames,
    data_root: &Path,
    relative_dir: &Path,
    stem: &str,
) -> Result<Resolution, DescriptorError> {
    let (names, swapped) = correct_transposition(names);
    if swapped {
        info!(
            data_file = %names.data.display(),
            index_file = %names.index.display(),
            "DataFile and IndexFile were transposed, swapping"
        );
    }

    let expected = expected_directory(data_root, relative_dir, stem);
    let fallback = fallback_directory(data_root, relative_dir);

    let (directory, used_fallback) = if pair_present(&expected, &names) {
        (expected, false)
    } else if pair_present(&fallback, &names) {
        (fallback, true)
    } else {
        return Err(DescriptorError::MissingBackingFiles {
            expected,
            fallback,
            hint: mismatch_hint(&names),
        });
    };

    Ok(Resolution {
        data_file: directory.join(&names.data),
        index_file: directory.join(&names.index),
        directory,
        used_fallback,
        swapped,
    })
}

fn pair_present(directory: &Path, names: &FileNames) -> bool {
    non_empty_file(&directory.join(&names.data)) && non_empty_file(&directory.join(&names.index))
}

fn non_empty_file(path: &Path) -> bool {
    std::fs::metadata(path)
        .map(|m| m.is_file() && m.len() > 0)
        .unwrap_or(false)
}

/// Diagnostic suffix pointing at suspicious extensions.
fn mismatch_hint(names: &FileNames) -> String {
    let mut hints = Vec::new();

    if !is_data_file(&names.data) {
        hints.push(format!(
            "DataFile '{}' does not have a data extension",
            names.data.display()
        ));
    }
    if !is_index_file(&names.index) {
        hints.push(format!(
            "IndexFile '{}' does not have the .{} extension",
            names.index.display(),
            INDEX_EXTENSION
        ));
    }

    if hints.is_empty() {
        String::new()
    } else {
        format!(" ({})", hints.join("; "))
    }
}
