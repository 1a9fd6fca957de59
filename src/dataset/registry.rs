//! Dataset registry.
//!
//! The registry is built by scanning a descriptor tree once, at startup or
//! on reload. Every descriptor goes through the same pipeline:
//!
//! 1. load the file and read `DataFile` / `IndexFile` base names
//! 2. correct a transposed pair and find the files (nested, then flat)
//! 3. validate geometry and compile `RegExp`
//! 4. register one entry per resolved directory, first descriptor wins
//! 5. rewrite the descriptor with the resolved absolute paths
//!
//! A failure in any step skips that descriptor only. The finished registry
//! is immutable; [`RegistryHandle`] swaps whole registries on reload.

use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::{Component, Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use regex::Regex;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use super::descriptor::{DatasetDescriptor, Descriptor};
use super::geometry::PyramidGeometry;
use super::resolve::resolve;
use super::store::TileStore;
use crate::error::{ConfigError, DescriptorError};
use crate::format::TileFormat;

// =============================================================================
// Configuration
// =============================================================================

/// Default descriptor file extension.
pub const DEFAULT_DESCRIPTOR_EXTENSION: &str = "webconf";

/// Path prefix every tile URL starts with.
pub const TILES_PATH: &str = "/tiles";

/// Source of registry generations, unique per build in this process.
static NEXT_GENERATION: AtomicU64 = AtomicU64::new(1);

/// Inputs to a registry build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryConfig {
    /// Root of the descriptor tree
    pub descriptor_root: PathBuf,

    /// Root of the data tree
    pub data_root: PathBuf,

    /// Extension of descriptor files, without the dot
    pub descriptor_extension: String,

    /// Write resolved paths back into descriptors
    pub rewrite_descriptors: bool,
}

impl RegistryConfig {
    /// Create a configuration with the default extension and rewriting on.
    pub fn new(descriptor_root: impl Into<PathBuf>, data_root: impl Into<PathBuf>) -> Self {
        Self {
            descriptor_root: descriptor_root.into(),
            data_root: data_root.into(),
            descriptor_extension: DEFAULT_DESCRIPTOR_EXTENSION.to_string(),
            rewrite_descriptors: true,
        }
    }

    pub fn with_extension(mut self, extension: impl Into<String>) -> Self {
        self.descriptor_extension = extension.into();
        self
    }

    pub fn with_rewrite(mut self, rewrite: bool) -> Self {
        self.rewrite_descriptors = rewrite;
        self
    }
}

// =============================================================================
// DatasetEntry
// =============================================================================

/// One served dataset.
pub struct DatasetEntry {
    /// URL path between `/tiles/` and `/tile/`
    pub route: String,

    /// Resolved directory holding the data and index files
    pub directory: PathBuf,

    /// Descriptor this entry was registered from
    pub descriptor_path: PathBuf,

    /// Validated descriptor
    pub descriptor: DatasetDescriptor,

    /// Compiled `RegExp`, if declared
    pub pattern: Option<Regex>,

    /// Open tile store
    pub store: TileStore,

    /// Generation of the registry build that opened this entry
    pub generation: u64,
}

impl DatasetEntry {
    pub fn geometry(&self) -> &PyramidGeometry {
        self.store.geometry()
    }

    pub fn format(&self) -> TileFormat {
        self.store.format()
    }

    /// Canonical request path of a tile.
    pub fn tile_path(&self, level: u32, col: u32, row: u32) -> String {
        format!(
            "{}/{}/tile/{}/{}/{}",
            TILES_PATH, self.route, level, col, row
        )
    }

    /// Whether a request path is accepted by this entry's `RegExp`.
    pub fn accepts(&self, request_path: &str) -> bool {
        self.pattern
            .as_ref()
            .map_or(true, |pattern| pattern.is_match(request_path))
    }
}

impl fmt::Debug for DatasetEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatasetEntry")
            .field("route", &self.route)
            .field("directory", &self.directory)
            .field("descriptor_path", &self.descriptor_path)
            .field("format", &self.format())
            .field("generation", &self.generation)
            .finish()
    }
}

// =============================================================================
// BuildReport
// =============================================================================

/// A descriptor that was not registered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedDescriptor {
    pub path: PathBuf,
    pub reason: String,
}

/// Outcome of a registry build, descriptor by descriptor.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildReport {
    /// Routes registered, in scan order
    pub registered: Vec<String>,

    /// Descriptors skipped and why
    pub skipped: Vec<SkippedDescriptor>,

    /// Descriptors whose files were found in the flat layout
    pub fallback: Vec<PathBuf>,

    /// Descriptors with transposed `DataFile` / `IndexFile`
    pub swapped: Vec<PathBuf>,

    /// Descriptors whose paths were (or in dry-run mode would be) rewritten
    pub rewritten: Vec<PathBuf>,

    /// Descriptors coalesced into an already registered directory
    pub coalesced: Vec<PathBuf>,

    /// Rewrites were suppressed
    pub dry_run: bool,
}

impl BuildReport {
    /// Number of descriptor files examined.
    pub fn scanned(&self) -> usize {
        self.registered.len() + self.skipped.len() + self.coalesced.len()
    }

    /// Log a one-line summary.
    pub fn log_summary(&self) {
        info!(
            scanned = self.scanned(),
            registered = self.registered.len(),
            skipped = self.skipped.len(),
            fallback = self.fallback.len(),
            swapped = self.swapped.len(),
            rewritten = self.rewritten.len(),
            coalesced = self.coalesced.len(),
            "Registry built"
        );
    }
}

impl fmt::Display for BuildReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Scanned {} descriptor(s): {} registered, {} skipped, {} coalesced",
            self.scanned(),
            self.registered.len(),
            self.skipped.len(),
            self.coalesced.len()
        )?;
        for route in &self.registered {
            writeln!(f, "  ok       {}", route)?;
        }
        for skipped in &self.skipped {
            writeln!(f, "  skipped  {}: {}", skipped.path.display(), skipped.reason)?;
        }
        for path in &self.fallback {
            writeln!(f, "  fallback {}", path.display())?;
        }
        for path in &self.swapped {
            writeln!(f, "  swapped  {}", path.display())?;
        }
        let verb = if self.dry_run { "stale   " } else { "rewrote " };
        for path in &self.rewritten {
            writeln!(f, "  {} {}", verb, path.display())?;
        }
        Ok(())
    }
}

// =============================================================================
// Registry
// =============================================================================

/// Immutable map of route prefixes to open datasets.
#[derive(Debug, Default)]
pub struct Registry {
    /// Entries keyed by resolved directory
    by_directory: BTreeMap<PathBuf, Arc<DatasetEntry>>,

    /// The same entries keyed by route
    by_route: BTreeMap<String, Arc<DatasetEntry>>,

    /// Build generation, 0 for an empty registry
    generation: u64,
}

impl Registry {
    /// A registry with no datasets.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Scan the descriptor tree and open every valid dataset.
    ///
    /// Only a missing or unreadable descriptor root is fatal. Individual
    /// descriptors that fail are recorded in the report and skipped.
    pub fn build(config: &RegistryConfig) -> Result<(Self, BuildReport), ConfigError> {
        let descriptor_root = absolute(&config.descriptor_root)?;
        if !descriptor_root.is_dir() {
            return Err(ConfigError::RootNotFound(descriptor_root));
        }

        let data_root = absolute(&config.data_root)?;
        if !data_root.is_dir() {
            warn!(
                data_root = %data_root.display(),
                "Data root does not exist, every descriptor will be skipped"
            );
        }

        let descriptors = discover(&descriptor_root, &config.descriptor_extension)?;
        debug!(
            root = %descriptor_root.display(),
            count = descriptors.len(),
            "Discovered descriptors"
        );

        let mut builder = Builder {
            descriptor_root: &descriptor_root,
            data_root: &data_root,
            rewrite: config.rewrite_descriptors,
            registry: Registry {
                generation: NEXT_GENERATION.fetch_add(1, Ordering::Relaxed),
                ..Registry::empty()
            },
            report: BuildReport {
                dry_run: !config.rewrite_descriptors,
                ..BuildReport::default()
            },
        };

        for path in descriptors {
            if let Err(e) = builder.register(&path) {
                warn!(descriptor = %path.display(), error = %e, "Skipping descriptor");
                builder.report.skipped.push(SkippedDescriptor {
                    path,
                    reason: e.to_string(),
                });
            }
        }

        Ok((builder.registry, builder.report))
    }

    pub fn len(&self) -> usize {
        self.by_route.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_route.is_empty()
    }

    /// Look up an entry by exact route.
    pub fn get(&self, route: &str) -> Option<&Arc<DatasetEntry>> {
        self.by_route.get(route)
    }

    /// Entries in route order.
    pub fn entries(&self) -> impl Iterator<Item = &Arc<DatasetEntry>> {
        self.by_route.values()
    }

    /// Match the longest registered route at the start of a path.
    ///
    /// `path` is the part of the request path after `/tiles/`. Returns the
    /// entry and the remainder after the route, without leading slashes.
    pub fn route<'a>(&self, path: &'a str) -> Option<(&Arc<DatasetEntry>, &'a str)> {
        let path = path.trim_start_matches('/');
        let mut end = path.len();
        loop {
            let prefix = path[..end].trim_end_matches('/');
            if let Some(entry) = self.by_route.get(prefix) {
                return Some((entry, path[end..].trim_start_matches('/')));
            }
            end = prefix.rfind('/')?;
        }
    }
}

/// Per-build state.
struct Builder<'a> {
    descriptor_root: &'a Path,
    data_root: &'a Path,
    rewrite: bool,
    registry: Registry,
    report: BuildReport,
}

impl Builder<'_> {
    fn register(&mut self, path: &Path) -> Result<(), DescriptorError> {
        let relative = path
            .strip_prefix(self.descriptor_root)
            .map_err(|e| DescriptorError::Read(e.to_string()))?;
        let relative_dir = relative.parent().unwrap_or(Path::new(""));
        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .ok_or_else(|| DescriptorError::Read("descriptor has no file name".to_string()))?;
        let route = route_for(relative_dir, &stem);

        let descriptor = Descriptor::load(path)?;
        let names = descriptor.file_names()?;

        let resolution = resolve(names, self.data_root, relative_dir, &stem)?;
        if resolution.swapped {
            self.report.swapped.push(path.to_path_buf());
        }
        if resolution.used_fallback {
            info!(
                descriptor = %path.display(),
                directory = %resolution.directory.display(),
                "Backing files found in fallback directory"
            );
            self.report.fallback.push(path.to_path_buf());
        }

        let validated =
            descriptor.validate(resolution.data_file.clone(), resolution.index_file.clone())?;
        let geometry = PyramidGeometry::from_descriptor(&validated)?;
        let pattern = validated
            .pattern
            .as_deref()
            .map(Regex::new)
            .transpose()
            .map_err(|e| DescriptorError::InvalidPattern(e.to_string()))?;

        for resolved in [&resolution.data_file, &resolution.index_file] {
            if resolved.to_string_lossy().chars().any(char::is_whitespace) {
                return Err(DescriptorError::UnsupportedPath(resolved.clone()));
            }
        }

        if let Some(existing) = self.registry.by_directory.get(&resolution.directory) {
            debug!(
                descriptor = %path.display(),
                existing = %existing.descriptor_path.display(),
                directory = %resolution.directory.display(),
                "Directory already registered, keeping the first descriptor"
            );
            self.rewrite_paths(path, &descriptor, &resolution.data_file, &resolution.index_file)?;
            self.report.coalesced.push(path.to_path_buf());
            return Ok(());
        }
        if let Some(existing) = self.registry.by_route.get(&route) {
            return Err(DescriptorError::RouteConflict {
                route,
                existing: existing.directory.clone(),
            });
        }

        let store = TileStore::open_files(
            route.clone(),
            geometry,
            &resolution.data_file,
            &resolution.index_file,
        )?;

        self.rewrite_paths(path, &descriptor, &resolution.data_file, &resolution.index_file)?;

        let entry = Arc::new(DatasetEntry {
            route: route.clone(),
            directory: resolution.directory.clone(),
            descriptor_path: path.to_path_buf(),
            descriptor: validated,
            pattern,
            store,
            generation: self.registry.generation,
        });

        let canonical = entry.tile_path(entry.geometry().max_level(), 0, 0);
        if !entry.accepts(&canonical) {
            warn!(
                route = %route,
                pattern = entry.pattern.as_ref().map(Regex::as_str).unwrap_or_default(),
                "RegExp does not match the dataset's tile URLs, requests will be declined"
            );
        }

        info!(
            route = %route,
            format = entry.format().name(),
            max_level = entry.geometry().max_level(),
            "Registered dataset"
        );

        self.registry
            .by_directory
            .insert(resolution.directory, Arc::clone(&entry));
        self.registry.by_route.insert(route.clone(), entry);
        self.report.registered.push(route);
        Ok(())
    }

    /// Point the descriptor's file lines at the resolved paths.
    ///
    /// The file is only written when its text changes, so a second build
    /// over corrected descriptors writes nothing.
    fn rewrite_paths(
        &mut self,
        path: &Path,
        descriptor: &Descriptor,
        data_file: &Path,
        index_file: &Path,
    ) -> Result<(), DescriptorError> {
        let updated = descriptor.with_paths(data_file, index_file);
        if updated == *descriptor {
            return Ok(());
        }

        if self.rewrite {
            fs::write(path, updated.render())
                .map_err(|e| DescriptorError::Write(format!("{}: {}", path.display(), e)))?;
            info!(descriptor = %path.display(), "Rewrote descriptor paths");
        } else {
            debug!(descriptor = %path.display(), "Descriptor paths are stale, not rewriting");
        }
        self.report.rewritten.push(path.to_path_buf());
        Ok(())
    }
}

/// Descriptor files under `root` with the given extension, sorted.
fn discover(root: &Path, extension: &str) -> Result<Vec<PathBuf>, ConfigError> {
    let mut found = Vec::new();
    let walker = WalkDir::new(root)
        .follow_links(true)
        .sort_by_file_name()
        .into_iter();

    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) if e.depth() == 0 => return Err(ConfigError::Walk(e.to_string())),
            Err(e) => {
                warn!(error = %e, "Skipping unreadable path under descriptor root");
                continue;
            }
        };

        let matches = entry
            .path()
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case(extension));
        if entry.file_type().is_file() && matches {
            found.push(entry.into_path());
        }
    }

    Ok(found)
}

/// Route prefix of a descriptor: its relative directory, or its stem at the
/// root.
fn route_for(relative_dir: &Path, stem: &str) -> String {
    let segments: Vec<String> = relative_dir
        .components()
        .filter_map(|c| match c {
            Component::Normal(s) => Some(s.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect();

    if segments.is_empty() {
        stem.to_string()
    } else {
        segments.join("/")
    }
}

fn absolute(path: &Path) -> Result<PathBuf, ConfigError> {
    std::path::absolute(path)
        .map_err(|e| ConfigError::Invalid(format!("{}: {}", path.display(), e)))
}

// =============================================================================
// RegistryHandle
// =============================================================================

/// Shared pointer to the current registry.
///
/// Requests take a snapshot and keep using it for their whole lifetime; a
/// reload builds a new registry off the async runtime and swaps the pointer.
pub struct RegistryHandle {
    config: RegistryConfig,
    current: RwLock<Arc<Registry>>,
}

impl RegistryHandle {
    pub fn new(config: RegistryConfig, registry: Registry) -> Self {
        Self {
            config,
            current: RwLock::new(Arc::new(registry)),
        }
    }

    /// The registry requests should be served from right now.
    pub async fn snapshot(&self) -> Arc<Registry> {
        Arc::clone(&*self.current.read().await)
    }

    /// Rebuild the registry and swap it in.
    ///
    /// On error the current registry stays in place.
    pub async fn reload(&self) -> Result<BuildReport, ConfigError> {
        let config = self.config.clone();
        let (registry, report) = tokio::task::spawn_blocking(move || Registry::build(&config))
            .await
            .map_err(|e| ConfigError::Task(e.to_string()))??;

        *self.current.write().await = Arc::new(registry);
        Ok(report)
    }
}
