//! Apache `mod_mrf` configuration output.
//!
//! Renders one `<Directory>` block per registered dataset so an existing
//! Apache/AHTSE deployment can be driven from the same descriptor tree the
//! server uses.

use crate::dataset::Registry;

/// Default Apache document root.
pub const DEFAULT_DOCUMENT_ROOT: &str = "/var/www/html";

/// Default URL prefix under the document root.
pub const DEFAULT_URL_PREFIX: &str = "/tiles";

/// Where the generated blocks are mounted.
#[derive(Debug, Clone)]
pub struct ApacheConfig {
    pub document_root: String,
    pub url_prefix: String,
}

impl ApacheConfig {
    pub fn new(document_root: impl Into<String>, url_prefix: impl Into<String>) -> Self {
        Self {
            document_root: document_root.into(),
            url_prefix: url_prefix.into(),
        }
    }

    /// Directory path for one route, with doubled slashes collapsed.
    pub fn directory_for(&self, route: &str) -> String {
        let root = self.document_root.trim_end_matches('/');
        let prefix = self.url_prefix.trim_matches('/');
        let mut path = String::from(root);
        for segment in [prefix, route.trim_matches('/')] {
            if !segment.is_empty() {
                path.push('/');
                path.push_str(segment);
            }
        }
        path
    }
}

impl Default for ApacheConfig {
    fn default() -> Self {
        Self::new(DEFAULT_DOCUMENT_ROOT, DEFAULT_URL_PREFIX)
    }
}

/// Render the configuration for every entry, in route order.
///
/// The registry holds one entry per data directory, so each directory block
/// appears once.
pub fn render(registry: &Registry, config: &ApacheConfig) -> String {
    let mut out = String::new();
    for entry in registry.entries() {
        out.push_str(&format!(
            "<Directory \"{}\">\n    MRF_ConfigurationFile \"{}\"\n</Directory>\n",
            config.directory_for(&entry.route),
            entry.descriptor_path.display()
        ));
    }
    out
}
