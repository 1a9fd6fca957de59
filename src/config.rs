//! Configuration management for MRF Streamer.
//!
//! This module provides a flexible configuration system that supports:
//! - Command-line arguments via clap, with `serve`, `genconf` and `check`
//!   subcommands
//! - Environment variables with `MRF_` prefix
//! - Sensible defaults for all optional settings
//!
//! # Example
//!
//! ```ignore
//! use clap::Parser;
//! use mrf_streamer::config::{Cli, Command};
//!
//! match Cli::parse().command {
//!     Command::Serve(config) => println!("Listening on {}", config.bind_address()),
//!     Command::Genconf(config) => println!("Writing {:?}", config.output),
//!     Command::Check(config) => println!("Dry run: {}", config.dry_run),
//! }
//! ```
//!
//! # Environment Variables
//!
//! - `MRF_DESCRIPTOR_ROOT` - Root of the descriptor tree (required)
//! - `MRF_DATA_ROOT` - Root of the index/data tree (required)
//! - `MRF_DESCRIPTOR_EXT` - Descriptor file extension (default: webconf)
//! - `MRF_NO_REWRITE` - Never write corrected descriptors back
//! - `MRF_HOST` - Server bind address (default: 0.0.0.0)
//! - `MRF_PORT` - Server port (default: 3000)
//! - `MRF_CACHE_TILES` - Tile cache size in bytes (default: 100MB)
//! - `MRF_CACHE_MAX_AGE` - HTTP cache max-age seconds (default: 86400)
//! - `MRF_CORS_ORIGINS` - Allowed CORS origins, comma-separated
//! - `MRF_DOCUMENT_ROOT` - Apache document root for `genconf`
//! - `MRF_URL_PREFIX` - URL prefix for `genconf` (default: /tiles)

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::apache::{ApacheConfig, DEFAULT_DOCUMENT_ROOT, DEFAULT_URL_PREFIX};
use crate::dataset::{RegistryConfig, DEFAULT_DESCRIPTOR_EXTENSION};
use crate::server::{RouterConfig, DEFAULT_CACHE_MAX_AGE};
use crate::tile::DEFAULT_TILE_CACHE_CAPACITY;

// =============================================================================
// Default Values
// =============================================================================

/// Default server host.
pub const DEFAULT_HOST: &str = "0.0.0.0";

/// Default server port.
pub const DEFAULT_PORT: u16 = 3000;

// =============================================================================
// CLI Arguments
// =============================================================================

/// MRF Streamer - A tile server for MRF raster pyramids.
///
/// Scans a tree of dataset descriptors, validates their index/data pairs and
/// serves tiles over HTTP. Can also emit the equivalent Apache mod_mrf
/// configuration.
#[derive(Parser, Debug, Clone)]
#[command(name = "mrf-streamer")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Start the tile server
    Serve(ServeConfig),

    /// Print Apache <Directory> blocks for every dataset
    Genconf(GenconfConfig),

    /// Build the registry, print the report and optionally probe datasets
    Check(CheckConfig),
}

/// Options shared by every subcommand: where descriptors and data live.
#[derive(Args, Debug, Clone)]
pub struct RegistryArgs {
    /// Root directory of the descriptor tree.
    #[arg(long, env = "MRF_DESCRIPTOR_ROOT")]
    pub descriptor_root: PathBuf,

    /// Root directory of the index/data tree.
    #[arg(long, env = "MRF_DATA_ROOT")]
    pub data_root: PathBuf,

    /// Extension of descriptor files, without the dot.
    #[arg(long, default_value = DEFAULT_DESCRIPTOR_EXTENSION, env = "MRF_DESCRIPTOR_EXT")]
    pub descriptor_ext: String,
}

impl RegistryArgs {
    fn validate(&self) -> Result<(), String> {
        if self.descriptor_root.as_os_str().is_empty() {
            return Err(
                "Descriptor root is required. Set --descriptor-root or MRF_DESCRIPTOR_ROOT"
                    .to_string(),
            );
        }
        if self.data_root.as_os_str().is_empty() {
            return Err("Data root is required. Set --data-root or MRF_DATA_ROOT".to_string());
        }

        let ext = self.descriptor_ext.trim_start_matches('.');
        if ext.is_empty() || ext.contains(['/', '\\']) {
            return Err(format!(
                "descriptor_ext must be a bare extension, got '{}'",
                self.descriptor_ext
            ));
        }

        Ok(())
    }

    /// Registry configuration with descriptor rewriting as requested.
    pub fn registry_config(&self, rewrite: bool) -> RegistryConfig {
        RegistryConfig::new(&self.descriptor_root, &self.data_root)
            .with_extension(self.descriptor_ext.trim_start_matches('.'))
            .with_rewrite(rewrite)
    }
}

// =============================================================================
// Serve
// =============================================================================

#[derive(Args, Debug, Clone)]
pub struct ServeConfig {
    #[command(flatten)]
    pub registry: RegistryArgs,

    /// Never write corrected descriptors back to disk.
    #[arg(long, default_value_t = false, env = "MRF_NO_REWRITE")]
    pub no_rewrite: bool,

    // =========================================================================
    // Server Configuration
    // =========================================================================
    /// Host address to bind the server to.
    #[arg(long, default_value = DEFAULT_HOST, env = "MRF_HOST")]
    pub host: String,

    /// Port to listen on.
    #[arg(short, long, default_value_t = DEFAULT_PORT, env = "MRF_PORT")]
    pub port: u16,

    // =========================================================================
    // Cache Configuration
    // =========================================================================
    /// Tile cache size in bytes.
    #[arg(long, default_value_t = DEFAULT_TILE_CACHE_CAPACITY, env = "MRF_CACHE_TILES")]
    pub cache_tiles: usize,

    /// HTTP Cache-Control max-age in seconds.
    #[arg(long, default_value_t = DEFAULT_CACHE_MAX_AGE, env = "MRF_CACHE_MAX_AGE")]
    pub cache_max_age: u32,

    // =========================================================================
    // CORS Configuration
    // =========================================================================
    /// Allowed CORS origins (comma-separated).
    ///
    /// If not specified, allows any origin.
    #[arg(long, env = "MRF_CORS_ORIGINS", value_delimiter = ',')]
    pub cors_origins: Option<Vec<String>>,

    // =========================================================================
    // Logging Configuration
    // =========================================================================
    /// Enable verbose logging (debug level).
    #[arg(short, long, default_value_t = false)]
    pub verbose: bool,

    /// Disable request tracing.
    #[arg(long, default_value_t = false)]
    pub no_tracing: bool,
}

impl ServeConfig {
    /// Validate the configuration and return an error message if invalid.
    pub fn validate(&self) -> Result<(), String> {
        self.registry.validate()?;

        if self.cache_tiles == 0 {
            return Err("cache_tiles must be greater than 0".to_string());
        }

        if let Some(origins) = &self.cors_origins {
            if let Some(bad) = origins.iter().find(|o| o.parse::<http::HeaderValue>().is_err()) {
                return Err(format!("Invalid CORS origin: '{}'", bad));
            }
        }

        Ok(())
    }

    /// Get the server bind address as "host:port".
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn registry_config(&self) -> RegistryConfig {
        self.registry.registry_config(!self.no_rewrite)
    }

    /// Build the router configuration from the serve options.
    pub fn router_config(&self) -> RouterConfig {
        let mut router_config = RouterConfig::new()
            .with_cache_max_age(self.cache_max_age)
            .with_tracing(!self.no_tracing);

        if let Some(ref origins) = self.cors_origins {
            router_config = router_config.with_cors_origins(origins.clone());
        }

        router_config
    }
}

// =============================================================================
// Genconf
// =============================================================================

#[derive(Args, Debug, Clone)]
pub struct GenconfConfig {
    #[command(flatten)]
    pub registry: RegistryArgs,

    /// Apache document root the tile directories live under.
    #[arg(long, default_value = DEFAULT_DOCUMENT_ROOT, env = "MRF_DOCUMENT_ROOT")]
    pub document_root: String,

    /// URL prefix between the document root and the dataset route.
    #[arg(long, default_value = DEFAULT_URL_PREFIX, env = "MRF_URL_PREFIX")]
    pub url_prefix: String,

    /// Write the configuration to this file instead of stdout.
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Never write corrected descriptors back to disk.
    #[arg(long, default_value_t = false, env = "MRF_NO_REWRITE")]
    pub no_rewrite: bool,

    /// Enable verbose logging (debug level).
    #[arg(short, long, default_value_t = false)]
    pub verbose: bool,
}

impl GenconfConfig {
    pub fn validate(&self) -> Result<(), String> {
        self.registry.validate()?;

        if !self.document_root.starts_with('/') {
            return Err(format!(
                "document_root must be an absolute path, got '{}'",
                self.document_root
            ));
        }

        Ok(())
    }

    pub fn registry_config(&self) -> RegistryConfig {
        self.registry.registry_config(!self.no_rewrite)
    }

    pub fn apache_config(&self) -> ApacheConfig {
        ApacheConfig::new(&self.document_root, &self.url_prefix)
    }
}

// =============================================================================
// Check
// =============================================================================

#[derive(Args, Debug, Clone)]
pub struct CheckConfig {
    #[command(flatten)]
    pub registry: RegistryArgs,

    /// Report stale descriptors without rewriting them.
    #[arg(long, default_value_t = false)]
    pub dry_run: bool,

    /// Read sample tiles from every dataset.
    #[arg(long, default_value_t = false)]
    pub probe: bool,

    /// Enable verbose logging (debug level).
    #[arg(short, long, default_value_t = false)]
    pub verbose: bool,
}

impl CheckConfig {
    pub fn validate(&self) -> Result<(), String> {
        self.registry.validate()
    }

    pub fn registry_config(&self) -> RegistryConfig {
        self.registry.registry_config(!self.dry_run)
    }
}

// =============================================================================
// Tests
// =============================================================================
