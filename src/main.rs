//! MRF Streamer - A tile server for MRF raster pyramids.
//!
//! This binary builds the dataset registry and starts the HTTP server, writes
//! the Apache configuration, or checks a descriptor tree.

use clap::Parser;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use mrf_streamer::{
    apache,
    config::{CheckConfig, Cli, Command, GenconfConfig, ServeConfig},
    dataset::{BuildReport, Registry, RegistryConfig, RegistryHandle, TILES_PATH},
    error::ConfigError,
    server::create_router_shared,
    tile::{probe_registry, TileCache, TileService},
};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match cli.command {
        Command::Serve(config) => run_serve(config).await,
        Command::Genconf(config) => run_genconf(config).await,
        Command::Check(config) => run_check(config).await,
    }
}

/// Build the registry on the blocking pool.
async fn build_registry(config: RegistryConfig) -> Result<(Registry, BuildReport), ConfigError> {
    tokio::task::spawn_blocking(move || Registry::build(&config))
        .await
        .map_err(|e| ConfigError::Task(e.to_string()))?
}

// =============================================================================
// Serve Command
// =============================================================================

async fn run_serve(config: ServeConfig) -> ExitCode {
    init_logging(config.verbose);

    if let Err(e) = config.validate() {
        error!("Configuration error: {}", e);
        return ExitCode::FAILURE;
    }

    let registry_config = config.registry_config();

    info!("MRF Streamer v{}", env!("CARGO_PKG_VERSION"));
    info!("Configuration:");
    info!("  Descriptors: {}", registry_config.descriptor_root.display());
    info!("  Data: {}", registry_config.data_root.display());
    info!(
        "  Descriptor extension: .{}",
        registry_config.descriptor_extension
    );
    if !registry_config.rewrite_descriptors {
        info!("  Descriptor rewriting: disabled");
    }
    info!("  Cache: {}MB tiles", config.cache_tiles / (1024 * 1024));

    let (registry, report) = match build_registry(registry_config.clone()).await {
        Ok(built) => built,
        Err(e) => {
            error!("Failed to build registry: {}", e);
            return ExitCode::FAILURE;
        }
    };
    report.log_summary();
    if registry.is_empty() {
        warn!("No datasets registered; every tile request will return 404");
    }

    let handle = Arc::new(RegistryHandle::new(registry_config, registry));
    let tile_service = Arc::new(TileService::with_shared_registry(
        handle,
        TileCache::with_capacity(config.cache_tiles),
    ));

    let router = create_router_shared(Arc::clone(&tile_service), config.router_config());

    let addr = config.bind_address();

    info!("Server listening on: http://{}", addr);
    info!("  curl http://{}/health", addr);
    info!("  curl http://{}/datasets", addr);
    info!("  curl http://{}{}/<route>/tile/<z>/<x>/<y>", addr, TILES_PATH);

    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(e) => {
            error!("Failed to bind to {}: {}", addr, e);
            return ExitCode::FAILURE;
        }
    };

    tokio::spawn(reload_on_hangup(tile_service));

    if let Err(e) = axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        error!("Server error: {}", e);
        return ExitCode::FAILURE;
    }

    info!("Server stopped");
    ExitCode::SUCCESS
}

/// Rebuild the registry every time the process receives SIGHUP.
#[cfg(unix)]
async fn reload_on_hangup(tile_service: Arc<TileService>) {
    use tokio::signal::unix::{signal, SignalKind};

    let mut hangup = match signal(SignalKind::hangup()) {
        Ok(stream) => stream,
        Err(e) => {
            warn!("Cannot listen for SIGHUP, reload disabled: {}", e);
            return;
        }
    };

    while hangup.recv().await.is_some() {
        info!("SIGHUP received, reloading registry");
        match tile_service.reload().await {
            Ok(report) => report.log_summary(),
            Err(e) => error!("Reload failed, keeping current registry: {}", e),
        }
    }
}

#[cfg(not(unix))]
async fn reload_on_hangup(_tile_service: Arc<TileService>) {}

/// Resolve on Ctrl-C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Cannot listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                warn!("Cannot listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}

/// Initialize the tracing/logging subsystem.
///
/// Logs go to stderr so `genconf` can write its output to stdout.
fn init_logging(verbose: bool) {
    let env_filter = if verbose {
        "mrf_streamer=debug,tower_http=debug"
    } else {
        "mrf_streamer=info,tower_http=info"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| env_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

// =============================================================================
// Genconf Command
// =============================================================================

async fn run_genconf(config: GenconfConfig) -> ExitCode {
    init_logging(config.verbose);

    if let Err(e) = config.validate() {
        error!("Configuration error: {}", e);
        return ExitCode::FAILURE;
    }

    let (registry, report) = match build_registry(config.registry_config()).await {
        Ok(built) => built,
        Err(e) => {
            error!("Failed to build registry: {}", e);
            return ExitCode::FAILURE;
        }
    };
    report.log_summary();

    let output = apache::render(&registry, &config.apache_config());

    match &config.output {
        Some(path) => {
            if let Err(e) = tokio::fs::write(path, output).await {
                error!("Failed to write {}: {}", path.display(), e);
                return ExitCode::FAILURE;
            }
            info!(
                blocks = registry.len(),
                "Apache configuration written to {}",
                path.display()
            );
        }
        None => print!("{}", output),
    }

    ExitCode::SUCCESS
}

// =============================================================================
// Check Command
// =============================================================================

async fn run_check(config: CheckConfig) -> ExitCode {
    if config.verbose {
        init_logging(true);
    }

    println!("MRF Streamer Configuration Check");
    println!("═════════════════════════════════");
    println!();

    if let Err(e) = config.validate() {
        println!("✗ {}", e);
        return ExitCode::FAILURE;
    }

    let registry_config = config.registry_config();
    println!("✓ Descriptors: {}", registry_config.descriptor_root.display());
    println!("✓ Data: {}", registry_config.data_root.display());
    if config.dry_run {
        println!("  (dry run: descriptors are not rewritten)");
    }
    println!();

    let (registry, report) = match build_registry(registry_config).await {
        Ok(built) => built,
        Err(e) => {
            println!("✗ {}", e);
            return ExitCode::FAILURE;
        }
    };

    print!("{}", report);

    let mut healthy = true;

    if config.probe {
        println!();
        println!("Probing datasets:");
        println!("─────────────────");

        let probes = probe_registry(&registry).await;
        if probes.is_empty() {
            println!("  (no datasets registered)");
        }
        for probe in &probes {
            print!("{}", probe);
            if probe.status().is_failing() {
                healthy = false;
            }
        }
    }

    println!();
    println!("═════════════════════════════════");
    if healthy {
        println!("✓ {} dataset(s) registered", registry.len());
        ExitCode::SUCCESS
    } else {
        println!("✗ Some datasets failed the probe");
        ExitCode::FAILURE
    }
}
