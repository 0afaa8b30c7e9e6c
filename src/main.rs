//! geoproc - An authenticated HTTP geoprocessing service.
//!
//! This binary starts the HTTP server and configures all components.

use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use geoproc::{
    config::Config,
    server::{auth::HttpTokenVerifier, routes::create_router},
    RouterConfig,
};

#[tokio::main]
async fn main() -> ExitCode {
    // Load a .env file when present, matching local development setups
    dotenvy::dotenv().ok();

    let config = Config::parse();

    // Initialize logging
    init_logging(config.verbose);

    // Validate configuration
    if let Err(e) = config.validate() {
        error!("Configuration error: {}", e);
        return ExitCode::FAILURE;
    }

    info!("geoproc v{}", env!("CARGO_PKG_VERSION"));
    info!("Configuration:");
    info!("  Bind address: {}", config.bind_address());
    info!(
        "  Upload limit: {} MiB",
        config.max_upload_bytes / (1024 * 1024)
    );

    // Auth status with warning if disabled
    if config.auth_enabled {
        info!("  Auth: enabled ({})", config.auth_url_or_local());
    } else {
        warn!("  Auth: DISABLED - all endpoints are publicly accessible");
        warn!("        Enable for production: --auth-url=<url> --auth-key=<key>");
    }

    // The verifier is process-wide state, built once and injected into the
    // router; with auth disabled it is never invoked
    let verifier = match HttpTokenVerifier::new(config.auth_url_or_local(), config.auth_key_or_empty())
    {
        Ok(verifier) => Arc::new(verifier),
        Err(e) => {
            error!("Failed to configure identity provider: {}", e);
            return ExitCode::FAILURE;
        }
    };

    // Probe the identity provider so a bad URL fails at startup, not per request
    if config.auth_enabled {
        info!("");
        info!("Checking identity provider...");
        match verifier.check_connectivity().await {
            Ok(()) => info!("  Provider reachable"),
            Err(e) => {
                error!("  Failed to reach identity provider: {}", e);
                error!("");
                error!("  Please check:");
                error!("    - The provider URL is correct and reachable");
                error!("    - The service key is valid");
                return ExitCode::FAILURE;
            }
        }
    }

    // Build router configuration
    let router_config = build_router_config(&config);

    // Create router
    let router = create_router(verifier, router_config);

    // Bind and serve
    let addr = config.bind_address();

    info!("");
    info!("────────────────────────────────────────────────────────────────");
    info!("  Server listening on: http://{}", addr);
    info!("");
    info!("  Try these endpoints:");
    info!("    curl http://{}/", addr);
    info!("    curl -X POST http://{}/buffer \\", addr);
    info!("         -H 'Authorization: Bearer <token>' \\");
    info!("         -F geojson_polygon=@area.geojson -F buffer_value=100");
    info!("────────────────────────────────────────────────────────────────");
    info!("");

    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(e) => {
            error!("Failed to bind to {}: {}", addr, e);
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = axum::serve(listener, router).await {
        error!("Server error: {}", e);
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}

/// Initialize the tracing/logging subsystem.
fn init_logging(verbose: bool) {
    let env_filter = if verbose {
        "geoproc=debug,tower_http=debug"
    } else {
        "geoproc=info,tower_http=info"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| env_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Build RouterConfig from the application Config.
fn build_router_config(config: &Config) -> RouterConfig {
    let mut router_config = if config.auth_enabled {
        RouterConfig::new()
    } else {
        RouterConfig::without_auth()
    };

    // Apply upload limit
    router_config = router_config.with_max_upload_bytes(config.max_upload_bytes);

    // Apply CORS origins
    if let Some(ref origins) = config.cors_origins {
        router_config = router_config.with_cors_origins(origins.clone());
    }

    // Apply tracing setting
    router_config = router_config.with_tracing(!config.no_tracing);

    router_config
}
