//! Router configuration for geoproc.
//!
//! This module defines the HTTP routes and applies middleware for
//! authentication, CORS, and the upload size limit.
//!
//! # Route Structure
//!
//! ```text
//! /             - Health check (public)
//! /buffer       - Buffer a GeoJSON upload (protected)
//! /process      - Run an operation over shapefile uploads (protected)
//! ```
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use geoproc::server::auth::HttpTokenVerifier;
//! use geoproc::server::routes::{create_router, RouterConfig};
//!
//! let verifier = Arc::new(HttpTokenVerifier::new("https://auth.example.com", "key")?);
//! let router = create_router(verifier, RouterConfig::new());
//!
//! let listener = tokio::net::TcpListener::bind("0.0.0.0:3000").await?;
//! axum::serve(listener, router).await?;
//! ```

use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::DefaultBodyLimit,
    middleware,
    routing::{get, post},
    Router,
};
use http::header::{AUTHORIZATION, CONTENT_TYPE};
use http::Method;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::ops::OpService;

use super::auth::TokenVerifier;
use super::handlers::{buffer_handler, health_handler, process_handler, AppState};

// =============================================================================
// Router Configuration
// =============================================================================

/// Default upload size limit (32 MiB).
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 32 * 1024 * 1024;

/// Configuration for the HTTP router.
#[derive(Clone)]
pub struct RouterConfig {
    /// Whether bearer authentication is enforced on the upload routes
    pub auth_enabled: bool,

    /// Allowed CORS origins (None = allow any origin)
    pub cors_origins: Option<Vec<String>>,

    /// Maximum accepted request body size in bytes
    pub max_upload_bytes: usize,

    /// Whether to enable request tracing
    pub enable_tracing: bool,
}

impl RouterConfig {
    /// Create a router configuration with secure defaults.
    ///
    /// By default:
    /// - Authentication is enabled
    /// - CORS allows any origin
    /// - Uploads are capped at 32 MiB
    /// - Tracing is enabled
    pub fn new() -> Self {
        Self {
            auth_enabled: true,
            cors_origins: None, // Allow any origin by default
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            enable_tracing: true,
        }
    }

    /// Create a configuration with authentication disabled.
    ///
    /// **Warning**: This should only be used for development/testing.
    pub fn without_auth() -> Self {
        Self {
            auth_enabled: false,
            cors_origins: None,
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            enable_tracing: true,
        }
    }

    /// Set specific allowed CORS origins.
    ///
    /// Pass an empty vec to disallow all cross-origin requests.
    /// Pass None (or don't call this method) to allow any origin.
    pub fn with_cors_origins(mut self, origins: Vec<String>) -> Self {
        self.cors_origins = Some(origins);
        self
    }

    /// Set the maximum accepted request body size.
    pub fn with_max_upload_bytes(mut self, bytes: usize) -> Self {
        self.max_upload_bytes = bytes;
        self
    }

    /// Enable or disable authentication.
    pub fn with_auth_enabled(mut self, enabled: bool) -> Self {
        self.auth_enabled = enabled;
        self
    }

    /// Enable or disable request tracing.
    pub fn with_tracing(mut self, enabled: bool) -> Self {
        self.enable_tracing = enabled;
        self
    }
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// Router Builder
// =============================================================================

/// Create the main application router.
///
/// This function builds the complete Axum router with:
/// - Public routes (health check)
/// - Protected routes (upload endpoints behind bearer auth)
/// - CORS configuration
/// - Upload size limit
/// - Request tracing (optional)
///
/// # Arguments
///
/// * `verifier` - The token verifier injected into the auth middleware
/// * `config` - Router configuration
///
/// # Returns
///
/// A configured Axum router ready to be served.
pub fn create_router<V>(verifier: Arc<V>, config: RouterConfig) -> Router
where
    V: TokenVerifier + 'static,
{
    let app_state = AppState::new(OpService::new());

    // Build CORS layer
    let cors = build_cors_layer(&config);

    // Build the router
    let router = if config.auth_enabled {
        build_protected_router(app_state, verifier, cors)
    } else {
        build_public_router(app_state, cors)
    };

    // Cap upload sizes before bodies are buffered
    let router = router.layer(DefaultBodyLimit::max(config.max_upload_bytes));

    // Add tracing if enabled
    if config.enable_tracing {
        router.layer(TraceLayer::new_for_http())
    } else {
        router
    }
}

/// Build router with authentication on the upload routes.
fn build_protected_router<V>(app_state: AppState, verifier: Arc<V>, cors: CorsLayer) -> Router
where
    V: TokenVerifier + 'static,
{
    // Protected upload routes (require bearer authentication)
    let protected_routes = Router::new()
        .route("/buffer", post(buffer_handler))
        .route("/process", post(process_handler))
        .layer(middleware::from_fn_with_state(
            verifier,
            super::auth::auth_middleware::<V>,
        ))
        .with_state(app_state);

    // Public routes (no auth required)
    let public_routes = Router::new().route("/", get(health_handler));

    // Combine routes
    Router::new()
        .merge(protected_routes)
        .merge(public_routes)
        .layer(cors)
}

/// Build router without authentication (for development/testing).
fn build_public_router(app_state: AppState, cors: CorsLayer) -> Router {
    // All routes are public
    Router::new()
        .route("/", get(health_handler))
        .route("/buffer", post(buffer_handler))
        .route("/process", post(process_handler))
        .with_state(app_state)
        .layer(cors)
}

/// Build the CORS layer based on configuration.
fn build_cors_layer(config: &RouterConfig) -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([AUTHORIZATION, CONTENT_TYPE])
        .max_age(Duration::from_secs(86400)); // 24 hours

    match &config.cors_origins {
        None => cors.allow_origin(Any),
        Some(origins) if origins.is_empty() => {
            // No origins allowed - this effectively disables CORS
            cors
        }
        Some(origins) => {
            // Parse origins into HeaderValues
            let parsed_origins: Vec<_> = origins.iter().filter_map(|o| o.parse().ok()).collect();
            cors.allow_origin(parsed_origins)
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
