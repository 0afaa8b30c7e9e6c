//! Configuration management for geoproc.
//!
//! This module provides a flexible configuration system that supports:
//! - Command-line arguments via clap
//! - Environment variables with `GEOPROC_` prefix
//! - Sensible defaults for all optional settings
//!
//! # Example
//!
//! ```ignore
//! use geoproc::config::Config;
//!
//! // Parse from command line and environment
//! let config = Config::parse();
//!
//! // Access configuration sections
//! println!("Listening on {}:{}", config.host, config.port);
//! ```
//!
//! # Environment Variables
//!
//! All configuration options can be set via environment variables with the
//! `GEOPROC_` prefix:
//!
//! - `GEOPROC_HOST` - Server bind address (default: 0.0.0.0)
//! - `GEOPROC_PORT` - Server port (default: 3000)
//! - `GEOPROC_AUTH_URL` - Identity provider base URL (required when auth is enabled)
//! - `GEOPROC_AUTH_KEY` - Identity provider service key (required when auth is enabled)
//! - `GEOPROC_AUTH_ENABLED` - Enable bearer authentication (default: true)
//! - `GEOPROC_MAX_UPLOAD_BYTES` - Upload size limit (default: 32 MiB)
//! - `GEOPROC_CORS_ORIGINS` - Allowed CORS origins, comma-separated

use clap::Parser;

use crate::server::routes::DEFAULT_MAX_UPLOAD_BYTES;

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

/// geoproc - An authenticated HTTP geoprocessing service.
///
/// Accepts uploaded GeoJSON files and zipped shapefile bundles, applies
/// coordinate-aware geometric operations, and returns GeoJSON results.
#[derive(Parser, Debug, Clone)]
#[command(name = "geoproc")]
#[command(author, version, about, long_about = None)]
pub struct Config {
    // =========================================================================
    // Server Configuration
    // =========================================================================
    /// Host address to bind the server to.
    #[arg(long, default_value = DEFAULT_HOST, env = "GEOPROC_HOST")]
    pub host: String,

    /// Port to listen on.
    #[arg(short, long, default_value_t = DEFAULT_PORT, env = "GEOPROC_PORT")]
    pub port: u16,

    // =========================================================================
    // Authentication Configuration
    // =========================================================================
    /// Base URL of the external identity provider.
    ///
    /// If not provided and auth is enabled, the server will fail to start.
    #[arg(long, env = "GEOPROC_AUTH_URL")]
    pub auth_url: Option<String>,

    /// Service key sent to the identity provider alongside each verification.
    #[arg(long, env = "GEOPROC_AUTH_KEY")]
    pub auth_key: Option<String>,

    /// Enable bearer token authentication.
    ///
    /// When disabled, the upload endpoints are open to anyone.
    /// WARNING: Only disable authentication in development/testing.
    #[arg(long, default_value_t = true, env = "GEOPROC_AUTH_ENABLED")]
    pub auth_enabled: bool,

    // =========================================================================
    // Upload Configuration
    // =========================================================================
    /// Maximum accepted request body size in bytes.
    #[arg(long, default_value_t = DEFAULT_MAX_UPLOAD_BYTES, env = "GEOPROC_MAX_UPLOAD_BYTES")]
    pub max_upload_bytes: usize,

    // =========================================================================
    // CORS Configuration
    // =========================================================================
    /// Allowed CORS origins (comma-separated).
    ///
    /// If not specified, allows any origin.
    #[arg(long, env = "GEOPROC_CORS_ORIGINS", value_delimiter = ',')]
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

impl Config {
    /// Validate the configuration and return an error message if invalid.
    pub fn validate(&self) -> Result<(), String> {
        // Check provider settings are present when auth is enabled
        if self.auth_enabled {
            let url = match &self.auth_url {
                Some(url) if !url.is_empty() => url,
                _ => {
                    return Err(
                        "Authentication is enabled but no provider URL given. \
                         Set --auth-url or GEOPROC_AUTH_URL, or disable auth with --auth-enabled=false"
                            .to_string(),
                    )
                }
            };

            if url::Url::parse(url).is_err() {
                return Err(format!("Invalid auth provider URL: {}", url));
            }

            if self.auth_key.as_deref().unwrap_or("").is_empty() {
                return Err(
                    "Authentication is enabled but no service key given. \
                     Set --auth-key or GEOPROC_AUTH_KEY"
                        .to_string(),
                );
            }
        }

        // Validate upload limit
        if self.max_upload_bytes < 1024 {
            return Err("max_upload_bytes must be at least 1KB".to_string());
        }

        Ok(())
    }

    /// Get the server bind address as "host:port".
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Get the auth provider URL, falling back to a local placeholder.
    ///
    /// The placeholder is only reachable from a router built without auth,
    /// where the verifier is never invoked (call validate() first).
    pub fn auth_url_or_local(&self) -> &str {
        self.auth_url.as_deref().unwrap_or("http://127.0.0.1:9999")
    }

    /// Get the auth service key, or an empty string when not set.
    pub fn auth_key_or_empty(&self) -> &str {
        self.auth_key.as_deref().unwrap_or("")
    }
}

// =============================================================================
// Tests
// =============================================================================
