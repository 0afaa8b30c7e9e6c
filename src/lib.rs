//! # geoproc
//!
//! An authenticated HTTP geoprocessing service.
//!
//! This library provides the core functionality for accepting uploaded
//! geospatial files (raw GeoJSON or zipped shapefile bundles), applying
//! coordinate-system-aware geometric operations, and returning GeoJSON
//! results. Bearer tokens are validated against an external identity
//! provider before any geometry work starts.
//!
//! ## Features
//!
//! - **Upload intake**: GeoJSON payloads and zipped shapefile bundles,
//!   normalized to EPSG:4326 with scoped temporary extraction
//! - **Fixed operation set**: buffer, clip, difference, union, intersect,
//!   merge, and dissolve, delegated to a mature geometry engine
//! - **CRS awareness**: overlays run in World Mercator; buffering estimates
//!   a local UTM zone per request for metric accuracy
//! - **Delegated authentication**: bearer tokens verified against a
//!   GoTrue-style identity provider behind a swappable trait
//!
//! ## Architecture
//!
//! The library is organized into several modules:
//!
//! - [`feature`] - Feature collection model and CRS handling
//! - [`mod@format`] - GeoJSON/shapefile intake and response encoding
//! - [`ops`] - Operation dispatch over feature sets
//! - [`server`] - Axum-based HTTP server, auth gate, and routes
//! - [`config`] - CLI and configuration types
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use geoproc::{create_router, HttpTokenVerifier, RouterConfig};
//!
//! #[tokio::main]
//! async fn main() {
//!     let verifier = Arc::new(
//!         HttpTokenVerifier::new("https://project.supabase.co", "service-key").unwrap(),
//!     );
//!     let router = create_router(verifier, RouterConfig::new());
//!
//!     // Start the server...
//! }
//! ```

pub mod config;
pub mod error;
pub mod feature;
pub mod format;
pub mod ops;
pub mod server;

// Re-export commonly used types
pub use config::Config;
pub use error::{CrsError, IntakeError, OpError};
pub use feature::{Crs, FeatureRecord, FeatureSet};
pub use format::{read_feature_set, read_zip_feature_set, to_feature_collection};
pub use ops::{OpRequest, OpService, Operation};
pub use server::{
    auth_middleware, create_router, health_handler, ApiError, AppState, AuthError,
    AuthenticatedUser, ErrorResponse, HealthResponse, HttpTokenVerifier, RouterConfig,
    TokenVerifier,
};
