//! HTTP server layer for geoproc.
//!
//! This module provides the HTTP API wiring the auth gate, the upload
//! intake, and the operation dispatcher together.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                         HTTP Layer                              │
//! │        POST /buffer            POST /process                    │
//! │                                                                 │
//! │  ┌─────────────┐  ┌──────────────┐  ┌────────────────────────┐  │
//! │  │  handlers   │  │     auth     │  │         routes         │  │
//! │  │ (multipart) │  │ (bearer gate)│  │    (router config)     │  │
//! │  └─────────────┘  └──────────────┘  └────────────────────────┘  │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

pub mod auth;
pub mod handlers;
pub mod routes;

pub use auth::{
    auth_middleware, bearer_token, AuthError, AuthenticatedUser, HttpTokenVerifier, TokenVerifier,
};
pub use handlers::{
    buffer_handler, health_handler, process_handler, ApiError, AppState, ErrorResponse,
    HealthResponse,
};
pub use routes::{create_router, RouterConfig, DEFAULT_MAX_UPLOAD_BYTES};
