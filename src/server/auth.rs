//! Bearer token authentication for geoproc.
//!
//! Authentication is delegated to an external identity provider: the bearer
//! token from the `Authorization` header is forwarded to the provider's
//! user-info endpoint, which either resolves it to a user identity or
//! rejects it. The provider call is one-shot; there is no retry policy and
//! transient failures surface to the caller immediately.
//!
//! The provider is abstracted behind the [`TokenVerifier`] trait so it can
//! be swapped (or mocked in tests) without touching request handlers. The
//! production implementation, [`HttpTokenVerifier`], targets a GoTrue-style
//! API:
//!
//! ```text
//! GET {auth_url}/auth/v1/user
//!     Authorization: Bearer <token>
//!     apikey: <service key>
//! ```
//!
//! # Example
//!
//! ```no_run
//! use geoproc::server::auth::HttpTokenVerifier;
//!
//! let verifier = HttpTokenVerifier::new(
//!     "https://project.supabase.co",
//!     "service-role-key",
//! ).unwrap();
//! ```

use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    extract::{Request, State},
    http::{header, HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;
use tracing::{debug, warn};
use url::Url;

use super::handlers::ErrorResponse;

// =============================================================================
// Types
// =============================================================================

/// Authentication error types.
#[derive(Debug, Clone)]
pub enum AuthError {
    /// No `Authorization` header on the request
    MissingHeader,

    /// The `Authorization` header is not a bearer token
    MalformedHeader,

    /// The identity provider rejected the token
    InvalidToken,

    /// The identity provider could not be reached or answered unexpectedly
    Provider(String),
}

impl std::fmt::Display for AuthError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AuthError::MissingHeader => write!(f, "Missing authorization header"),
            AuthError::MalformedHeader => write!(f, "Malformed authorization header"),
            AuthError::InvalidToken => write!(f, "Invalid or expired token"),
            AuthError::Provider(message) => {
                write!(f, "Identity provider error: {}", message)
            }
        }
    }
}

impl std::error::Error for AuthError {}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let (error_type, message) = match &self {
            AuthError::MissingHeader => ("missing_token", self.to_string()),
            AuthError::MalformedHeader => ("malformed_token", self.to_string()),
            AuthError::InvalidToken => ("invalid_token", self.to_string()),
            AuthError::Provider(_) => ("auth_provider_error", self.to_string()),
        };

        // Every authentication failure surfaces as 401; rejected tokens and
        // provider trouble are logged at warn, the rest at debug
        let status = StatusCode::UNAUTHORIZED;
        match &self {
            AuthError::InvalidToken | AuthError::Provider(_) => {
                warn!(
                    error_type = error_type,
                    status = status.as_u16(),
                    "Authentication failed: {}",
                    message
                );
            }
            _ => {
                debug!(
                    error_type = error_type,
                    status = status.as_u16(),
                    "Authentication failed: {}",
                    message
                );
            }
        }

        let error_response = ErrorResponse::with_status(error_type, message, status);
        (status, Json(error_response)).into_response()
    }
}

/// An identity resolved by the provider.
///
/// Used only for request logging; never persisted.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    /// Opaque user identifier
    pub id: String,

    /// Email address, when the provider reports one
    pub email: Option<String>,
}

// =============================================================================
// Token Verification
// =============================================================================

/// Resolves a bearer token to a user identity.
///
/// Implementations must be cheap to share across requests; the production
/// verifier is built once at startup and injected into the router.
#[async_trait]
pub trait TokenVerifier: Send + Sync {
    /// Verify a bearer token, returning the identity it belongs to.
    async fn verify(&self, token: &str) -> Result<AuthenticatedUser, AuthError>;
}

/// Shape of the provider's user-info response.
#[derive(Debug, Deserialize)]
struct UserPayload {
    #[serde(default)]
    id: String,
    #[serde(default)]
    email: Option<String>,
}

/// Token verifier backed by a GoTrue-style HTTP identity provider.
pub struct HttpTokenVerifier {
    client: reqwest::Client,
    user_endpoint: Url,
    health_endpoint: Url,
    service_key: String,
}

impl HttpTokenVerifier {
    /// Create a verifier for the provider at `auth_url`.
    ///
    /// `auth_url` is the provider base URL (e.g. the project URL); the
    /// user-info and health endpoints are derived from it.
    pub fn new(auth_url: &str, service_key: impl Into<String>) -> Result<Self, AuthError> {
        let mut base = Url::parse(auth_url)
            .map_err(|e| AuthError::Provider(format!("invalid auth service URL: {}", e)))?;
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }

        let user_endpoint = base
            .join("auth/v1/user")
            .map_err(|e| AuthError::Provider(format!("invalid auth service URL: {}", e)))?;
        let health_endpoint = base
            .join("auth/v1/health")
            .map_err(|e| AuthError::Provider(format!("invalid auth service URL: {}", e)))?;

        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(10))
            .build()
            .map_err(|e| AuthError::Provider(e.to_string()))?;

        Ok(Self {
            client,
            user_endpoint,
            health_endpoint,
            service_key: service_key.into(),
        })
    }

    /// Probe the provider's health endpoint.
    ///
    /// Called once at startup so a misconfigured provider URL fails fast
    /// instead of turning every request into a 401.
    pub async fn check_connectivity(&self) -> Result<(), AuthError> {
        let response = self
            .client
            .get(self.health_endpoint.clone())
            .header("apikey", &self.service_key)
            .send()
            .await
            .map_err(|e| AuthError::Provider(e.to_string()))?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(AuthError::Provider(format!(
                "health endpoint returned {}",
                response.status()
            )))
        }
    }
}

#[async_trait]
impl TokenVerifier for HttpTokenVerifier {
    async fn verify(&self, token: &str) -> Result<AuthenticatedUser, AuthError> {
        let response = self
            .client
            .get(self.user_endpoint.clone())
            .bearer_auth(token)
            .header("apikey", &self.service_key)
            .send()
            .await
            .map_err(|e| AuthError::Provider(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            let payload: UserPayload = response
                .json()
                .await
                .map_err(|e| AuthError::Provider(e.to_string()))?;
            if payload.id.is_empty() {
                return Err(AuthError::InvalidToken);
            }
            Ok(AuthenticatedUser {
                id: payload.id,
                email: payload.email,
            })
        } else if status == reqwest::StatusCode::UNAUTHORIZED
            || status == reqwest::StatusCode::FORBIDDEN
        {
            Err(AuthError::InvalidToken)
        } else {
            Err(AuthError::Provider(format!(
                "identity service returned {}",
                status
            )))
        }
    }
}

// =============================================================================
// Header Parsing
// =============================================================================

/// Extract the bearer token from the `Authorization` header.
pub fn bearer_token(headers: &HeaderMap) -> Result<&str, AuthError> {
    let header = headers
        .get(header::AUTHORIZATION)
        .ok_or(AuthError::MissingHeader)?;

    let value = header.to_str().map_err(|_| AuthError::MalformedHeader)?;
    let token = value
        .strip_prefix("Bearer ")
        .ok_or(AuthError::MalformedHeader)?
        .trim();

    if token.is_empty() {
        return Err(AuthError::MalformedHeader);
    }

    Ok(token)
}

// =============================================================================
// Axum Middleware
// =============================================================================

/// Axum middleware verifying the bearer token on protected routes.
///
/// The resolved [`AuthenticatedUser`] is inserted into request extensions
/// for handlers that want to log the caller. Rejections short-circuit with
/// 401 before any upload is read or geometry work starts.
///
/// # Example
///
/// ```ignore
/// use std::sync::Arc;
/// use axum::{middleware, routing::post, Router};
/// use geoproc::server::auth::{auth_middleware, HttpTokenVerifier};
///
/// let verifier = Arc::new(HttpTokenVerifier::new("https://auth.example.com", "key")?);
/// let app = Router::new()
///     .route("/process", post(process_handler))
///     .layer(middleware::from_fn_with_state(verifier, auth_middleware::<HttpTokenVerifier>));
/// ```
pub async fn auth_middleware<V: TokenVerifier + 'static>(
    State(verifier): State<Arc<V>>,
    mut request: Request,
    next: Next,
) -> Result<Response, AuthError> {
    let token = bearer_token(request.headers())?;
    let user = verifier.verify(token).await?;

    debug!(user_id = %user.id, "request authenticated");
    request.extensions_mut().insert(user);

    Ok(next.run(request).await)
}

// =============================================================================
// Tests
// =============================================================================
