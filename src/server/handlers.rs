//! HTTP request handlers for the geoprocessing API.
//!
//! This module contains the Axum handlers for the upload endpoints and the
//! health check.
//!
//! # Endpoints
//!
//! - `GET /` - Health check
//! - `POST /buffer` - Buffer an uploaded GeoJSON file by a metric distance
//! - `POST /process` - Run one operation over one or two zipped shapefiles

use std::sync::Arc;

use axum::{
    extract::{multipart::MultipartError, Multipart, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Extension, Json,
};
use bytes::Bytes;
use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::error::{CrsError, IntakeError, OpError};
use crate::format;
use crate::ops::{OpRequest, OpService, Operation};

use super::auth::AuthenticatedUser;

// =============================================================================
// Application State
// =============================================================================

/// Shared application state containing the operation service.
///
/// This is passed to all handlers via Axum's State extractor.
#[derive(Clone)]
pub struct AppState {
    /// The dispatcher for geometry operations
    pub ops: Arc<OpService>,
}

impl AppState {
    /// Create a new application state around the given service.
    pub fn new(ops: OpService) -> Self {
        Self { ops: Arc::new(ops) }
    }
}

// =============================================================================
// Response Types
// =============================================================================

/// JSON error response returned for all error conditions.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Error type identifier (e.g., "empty_result", "missing_shapefile")
    pub error: String,

    /// Human-readable error message
    pub message: String,

    /// HTTP status code (included for convenience)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
}

impl ErrorResponse {
    /// Create a new error response.
    pub fn new(error: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            message: message.into(),
            status: None,
        }
    }

    /// Create a new error response with status code.
    pub fn with_status(
        error: impl Into<String>,
        message: impl Into<String>,
        status: StatusCode,
    ) -> Self {
        Self {
            error: error.into(),
            message: message.into(),
            status: Some(status.as_u16()),
        }
    }
}

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Service status
    pub status: String,

    /// Service version
    pub version: String,
}

// =============================================================================
// Error Mapping
// =============================================================================

/// Errors surfaced by the upload endpoints.
///
/// Wraps the intake and dispatch error types together with the multipart
/// problems only the HTTP layer can see, and maps all of them to transport
/// status codes.
#[derive(Debug)]
pub enum ApiError {
    /// A required multipart field is absent
    MissingField(&'static str),

    /// A field was present but its value is unusable
    InvalidField {
        field: &'static str,
        message: String,
    },

    /// The multipart body itself could not be read
    Multipart(String),

    /// Upload parsing failed
    Intake(IntakeError),

    /// The dispatcher rejected or failed the operation
    Op(OpError),
}

impl From<MultipartError> for ApiError {
    fn from(err: MultipartError) -> Self {
        ApiError::Multipart(err.to_string())
    }
}

impl From<IntakeError> for ApiError {
    fn from(err: IntakeError) -> Self {
        ApiError::Intake(err)
    }
}

impl From<OpError> for ApiError {
    fn from(err: OpError) -> Self {
        ApiError::Op(err)
    }
}

impl ApiError {
    fn parts(&self) -> (StatusCode, &'static str, String) {
        match self {
            ApiError::MissingField(field) => (
                StatusCode::BAD_REQUEST,
                "missing_field",
                format!("Missing required field: {}", field),
            ),
            ApiError::InvalidField { field, message } => (
                StatusCode::BAD_REQUEST,
                "invalid_field",
                format!("Invalid value for field '{}': {}", field, message),
            ),
            ApiError::Multipart(message) => (
                StatusCode::BAD_REQUEST,
                "invalid_multipart",
                format!("Malformed multipart body: {}", message),
            ),
            ApiError::Intake(err) => intake_parts(err),
            ApiError::Op(err) => op_parts(err),
        }
    }
}

fn intake_parts(err: &IntakeError) -> (StatusCode, &'static str, String) {
    match err {
        IntakeError::InvalidGeoJson(_) => {
            (StatusCode::BAD_REQUEST, "invalid_geojson", err.to_string())
        }
        IntakeError::InvalidArchive(_) => {
            (StatusCode::BAD_REQUEST, "invalid_archive", err.to_string())
        }
        IntakeError::MissingShapefile => {
            (StatusCode::BAD_REQUEST, "missing_shapefile", err.to_string())
        }
        IntakeError::InvalidShapefile(_) => {
            (StatusCode::BAD_REQUEST, "invalid_shapefile", err.to_string())
        }
        IntakeError::UnsupportedShape(_) => {
            (StatusCode::BAD_REQUEST, "unsupported_shape", err.to_string())
        }
        IntakeError::Crs(CrsError::Unsupported(_)) => {
            (StatusCode::BAD_REQUEST, "unsupported_crs", err.to_string())
        }
        IntakeError::Crs(_) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            "projection_error",
            err.to_string(),
        ),
        IntakeError::Io(_) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            "io_error",
            err.to_string(),
        ),
    }
}

fn op_parts(err: &OpError) -> (StatusCode, &'static str, String) {
    match err {
        OpError::UnsupportedOperation(_) => (
            StatusCode::BAD_REQUEST,
            "unsupported_operation",
            err.to_string(),
        ),
        OpError::MissingSecondInput(_) => (
            StatusCode::BAD_REQUEST,
            "missing_second_file",
            err.to_string(),
        ),
        OpError::MissingDistance => {
            (StatusCode::BAD_REQUEST, "missing_distance", err.to_string())
        }
        OpError::EmptyResult => (StatusCode::NOT_FOUND, "empty_result", err.to_string()),
        OpError::Crs(_) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            "projection_error",
            err.to_string(),
        ),
    }
}

/// Convert ApiError to HTTP response.
///
/// Errors are logged by severity before the response body is built:
/// - 5xx at ERROR level (server errors)
/// - 404 at DEBUG level (empty results are common and expected)
/// - other 4xx at WARN level (client errors)
impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_type, message) = self.parts();

        if status.is_server_error() {
            error!(
                error_type = error_type,
                status = status.as_u16(),
                "Server error: {}",
                message
            );
        } else if status == StatusCode::NOT_FOUND {
            debug!(
                error_type = error_type,
                status = status.as_u16(),
                "Empty result: {}",
                message
            );
        } else {
            warn!(
                error_type = error_type,
                status = status.as_u16(),
                "Client error: {}",
                message
            );
        }

        let error_response = ErrorResponse::with_status(error_type, message, status);
        (status, Json(error_response)).into_response()
    }
}

// =============================================================================
// Handlers
// =============================================================================

/// Handle health check requests.
///
/// # Endpoint
///
/// `GET /`
///
/// # Response
///
/// `200 OK` with JSON body:
/// ```json
/// {
///   "status": "ok",
///   "version": "0.1.0"
/// }
/// ```
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Handle buffer requests.
///
/// # Endpoint
///
/// `POST /buffer`
///
/// # Multipart Fields
///
/// - `geojson_polygon`: GeoJSON file (FeatureCollection, Feature, or bare
///   geometry); assumed EPSG:4326 unless a legacy `crs` member says otherwise
/// - `buffer_value`: buffer distance in meters
///
/// # Response
///
/// - `200 OK`: GeoJSON FeatureCollection of the buffered geometries
/// - `400 Bad Request`: missing field, unparseable GeoJSON or distance
/// - `401 Unauthorized`: missing/invalid bearer token
/// - `404 Not Found`: input contained no geometry to buffer
/// - `500 Internal Server Error`: projection or processing failure
pub async fn buffer_handler(
    State(state): State<AppState>,
    user: Option<Extension<AuthenticatedUser>>,
    mut multipart: Multipart,
) -> Result<Json<geojson::FeatureCollection>, ApiError> {
    if let Some(Extension(user)) = &user {
        info!(user_id = %user.id, "buffer request from authenticated user");
    }

    let mut geojson_bytes: Option<Bytes> = None;
    let mut buffer_value: Option<f64> = None;

    while let Some(field) = multipart.next_field().await? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "geojson_polygon" => {
                geojson_bytes = Some(field.bytes().await?);
            }
            "buffer_value" => {
                let text = field.text().await?;
                let parsed = text.trim().parse::<f64>().map_err(|_| ApiError::InvalidField {
                    field: "buffer_value",
                    message: format!("expected a number, got '{}'", text.trim()),
                })?;
                buffer_value = Some(parsed);
            }
            _ => {
                debug!(field = %name, "ignoring unknown multipart field");
            }
        }
    }

    let bytes = geojson_bytes.ok_or(ApiError::MissingField("geojson_polygon"))?;
    let distance = buffer_value.ok_or(ApiError::MissingField("buffer_value"))?;

    let collection = format::read_feature_set(&bytes)?;
    let result = state.ops.apply(OpRequest::buffer(collection, distance))?;

    Ok(Json(format::to_feature_collection(&result)))
}

/// Handle geoprocessing requests over zipped shapefile bundles.
///
/// # Endpoint
///
/// `POST /process`
///
/// # Multipart Fields
///
/// - `operation`: one of `clip`, `difference`, `union`, `intersect`,
///   `merge`, `dissolve`
/// - `file_a`: zipped shapefile bundle (required)
/// - `file_b`: zipped shapefile bundle (required for two-input operations)
/// - `group_by`: attribute field to group by when dissolving (optional)
///
/// # Response
///
/// - `200 OK`: GeoJSON FeatureCollection of the operation result
/// - `400 Bad Request`: unsupported operation, missing required file, or
///   archive without a `.shp` entry
/// - `401 Unauthorized`: missing/invalid bearer token
/// - `404 Not Found`: the operation produced no geometry
/// - `500 Internal Server Error`: projection or processing failure
pub async fn process_handler(
    State(state): State<AppState>,
    user: Option<Extension<AuthenticatedUser>>,
    mut multipart: Multipart,
) -> Result<Json<geojson::FeatureCollection>, ApiError> {
    if let Some(Extension(user)) = &user {
        info!(user_id = %user.id, "process request from authenticated user");
    }

    let mut operation_text: Option<String> = None;
    let mut file_a: Option<Bytes> = None;
    let mut file_b: Option<Bytes> = None;
    let mut group_by: Option<String> = None;

    while let Some(field) = multipart.next_field().await? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "operation" => operation_text = Some(field.text().await?),
            "file_a" => file_a = Some(field.bytes().await?),
            "file_b" => file_b = Some(field.bytes().await?),
            "group_by" => group_by = Some(field.text().await?),
            _ => {
                debug!(field = %name, "ignoring unknown multipart field");
            }
        }
    }

    let operation_text = operation_text.ok_or(ApiError::MissingField("operation"))?;
    let operation: Operation = operation_text.trim().parse().map_err(ApiError::Op)?;

    let file_a = file_a.ok_or(ApiError::MissingField("file_a"))?;
    let primary = format::read_zip_feature_set(&file_a)?;

    let secondary = if operation.requires_second_input() {
        let bytes = file_b.ok_or(ApiError::Op(OpError::MissingSecondInput(operation.name())))?;
        Some(format::read_zip_feature_set(&bytes)?)
    } else {
        None
    };

    let mut request = OpRequest::new(operation, primary);
    if let Some(secondary) = secondary {
        request = request.with_secondary(secondary);
    }
    if let Some(field) = group_by {
        request = request.with_group_by(field);
    }

    let result = state.ops.apply(request)?;

    Ok(Json(format::to_feature_collection(&result)))
}

// =============================================================================
// Tests
// =============================================================================
