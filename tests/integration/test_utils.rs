//! Test utilities for integration tests.
//!
//! This module provides a mock token verifier, multipart body construction,
//! and helpers for building zipped shapefile fixtures in memory.

use std::io::{Cursor, Write};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, Request, Response};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::Value;

use geoproc::server::auth::{AuthError, AuthenticatedUser, TokenVerifier};
use geoproc::{create_router, RouterConfig};

// =============================================================================
// Mock Token Verifier
// =============================================================================

/// A mock verifier that accepts or rejects every token and counts calls.
///
/// The call count is how tests assert that rejected requests never reach
/// the provider or the geometry layer.
pub struct MockVerifier {
    accept: bool,
    calls: AtomicUsize,
}

impl MockVerifier {
    pub fn accepting() -> Self {
        Self {
            accept: true,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn rejecting() -> Self {
        Self {
            accept: false,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TokenVerifier for MockVerifier {
    async fn verify(&self, _token: &str) -> Result<AuthenticatedUser, AuthError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.accept {
            Ok(AuthenticatedUser {
                id: "user-123".to_string(),
                email: Some("tester@example.com".to_string()),
            })
        } else {
            Err(AuthError::InvalidToken)
        }
    }
}

// =============================================================================
// Router Construction
// =============================================================================

/// Build a router with bearer auth enforced by the given mock verifier.
pub fn protected_router(verifier: Arc<MockVerifier>) -> Router {
    create_router(verifier, RouterConfig::new().with_tracing(false))
}

/// Build a router with authentication disabled.
pub fn open_router() -> Router {
    create_router(
        Arc::new(MockVerifier::accepting()),
        RouterConfig::without_auth().with_tracing(false),
    )
}

// =============================================================================
// Multipart Bodies
// =============================================================================

/// Boundary used by every test multipart body.
pub const BOUNDARY: &str = "geoproc-test-boundary";

/// Builds raw `multipart/form-data` bodies.
pub struct MultipartBuilder {
    body: Vec<u8>,
}

impl MultipartBuilder {
    pub fn new() -> Self {
        Self { body: Vec::new() }
    }

    /// Append a plain text field.
    pub fn text(mut self, name: &str, value: &str) -> Self {
        self.body
            .extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
        self.body.extend_from_slice(
            format!("Content-Disposition: form-data; name=\"{}\"\r\n\r\n", name).as_bytes(),
        );
        self.body.extend_from_slice(value.as_bytes());
        self.body.extend_from_slice(b"\r\n");
        self
    }

    /// Append a file field.
    pub fn file(mut self, name: &str, filename: &str, content: &[u8]) -> Self {
        self.body
            .extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
        self.body.extend_from_slice(
            format!(
                "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\n",
                name, filename
            )
            .as_bytes(),
        );
        self.body
            .extend_from_slice(b"Content-Type: application/octet-stream\r\n\r\n");
        self.body.extend_from_slice(content);
        self.body.extend_from_slice(b"\r\n");
        self
    }

    pub fn finish(mut self) -> Vec<u8> {
        self.body
            .extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());
        self.body
    }
}

/// Build a POST request carrying a multipart body and an optional bearer token.
pub fn multipart_request(uri: &str, token: Option<&str>, body: Vec<u8>) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri(uri)
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", BOUNDARY),
        );

    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }

    builder.body(Body::from(body)).unwrap()
}

/// Collect a response body into JSON.
pub async fn json_body(response: Response<Body>) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

// =============================================================================
// Geospatial Fixtures
// =============================================================================

/// A GeoJSON FeatureCollection holding one small square polygon.
pub fn square_geojson() -> String {
    r#"{
        "type": "FeatureCollection",
        "features": [
            {
                "type": "Feature",
                "geometry": {
                    "type": "Polygon",
                    "coordinates": [[[106.80, -6.20], [106.81, -6.20], [106.81, -6.19], [106.80, -6.19], [106.80, -6.20]]]
                },
                "properties": {"name": "site"}
            }
        ]
    }"#
    .to_string()
}

/// Write a shapefile bundle of axis-aligned squares and zip it in memory.
///
/// Each entry is `(x0, y0, size, name)` in EPSG:4326 degrees; the `name`
/// lands in a character attribute field.
pub fn squares_shapefile_zip(squares: &[(f64, f64, f64, &str)]) -> Vec<u8> {
    use shapefile::dbase;

    let dir = tempfile::tempdir().unwrap();
    let shp_path = dir.path().join("layer.shp");

    let table = dbase::TableWriterBuilder::new()
        .add_character_field(dbase::FieldName::try_from("name").unwrap(), 50);
    let mut writer = shapefile::Writer::from_path(&shp_path, table).unwrap();

    for (x0, y0, size, name) in squares {
        let polygon = shapefile::Polygon::with_rings(vec![shapefile::PolygonRing::Outer(vec![
            shapefile::Point::new(*x0, *y0),
            shapefile::Point::new(*x0, *y0 + *size),
            shapefile::Point::new(*x0 + *size, *y0 + *size),
            shapefile::Point::new(*x0 + *size, *y0),
            shapefile::Point::new(*x0, *y0),
        ])]);

        let mut record = dbase::Record::default();
        record.insert(
            "name".to_string(),
            dbase::FieldValue::Character(Some(name.to_string())),
        );

        writer.write_shape_and_record(&polygon, &record).unwrap();
    }
    drop(writer);

    zip_dir(dir.path())
}

/// Zip an archive with a single non-shapefile entry.
pub fn zip_without_shapefile() -> Vec<u8> {
    let mut zw = zip::ZipWriter::new(Cursor::new(Vec::new()));
    zw.start_file("readme.txt", zip::write::SimpleFileOptions::default())
        .unwrap();
    zw.write_all(b"no geometry here").unwrap();
    zw.finish().unwrap().into_inner()
}

fn zip_dir(dir: &Path) -> Vec<u8> {
    let mut zw = zip::ZipWriter::new(Cursor::new(Vec::new()));
    let options = zip::write::SimpleFileOptions::default();
    for entry in std::fs::read_dir(dir).unwrap() {
        let entry = entry.unwrap();
        let name = entry.file_name().to_string_lossy().into_owned();
        zw.start_file(name, options).unwrap();
        zw.write_all(&std::fs::read(entry.path()).unwrap()).unwrap();
    }
    zw.finish().unwrap().into_inner()
}
