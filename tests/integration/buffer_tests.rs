//! Integration tests for the `/buffer` endpoint.
//!
//! Tests verify:
//! - Buffered output stays in geographic coordinate range and expands the
//!   input extent
//! - Attribute rows survive buffering
//! - Error cases (missing fields, non-numeric distance, malformed GeoJSON)

use axum::http::StatusCode;
use tower::ServiceExt;

use super::test_utils::{
    json_body, multipart_request, open_router, square_geojson, MultipartBuilder,
};

/// Collect the bounding box of every position in a FeatureCollection.
fn bounds(json: &serde_json::Value) -> (f64, f64, f64, f64) {
    let mut min_x = f64::INFINITY;
    let mut min_y = f64::INFINITY;
    let mut max_x = f64::NEG_INFINITY;
    let mut max_y = f64::NEG_INFINITY;

    for feature in json["features"].as_array().unwrap() {
        for polygon in feature["geometry"]["coordinates"].as_array().unwrap() {
            for ring in polygon.as_array().unwrap() {
                for position in ring.as_array().unwrap() {
                    let x = position[0].as_f64().unwrap();
                    let y = position[1].as_f64().unwrap();
                    min_x = min_x.min(x);
                    min_y = min_y.min(y);
                    max_x = max_x.max(x);
                    max_y = max_y.max(y);
                }
            }
        }
    }

    (min_x, min_y, max_x, max_y)
}

#[tokio::test]
async fn test_buffer_expands_extent_in_geographic_range() {
    let router = open_router();

    let body = MultipartBuilder::new()
        .file("geojson_polygon", "area.geojson", square_geojson().as_bytes())
        .text("buffer_value", "250")
        .finish();

    let response = router
        .oneshot(multipart_request("/buffer", None, body))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = json_body(response).await;
    assert_eq!(json["type"], "FeatureCollection");
    assert_eq!(json["features"].as_array().unwrap().len(), 1);

    let (min_x, min_y, max_x, max_y) = bounds(&json);

    // Coordinates are geographic
    assert!(min_x >= -180.0 && max_x <= 180.0);
    assert!(min_y >= -90.0 && max_y <= 90.0);

    // The buffered extent strictly contains the input square
    assert!(min_x < 106.80);
    assert!(min_y < -6.20);
    assert!(max_x > 106.81);
    assert!(max_y > -6.19);
}

#[tokio::test]
async fn test_buffer_preserves_properties() {
    let router = open_router();

    let body = MultipartBuilder::new()
        .file("geojson_polygon", "area.geojson", square_geojson().as_bytes())
        .text("buffer_value", "100")
        .finish();

    let response = router
        .oneshot(multipart_request("/buffer", None, body))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = json_body(response).await;
    assert_eq!(json["features"][0]["properties"]["name"], "site");
}

#[tokio::test]
async fn test_buffer_missing_distance_field() {
    let router = open_router();

    let body = MultipartBuilder::new()
        .file("geojson_polygon", "area.geojson", square_geojson().as_bytes())
        .finish();

    let response = router
        .oneshot(multipart_request("/buffer", None, body))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = json_body(response).await;
    assert_eq!(json["error"], "missing_field");
}

#[tokio::test]
async fn test_buffer_non_numeric_distance() {
    let router = open_router();

    let body = MultipartBuilder::new()
        .file("geojson_polygon", "area.geojson", square_geojson().as_bytes())
        .text("buffer_value", "wide")
        .finish();

    let response = router
        .oneshot(multipart_request("/buffer", None, body))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = json_body(response).await;
    assert_eq!(json["error"], "invalid_field");
}

#[tokio::test]
async fn test_buffer_malformed_geojson() {
    let router = open_router();

    let body = MultipartBuilder::new()
        .file("geojson_polygon", "area.geojson", b"{\"type\": \"Nonsense\"}")
        .text("buffer_value", "100")
        .finish();

    let response = router
        .oneshot(multipart_request("/buffer", None, body))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = json_body(response).await;
    assert_eq!(json["error"], "invalid_geojson");
}
