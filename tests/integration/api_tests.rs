//! API integration tests for the `/process` endpoint.
//!
//! Tests verify:
//! - Operation results (merge counts, clip extents, dissolve, union)
//! - Error cases (unsupported operation, missing second file, archive
//!   without a shapefile, empty results)
//! - HTTP response codes and bodies

use axum::body::Body;
use axum::http::{Request, StatusCode};
use tower::ServiceExt;

use super::test_utils::{
    json_body, multipart_request, open_router, squares_shapefile_zip, zip_without_shapefile,
    MultipartBuilder,
};

// =============================================================================
// Health Check
// =============================================================================

#[tokio::test]
async fn test_health_check() {
    let router = open_router();

    let request = Request::builder().uri("/").body(Body::empty()).unwrap();
    let response = router.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = json_body(response).await;
    assert_eq!(json["status"], "ok");
    assert!(json["version"].is_string());
}

// =============================================================================
// Operations
// =============================================================================

#[tokio::test]
async fn test_process_merge_concatenates_features() {
    let router = open_router();

    let file_a = squares_shapefile_zip(&[
        (0.0, 0.0, 1.0, "a1"),
        (2.0, 0.0, 1.0, "a2"),
    ]);
    let file_b = squares_shapefile_zip(&[(4.0, 0.0, 1.0, "b1")]);

    let body = MultipartBuilder::new()
        .text("operation", "merge")
        .file("file_a", "a.zip", &file_a)
        .file("file_b", "b.zip", &file_b)
        .finish();

    let response = router
        .oneshot(multipart_request("/process", None, body))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = json_body(response).await;
    assert_eq!(json["type"], "FeatureCollection");
    assert_eq!(json["features"].as_array().unwrap().len(), 3);
}

#[tokio::test]
async fn test_process_clip_extent_within_mask() {
    let router = open_router();

    let file_a = squares_shapefile_zip(&[(0.0, 0.0, 2.0, "subject")]);
    let file_b = squares_shapefile_zip(&[(1.0, 1.0, 2.0, "mask")]);

    let body = MultipartBuilder::new()
        .text("operation", "clip")
        .file("file_a", "a.zip", &file_a)
        .file("file_b", "b.zip", &file_b)
        .finish();

    let response = router
        .oneshot(multipart_request("/process", None, body))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = json_body(response).await;

    // Every output coordinate must fall inside the mask's extent
    let features = json["features"].as_array().unwrap();
    assert!(!features.is_empty());
    for feature in features {
        for ring in feature["geometry"]["coordinates"]
            .as_array()
            .unwrap()
            .iter()
            .flat_map(|polygon| polygon.as_array().unwrap())
        {
            for position in ring.as_array().unwrap() {
                let x = position[0].as_f64().unwrap();
                let y = position[1].as_f64().unwrap();
                assert!((1.0 - 1e-6..=3.0 + 1e-6).contains(&x), "x = {}", x);
                assert!((1.0 - 1e-6..=3.0 + 1e-6).contains(&y), "y = {}", y);
            }
        }
    }
}

#[tokio::test]
async fn test_process_dissolve_single_feature() {
    let router = open_router();

    let file_a = squares_shapefile_zip(&[
        (0.0, 0.0, 1.0, "one"),
        (3.0, 0.0, 1.0, "two"),
    ]);

    let body = MultipartBuilder::new()
        .text("operation", "dissolve")
        .file("file_a", "a.zip", &file_a)
        .finish();

    let response = router
        .oneshot(multipart_request("/process", None, body))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = json_body(response).await;
    assert_eq!(json["features"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_process_dissolve_grouped() {
    let router = open_router();

    let file_a = squares_shapefile_zip(&[
        (0.0, 0.0, 1.0, "zone-a"),
        (2.0, 0.0, 1.0, "zone-a"),
        (4.0, 0.0, 1.0, "zone-b"),
    ]);

    let body = MultipartBuilder::new()
        .text("operation", "dissolve")
        .text("group_by", "name")
        .file("file_a", "a.zip", &file_a)
        .finish();

    let response = router
        .oneshot(multipart_request("/process", None, body))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = json_body(response).await;
    assert_eq!(json["features"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_process_union_single_feature() {
    let router = open_router();

    let file_a = squares_shapefile_zip(&[(0.0, 0.0, 2.0, "a")]);
    let file_b = squares_shapefile_zip(&[(1.0, 0.0, 2.0, "b")]);

    let body = MultipartBuilder::new()
        .text("operation", "union")
        .file("file_a", "a.zip", &file_a)
        .file("file_b", "b.zip", &file_b)
        .finish();

    let response = router
        .oneshot(multipart_request("/process", None, body))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = json_body(response).await;
    assert_eq!(json["features"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_process_intersect_merges_properties() {
    let router = open_router();

    let file_a = squares_shapefile_zip(&[(0.0, 0.0, 2.0, "left")]);
    let file_b = squares_shapefile_zip(&[(1.0, 1.0, 2.0, "right")]);

    let body = MultipartBuilder::new()
        .text("operation", "intersect")
        .file("file_a", "a.zip", &file_a)
        .file("file_b", "b.zip", &file_b)
        .finish();

    let response = router
        .oneshot(multipart_request("/process", None, body))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = json_body(response).await;
    let features = json["features"].as_array().unwrap();
    assert_eq!(features.len(), 1);
    assert_eq!(features[0]["properties"]["name"], "left");
    assert_eq!(features[0]["properties"]["name_2"], "right");
}

// =============================================================================
// Error Cases
// =============================================================================

#[tokio::test]
async fn test_process_unsupported_operation() {
    let router = open_router();

    let file_a = squares_shapefile_zip(&[(0.0, 0.0, 1.0, "a")]);
    let body = MultipartBuilder::new()
        .text("operation", "erode")
        .file("file_a", "a.zip", &file_a)
        .finish();

    let response = router
        .oneshot(multipart_request("/process", None, body))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = json_body(response).await;
    assert_eq!(json["error"], "unsupported_operation");
}

#[tokio::test]
async fn test_process_missing_second_file() {
    let router = open_router();

    let file_a = squares_shapefile_zip(&[(0.0, 0.0, 1.0, "a")]);
    let body = MultipartBuilder::new()
        .text("operation", "clip")
        .file("file_a", "a.zip", &file_a)
        .finish();

    let response = router
        .oneshot(multipart_request("/process", None, body))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = json_body(response).await;
    assert_eq!(json["error"], "missing_second_file");
}

#[tokio::test]
async fn test_process_zip_without_shapefile() {
    let router = open_router();

    let body = MultipartBuilder::new()
        .text("operation", "dissolve")
        .file("file_a", "a.zip", &zip_without_shapefile())
        .finish();

    let response = router
        .oneshot(multipart_request("/process", None, body))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = json_body(response).await;
    assert_eq!(json["error"], "missing_shapefile");
}

#[tokio::test]
async fn test_process_difference_of_identical_is_404() {
    let router = open_router();

    let file_a = squares_shapefile_zip(&[(0.0, 0.0, 1.0, "a")]);
    let file_b = squares_shapefile_zip(&[(0.0, 0.0, 1.0, "b")]);

    let body = MultipartBuilder::new()
        .text("operation", "difference")
        .file("file_a", "a.zip", &file_a)
        .file("file_b", "b.zip", &file_b)
        .finish();

    let response = router
        .oneshot(multipart_request("/process", None, body))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let json = json_body(response).await;
    assert_eq!(json["error"], "empty_result");
}

#[tokio::test]
async fn test_process_missing_operation_field() {
    let router = open_router();

    let file_a = squares_shapefile_zip(&[(0.0, 0.0, 1.0, "a")]);
    let body = MultipartBuilder::new()
        .file("file_a", "a.zip", &file_a)
        .finish();

    let response = router
        .oneshot(multipart_request("/process", None, body))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = json_body(response).await;
    assert_eq!(json["error"], "missing_field");
}
