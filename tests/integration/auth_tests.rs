//! Authentication integration tests.
//!
//! Tests verify:
//! - Missing/malformed bearer tokens are rejected before any verification
//!   or geometry work
//! - Rejected tokens surface as 401
//! - Accepted tokens reach the handlers
//! - The health check stays public

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use tower::ServiceExt;

use super::test_utils::{
    json_body, multipart_request, protected_router, squares_shapefile_zip, MockVerifier,
    MultipartBuilder,
};

fn dissolve_body() -> Vec<u8> {
    let file_a = squares_shapefile_zip(&[(0.0, 0.0, 1.0, "a")]);
    MultipartBuilder::new()
        .text("operation", "dissolve")
        .file("file_a", "a.zip", &file_a)
        .finish()
}

#[tokio::test]
async fn test_missing_token_rejected_without_verification() {
    let verifier = Arc::new(MockVerifier::accepting());
    let router = protected_router(Arc::clone(&verifier));

    let response = router
        .oneshot(multipart_request("/process", None, dissolve_body()))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let json = json_body(response).await;
    assert_eq!(json["error"], "missing_token");

    // The provider was never consulted
    assert_eq!(verifier.call_count(), 0);
}

#[tokio::test]
async fn test_malformed_header_rejected() {
    let verifier = Arc::new(MockVerifier::accepting());
    let router = protected_router(Arc::clone(&verifier));

    let request = Request::builder()
        .method("POST")
        .uri("/buffer")
        .header("authorization", "Basic dXNlcjpwYXNz")
        .header(
            "content-type",
            format!(
                "multipart/form-data; boundary={}",
                super::test_utils::BOUNDARY
            ),
        )
        .body(Body::from(dissolve_body()))
        .unwrap();

    let response = router.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let json = json_body(response).await;
    assert_eq!(json["error"], "malformed_token");
    assert_eq!(verifier.call_count(), 0);
}

#[tokio::test]
async fn test_rejected_token_is_401() {
    let verifier = Arc::new(MockVerifier::rejecting());
    let router = protected_router(Arc::clone(&verifier));

    let response = router
        .oneshot(multipart_request(
            "/process",
            Some("expired-token"),
            dissolve_body(),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let json = json_body(response).await;
    assert_eq!(json["error"], "invalid_token");
    assert_eq!(verifier.call_count(), 1);
}

#[tokio::test]
async fn test_accepted_token_reaches_handler() {
    let verifier = Arc::new(MockVerifier::accepting());
    let router = protected_router(Arc::clone(&verifier));

    let response = router
        .oneshot(multipart_request(
            "/process",
            Some("valid-token"),
            dissolve_body(),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(verifier.call_count(), 1);

    let json = json_body(response).await;
    assert_eq!(json["type"], "FeatureCollection");
}

#[tokio::test]
async fn test_health_check_stays_public() {
    let verifier = Arc::new(MockVerifier::accepting());
    let router = protected_router(Arc::clone(&verifier));

    let request = Request::builder().uri("/").body(Body::empty()).unwrap();
    let response = router.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(verifier.call_count(), 0);
}
