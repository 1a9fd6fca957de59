//! API integration tests for tile retrieval and error handling.
//!
//! Tests verify:
//! - Tile retrieval for JPEG and PNG datasets
//! - ETag revalidation
//! - Error cases (unknown dataset, sparse tile, out of range, malformed
//!   coordinates, corrupt store)
//! - Metadata, listing and health endpoints
//! - HTTP response codes and headers

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use tower::ServiceExt;

use mrf_streamer::{create_router, RouterConfig};

use super::test_utils::{
    body_bytes, body_json, build_router, build_service, get, is_valid_jpeg, is_valid_png,
    TestTree,
};

// =============================================================================
// Basic Tile Retrieval
// =============================================================================

#[tokio::test]
async fn test_tile_retrieval_success() {
    let tree = TestTree::new();
    tree.add_gebco();
    let router = build_router(&tree);

    let response = get(router, "/tiles/Tif/tile/0/0/0").await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get("content-type").unwrap(),
        "image/jpeg"
    );
    assert_eq!(
        response.headers().get("cache-control").unwrap(),
        "public, max-age=86400"
    );
    assert_eq!(response.headers().get("x-tile-cache-hit").unwrap(), "false");
    assert!(response.headers().contains_key("etag"));

    let body = body_bytes(response).await;
    assert!(is_valid_jpeg(&body), "Response should be a valid JPEG");
}

#[tokio::test]
async fn test_png_dataset_content_type() {
    let tree = TestTree::new();
    tree.add_shaded();
    let router = build_router(&tree);

    let response = get(router, "/tiles/Shaded/tile/0/0/0").await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers().get("content-type").unwrap(), "image/png");
    assert!(is_valid_png(&body_bytes(response).await));
}

#[tokio::test]
async fn test_every_stored_tile_is_served() {
    let tree = TestTree::new();
    tree.add_gebco();
    let router = build_router(&tree);

    for (col, row) in [(0, 0), (1, 0), (2, 0), (3, 0), (0, 1), (1, 1), (2, 1), (3, 1)] {
        let response = get(router.clone(), &format!("/tiles/Tif/tile/2/{}/{}", col, row)).await;
        assert_eq!(response.status(), StatusCode::OK, "tile 2/{}/{}", col, row);
    }
}

#[tokio::test]
async fn test_second_request_hits_cache() {
    let tree = TestTree::new();
    tree.add_gebco();
    let router = build_router(&tree);

    let first = get(router.clone(), "/tiles/Tif/tile/2/3/1").await;
    let second = get(router, "/tiles/Tif/tile/2/3/1").await;

    assert_eq!(first.headers().get("x-tile-cache-hit").unwrap(), "false");
    assert_eq!(second.headers().get("x-tile-cache-hit").unwrap(), "true");
    assert_eq!(
        first.headers().get("etag").unwrap(),
        second.headers().get("etag").unwrap()
    );
    assert_eq!(body_bytes(first).await, body_bytes(second).await);
}

#[tokio::test]
async fn test_custom_cache_max_age() {
    let tree = TestTree::new();
    tree.add_gebco();
    let router = create_router(
        build_service(&tree),
        RouterConfig::new().with_cache_max_age(60).with_tracing(false),
    );

    let response = get(router, "/tiles/Tif/tile/0/0/0").await;
    assert_eq!(
        response.headers().get("cache-control").unwrap(),
        "public, max-age=60"
    );
}

// =============================================================================
// ETag Revalidation
// =============================================================================

#[tokio::test]
async fn test_if_none_match_returns_304() {
    let tree = TestTree::new();
    tree.add_gebco();
    let router = build_router(&tree);

    let first = get(router.clone(), "/tiles/Tif/tile/1/0/0").await;
    let etag = first.headers().get("etag").unwrap().clone();

    let request = Request::builder()
        .uri("/tiles/Tif/tile/1/0/0")
        .header(header::IF_NONE_MATCH, etag.clone())
        .body(Body::empty())
        .unwrap();
    let response = router.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::NOT_MODIFIED);
    assert_eq!(response.headers().get("etag").unwrap(), &etag);
    assert!(body_bytes(response).await.is_empty());
}

#[tokio::test]
async fn test_stale_etag_returns_tile() {
    let tree = TestTree::new();
    tree.add_gebco();
    let router = build_router(&tree);

    let request = Request::builder()
        .uri("/tiles/Tif/tile/1/0/0")
        .header(header::IF_NONE_MATCH, "\"0000\"")
        .body(Body::empty())
        .unwrap();
    let response = router.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert!(is_valid_jpeg(&body_bytes(response).await));
}

// =============================================================================
// Error Cases
// =============================================================================

#[tokio::test]
async fn test_unknown_dataset() {
    let tree = TestTree::new();
    tree.add_gebco();
    let router = build_router(&tree);

    let response = get(router, "/tiles/UnknownSet/tile/0/0/0").await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let json = body_json(response).await;
    assert_eq!(json["error"], "unknown_dataset");
    assert_eq!(json["status"], 404);
    assert!(!json["message"].as_str().unwrap().contains(tree.path().to_str().unwrap()));
}

#[tokio::test]
async fn test_sparse_tile_is_not_found() {
    let tree = TestTree::new();
    tree.add_gebco();
    let router = build_router(&tree);

    let response = get(router, "/tiles/Tif/tile/1/1/0").await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_json(response).await["error"], "tile_not_found");
}

#[tokio::test]
async fn test_out_of_range_tiles() {
    let tree = TestTree::new();
    tree.add_gebco();
    let router = build_router(&tree);

    for uri in [
        "/tiles/Tif/tile/3/0/0",
        "/tiles/Tif/tile/2/4/0",
        "/tiles/Tif/tile/2/0/2",
        "/tiles/Tif/tile/0/1/0",
    ] {
        let response = get(router.clone(), uri).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND, "{}", uri);
        assert_eq!(body_json(response).await["error"], "tile_out_of_range");
    }
}

#[tokio::test]
async fn test_malformed_coordinates_are_bad_requests() {
    let tree = TestTree::new();
    tree.add_gebco();
    let router = build_router(&tree);

    for uri in [
        "/tiles/Tif/tile/a/0/0",
        "/tiles/Tif/tile/0/-1/0",
        "/tiles/Tif/tile/0/0/+1",
        "/tiles/Tif/tile/0/0/1.5",
        "/tiles/Tif/tile/0/0/99999999999999999999",
        "/tiles/Tif/tile/0/0",
        "/tiles/Tif/tile/0/0/0/0",
        "/tiles/Tif/tile/0//0",
        "/tiles/Tif/tile/%20/0/0",
    ] {
        let response = get(router.clone(), uri).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{}", uri);
        assert_eq!(body_json(response).await["error"], "invalid_coordinates");
    }
}

#[tokio::test]
async fn test_corrupt_store_is_opaque_500() {
    let tree = TestTree::new();
    tree.add_gebco();
    tree.add_broken();
    let router = build_router(&tree);

    let response = get(router.clone(), "/tiles/Broken/tile/0/0/0").await;

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = body_bytes(response).await;
    let text = String::from_utf8_lossy(&body);
    assert!(!text.contains(tree.path().to_str().unwrap()));
    assert!(!text.contains(".pjg"));
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["error"], "store_error");

    // Other datasets keep serving
    let response = get(router, "/tiles/Tif/tile/0/0/0").await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_regexp_declines_unmatched_requests() {
    let tree = TestTree::new();
    tree.add_gebco();
    tree.write_descriptor(
        "Tif/Gebco.webconf",
        "RegExp ^/tiles/Tif/tile/[01]/\nSize 2048 1024 1 2\nPageSize 512 512 1 2\nDataFile Gebco.pjg\nIndexFile Gebco.idx\n",
    );
    let router = build_router(&tree);

    let response = get(router.clone(), "/tiles/Tif/tile/1/0/0").await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = get(router, "/tiles/Tif/tile/2/0/0").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_json(response).await["error"], "unknown_dataset");
}

// =============================================================================
// Metadata, Listing and Health
// =============================================================================

#[tokio::test]
async fn test_dataset_metadata() {
    let tree = TestTree::new();
    tree.add_gebco();
    let router = build_router(&tree);

    let response = get(router, "/tiles/Tif/").await;

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_bytes(response).await;
    assert!(!String::from_utf8_lossy(&body).contains(tree.path().to_str().unwrap()));

    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["route"], "Tif");
    assert_eq!(json["format"], "jpeg");
    assert_eq!(json["width"], 2048);
    assert_eq!(json["height"], 1024);
    assert_eq!(json["max_level"], 2);
    assert_eq!(json["tile_url"], "/tiles/Tif/tile/{z}/{x}/{y}");

    let levels = json["levels"].as_array().unwrap();
    assert_eq!(levels.len(), 3);
    // Finest level first
    assert_eq!(levels[0]["level"], 2);
    assert_eq!(levels[0]["tiles_x"], 4);
    assert_eq!(levels[0]["tiles_y"], 2);
    assert_eq!(levels[2]["level"], 0);
    assert_eq!(levels[2]["tiles_x"], 1);
}

#[tokio::test]
async fn test_datasets_listing() {
    let tree = TestTree::new();
    tree.add_gebco();
    tree.add_shaded();
    let router = build_router(&tree);

    let response = get(router, "/datasets").await;

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    let routes: Vec<&str> = json["datasets"]
        .as_array()
        .unwrap()
        .iter()
        .map(|d| d["route"].as_str().unwrap())
        .collect();
    assert_eq!(routes, vec!["Shaded", "Tif"]);
}

#[tokio::test]
async fn test_health_endpoint() {
    let tree = TestTree::new();
    tree.add_gebco();
    let router = build_router(&tree);

    let response = get(router, "/health").await;

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["status"], "healthy");
    assert_eq!(json["datasets"], 1);
    assert!(json["version"].is_string());
}

// =============================================================================
// CORS
// =============================================================================

#[tokio::test]
async fn test_cors_any_origin() {
    let tree = TestTree::new();
    tree.add_gebco();
    let router = build_router(&tree);

    let request = Request::builder()
        .uri("/tiles/Tif/tile/0/0/0")
        .header(header::ORIGIN, "https://maps.example.com")
        .body(Body::empty())
        .unwrap();
    let response = router.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response
            .headers()
            .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
            .unwrap(),
        "*"
    );
}

#[tokio::test]
async fn test_cors_restricted_origins() {
    let tree = TestTree::new();
    tree.add_gebco();
    let router = create_router(
        build_service(&tree),
        RouterConfig::new()
            .with_cors_origins(vec!["https://allowed.example.com".to_string()])
            .with_tracing(false),
    );

    let request = Request::builder()
        .uri("/tiles/Tif/tile/0/0/0")
        .header(header::ORIGIN, "https://other.example.com")
        .body(Body::empty())
        .unwrap();
    let response = router.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert!(response
        .headers()
        .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
        .is_none());
}
