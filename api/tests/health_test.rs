mod helpers;

use axum::http::StatusCode;
use helpers::{call, make_test_app};

#[tokio::test]
async fn health_is_public() {
    let (app, _) = make_test_app().await;
    let (status, json) = call(&app, "GET", "/api/health", None, None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["success"], true);
    assert_eq!(json["data"], "OK");
}

#[tokio::test]
async fn unknown_route_is_404() {
    let (app, _) = make_test_app().await;
    let (status, _) = call(&app, "GET", "/api/nope", None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
