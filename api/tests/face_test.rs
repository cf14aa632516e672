mod helpers;

use axum::http::StatusCode;
use helpers::app::{FACE_IMAGE, NO_FACE_IMAGE, classroom};
use helpers::{call, make_test_app};
use serde_json::json;
use serial_test::serial;

#[tokio::test]
#[serial]
async fn register_then_overwrite() {
    let (app, state) = make_test_app().await;
    let class = classroom(state.db(), true).await;
    let token = class.student_token();

    let (status, json) = call(&app, "GET", "/api/face/registered", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["registered"], false);
    assert!(json["data"]["embedding_id"].is_null());

    let body = json!({ "images": [FACE_IMAGE, FACE_IMAGE] });
    let (status, json) = call(&app, "POST", "/api/face/register", Some(&token), Some(body)).await;
    assert_eq!(status, StatusCode::CREATED, "{json}");
    assert_eq!(json["data"]["templates"], 2);
    let id = json["data"]["id"].as_i64().unwrap();

    let (status, json) = call(&app, "GET", "/api/face/registered", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["registered"], true);
    assert_eq!(json["data"]["embedding_id"], id);

    let body = json!({ "images": [FACE_IMAGE] });
    let (status, _) = call(&app, "POST", "/api/face/register", Some(&token), Some(body.clone())).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, json) = call(&app, "POST", "/api/face/overwrite", Some(&token), Some(body)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["message"], "Face updated");
    assert_eq!(json["data"]["id"], id);
    assert_eq!(json["data"]["templates"], 1);
}

#[tokio::test]
#[serial]
async fn overwrite_without_registration_is_not_found() {
    let (app, state) = make_test_app().await;
    let class = classroom(state.db(), true).await;

    let body = json!({ "images": [FACE_IMAGE] });
    let token = class.student_token();
    let (status, _) = call(&app, "POST", "/api/face/overwrite", Some(&token), Some(body)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
#[serial]
async fn bad_batches_are_rejected() {
    let (app, state) = make_test_app().await;
    let class = classroom(state.db(), true).await;
    let token = class.student_token();

    let (status, json) = call(
        &app,
        "POST",
        "/api/face/register",
        Some(&token),
        Some(json!({ "images": [] })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["message"], "Provide between 1 and 10 images");

    let (status, _) = call(
        &app,
        "POST",
        "/api/face/register",
        Some(&token),
        Some(json!({ "images": ["%%%"] })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = call(
        &app,
        "POST",
        "/api/face/register",
        Some(&token),
        Some(json!({ "images": [FACE_IMAGE, NO_FACE_IMAGE] })),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let (_, json) = call(&app, "GET", "/api/face/registered", Some(&token), None).await;
    assert_eq!(json["data"]["registered"], false);
}
