mod helpers;

use axum::http::StatusCode;
use chrono::{Duration, Local};
use db::models::room_user::{self, MembershipStatus};
use helpers::app::classroom;
use helpers::{call, make_test_app};
use serde_json::{Value, json};
use serial_test::serial;

fn tomorrow() -> String {
    (Local::now().date_naive() + Duration::days(1)).to_string()
}

fn lecture(name: &str, start: &str, end: &str) -> Value {
    json!({
        "name": name,
        "description": "Graph algorithms",
        "date": tomorrow(),
        "start_time": start,
        "end_time": end
    })
}

#[tokio::test]
#[serial]
async fn owner_creates_and_members_list_schedules() {
    let (app, state) = make_test_app().await;
    let class = classroom(state.db(), false).await;
    let uri = format!("/api/rooms/{}/schedules", class.room.id);

    let body = lecture("Lecture 4", "10:00:00", "11:00:00");
    let (status, json) = call(&app, "POST", &uri, Some(&class.teacher_token()), Some(body)).await;
    assert_eq!(status, StatusCode::CREATED, "{json}");
    assert_eq!(json["message"], "Schedule created");
    assert_eq!(json["data"]["name"], "Lecture 4");
    assert_eq!(json["data"]["start_time"], "10:00:00");

    let (status, json) = call(&app, "GET", &uri, Some(&class.student_token()), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"].as_array().unwrap().len(), 1);

    let (status, _) = call(&app, "GET", &uri, Some(&class.outsider_token()), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
#[serial]
async fn student_cannot_create_schedule() {
    let (app, state) = make_test_app().await;
    let class = classroom(state.db(), false).await;
    let uri = format!("/api/rooms/{}/schedules", class.room.id);

    let body = lecture("Lecture 4", "10:00:00", "11:00:00");
    let (status, json) = call(&app, "POST", &uri, Some(&class.student_token()), Some(body)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(json["success"], false);
}

#[tokio::test]
#[serial]
async fn overlapping_and_invalid_windows_are_rejected() {
    let (app, state) = make_test_app().await;
    let class = classroom(state.db(), false).await;
    let uri = format!("/api/rooms/{}/schedules", class.room.id);
    let token = class.teacher_token();

    let (status, _) = call(&app, "POST", &uri, Some(&token), Some(lecture("A", "10:00:00", "11:00:00"))).await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, json) = call(&app, "POST", &uri, Some(&token), Some(lecture("B", "10:30:00", "11:30:00"))).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(json["message"].as_str().unwrap().contains("10:00 - 11:00"));

    let (status, _) = call(&app, "POST", &uri, Some(&token), Some(lecture("C", "11:00:00", "12:00:00"))).await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, _) = call(&app, "POST", &uri, Some(&token), Some(lecture("", "13:00:00", "14:00:00"))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = call(&app, "POST", &uri, Some(&token), Some(lecture("D", "15:00:00", "14:00:00"))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
#[serial]
async fn owner_updates_a_schedule() {
    let (app, state) = make_test_app().await;
    let class = classroom(state.db(), false).await;
    let uri = format!("/api/rooms/{}/schedules", class.room.id);
    let token = class.teacher_token();

    let (_, json) = call(&app, "POST", &uri, Some(&token), Some(lecture("A", "10:00:00", "11:00:00"))).await;
    let id = json["data"]["id"].as_i64().unwrap();

    let patch = json!({ "name": "A (moved)", "start_time": "10:30:00", "end_time": "11:30:00" });
    let (status, json) = call(&app, "PUT", &format!("{uri}/{id}"), Some(&token), Some(patch)).await;
    assert_eq!(status, StatusCode::OK, "{json}");
    assert_eq!(json["data"]["name"], "A (moved)");
    assert_eq!(json["data"]["end_time"], "11:30:00");

    let (status, _) = call(
        &app,
        "PUT",
        &format!("{uri}/{id}"),
        Some(&class.student_token()),
        Some(json!({ "name": "Hijacked" })),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
#[serial]
async fn records_excuses_and_lookup() {
    let (app, state) = make_test_app().await;
    let class = classroom(state.db(), false).await;
    let base = format!("/api/rooms/{}/schedules", class.room.id);
    let teacher = class.teacher_token();

    let (_, json) = call(&app, "POST", &base, Some(&teacher), Some(lecture("A", "10:00:00", "11:00:00"))).await;
    let id = json["data"]["id"].as_i64().unwrap();

    // A member joining after the window was created gets a record on listing.
    let late_joiner = {
        let u = db::models::user::Model::create(
            state.db(),
            "late",
            "late@test.com",
            "hash",
            "Late",
            "Joiner",
            db::models::user::UserRole::Student,
        )
        .await
        .unwrap();
        room_user::Model::join(state.db(), class.room.id, u.id, MembershipStatus::Accepted)
            .await
            .unwrap();
        u
    };

    let (status, json) = call(&app, "GET", &format!("{base}/{id}/records"), Some(&teacher), None).await;
    assert_eq!(status, StatusCode::OK);
    let rows = json["data"].as_array().unwrap();
    assert_eq!(rows.len(), 2);
    assert!(rows.iter().all(|r| r["status"] == "pending"));
    assert!(rows.iter().any(|r| r["user_id"] == late_joiner.id));

    let (status, _) = call(
        &app,
        "GET",
        &format!("{base}/{id}/records"),
        Some(&class.student_token()),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let excuse = json!({ "user_id": class.student.id, "reason": "Hospital visit" });
    let (status, json) = call(&app, "POST", &format!("{base}/{id}/excuses"), Some(&teacher), Some(excuse.clone())).await;
    assert_eq!(status, StatusCode::CREATED, "{json}");
    assert_eq!(json["data"]["status"], "excused");

    let (status, _) = call(&app, "POST", &format!("{base}/{id}/excuses"), Some(&teacher), Some(excuse)).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let lookup = format!("{base}/{id}/excuses/{}", class.student.id);
    let (status, json) = call(&app, "GET", &lookup, Some(&class.student_token()), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["reason"], "Hospital visit");

    let (status, _) = call(&app, "GET", &lookup, Some(&late_joiner_token(&late_joiner)), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

fn late_joiner_token(u: &db::models::user::Model) -> String {
    helpers::app::token_for(u)
}
