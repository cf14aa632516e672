use std::sync::Arc;

use api::auth::generate_jwt;
use api::auth::middleware::log_request;
use api::routes::routes;
use api::state::AppState;
use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode},
    middleware::from_fn,
};
use chrono::{Local, NaiveTime};
use db::models::room_user::MembershipStatus;
use db::models::user::{self, UserRole};
use db::models::{attendance_schedule, room, room_user};
use db::test_utils::setup_test_db;
use sea_orm::DatabaseConnection;
use serde_json::Value;
use services::face::{DetectedFace, FaceDetector, FaceError, FaceWorkerPool};
use services::sweeper::{ReconciliationSweeper, SweepConfig};
use tower::ServiceExt;

/// `"bm9ib2R5"` (`nobody`) has no face; any other payload is one face
/// pointing along the first axis.
struct FixedDetector;

impl FaceDetector for FixedDetector {
    fn detect(&self, image: &[u8]) -> Result<Vec<DetectedFace>, FaceError> {
        if image == b"nobody" {
            return Ok(vec![]);
        }
        Ok(vec![DetectedFace {
            bbox: [0.0, 0.0, 64.0, 64.0].into(),
            embedding: vec![1.0, 0.0, 0.0],
        }])
    }
}

pub const FACE_IMAGE: &str = "ZmFjZQ==";
pub const NO_FACE_IMAGE: &str = "bm9ib2R5";

pub async fn make_test_app() -> (Router, AppState) {
    let db = setup_test_db().await;
    let faces = FaceWorkerPool::new(Arc::new(FixedDetector), 2);
    let sweeper = ReconciliationSweeper::new(db.clone(), SweepConfig::default());
    let state = AppState::new(db, faces, sweeper);

    let app = Router::new()
        .nest("/api", routes(state.clone()))
        .layer(from_fn(log_request));
    (app, state)
}

/// Sends one request and returns the status plus the parsed JSON body.
pub async fn call(
    app: &Router,
    method: &str,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header("Authorization", format!("Bearer {token}"));
    }
    let req = match body {
        Some(json) => builder
            .header("Content-Type", "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(req).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, json)
}

pub struct Classroom {
    pub teacher: user::Model,
    pub student: user::Model,
    pub outsider: user::Model,
    pub room: room::Model,
}

impl Classroom {
    pub fn teacher_token(&self) -> String {
        token_for(&self.teacher)
    }

    pub fn student_token(&self) -> String {
        token_for(&self.student)
    }

    pub fn outsider_token(&self) -> String {
        token_for(&self.outsider)
    }
}

pub fn token_for(u: &user::Model) -> String {
    generate_jwt(u.id, u.role).unwrap().0
}

async fn create_user(db: &DatabaseConnection, name: &str, role: UserRole) -> user::Model {
    user::Model::create(db, name, &format!("{name}@test.com"), "hash", name, "Tester", role)
        .await
        .unwrap()
}

/// A room with no geofence or face requirement, one accepted student and one
/// user who never joined.
pub async fn classroom(db: &DatabaseConnection, face_auth_required: bool) -> Classroom {
    let teacher = create_user(db, "teacher", UserRole::Teacher).await;
    let student = create_user(db, "student", UserRole::Student).await;
    let outsider = create_user(db, "outsider", UserRole::Student).await;
    let room = room::Model::create(
        db,
        teacher.id,
        "COS 301",
        "A",
        Some("Software engineering"),
        false,
        face_auth_required,
        None,
    )
    .await
    .unwrap();
    room_user::Model::join(db, room.id, student.id, MembershipStatus::Accepted)
        .await
        .unwrap();

    Classroom {
        teacher,
        student,
        outsider,
        room,
    }
}

/// A window covering the whole of today, so scans succeed whatever the clock
/// says.
pub async fn all_day_window(db: &DatabaseConnection, room: &room::Model) -> attendance_schedule::Model {
    attendance_schedule::Model::create(
        db,
        room.id,
        "All day",
        None,
        Local::now().date_naive(),
        NaiveTime::MIN,
        NaiveTime::from_hms_opt(23, 59, 59).unwrap(),
    )
    .await
    .unwrap()
}
