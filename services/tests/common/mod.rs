#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use db::models::room_user::MembershipStatus;
use db::models::user::UserRole;
use db::models::{attendance_schedule, geofence, room, room_user, user};
use sea_orm::DatabaseConnection;
use services::attendance::{AttendancePolicy, AttendanceService, TakeAttendance};
use services::auth::{JwtTokenResolver, issue_token};
use services::face::{DetectedFace, FaceDetector, FaceError, FaceWorkerPool};

pub const SECRET: &str = "test-secret";

/// Interprets image bytes as a label naming a canned detection result.
pub struct StubDetector;

impl FaceDetector for StubDetector {
    fn detect(&self, image: &[u8]) -> Result<Vec<DetectedFace>, FaceError> {
        let face = |bbox: [f32; 4], embedding: Vec<f32>| DetectedFace {
            bbox: bbox.into(),
            embedding,
        };
        match image {
            b"alice" => Ok(vec![face([0.0, 0.0, 100.0, 100.0], vec![1.0, 0.0, 0.0])]),
            b"alice-0.95" => Ok(vec![face(
                [0.0, 0.0, 100.0, 100.0],
                vec![0.95, (1.0f32 - 0.95 * 0.95).sqrt(), 0.0],
            )]),
            b"stranger" => Ok(vec![face([0.0, 0.0, 100.0, 100.0], vec![0.0, 0.0, 1.0])]),
            b"crowd" => Ok(vec![
                face([0.0, 0.0, 20.0, 20.0], vec![0.0, 0.0, 1.0]),
                face([50.0, 50.0, 250.0, 250.0], vec![2.0, 0.0, 0.0]),
            ]),
            b"nobody" => Ok(vec![]),
            b"slow" => {
                std::thread::sleep(Duration::from_millis(400));
                Ok(vec![face([0.0, 0.0, 100.0, 100.0], vec![1.0, 0.0, 0.0])])
            }
            _ => Err(FaceError::Model("unreadable image".into())),
        }
    }
}

pub fn image(label: &str) -> String {
    STANDARD.encode(label.as_bytes())
}

pub fn face_pool() -> FaceWorkerPool {
    FaceWorkerPool::new(Arc::new(StubDetector), 2)
}

pub fn day() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 3, 2).unwrap()
}

pub fn hm(h: u32, m: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(h, m, 0).unwrap()
}

pub fn at(h: u32, m: u32) -> NaiveDateTime {
    day().and_time(hm(h, m))
}

pub async fn create_user(db: &DatabaseConnection, username: &str, role: UserRole) -> user::Model {
    user::Model::create(
        db,
        username,
        &format!("{username}@test.com"),
        "hash",
        username,
        "Test",
        role,
    )
    .await
    .unwrap()
}

pub async fn create_room(
    db: &DatabaseConnection,
    owner: &user::Model,
    geofence_id: Option<i64>,
    geofence_required: bool,
    face_auth_required: bool,
) -> room::Model {
    room::Model::create(
        db,
        owner.id,
        "COS 301",
        "A",
        None,
        geofence_required,
        face_auth_required,
        geofence_id,
    )
    .await
    .unwrap()
}

pub async fn create_geofence(db: &DatabaseConnection, lat: f64, lon: f64, radius: f64) -> geofence::Model {
    geofence::Model::create(db, "Engineering", lat, lon, radius)
        .await
        .unwrap()
}

pub async fn join(db: &DatabaseConnection, room: &room::Model, u: &user::Model, status: MembershipStatus) {
    room_user::Model::join(db, room.id, u.id, status).await.unwrap();
}

pub async fn create_window(
    db: &DatabaseConnection,
    room: &room::Model,
    start: (u32, u32),
    end: (u32, u32),
) -> attendance_schedule::Model {
    attendance_schedule::Model::create(
        db,
        room.id,
        "Lecture",
        None,
        day(),
        hm(start.0, start.1),
        hm(end.0, end.1),
    )
    .await
    .unwrap()
}

pub fn token_for(u: &user::Model) -> String {
    issue_token(SECRET, u.id, u.role, 60).unwrap().0
}

pub fn attendance_service(db: &DatabaseConnection, policy: AttendancePolicy) -> AttendanceService {
    AttendanceService::new(
        db.clone(),
        Arc::new(JwtTokenResolver::new(db.clone(), SECRET)),
        face_pool(),
        policy,
    )
}

pub fn scan(room: &room::Model, u: &user::Model) -> TakeAttendance {
    TakeAttendance {
        room_id: room.id,
        token: token_for(u),
        latitude: None,
        longitude: None,
        image: None,
    }
}
