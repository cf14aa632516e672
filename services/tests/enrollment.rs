mod common;

use std::time::Duration;

use common::*;
use db::models::user::UserRole;
use db::test_utils::setup_test_db;
use services::AttendanceError;
use services::enrollment::FaceEnrollmentService;

#[tokio::test]
async fn register_then_overwrite() {
    let db = setup_test_db().await;
    let alice = create_user(&db, "alice", UserRole::Student).await;
    let service = FaceEnrollmentService::new(db.clone(), face_pool(), Duration::from_secs(5));

    assert_eq!(service.is_face_registered(alice.id).await.unwrap(), None);

    let err = service
        .overwrite_face(alice.id, &[image("alice")])
        .await
        .unwrap_err();
    assert!(matches!(err, AttendanceError::NotFound(_)));

    let set = service
        .register_face(alice.id, &[image("alice"), image("crowd")])
        .await
        .unwrap();
    let vectors = set.vectors().unwrap();
    assert_eq!(vectors.len(), 2);
    // The crowd frame contributes its largest face, normalised.
    assert!((vectors[1][0] - 1.0).abs() < 1e-6);
    assert_eq!(service.is_face_registered(alice.id).await.unwrap(), Some(set.id));

    let err = service
        .register_face(alice.id, &[image("alice")])
        .await
        .unwrap_err();
    assert!(matches!(err, AttendanceError::Conflict(_)));

    let replaced = service
        .overwrite_face(alice.id, &[image("stranger")])
        .await
        .unwrap();
    assert_eq!(replaced.id, set.id);
    assert_eq!(replaced.vectors().unwrap(), vec![vec![0.0, 0.0, 1.0]]);
}

#[tokio::test]
async fn unusable_images_fail_the_whole_batch() {
    let db = setup_test_db().await;
    let alice = create_user(&db, "alice", UserRole::Student).await;
    let service = FaceEnrollmentService::new(db.clone(), face_pool(), Duration::from_secs(5));

    let err = service.register_face(alice.id, &[]).await.unwrap_err();
    assert!(matches!(err, AttendanceError::Validation(_)));

    let err = service
        .register_face(alice.id, &[image("alice"), image("nobody")])
        .await
        .unwrap_err();
    assert!(matches!(err, AttendanceError::NoFaceDetected));

    let err = service
        .register_face(alice.id, &[image("alice"), "not base64!".into()])
        .await
        .unwrap_err();
    assert!(matches!(err, AttendanceError::Validation(_)));

    assert_eq!(service.is_face_registered(alice.id).await.unwrap(), None);
}

#[tokio::test]
async fn slow_enrollment_times_out() {
    let db = setup_test_db().await;
    let alice = create_user(&db, "alice", UserRole::Student).await;
    let service = FaceEnrollmentService::new(db.clone(), face_pool(), Duration::from_millis(50));

    let err = service
        .register_face(alice.id, &[image("slow")])
        .await
        .unwrap_err();
    assert!(matches!(err, AttendanceError::Timeout));
    assert_eq!(service.is_face_registered(alice.id).await.unwrap(), None);
}
