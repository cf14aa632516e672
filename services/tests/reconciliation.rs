mod common;

use std::time::Duration;

use common::*;
use db::models::attendance_record::{self, AttendanceStatus, RecordKey};
use db::models::room_user::MembershipStatus;
use db::models::user::UserRole;
use db::models::{attendance_schedule, notification, room, user};
use db::test_utils::setup_test_db;
use sea_orm::{ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, QueryFilter};
use services::attendance::AttendancePolicy;
use services::notification::{KIND_MARKED_ABSENT, Notice, NotificationEmitter};
use services::sweeper::{ReconciliationSweeper, SweepConfig};

fn sweeper(db: &DatabaseConnection, batch_size: u64) -> ReconciliationSweeper {
    ReconciliationSweeper::new(
        db.clone(),
        SweepConfig {
            interval: Duration::from_secs(3600),
            batch_size,
        },
    )
}

async fn titles_for(db: &DatabaseConnection, u: &user::Model) -> Vec<String> {
    notification::Entity::find()
        .filter(notification::Column::UserId.eq(u.id))
        .all(db)
        .await
        .unwrap()
        .into_iter()
        .map(|n| n.title)
        .collect()
}

async fn status_of(
    db: &DatabaseConnection,
    room: &room::Model,
    u: &user::Model,
    schedule: &attendance_schedule::Model,
) -> Option<AttendanceStatus> {
    attendance_record::Model::find_by_key(db, RecordKey::new(room.id, u.id, schedule.id))
        .await
        .unwrap()
        .map(|r| r.status)
}

async fn pending(db: &DatabaseConnection, room: &room::Model, u: &user::Model, s: &attendance_schedule::Model) {
    attendance_record::Model::insert_if_absent(
        db,
        RecordKey::new(room.id, u.id, s.id),
        AttendanceStatus::Pending,
        None,
    )
    .await
    .unwrap();
}

#[tokio::test]
async fn pending_becomes_absent_with_one_notification_each() {
    let db = setup_test_db().await;
    let teacher = create_user(&db, "teacher", UserRole::Teacher).await;
    let alice = create_user(&db, "alice", UserRole::Student).await;
    let room = create_room(&db, &teacher, None, false, false).await;
    join(&db, &room, &alice, MembershipStatus::Accepted).await;
    let schedule = create_window(&db, &room, (10, 0), (11, 0)).await;
    pending(&db, &room, &alice, &schedule).await;
    let sweeper = sweeper(&db, 1000);

    let first = sweeper.run_tick(at(11, 5)).await;
    assert_eq!(first.windows, 1);
    assert_eq!(first.finalized, 1);
    assert_eq!(first.inserted_absent, 0);
    assert_eq!(first.notifications, 2);
    assert_eq!(first.failures, 0);

    assert_eq!(status_of(&db, &room, &alice, &schedule).await, Some(AttendanceStatus::Absent));
    let record = attendance_record::Model::find_by_key(&db, RecordKey::new(room.id, alice.id, schedule.id))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(record.taken_at, Some(at(11, 5)));

    assert_eq!(titles_for(&db, &alice).await, vec!["Marked Absent".to_string()]);
    assert_eq!(titles_for(&db, &teacher).await, vec!["Student Marked Absent".to_string()]);

    let second = sweeper.run_tick(at(11, 10)).await;
    assert_eq!(second.finalized, 0);
    assert_eq!(second.inserted_absent, 0);
    assert_eq!(second.notifications, 0);
    assert_eq!(titles_for(&db, &alice).await.len(), 1);
    assert_eq!(titles_for(&db, &teacher).await.len(), 1);
}

#[tokio::test]
async fn failing_record_rolls_back_alone_and_is_retried_next_tick() {
    let db = setup_test_db().await;
    let teacher = create_user(&db, "teacher", UserRole::Teacher).await;
    let alice = create_user(&db, "alice", UserRole::Student).await;
    let bob = create_user(&db, "bob", UserRole::Student).await;
    let carol = create_user(&db, "carol", UserRole::Student).await;
    let room = create_room(&db, &teacher, None, false, false).await;
    let schedule = create_window(&db, &room, (10, 0), (11, 0)).await;
    for u in [&alice, &bob, &carol] {
        join(&db, &room, u, MembershipStatus::Accepted).await;
        pending(&db, &room, u, &schedule).await;
    }

    db.execute_unprepared(&format!(
        "CREATE TRIGGER reject_bob BEFORE INSERT ON notifications \
         WHEN NEW.user_id = {} BEGIN SELECT RAISE(ABORT, 'notifications unavailable'); END;",
        bob.id
    ))
    .await
    .unwrap();

    let sweeper = sweeper(&db, 1000);
    let first = sweeper.run_tick(at(11, 5)).await;
    assert_eq!(first.failures, 1);
    assert_eq!(first.finalized, 2);
    assert_eq!(first.notifications, 4);
    assert_eq!(status_of(&db, &room, &alice, &schedule).await, Some(AttendanceStatus::Absent));
    assert_eq!(status_of(&db, &room, &carol, &schedule).await, Some(AttendanceStatus::Absent));
    assert_eq!(status_of(&db, &room, &bob, &schedule).await, Some(AttendanceStatus::Pending));
    assert!(titles_for(&db, &bob).await.is_empty());

    db.execute_unprepared("DROP TRIGGER reject_bob").await.unwrap();

    let second = sweeper.run_tick(at(11, 10)).await;
    assert_eq!(second.failures, 0);
    assert_eq!(second.finalized, 1);
    assert_eq!(second.notifications, 2);
    assert_eq!(status_of(&db, &room, &bob, &schedule).await, Some(AttendanceStatus::Absent));
    assert_eq!(titles_for(&db, &bob).await, vec!["Marked Absent".to_string()]);
    assert_eq!(titles_for(&db, &teacher).await.len(), 3);
}

#[tokio::test]
async fn open_window_is_left_alone() {
    let db = setup_test_db().await;
    let teacher = create_user(&db, "teacher", UserRole::Teacher).await;
    let alice = create_user(&db, "alice", UserRole::Student).await;
    let room = create_room(&db, &teacher, None, false, false).await;
    join(&db, &room, &alice, MembershipStatus::Accepted).await;
    let schedule = create_window(&db, &room, (10, 0), (11, 0)).await;
    pending(&db, &room, &alice, &schedule).await;

    let report = sweeper(&db, 1000).run_tick(at(10, 59)).await;
    assert_eq!(report.windows, 0);
    assert_eq!(status_of(&db, &room, &alice, &schedule).await, Some(AttendanceStatus::Pending));
    assert!(titles_for(&db, &alice).await.is_empty());
}

#[tokio::test]
async fn members_without_records_are_backfilled() {
    let db = setup_test_db().await;
    let teacher = create_user(&db, "teacher", UserRole::Teacher).await;
    let alice = create_user(&db, "alice", UserRole::Student).await;
    let bob = create_user(&db, "bob", UserRole::Student).await;
    let carol = create_user(&db, "carol", UserRole::Student).await;
    let room = create_room(&db, &teacher, None, false, false).await;
    join(&db, &room, &alice, MembershipStatus::Accepted).await;
    join(&db, &room, &bob, MembershipStatus::Accepted).await;
    join(&db, &room, &carol, MembershipStatus::Pending).await;
    let schedule = create_window(&db, &room, (10, 0), (11, 0)).await;

    let service = attendance_service(&db, AttendancePolicy::default());
    service.take_attendance(scan(&room, &alice), at(10, 5)).await.unwrap();

    let report = sweeper(&db, 1000).run_tick(at(12, 0)).await;
    assert_eq!(report.inserted_absent, 1);
    assert_eq!(report.finalized, 0);

    assert_eq!(status_of(&db, &room, &alice, &schedule).await, Some(AttendanceStatus::Present));
    assert_eq!(status_of(&db, &room, &bob, &schedule).await, Some(AttendanceStatus::Absent));
    assert_eq!(status_of(&db, &room, &carol, &schedule).await, None);
    assert_eq!(titles_for(&db, &bob).await, vec!["Marked Absent".to_string()]);
}

#[tokio::test]
async fn small_batches_cover_every_pending_record() {
    let db = setup_test_db().await;
    let teacher = create_user(&db, "teacher", UserRole::Teacher).await;
    let room = create_room(&db, &teacher, None, false, false).await;
    let schedule = create_window(&db, &room, (10, 0), (11, 0)).await;
    let mut students = Vec::new();
    for name in ["s1", "s2", "s3"] {
        let s = create_user(&db, name, UserRole::Student).await;
        join(&db, &room, &s, MembershipStatus::Accepted).await;
        pending(&db, &room, &s, &schedule).await;
        students.push(s);
    }

    let report = sweeper(&db, 1).run_tick(at(11, 30)).await;
    assert_eq!(report.finalized, 3);
    assert_eq!(report.notifications, 6);

    for s in &students {
        assert_eq!(status_of(&db, &room, s, &schedule).await, Some(AttendanceStatus::Absent));
    }
    assert_eq!(titles_for(&db, &teacher).await.len(), 3);
}

#[tokio::test]
async fn unread_duplicate_suppresses_notification() {
    let db = setup_test_db().await;
    let teacher = create_user(&db, "teacher", UserRole::Teacher).await;
    let alice = create_user(&db, "alice", UserRole::Student).await;
    let room = create_room(&db, &teacher, None, false, false).await;
    join(&db, &room, &alice, MembershipStatus::Accepted).await;
    let schedule = create_window(&db, &room, (10, 0), (11, 0)).await;
    pending(&db, &room, &alice, &schedule).await;

    let earlier = Notice::new(alice.id, "Marked Absent", "already told")
        .about(room.id, Some(schedule.id), KIND_MARKED_ABSENT);
    NotificationEmitter::emit(&db, &earlier).await.unwrap();

    let report = sweeper(&db, 1000).run_tick(at(11, 5)).await;
    assert_eq!(report.finalized, 1);
    assert_eq!(report.notifications, 1);
    assert_eq!(titles_for(&db, &alice).await.len(), 1);
    assert_eq!(titles_for(&db, &teacher).await.len(), 1);
}

#[tokio::test]
async fn settled_records_are_never_touched() {
    let db = setup_test_db().await;
    let teacher = create_user(&db, "teacher", UserRole::Teacher).await;
    let alice = create_user(&db, "alice", UserRole::Student).await;
    let room = create_room(&db, &teacher, None, false, false).await;
    join(&db, &room, &alice, MembershipStatus::Accepted).await;
    let schedule = create_window(&db, &room, (10, 0), (11, 0)).await;
    let key = RecordKey::new(room.id, alice.id, schedule.id);
    attendance_record::Model::insert_if_absent(&db, key, AttendanceStatus::Excused, Some(at(9, 0)))
        .await
        .unwrap();

    let report = sweeper(&db, 1000).run_tick(at(11, 5)).await;
    assert_eq!((report.finalized, report.inserted_absent), (0, 0));
    assert_eq!(status_of(&db, &room, &alice, &schedule).await, Some(AttendanceStatus::Excused));
}

#[tokio::test]
async fn overlapping_tick_is_skipped() {
    let db = setup_test_db().await;
    let teacher = create_user(&db, "teacher", UserRole::Teacher).await;
    let alice = create_user(&db, "alice", UserRole::Student).await;
    let room = create_room(&db, &teacher, None, false, false).await;
    join(&db, &room, &alice, MembershipStatus::Accepted).await;
    let schedule = create_window(&db, &room, (10, 0), (11, 0)).await;
    pending(&db, &room, &alice, &schedule).await;
    let sweeper = sweeper(&db, 1000);

    let (a, b) = tokio::join!(sweeper.run_tick(at(11, 5)), sweeper.run_tick(at(11, 5)));

    assert_eq!([a.skipped, b.skipped].iter().filter(|s| **s).count(), 1);
    assert_eq!(a.finalized + b.finalized, 1);
    assert_eq!(titles_for(&db, &alice).await.len(), 1);
}

#[tokio::test]
async fn spawned_sweeper_stops_on_request() {
    let db = setup_test_db().await;
    let handle = sweeper(&db, 1000).spawn();
    tokio::time::timeout(Duration::from_secs(5), handle.stop())
        .await
        .expect("sweeper did not stop");
}
