//! Attendance record lifecycle.
//!
//! ```text
//! pending ──scan──▶ present | late ──teacher──▶ excused
//!    │                                             ▲
//!    └──sweep──▶ absent ─────────teacher───────────┘
//! ```
//!
//! A scan only ever moves `pending` (or a missing row) forward. `present`, `late`
//! and `absent` are final for the scan path; only an explicit excuse moves them.

use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDateTime;
use db::models::attendance_record::{self, AttendanceStatus, RecordKey};
use db::models::{attendance_schedule, excuse, face_embedding, geofence, room, room_user, user};
use sea_orm::{DatabaseConnection, EntityTrait, TransactionTrait};
use serde::Serialize;
use tokio::time::Instant;

use crate::auth::TokenResolver;
use crate::error::AttendanceError;
use crate::face::FaceWorkerPool;
use crate::face::image::decode_base64_image;
use crate::geofence::{self as geo, Coordinate};
use crate::notification::{KIND_ATTENDANCE_MARKED, KIND_EXCUSED, Notice, NotificationEmitter};
use crate::schedule_window::{LATE_CUTOFF_MINUTES, ScheduleWindow};

#[derive(Debug, Clone)]
pub struct AttendancePolicy {
    pub late_cutoff_minutes: i64,
    pub face_match_threshold: f32,
    /// Whether `present`/`late` records may still be excused.
    pub excuse_after_marked: bool,
    /// Overall budget for one take-attendance call, face matching included.
    pub request_timeout: Duration,
}

impl Default for AttendancePolicy {
    fn default() -> Self {
        Self {
            late_cutoff_minutes: LATE_CUTOFF_MINUTES,
            face_match_threshold: 0.80,
            excuse_after_marked: true,
            request_timeout: Duration::from_secs(15),
        }
    }
}

#[derive(Debug, Clone)]
pub struct TakeAttendance {
    pub room_id: i64,
    pub token: String,
    /// Degrees. Only read, and only validated, when the room enforces a geofence.
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    /// Base64 image, optionally as a data URL.
    pub image: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AttendanceOutcome {
    pub schedule_id: i64,
    pub status: AttendanceStatus,
    pub taken_at: NaiveDateTime,
    /// Best face similarity, when face authentication ran.
    pub score: Option<f32>,
    /// Distance from the geofence centre in metres, when the geofence ran.
    pub distance_m: Option<f64>,
}

/// What a scanned room QR code reveals before the student commits to a scan.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct RoomPreview {
    pub room_id: i64,
    pub class_name: String,
    pub section: String,
    pub description: Option<String>,
    pub geofence_required: bool,
    pub face_auth_required: bool,
    pub archived: bool,
}

impl From<&room::Model> for RoomPreview {
    fn from(room: &room::Model) -> Self {
        Self {
            room_id: room.id,
            class_name: room.class_name.clone(),
            section: room.section.clone(),
            description: room.description.clone(),
            geofence_required: room.geofence_required,
            face_auth_required: room.face_auth_required,
            archived: room.archived,
        }
    }
}

#[derive(Clone)]
pub struct AttendanceService {
    db: DatabaseConnection,
    tokens: Arc<dyn TokenResolver>,
    faces: FaceWorkerPool,
    policy: AttendancePolicy,
}

impl AttendanceService {
    pub fn new(
        db: DatabaseConnection,
        tokens: Arc<dyn TokenResolver>,
        faces: FaceWorkerPool,
        policy: AttendancePolicy,
    ) -> Self {
        Self {
            db,
            tokens,
            faces,
            policy,
        }
    }

    pub fn policy(&self) -> &AttendancePolicy {
        &self.policy
    }

    /// Marks the caller present or late for the room's currently open window.
    ///
    /// Preconditions are checked strictly in this order and the first failure is
    /// returned: token, room, membership, geofence, face, open window. Request
    /// fields are only validated by the step that reads them. No
    /// transaction is held while face matching runs on the worker pool.
    pub async fn take_attendance(
        &self,
        req: TakeAttendance,
        now: NaiveDateTime,
    ) -> Result<AttendanceOutcome, AttendanceError> {
        let deadline = Instant::now() + self.policy.request_timeout;
        let db = &self.db;

        let caller = self.tokens.resolve(&req.token).await?;
        let user_id = caller.user_id;

        let room = room::Entity::find_by_id(req.room_id)
            .one(db)
            .await?
            .ok_or_else(|| AttendanceError::not_found("Room not found"))?;
        if room.archived {
            return Err(AttendanceError::conflict(
                "This room is archived and no longer accepts attendance",
            ));
        }

        let accepted = room_user::Model::find_membership(db, room.id, user_id)
            .await?
            .is_some_and(|m| m.is_accepted());
        if !accepted {
            return Err(AttendanceError::forbidden(
                "You are not an accepted member of this room",
            ));
        }

        let distance_m = if room.geofence_required {
            Some(
                self.check_geofence(&room, req.latitude, req.longitude, user_id)
                    .await?,
            )
        } else {
            None
        };

        let score = if room.face_auth_required {
            Some(self.check_face(&room, req.image.as_deref(), user_id, deadline).await?)
        } else {
            None
        };

        let (schedule, window) = self.open_window(room.id, now).await?;
        let status = if window.is_late(now, self.policy.late_cutoff_minutes) {
            AttendanceStatus::Late
        } else {
            AttendanceStatus::Present
        };

        let key = RecordKey::new(room.id, user_id, schedule.id);
        self.write_scan(key, status, now).await?;

        tracing::info!(
            room_id = room.id,
            user_id,
            schedule_id = schedule.id,
            status = %status,
            "Attendance taken"
        );

        self.notify_owner(&room, &schedule, user_id, status).await;

        Ok(AttendanceOutcome {
            schedule_id: schedule.id,
            status,
            taken_at: now,
            score,
            distance_m,
        })
    }

    /// Resolves a scanned QR code to the room's attendance requirements, so the
    /// client knows whether to collect a location or a face image. Any live
    /// account may look; membership is enforced by the scan itself.
    pub async fn preview_room(&self, token: &str, room_id: i64) -> Result<RoomPreview, AttendanceError> {
        self.tokens.resolve(token).await?;

        let room = room::Entity::find_by_id(room_id)
            .one(&self.db)
            .await?
            .ok_or_else(|| AttendanceError::not_found("Room not found"))?;

        Ok(RoomPreview::from(&room))
    }

    async fn check_geofence(
        &self,
        room: &room::Model,
        latitude: Option<f64>,
        longitude: Option<f64>,
        user_id: i64,
    ) -> Result<f64, AttendanceError> {
        let missing = || {
            AttendanceError::conflict("Geofence is required but not configured for this room")
        };
        let geofence_id = room.geofence_id.ok_or_else(missing)?;
        let area = geofence::Entity::find_by_id(geofence_id)
            .one(&self.db)
            .await?
            .ok_or_else(missing)?;

        let point = match (latitude, longitude) {
            (Some(latitude), Some(longitude)) => Coordinate::new(latitude, longitude)?,
            (None, None) => {
                return Err(AttendanceError::validation(
                    "Location is required to take attendance in this room",
                ));
            }
            _ => {
                return Err(AttendanceError::validation(
                    "Latitude and longitude must be provided together",
                ));
            }
        };
        let center = Coordinate::new(area.latitude, area.longitude)?;
        let check = geo::validate(point, center, area.radius)?;

        tracing::info!(
            room_id = room.id,
            user_id,
            geofence_id,
            distance = check.distance_m,
            radius = area.radius,
            accepted = check.within_radius,
            "Geofence validation"
        );

        if !check.within_radius {
            return Err(AttendanceError::GeofenceRejected {
                distance: check.distance_m,
            });
        }
        Ok(check.distance_m)
    }

    async fn check_face(
        &self,
        room: &room::Model,
        image: Option<&str>,
        user_id: i64,
        deadline: Instant,
    ) -> Result<f32, AttendanceError> {
        let image = image.ok_or_else(|| {
            AttendanceError::validation("A face image is required to take attendance in this room")
        })?;
        let bytes = decode_base64_image(image)?;

        let enrolled = face_embedding::Model::find_by_user(&self.db, user_id)
            .await?
            .ok_or(AttendanceError::NoEnrollment)?
            .vectors()?;
        if enrolled.is_empty() {
            return Err(AttendanceError::NoEnrollment);
        }

        let decision = tokio::time::timeout_at(
            deadline,
            self.faces
                .verify(bytes, enrolled, self.policy.face_match_threshold),
        )
        .await
        .map_err(|_| {
            tracing::warn!(room_id = room.id, user_id, "Face verification timed out");
            AttendanceError::Timeout
        })??;

        tracing::info!(
            room_id = room.id,
            user_id,
            score = decision.score,
            top_k = decision.top_k_average,
            accepted = decision.accepted,
            "Face authentication"
        );

        if !decision.accepted {
            return Err(AttendanceError::FaceAuthRejected {
                score: decision.score,
            });
        }
        Ok(decision.score)
    }

    async fn open_window(
        &self,
        room_id: i64,
        now: NaiveDateTime,
    ) -> Result<(attendance_schedule::Model, ScheduleWindow), AttendanceError> {
        let candidates = attendance_schedule::Model::for_room_on(&self.db, room_id, now.date()).await?;
        for schedule in candidates {
            match ScheduleWindow::try_from(&schedule) {
                Ok(window) if window.is_open(now) => return Ok((schedule, window)),
                Ok(_) => {}
                Err(e) => tracing::warn!(schedule_id = schedule.id, error = %e, "Skipping malformed schedule"),
            }
        }
        Err(AttendanceError::NoActiveWindow)
    }

    /// `pending -> status`, else insert, else one more CAS for a pending row that
    /// appeared in between. Anything left is a non-pending row: already marked.
    async fn write_scan(
        &self,
        key: RecordKey,
        status: AttendanceStatus,
        now: NaiveDateTime,
    ) -> Result<(), AttendanceError> {
        let db = &self.db;
        if attendance_record::Model::transition_from_pending(db, key, status, now).await? {
            return Ok(());
        }
        if attendance_record::Model::insert_if_absent(db, key, status, Some(now)).await? {
            return Ok(());
        }
        if attendance_record::Model::transition_from_pending(db, key, status, now).await? {
            return Ok(());
        }
        Err(AttendanceError::AlreadyMarked)
    }

    async fn notify_owner(
        &self,
        room: &room::Model,
        schedule: &attendance_schedule::Model,
        user_id: i64,
        status: AttendanceStatus,
    ) {
        let name = match user::Model::find_active(&self.db, user_id).await {
            Ok(Some(u)) => u.full_name(),
            _ => format!("User {user_id}"),
        };
        let notice = Notice::new(
            room.owner_id,
            "Student Attendance Marked",
            format!(
                "{name} marked attendance as {status} for {} in {}.",
                schedule.name, room.class_name
            ),
        )
        .about(room.id, Some(schedule.id), KIND_ATTENDANCE_MARKED)
        .subject(user_id);

        if let Err(e) = NotificationEmitter::emit(&self.db, &notice).await {
            tracing::error!(room_id = room.id, user_id, error = %e, "Failed to notify room owner");
        }
    }

    /// Records an excuse and moves the student's record to `excused`.
    ///
    /// A missing record is created as `excused`. `present`/`late` records are only
    /// excusable when the policy allows it.
    pub async fn mark_excused(
        &self,
        owner_id: i64,
        room_id: i64,
        schedule_id: i64,
        student_id: i64,
        reason: Option<&str>,
        now: NaiveDateTime,
    ) -> Result<attendance_record::Model, AttendanceError> {
        let room = self.owned_room(owner_id, room_id).await?;
        if room.archived {
            return Err(AttendanceError::conflict("This room is archived"));
        }
        let schedule = attendance_schedule::Model::find_in_room(&self.db, room_id, schedule_id)
            .await?
            .ok_or_else(|| AttendanceError::not_found("Schedule not found"))?;
        let member = room_user::Model::find_membership(&self.db, room_id, student_id)
            .await?
            .is_some_and(|m| m.is_accepted());
        if !member {
            return Err(AttendanceError::not_found(
                "Student is not an accepted member of this room",
            ));
        }

        let mut from = vec![AttendanceStatus::Pending, AttendanceStatus::Absent];
        if self.policy.excuse_after_marked {
            from.extend([AttendanceStatus::Present, AttendanceStatus::Late]);
        }

        let key = RecordKey::new(room_id, student_id, schedule.id);
        let txn = self.db.begin().await?;

        if !excuse::Model::insert_if_absent(&txn, student_id, schedule.id, reason).await? {
            return Err(AttendanceError::conflict(
                "An excuse has already been recorded for this student and schedule",
            ));
        }

        let moved = attendance_record::Model::compare_and_set(
            &txn,
            key,
            &from,
            AttendanceStatus::Excused,
            None,
        )
        .await?
            || attendance_record::Model::insert_if_absent(
                &txn,
                key,
                AttendanceStatus::Excused,
                Some(now),
            )
            .await?;

        if !moved {
            let current = attendance_record::Model::find_by_key(&txn, key)
                .await?
                .map(|r| r.status.to_string())
                .unwrap_or_default();
            return Err(AttendanceError::conflict(format!(
                "A {current} record cannot be excused"
            )));
        }

        let record = attendance_record::Model::find_by_key(&txn, key)
            .await?
            .ok_or_else(|| AttendanceError::Internal("Excused record vanished".into()))?;

        let notice = Notice::new(
            student_id,
            "Attendance Excused",
            format!(
                "Your attendance for {} in {} has been excused.",
                schedule.name, room.class_name
            ),
        )
        .about(room.id, Some(schedule.id), KIND_EXCUSED);
        NotificationEmitter::emit(&txn, &notice).await?;

        txn.commit().await?;

        tracing::info!(room_id, schedule_id, student_id, "Attendance excused");
        Ok(record)
    }

    /// The excuse recorded for `student_id`. Visible to the room owner and the
    /// student.
    pub async fn get_excuse(
        &self,
        requester_id: i64,
        room_id: i64,
        schedule_id: i64,
        student_id: i64,
    ) -> Result<excuse::Model, AttendanceError> {
        let room = room::Entity::find_by_id(room_id)
            .one(&self.db)
            .await?
            .ok_or_else(|| AttendanceError::not_found("Room not found"))?;
        if !room.is_owner(requester_id) && requester_id != student_id {
            return Err(AttendanceError::forbidden("You cannot view this excuse"));
        }
        attendance_schedule::Model::find_in_room(&self.db, room_id, schedule_id)
            .await?
            .ok_or_else(|| AttendanceError::not_found("Schedule not found"))?;

        excuse::Model::find(&self.db, student_id, schedule_id)
            .await?
            .ok_or_else(|| AttendanceError::not_found("No excuse recorded"))
    }

    async fn owned_room(&self, owner_id: i64, room_id: i64) -> Result<room::Model, AttendanceError> {
        let room = room::Entity::find_by_id(room_id)
            .one(&self.db)
            .await?
            .ok_or_else(|| AttendanceError::not_found("Room not found"))?;
        if !room.is_owner(owner_id) {
            return Err(AttendanceError::forbidden(
                "Only the room owner can perform this action",
            ));
        }
        Ok(room)
    }
}
