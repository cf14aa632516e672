//! Notification delivery boundary.
//!
//! Delivery is a row in `notifications`. The emitter itself never de-duplicates;
//! callers that need at-most-once semantics (the reconciliation sweep) go through
//! [`NotificationEmitter::emit_unless_unread`], which treats unread rows as the
//! ledger.

use db::models::notification::{self, DedupKey};
use sea_orm::{ConnectionTrait, DatabaseConnection, DbErr};

use crate::error::AttendanceError;

pub const KIND_ATTENDANCE_MARKED: &str = "attendance_marked";
pub const KIND_MARKED_ABSENT: &str = "marked_absent";
pub const KIND_STUDENT_MARKED_ABSENT: &str = "student_marked_absent";
pub const KIND_NEW_SCHEDULE: &str = "new_schedule";
pub const KIND_EXCUSED: &str = "excused";

#[derive(Debug, Clone)]
pub struct Notice {
    pub recipient: i64,
    pub title: String,
    pub message: String,
    pub key: DedupKey,
}

impl Notice {
    pub fn new(recipient: i64, title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            recipient,
            title: title.into(),
            message: message.into(),
            key: DedupKey::default(),
        }
    }

    pub fn about(mut self, room_id: i64, schedule_id: Option<i64>, kind: &str) -> Self {
        self.key.room_id = Some(room_id);
        self.key.schedule_id = schedule_id;
        self.key.kind = Some(kind.to_owned());
        self
    }

    pub fn subject(mut self, user_id: i64) -> Self {
        self.key.subject_user_id = Some(user_id);
        self
    }
}

pub struct NotificationEmitter;

impl NotificationEmitter {
    pub async fn emit<C: ConnectionTrait>(db: &C, notice: &Notice) -> Result<(), DbErr> {
        notification::Model::create(db, notice.recipient, &notice.title, &notice.message, &notice.key)
            .await?;
        tracing::debug!(
            recipient = notice.recipient,
            kind = notice.key.kind.as_deref().unwrap_or("-"),
            "Notification emitted"
        );
        Ok(())
    }

    /// Emits unless the recipient already holds an unread notification with the
    /// same key. Returns whether a row was written.
    pub async fn emit_unless_unread<C: ConnectionTrait>(
        db: &C,
        notice: &Notice,
    ) -> Result<bool, DbErr> {
        if notification::Model::unread_exists(db, notice.recipient, &notice.key).await? {
            return Ok(false);
        }
        Self::emit(db, notice).await?;
        Ok(true)
    }
}

pub async fn list_notifications(
    db: &DatabaseConnection,
    user_id: i64,
) -> Result<Vec<notification::Model>, AttendanceError> {
    Ok(notification::Model::list_for_user(db, user_id).await?)
}

pub async fn mark_as_read(
    db: &DatabaseConnection,
    user_id: i64,
    notification_id: i64,
) -> Result<(), AttendanceError> {
    if notification::Model::mark_read(db, user_id, notification_id).await? {
        Ok(())
    } else {
        Err(AttendanceError::not_found("Notification not found"))
    }
}

pub async fn mark_all_as_read(db: &DatabaseConnection, user_id: i64) -> Result<u64, AttendanceError> {
    Ok(notification::Model::mark_all_read(db, user_id).await?)
}
