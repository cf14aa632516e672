//! Shared response DTOs and the error-to-status mapping used by every handler.

use axum::{Json, http::StatusCode};
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use db::models::attendance_record::{self, AttendanceStatus};
use db::models::{attendance_schedule, excuse, notification};
use serde::Serialize;
use services::AttendanceError;
use validator::ValidationErrors;

use crate::response::ApiResponse;

pub type ApiResult<T> = (StatusCode, Json<ApiResponse<T>>);

const GENERIC_ERROR: &str = "An unexpected error occurred. Please try again later.";

pub fn status_for(err: &AttendanceError) -> StatusCode {
    match err {
        AttendanceError::Unauthenticated => StatusCode::UNAUTHORIZED,
        AttendanceError::Forbidden(_)
        | AttendanceError::GeofenceRejected { .. }
        | AttendanceError::FaceAuthRejected { .. } => StatusCode::FORBIDDEN,
        AttendanceError::NotFound(_) => StatusCode::NOT_FOUND,
        AttendanceError::Conflict(_)
        | AttendanceError::AlreadyMarked
        | AttendanceError::NoActiveWindow => StatusCode::CONFLICT,
        AttendanceError::Validation(_) => StatusCode::BAD_REQUEST,
        AttendanceError::NoFaceDetected | AttendanceError::NoEnrollment => {
            StatusCode::UNPROCESSABLE_ENTITY
        }
        AttendanceError::Timeout => StatusCode::GATEWAY_TIMEOUT,
        AttendanceError::Database(_) | AttendanceError::Internal(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

/// Maps a service error onto the response envelope. Storage and internal
/// failures are logged and replaced by a generic message.
pub fn error_response<T: Serialize + Default>(err: AttendanceError) -> ApiResult<T> {
    let status = status_for(&err);
    let message = if status == StatusCode::INTERNAL_SERVER_ERROR {
        tracing::error!(error = %err, "Request failed");
        GENERIC_ERROR.to_string()
    } else {
        err.to_string()
    };
    (status, Json(ApiResponse::error(message)))
}

pub fn format_validation_errors(errors: &ValidationErrors) -> String {
    errors
        .field_errors()
        .values()
        .flat_map(|errs| {
            errs.iter()
                .filter_map(|e| e.message.as_ref().map(|m| m.to_string()))
        })
        .collect::<Vec<_>>()
        .join("; ")
}

pub fn validation_failed<T: Serialize + Default>(errors: &ValidationErrors) -> ApiResult<T> {
    (
        StatusCode::BAD_REQUEST,
        Json(ApiResponse::error(format_validation_errors(errors))),
    )
}

#[derive(Debug, Serialize, Default)]
pub struct ScheduleResponse {
    pub id: i64,
    pub room_id: i64,
    pub name: String,
    pub description: Option<String>,
    pub date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub archived: bool,
}

impl From<attendance_schedule::Model> for ScheduleResponse {
    fn from(s: attendance_schedule::Model) -> Self {
        Self {
            id: s.id,
            room_id: s.room_id,
            name: s.name,
            description: s.description,
            date: s.date,
            start_time: s.start_time,
            end_time: s.end_time,
            archived: s.archived,
        }
    }
}

#[derive(Debug, Serialize, Default)]
pub struct RecordResponse {
    pub id: i64,
    pub user_id: i64,
    pub schedule_id: i64,
    pub status: AttendanceStatus,
    pub taken_at: Option<NaiveDateTime>,
}

impl From<attendance_record::Model> for RecordResponse {
    fn from(r: attendance_record::Model) -> Self {
        Self {
            id: r.id,
            user_id: r.user_id,
            schedule_id: r.schedule_id,
            status: r.status,
            taken_at: r.taken_at,
        }
    }
}

#[derive(Debug, Serialize, Default)]
pub struct ExcuseResponse {
    pub user_id: i64,
    pub schedule_id: i64,
    pub reason: Option<String>,
    pub created_at: String,
}

impl From<excuse::Model> for ExcuseResponse {
    fn from(e: excuse::Model) -> Self {
        Self {
            user_id: e.user_id,
            schedule_id: e.schedule_id,
            reason: e.reason,
            created_at: e.created_at.to_rfc3339(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct NotificationResponse {
    pub id: i64,
    pub title: String,
    pub message: String,
    pub room_id: Option<i64>,
    pub is_read: bool,
    pub created_at: String,
}

impl From<notification::Model> for NotificationResponse {
    fn from(n: notification::Model) -> Self {
        Self {
            id: n.id,
            title: n.title,
            message: n.message,
            room_id: n.room_id,
            is_read: n.is_read,
            created_at: n.created_at.to_rfc3339(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejections_are_forbidden_and_conflicts_are_409() {
        assert_eq!(
            status_for(&AttendanceError::GeofenceRejected { distance: 73.4 }),
            StatusCode::FORBIDDEN
        );
        assert_eq!(status_for(&AttendanceError::AlreadyMarked), StatusCode::CONFLICT);
        assert_eq!(status_for(&AttendanceError::NoActiveWindow), StatusCode::CONFLICT);
        assert_eq!(status_for(&AttendanceError::Timeout), StatusCode::GATEWAY_TIMEOUT);
    }

    #[test]
    fn internal_errors_are_hidden() {
        let (status, Json(body)) =
            error_response::<()>(AttendanceError::Internal("pool exploded".into()));
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body.message, GENERIC_ERROR);
    }

    #[test]
    fn geofence_message_carries_distance() {
        let (_, Json(body)) =
            error_response::<()>(AttendanceError::GeofenceRejected { distance: 73.456 });
        assert!(body.message.contains("73.46 meters"), "{}", body.message);
    }
}
