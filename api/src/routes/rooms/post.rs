use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
};
use chrono::{Local, NaiveDate, NaiveTime};
use serde::Deserialize;
use services::schedule::NewSchedule;
use validator::Validate;

use crate::auth::AuthUser;
use crate::response::ApiResponse;
use crate::routes::common::{
    ApiResult, RecordResponse, ScheduleResponse, error_response, validation_failed,
};
use crate::state::AppState;

#[derive(Debug, Deserialize, Validate)]
pub struct CreateScheduleRequest {
    #[validate(length(min = 1, max = 100, message = "Schedule name must be 1-100 characters"))]
    pub name: String,
    #[validate(length(max = 500, message = "Description must be at most 500 characters"))]
    pub description: Option<String>,
    pub date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
}

/// POST /api/rooms/{room_id}/schedules
///
/// Owner only. Rejects windows in the past, with `start_time >= end_time`, or
/// overlapping another window of the room on the same date.
///
/// ### Request Body
/// ```json
/// {
///   "name": "Lecture 4",
///   "description": "Graph algorithms",
///   "date": "2026-03-02",
///   "start_time": "10:00:00",
///   "end_time": "11:00:00"
/// }
/// ```
///
/// ### Responses
/// - `201 Created`
/// - `400 Bad Request` invalid name, times or date
/// - `403 Forbidden` caller does not own the room
/// - `409 Conflict` overlap or archived room
pub async fn create_schedule(
    State(state): State<AppState>,
    Path(room_id): Path<i64>,
    Extension(AuthUser(claims)): Extension<AuthUser>,
    Json(body): Json<CreateScheduleRequest>,
) -> ApiResult<ScheduleResponse> {
    if let Err(errors) = body.validate() {
        return validation_failed(&errors);
    }

    let input = NewSchedule {
        name: body.name,
        description: body.description,
        date: body.date,
        start_time: body.start_time,
        end_time: body.end_time,
    };

    match state
        .schedules()
        .create_schedule(claims.sub, room_id, input, Local::now().naive_local())
        .await
    {
        Ok(schedule) => (
            StatusCode::CREATED,
            Json(ApiResponse::success(schedule.into(), "Schedule created")),
        ),
        Err(e) => error_response(e),
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct ExcuseRequest {
    pub user_id: i64,
    #[validate(length(max = 1000, message = "Reason must be at most 1000 characters"))]
    pub reason: Option<String>,
}

/// POST /api/rooms/{room_id}/schedules/{schedule_id}/excuses
///
/// Owner only. Records the excuse and moves the student's record to `excused`.
pub async fn excuse_student(
    State(state): State<AppState>,
    Path((room_id, schedule_id)): Path<(i64, i64)>,
    Extension(AuthUser(claims)): Extension<AuthUser>,
    Json(body): Json<ExcuseRequest>,
) -> ApiResult<RecordResponse> {
    if let Err(errors) = body.validate() {
        return validation_failed(&errors);
    }

    match state
        .attendance()
        .mark_excused(
            claims.sub,
            room_id,
            schedule_id,
            body.user_id,
            body.reason.as_deref(),
            Local::now().naive_local(),
        )
        .await
    {
        Ok(record) => (
            StatusCode::CREATED,
            Json(ApiResponse::success(record.into(), "Student excused")),
        ),
        Err(e) => error_response(e),
    }
}
