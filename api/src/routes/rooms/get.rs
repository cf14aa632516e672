use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
};
use chrono::Local;
use services::report::{AttendanceSummary, ScheduleStatus, StudentRate, TrendPoint};

use crate::auth::AuthUser;
use crate::response::ApiResponse;
use crate::routes::common::{
    ApiResult, ExcuseResponse, RecordResponse, ScheduleResponse, error_response,
};
use crate::state::AppState;

/// GET /api/rooms/{room_id}/schedules
///
/// Visible to the room owner and accepted members.
pub async fn list_schedules(
    State(state): State<AppState>,
    Path(room_id): Path<i64>,
    Extension(AuthUser(claims)): Extension<AuthUser>,
) -> ApiResult<Vec<ScheduleResponse>> {
    match state.schedules().list_schedules(claims.sub, room_id).await {
        Ok(rows) => (
            StatusCode::OK,
            Json(ApiResponse::success(
                rows.into_iter().map(ScheduleResponse::from).collect(),
                "Schedules retrieved",
            )),
        ),
        Err(e) => error_response(e),
    }
}

/// GET /api/rooms/{room_id}/schedules/{schedule_id}/records
///
/// Owner only. Fills in missing records for accepted members first (`pending`
/// before the window ends, `absent` after) and returns every record.
pub async fn list_records(
    State(state): State<AppState>,
    Path((room_id, schedule_id)): Path<(i64, i64)>,
    Extension(AuthUser(claims)): Extension<AuthUser>,
) -> ApiResult<Vec<RecordResponse>> {
    let now = Local::now().naive_local();
    match state
        .schedules()
        .initialize_records(claims.sub, room_id, schedule_id, now)
        .await
    {
        Ok(rows) => (
            StatusCode::OK,
            Json(ApiResponse::success(
                rows.into_iter().map(RecordResponse::from).collect(),
                "Attendance records retrieved",
            )),
        ),
        Err(e) => error_response(e),
    }
}

/// GET /api/rooms/{room_id}/schedules/{schedule_id}/excuses/{user_id}
pub async fn get_excuse(
    State(state): State<AppState>,
    Path((room_id, schedule_id, user_id)): Path<(i64, i64, i64)>,
    Extension(AuthUser(claims)): Extension<AuthUser>,
) -> ApiResult<ExcuseResponse> {
    match state
        .attendance()
        .get_excuse(claims.sub, room_id, schedule_id, user_id)
        .await
    {
        Ok(excuse) => (
            StatusCode::OK,
            Json(ApiResponse::success(excuse.into(), "Excuse retrieved")),
        ),
        Err(e) => error_response(e),
    }
}

/// GET /api/rooms/{room_id}/attendance/me
///
/// The caller's status for every schedule of the room. Schedules without a
/// record read `pending` until their window ends and `absent` after.
pub async fn my_attendance(
    State(state): State<AppState>,
    Path(room_id): Path<i64>,
    Extension(AuthUser(claims)): Extension<AuthUser>,
) -> ApiResult<Vec<ScheduleStatus>> {
    let now = Local::now().naive_local();
    match state.reports().student_status(claims.sub, room_id, now).await {
        Ok(rows) => (
            StatusCode::OK,
            Json(ApiResponse::success(rows, "Attendance status retrieved")),
        ),
        Err(e) => error_response(e),
    }
}

/// GET /api/rooms/{room_id}/attendance/summary
///
/// Owner only. Present and late both count as attended; open and future
/// windows are not counted.
pub async fn attendance_summary(
    State(state): State<AppState>,
    Path(room_id): Path<i64>,
    Extension(AuthUser(claims)): Extension<AuthUser>,
) -> ApiResult<AttendanceSummary> {
    let now = Local::now().naive_local();
    match state.reports().summary(claims.sub, room_id, now).await {
        Ok(summary) => (
            StatusCode::OK,
            Json(ApiResponse::success(summary, "Attendance summary computed")),
        ),
        Err(e) => error_response(e),
    }
}

/// GET /api/rooms/{room_id}/attendance/students
pub async fn student_rates(
    State(state): State<AppState>,
    Path(room_id): Path<i64>,
    Extension(AuthUser(claims)): Extension<AuthUser>,
) -> ApiResult<Vec<StudentRate>> {
    let now = Local::now().naive_local();
    match state.reports().student_rates(claims.sub, room_id, now).await {
        Ok(rows) => (
            StatusCode::OK,
            Json(ApiResponse::success(rows, "Attendance rates computed")),
        ),
        Err(e) => error_response(e),
    }
}

/// GET /api/rooms/{room_id}/attendance/trend
pub async fn attendance_trend(
    State(state): State<AppState>,
    Path(room_id): Path<i64>,
    Extension(AuthUser(claims)): Extension<AuthUser>,
) -> ApiResult<Vec<TrendPoint>> {
    let now = Local::now().naive_local();
    match state.reports().trend(claims.sub, room_id, now).await {
        Ok(rows) => (
            StatusCode::OK,
            Json(ApiResponse::success(rows, "Attendance trend computed")),
        ),
        Err(e) => error_response(e),
    }
}
