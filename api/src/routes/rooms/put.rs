use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
};
use chrono::{Local, NaiveDate, NaiveTime};
use serde::Deserialize;
use services::schedule::SchedulePatch;
use validator::Validate;

use crate::auth::AuthUser;
use crate::response::ApiResponse;
use crate::routes::common::{ApiResult, ScheduleResponse, error_response, validation_failed};
use crate::state::AppState;

/// Every field is optional; omitted fields keep their stored value.
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateScheduleRequest {
    #[validate(length(min = 1, max = 100, message = "Schedule name must be 1-100 characters"))]
    pub name: Option<String>,
    #[validate(length(max = 500, message = "Description must be at most 500 characters"))]
    pub description: Option<String>,
    pub date: Option<NaiveDate>,
    pub start_time: Option<NaiveTime>,
    pub end_time: Option<NaiveTime>,
}

/// PUT /api/rooms/{room_id}/schedules/{schedule_id}
///
/// Same rules as creation, applied to the merged schedule. The schedule never
/// overlaps with itself.
pub async fn update_schedule(
    State(state): State<AppState>,
    Path((room_id, schedule_id)): Path<(i64, i64)>,
    Extension(AuthUser(claims)): Extension<AuthUser>,
    Json(body): Json<UpdateScheduleRequest>,
) -> ApiResult<ScheduleResponse> {
    if let Err(errors) = body.validate() {
        return validation_failed(&errors);
    }

    let patch = SchedulePatch {
        name: body.name,
        description: body.description,
        date: body.date,
        start_time: body.start_time,
        end_time: body.end_time,
    };

    match state
        .schedules()
        .update_schedule(claims.sub, room_id, schedule_id, patch, Local::now().naive_local())
        .await
    {
        Ok(schedule) => (
            StatusCode::OK,
            Json(ApiResponse::success(schedule.into(), "Schedule updated")),
        ),
        Err(e) => error_response(e),
    }
}
