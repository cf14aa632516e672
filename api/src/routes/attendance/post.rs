use axum::{
    Json,
    extract::State,
    http::StatusCode,
};
use axum_extra::extract::TypedHeader;
use chrono::{Local, NaiveDateTime};
use db::models::attendance_record::AttendanceStatus;
use headers::{Authorization, authorization::Bearer};
use serde::{Deserialize, Serialize};
use services::AttendanceError;
use services::attendance::{AttendanceOutcome, TakeAttendance};

use crate::response::ApiResponse;
use crate::routes::common::{ApiResult, error_response};
use crate::state::AppState;

/// Coordinates are range-checked by the service, and only for rooms that
/// enforce a geofence.
#[derive(Debug, Deserialize)]
pub struct TakeAttendanceRequest {
    pub room_id: i64,
    /// Falls back to the `Authorization: Bearer` header when absent.
    pub token: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    /// Base64 image, plain or as a data URL.
    pub image: Option<String>,
}

#[derive(Debug, Serialize, Default)]
pub struct TakeAttendanceResponse {
    pub schedule_id: i64,
    pub status: AttendanceStatus,
    pub taken_at: NaiveDateTime,
    pub score: Option<f32>,
    pub distance_m: Option<f64>,
}

impl From<AttendanceOutcome> for TakeAttendanceResponse {
    fn from(o: AttendanceOutcome) -> Self {
        Self {
            schedule_id: o.schedule_id,
            status: o.status,
            taken_at: o.taken_at,
            score: o.score,
            distance_m: o.distance_m,
        }
    }
}

/// POST /api/attendance/take
///
/// Marks the caller present or late for the room's open schedule window.
///
/// ### Request Body
/// ```json
/// {
///   "room_id": 4,
///   "token": "<jwt>",
///   "latitude": -25.7545,
///   "longitude": 28.2314,
///   "image": "data:image/jpeg;base64,..."
/// }
/// ```
/// `latitude`/`longitude` are required when the room enforces a geofence and
/// `image` when it enforces face authentication.
///
/// ### Responses
/// - `200 OK` with the recorded status, face score and distance
/// - `400 Bad Request` missing or malformed coordinates (geofenced rooms) or image
/// - `401 Unauthorized` missing or invalid token
/// - `403 Forbidden` not a member, outside the geofence, or face mismatch
/// - `404 Not Found` unknown room
/// - `409 Conflict` archived room, no open window, or already marked
/// - `422 Unprocessable Entity` no face in the image or no registered face
/// - `504 Gateway Timeout` face verification took too long
pub async fn take_attendance(
    State(state): State<AppState>,
    bearer: Option<TypedHeader<Authorization<Bearer>>>,
    Json(body): Json<TakeAttendanceRequest>,
) -> ApiResult<TakeAttendanceResponse> {
    let Some(token) = body
        .token
        .or_else(|| bearer.map(|TypedHeader(Authorization(b))| b.token().to_owned()))
    else {
        return error_response(AttendanceError::Unauthenticated);
    };

    let req = TakeAttendance {
        room_id: body.room_id,
        token,
        latitude: body.latitude,
        longitude: body.longitude,
        image: body.image,
    };

    match state
        .attendance()
        .take_attendance(req, Local::now().naive_local())
        .await
    {
        Ok(outcome) => {
            let message = format!("Attendance marked as {}", outcome.status);
            (
                StatusCode::OK,
                Json(ApiResponse::success(outcome.into(), message)),
            )
        }
        Err(e) => {
            tracing::info!(room_id = body.room_id, error = %e, "Attendance rejected");
            error_response(e)
        }
    }
}
