use axum::{
    Json,
    extract::{Query, State},
    http::StatusCode,
};
use axum_extra::extract::TypedHeader;
use headers::{Authorization, authorization::Bearer};
use serde::Deserialize;
use services::AttendanceError;
use services::attendance::RoomPreview;

use crate::response::ApiResponse;
use crate::routes::common::{ApiResult, error_response};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ScanQuery {
    pub room_id: i64,
    /// Falls back to the `Authorization: Bearer` header when absent.
    pub token: Option<String>,
}

/// GET /api/attendance/scan?room_id={room_id}&token={jwt}
///
/// Decodes a scanned room QR code into the room's attendance requirements, so
/// the client knows to collect a location or a face image before calling
/// `POST /api/attendance/take`.
///
/// ### Responses
/// - `200 OK` with `room_id`, `class_name`, `section`, `description`,
///   `geofence_required`, `face_auth_required` and `archived`
/// - `401 Unauthorized` missing or invalid token
/// - `404 Not Found` unknown room
pub async fn scan_room(
    State(state): State<AppState>,
    bearer: Option<TypedHeader<Authorization<Bearer>>>,
    Query(query): Query<ScanQuery>,
) -> ApiResult<RoomPreview> {
    let Some(token) = query
        .token
        .or_else(|| bearer.map(|TypedHeader(Authorization(b))| b.token().to_owned()))
    else {
        return error_response(AttendanceError::Unauthenticated);
    };

    match state.attendance().preview_room(&token, query.room_id).await {
        Ok(preview) => (
            StatusCode::OK,
            Json(ApiResponse::success(preview, "Room details retrieved")),
        ),
        Err(e) => error_response(e),
    }
}
