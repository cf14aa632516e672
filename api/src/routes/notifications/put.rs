use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
};
use serde::Serialize;
use services::notification;

use crate::auth::AuthUser;
use crate::auth::guards::Empty;
use crate::response::ApiResponse;
use crate::routes::common::{ApiResult, error_response};
use crate::state::AppState;

#[derive(Debug, Serialize, Default)]
pub struct MarkedRead {
    pub updated: u64,
}

/// PUT /api/notifications/{notification_id}/read
pub async fn mark_read(
    State(state): State<AppState>,
    Path(notification_id): Path<i64>,
    Extension(AuthUser(claims)): Extension<AuthUser>,
) -> ApiResult<Empty> {
    match notification::mark_as_read(state.db(), claims.sub, notification_id).await {
        Ok(()) => (
            StatusCode::OK,
            Json(ApiResponse::success(Empty, "Notification marked as read")),
        ),
        Err(e) => error_response(e),
    }
}

/// PUT /api/notifications/read-all
pub async fn mark_all_read(
    State(state): State<AppState>,
    Extension(AuthUser(claims)): Extension<AuthUser>,
) -> ApiResult<MarkedRead> {
    match notification::mark_all_as_read(state.db(), claims.sub).await {
        Ok(updated) => (
            StatusCode::OK,
            Json(ApiResponse::success(
                MarkedRead { updated },
                "All notifications marked as read",
            )),
        ),
        Err(e) => error_response(e),
    }
}
