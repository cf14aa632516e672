use axum::{Extension, Json, extract::State, http::StatusCode};
use services::notification;

use crate::auth::AuthUser;
use crate::response::ApiResponse;
use crate::routes::common::{ApiResult, NotificationResponse, error_response};
use crate::state::AppState;

/// GET /api/notifications
///
/// The caller's notifications, newest first.
pub async fn list_notifications(
    State(state): State<AppState>,
    Extension(AuthUser(claims)): Extension<AuthUser>,
) -> ApiResult<Vec<NotificationResponse>> {
    match notification::list_notifications(state.db(), claims.sub).await {
        Ok(rows) => (
            StatusCode::OK,
            Json(ApiResponse::success(
                rows.into_iter().map(NotificationResponse::from).collect(),
                "Notifications retrieved",
            )),
        ),
        Err(e) => error_response(e),
    }
}
