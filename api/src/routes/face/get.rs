use axum::{Extension, Json, extract::State, http::StatusCode};
use serde::Serialize;

use crate::auth::AuthUser;
use crate::response::ApiResponse;
use crate::routes::common::{ApiResult, error_response};
use crate::state::AppState;

#[derive(Debug, Serialize, Default)]
pub struct FaceStatusResponse {
    pub registered: bool,
    pub embedding_id: Option<i64>,
}

/// GET /api/face/registered
pub async fn face_registered(
    State(state): State<AppState>,
    Extension(AuthUser(claims)): Extension<AuthUser>,
) -> ApiResult<FaceStatusResponse> {
    match state.enrollment().is_face_registered(claims.sub).await {
        Ok(embedding_id) => (
            StatusCode::OK,
            Json(ApiResponse::success(
                FaceStatusResponse {
                    registered: embedding_id.is_some(),
                    embedding_id,
                },
                "Face registration status retrieved",
            )),
        ),
        Err(e) => error_response(e),
    }
}
