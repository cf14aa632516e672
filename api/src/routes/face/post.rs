use axum::{Extension, Json, extract::State, http::StatusCode};
use db::models::face_embedding;
use serde::{Deserialize, Serialize};
use services::AttendanceError;
use validator::Validate;

use crate::auth::AuthUser;
use crate::response::ApiResponse;
use crate::routes::common::{ApiResult, error_response, validation_failed};
use crate::state::AppState;

#[derive(Debug, Deserialize, Validate)]
pub struct FaceImagesRequest {
    /// Base64 images, plain or as data URLs. One template is stored per image.
    #[validate(length(min = 1, max = 10, message = "Provide between 1 and 10 images"))]
    pub images: Vec<String>,
}

#[derive(Debug, Serialize, Default)]
pub struct FaceSetResponse {
    pub id: i64,
    pub templates: usize,
}

impl TryFrom<face_embedding::Model> for FaceSetResponse {
    type Error = AttendanceError;

    fn try_from(set: face_embedding::Model) -> Result<Self, Self::Error> {
        Ok(Self {
            id: set.id,
            templates: set.vectors()?.len(),
        })
    }
}

fn stored(
    result: Result<face_embedding::Model, AttendanceError>,
    status: StatusCode,
    message: &str,
) -> ApiResult<FaceSetResponse> {
    match result.and_then(FaceSetResponse::try_from) {
        Ok(set) => (status, Json(ApiResponse::success(set, message))),
        Err(e) => error_response(e),
    }
}

/// POST /api/face/register
///
/// ### Responses
/// - `201 Created`
/// - `400 Bad Request` no images or an undecodable image
/// - `409 Conflict` a face is already registered
/// - `422 Unprocessable Entity` an image without a face
pub async fn register_face(
    State(state): State<AppState>,
    Extension(AuthUser(claims)): Extension<AuthUser>,
    Json(body): Json<FaceImagesRequest>,
) -> ApiResult<FaceSetResponse> {
    if let Err(errors) = body.validate() {
        return validation_failed(&errors);
    }
    let result = state.enrollment().register_face(claims.sub, &body.images).await;
    stored(result, StatusCode::CREATED, "Face registered")
}

/// POST /api/face/overwrite
///
/// Replaces the caller's templates. `404` when nothing is registered yet.
pub async fn overwrite_face(
    State(state): State<AppState>,
    Extension(AuthUser(claims)): Extension<AuthUser>,
    Json(body): Json<FaceImagesRequest>,
) -> ApiResult<FaceSetResponse> {
    if let Err(errors) = body.validate() {
        return validation_failed(&errors);
    }
    let result = state.enrollment().overwrite_face(claims.sub, &body.images).await;
    stored(result, StatusCode::OK, "Face updated")
}
