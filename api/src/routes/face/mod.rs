use axum::{
    Router,
    routing::{get, post},
};

use crate::state::AppState;

mod get;
mod post;

pub use get::{FaceStatusResponse, face_registered};
pub use post::{FaceImagesRequest, FaceSetResponse, overwrite_face, register_face};

pub fn face_routes() -> Router<AppState> {
    Router::new()
        .route("/register", post(register_face))
        .route("/overwrite", post(overwrite_face))
        .route("/registered", get(face_registered))
}
