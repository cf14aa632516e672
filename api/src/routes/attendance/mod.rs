use axum::{
    Router,
    routing::{get, post},
};

use crate::state::AppState;

mod get;
mod post;

pub use get::{ScanQuery, scan_room};
pub use post::{TakeAttendanceRequest, TakeAttendanceResponse, take_attendance};

/// Not behind `allow_authenticated`: both calls may carry their token in the
/// request itself.
pub fn attendance_routes() -> Router<AppState> {
    Router::new()
        .route("/scan", get(scan_room))
        .route("/take", post(take_attendance))
}
