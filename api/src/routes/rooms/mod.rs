use axum::{
    Router,
    routing::{get, post, put},
};

use crate::state::AppState;

mod get;
mod post;
mod put;

pub use get::{
    attendance_summary, attendance_trend, get_excuse, list_records, list_schedules, my_attendance,
    student_rates,
};
pub use post::{CreateScheduleRequest, ExcuseRequest, create_schedule, excuse_student};
pub use put::{UpdateScheduleRequest, update_schedule};

/// Routes under `/api/rooms`. Room ownership and membership are checked by the
/// services; the router only requires an authenticated caller.
pub fn room_routes() -> Router<AppState> {
    Router::new()
        .route("/{room_id}/schedules", get(list_schedules).post(create_schedule))
        .route("/{room_id}/schedules/{schedule_id}", put(update_schedule))
        .route("/{room_id}/schedules/{schedule_id}/records", get(list_records))
        .route("/{room_id}/schedules/{schedule_id}/excuses", post(excuse_student))
        .route(
            "/{room_id}/schedules/{schedule_id}/excuses/{user_id}",
            get(get_excuse),
        )
        .route("/{room_id}/attendance/me", get(my_attendance))
        .route("/{room_id}/attendance/summary", get(attendance_summary))
        .route("/{room_id}/attendance/students", get(student_rates))
        .route("/{room_id}/attendance/trend", get(attendance_trend))
}
