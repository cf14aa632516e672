//! HTTP route entry point for `/api/...`.
//!
//! - `/health` → liveness check (public)
//! - `/attendance` → QR-scan attendance; the token travels in the body (public)
//! - `/rooms` → schedules, records and excuses (authenticated)
//! - `/face` → face enrollment (authenticated)
//! - `/notifications` → the caller's notifications (authenticated)

use axum::{Router, middleware::from_fn};

use crate::auth::guards::allow_authenticated;
use crate::state::AppState;

pub mod attendance;
pub mod common;
pub mod face;
pub mod health;
pub mod notifications;
pub mod rooms;

/// Builds the router for everything under `/api`, with state applied.
pub fn routes(app_state: AppState) -> Router {
    Router::new()
        .nest("/health", health::health_routes())
        .nest("/attendance", attendance::attendance_routes())
        .nest(
            "/rooms",
            rooms::room_routes().route_layer(from_fn(allow_authenticated)),
        )
        .nest(
            "/face",
            face::face_routes().route_layer(from_fn(allow_authenticated)),
        )
        .nest(
            "/notifications",
            notifications::notification_routes().route_layer(from_fn(allow_authenticated)),
        )
        .with_state(app_state)
}
