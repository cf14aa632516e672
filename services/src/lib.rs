//! Attendance reconciliation core.
//!
//! Leaf modules (`geofence`, `schedule_window`, `face::matcher`) are pure. The
//! stateful services (`attendance`, `schedule`, `enrollment`, `report`, `sweeper`) are plain
//! structs built once at startup and shared by cloning; none of them read global
//! configuration.

pub mod attendance;
pub mod auth;
pub mod enrollment;
pub mod error;
pub mod face;
pub mod geofence;
pub mod notification;
pub mod report;
pub mod schedule;
pub mod schedule_window;
pub mod sweeper;

pub use error::AttendanceError;
