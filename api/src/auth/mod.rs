pub mod claims;
pub mod extractors;
pub mod guards;
pub mod middleware;

pub use claims::{AuthUser, Claims};

use db::models::user::UserRole;
use services::AttendanceError;
use services::auth::issue_token;
use util::config;

/// Generates a JWT and its expiry timestamp for a given user, signed with the
/// configured secret.
pub fn generate_jwt(user_id: i64, role: UserRole) -> Result<(String, String), AttendanceError> {
    let minutes = config::jwt_duration_minutes() as i64;
    issue_token(&config::jwt_secret(), user_id, role, minutes)
}
