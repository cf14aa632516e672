pub use services::auth::Claims;

/// Claims of the caller, inserted into request extensions by the guards.
#[derive(Debug, Clone)]
pub struct AuthUser(pub Claims);
