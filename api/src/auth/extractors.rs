use axum::{
    extract::FromRequestParts,
    http::{StatusCode, request::Parts},
};
use axum_extra::extract::TypedHeader;
use headers::{Authorization, authorization::Bearer};
use services::auth::decode_claims;
use util::config;

use crate::auth::claims::AuthUser;

/// Implements extraction of `AuthUser` from the `Authorization: Bearer` header.
///
/// The token is verified against the configured `JWT_SECRET`. Whether the user
/// still exists is only checked on the take-attendance path, which resolves its
/// token through the service's `TokenResolver`.
///
/// # Errors
/// Returns `401 Unauthorized` if the header is missing, malformed, or the token is
/// invalid or expired.
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = (StatusCode, &'static str);

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let TypedHeader(Authorization(bearer)) =
            TypedHeader::<Authorization<Bearer>>::from_request_parts(parts, state)
                .await
                .map_err(|_| (StatusCode::UNAUTHORIZED, "Missing or invalid Authorization header"))?;

        let claims = decode_claims(bearer.token(), &config::jwt_secret())
            .map_err(|_| (StatusCode::UNAUTHORIZED, "Invalid or expired token"))?;

        Ok(AuthUser(claims))
    }
}
