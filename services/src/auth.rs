use async_trait::async_trait;
use chrono::{Duration, Utc};
use db::models::user::{self, UserRole};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use sea_orm::DatabaseConnection;
use serde::{Deserialize, Serialize};

use crate::error::AttendanceError;

/// JWT payload shared by token issuance and resolution.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    pub sub: i64,
    pub exp: usize,
    pub role: UserRole,
}

/// Identity behind a token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedUser {
    pub user_id: i64,
    pub role: UserRole,
}

/// Turns an opaque token into a live user.
#[async_trait]
pub trait TokenResolver: Send + Sync {
    async fn resolve(&self, token: &str) -> Result<ResolvedUser, AttendanceError>;
}

/// Resolves HS256 tokens and checks the subject still exists.
#[derive(Clone)]
pub struct JwtTokenResolver {
    db: DatabaseConnection,
    key: DecodingKey,
}

impl JwtTokenResolver {
    pub fn new(db: DatabaseConnection, secret: &str) -> Self {
        Self {
            db,
            key: DecodingKey::from_secret(secret.as_bytes()),
        }
    }
}

/// Decodes and verifies a token without touching the database.
pub fn decode_claims(token: &str, secret: &str) -> Result<Claims, AttendanceError> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::new(Algorithm::HS256),
    )
    .map(|data| data.claims)
    .map_err(|_| AttendanceError::Unauthenticated)
}

/// Issues a token for `user_id`. Returns the token and its RFC 3339 expiry.
pub fn issue_token(
    secret: &str,
    user_id: i64,
    role: UserRole,
    duration_minutes: i64,
) -> Result<(String, String), AttendanceError> {
    let expiry = Utc::now() + Duration::minutes(duration_minutes);
    let claims = Claims {
        sub: user_id,
        exp: expiry.timestamp() as usize,
        role,
    };

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| AttendanceError::Internal(format!("Token encoding failed: {e}")))?;

    Ok((token, expiry.to_rfc3339()))
}

#[async_trait]
impl TokenResolver for JwtTokenResolver {
    async fn resolve(&self, token: &str) -> Result<ResolvedUser, AttendanceError> {
        let claims = decode::<Claims>(token, &self.key, &Validation::new(Algorithm::HS256))
            .map(|data| data.claims)
            .map_err(|e| {
                tracing::debug!(error = %e, "Rejected attendance token");
                AttendanceError::Unauthenticated
            })?;

        let user = user::Model::find_active(&self.db, claims.sub)
            .await?
            .ok_or(AttendanceError::Unauthenticated)?;

        Ok(ResolvedUser {
            user_id: user.id,
            role: user.role,
        })
    }
}
