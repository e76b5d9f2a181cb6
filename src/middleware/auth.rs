// SPDX-License-Identifier: MIT

//! JWT authentication middleware with explicit role claims.
//!
//! The token carries the owner's stored role; handlers authorize each
//! operation against the role it requires. Roles are never inferred from the
//! shape of stored data.

use crate::error::AppError;
use crate::models::{OwnerRole, RecordKind};
use crate::AppState;
use axum::{
    extract::{Request, State},
    http::{header, StatusCode},
    middleware::Next,
    response::Response,
};
use axum_extra::extract::cookie::CookieJar;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// JWT claims structure.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    /// Subject (owner ID)
    pub sub: String,
    /// Stored role tag ("consumer" or "worker")
    pub role: String,
    /// Expiration time (Unix timestamp)
    pub exp: usize,
    /// Issued at (Unix timestamp)
    pub iat: usize,
}

/// Authenticated owner extracted from the JWT.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub owner_id: String,
    pub role: OwnerRole,
}

/// The role an operation on records of this kind requires.
pub fn required_role(kind: RecordKind) -> OwnerRole {
    match kind {
        RecordKind::Activity => OwnerRole::Consumer,
        RecordKind::Visit => OwnerRole::Worker,
    }
}

/// Explicit authorization check run by handlers before any core operation.
pub fn authorize(user: &AuthUser, required: OwnerRole) -> Result<(), AppError> {
    if user.role == required {
        Ok(())
    } else {
        Err(AppError::Unauthorized)
    }
}

/// Middleware that requires valid JWT authentication.
pub async fn require_auth(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    mut request: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    // Try cookie first, then header
    let token = if let Some(cookie) = jar.get("brandsnap_token") {
        cookie.value().to_string()
    } else {
        let auth_header = request
            .headers()
            .get(header::AUTHORIZATION)
            .and_then(|h| h.to_str().ok());

        match auth_header {
            Some(h) if h.starts_with("Bearer ") => h[7..].to_string(),
            _ => return Err(StatusCode::UNAUTHORIZED),
        }
    };

    let key = DecodingKey::from_secret(&state.config.jwt_signing_key);
    let validation = Validation::new(Algorithm::HS256);

    let token_data =
        decode::<Claims>(&token, &key, &validation).map_err(|_| StatusCode::UNAUTHORIZED)?;

    let role: OwnerRole = token_data
        .claims
        .role
        .parse()
        .map_err(|_| StatusCode::UNAUTHORIZED)?;

    let auth_user = AuthUser {
        owner_id: token_data.claims.sub,
        role,
    };
    request.extensions_mut().insert(auth_user);

    Ok(next.run(request).await)
}

/// Create a JWT for an owner session.
pub fn create_jwt(owner_id: &str, role: OwnerRole, signing_key: &[u8]) -> anyhow::Result<String> {
    use jsonwebtoken::{encode, EncodingKey, Header};
    use std::time::{SystemTime, UNIX_EPOCH};

    let now = SystemTime::now().duration_since(UNIX_EPOCH)?.as_secs() as usize;

    let claims = Claims {
        sub: owner_id.to_string(),
        role: role.to_string(),
        iat: now,
        exp: now + 30 * 24 * 60 * 60, // 30 days
    };

    Ok(encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(signing_key),
    )?)
}
