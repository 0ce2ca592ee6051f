//! Cookie sessions.
//!
//! A session is a HS256-signed token carried in an HttpOnly cookie. The
//! token only names the user; every request reloads the account, so deleted
//! users lose access immediately. Tokens also carry the account's session
//! epoch, and logging out bumps it, which revokes every token issued so far.

use std::sync::Arc;

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::api::response::ApiError;
use crate::error::AppError;
use crate::storage::models::{Role, UserRecord};
use crate::AppState;

/// Name of the session cookie.
pub const SESSION_COOKIE: &str = "session";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionClaims {
    /// User id
    pub sub: String,
    pub username: String,
    pub role: Role,
    /// Session epoch of the account when the token was issued
    #[serde(default)]
    pub epoch: u64,
    pub iat: u64,
    pub exp: u64,
}

/// Signing material for session tokens, derived from the configured secret.
pub struct SessionKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    ttl_secs: u64,
}

impl SessionKeys {
    pub fn new(secret: &str, ttl_secs: u64) -> Self {
        let mut validation = Validation::default();
        validation.validate_exp = true;
        validation.leeway = 0;

        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            validation,
            ttl_secs,
        }
    }

    /// Sign a new session token for `user`.
    pub fn issue(&self, user: &UserRecord) -> Result<String, AppError> {
        let now = chrono::Utc::now().timestamp().max(0) as u64;
        let claims = SessionClaims {
            sub: user.id.clone(),
            username: user.username.clone(),
            role: user.role,
            epoch: user.session_epoch,
            iat: now,
            exp: now + self.ttl_secs,
        };

        encode(&Header::default(), &claims, &self.encoding)
            .map_err(|e| AppError::internal(format!("Failed to sign session: {e}")))
    }

    /// Validate a token's signature and expiry.
    pub fn verify(&self, token: &str) -> Option<SessionClaims> {
        match decode::<SessionClaims>(token, &self.decoding, &self.validation) {
            Ok(data) => Some(data.claims),
            Err(e) => {
                tracing::debug!("Session token rejected: {}", e);
                None
            }
        }
    }

    /// Cookie carrying a freshly issued token.
    pub fn cookie(token: String) -> Cookie<'static> {
        Cookie::build((SESSION_COOKIE, token))
            .path("/")
            .http_only(true)
            .same_site(SameSite::Lax)
            .build()
    }

    /// Cookie that clears the session on the client.
    pub fn removal_cookie() -> Cookie<'static> {
        Cookie::build(SESSION_COOKIE).path("/").build()
    }
}

/// Resolve the session cookie to a live account, if any.
fn session_user(parts: &Parts, state: &AppState) -> Result<Option<UserRecord>, AppError> {
    let jar = CookieJar::from_headers(&parts.headers);
    let Some(cookie) = jar.get(SESSION_COOKIE) else {
        return Ok(None);
    };
    let Some(claims) = state.sessions.verify(cookie.value()) else {
        return Ok(None);
    };

    let Some(user) = state.db.get_user(&claims.sub)? else {
        tracing::debug!(user_id = %claims.sub, "Session refers to a deleted account");
        return Ok(None);
    };
    if user.session_epoch != claims.epoch {
        tracing::debug!(user_id = %claims.sub, "Session was revoked by a logout");
        return Ok(None);
    }
    Ok(Some(user))
}

/// Extractor for requests that must come from a logged-in user.
#[derive(Debug, Clone)]
pub struct CurrentUser(pub UserRecord);

#[axum::async_trait]
impl FromRequestParts<Arc<AppState>> for CurrentUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, ApiError> {
        session_user(parts, state)?
            .map(CurrentUser)
            .ok_or_else(|| AppError::unauthorized("Login required").into())
    }
}

/// Extractor for routes open to anonymous callers.
#[derive(Debug, Clone)]
pub struct MaybeUser(pub Option<UserRecord>);

#[axum::async_trait]
impl FromRequestParts<Arc<AppState>> for MaybeUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, ApiError> {
        Ok(MaybeUser(session_user(parts, state)?))
    }
}

/// Extractor for admin-only routes: anonymous callers get 401, non-admins 403.
#[derive(Debug, Clone)]
pub struct AdminUser(pub UserRecord);

#[axum::async_trait]
impl FromRequestParts<Arc<AppState>> for AdminUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, ApiError> {
        let CurrentUser(user) = CurrentUser::from_request_parts(parts, state).await?;
        super::require_admin(&user)?;
        Ok(AdminUser(user))
    }
}
