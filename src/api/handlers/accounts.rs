use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use axum_extra::extract::cookie::CookieJar;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::FormDescriptor;
use crate::accounts;
use crate::api::response::{ApiError, AppForm, JSend};
use crate::auth::{MaybeUser, SessionKeys};
use crate::error::AppError;
use crate::storage::models::{Role, UserRecord};
use crate::AppState;

// ============================================================================
// Types
// ============================================================================

#[derive(Debug, Serialize)]
pub struct UserResponse {
    pub created_at: String,
    pub id: String,
    pub role: Role,
    pub username: String,
}

#[derive(Deserialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

const CREDENTIAL_FIELDS: &[&str] = &["username", "password"];

// ============================================================================
// Handlers
// ============================================================================

pub async fn login_form() -> Json<JSend<FormDescriptor>> {
    JSend::success(credentials_form("/login"))
}

pub async fn login(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    AppForm(credentials): AppForm<Credentials>,
) -> Result<(CookieJar, Json<JSend<UserResponse>>), ApiError> {
    let user =
        accounts::authenticate(&state, &credentials.username, &credentials.password).await?;
    let token = state.sessions.issue(&user)?;

    tracing::debug!(username = %user.username, "Logged in");
    Ok((
        jar.add(SessionKeys::cookie(token)),
        JSend::success(user_to_response(&user)),
    ))
}

/// Clear the cookie and revoke every outstanding session of the caller.
pub async fn logout(
    State(state): State<Arc<AppState>>,
    MaybeUser(user): MaybeUser,
    jar: CookieJar,
) -> Result<(CookieJar, Json<JSend<()>>), ApiError> {
    if let Some(user) = user {
        state
            .db
            .bump_session_epoch(&user.id)
            .map_err(AppError::from)?;
        tracing::debug!(username = %user.username, "Logged out");
    }
    Ok((jar.remove(SessionKeys::removal_cookie()), JSend::success(())))
}

pub async fn register_form() -> Json<JSend<FormDescriptor>> {
    JSend::success(credentials_form("/register"))
}

pub async fn register(
    State(state): State<Arc<AppState>>,
    AppForm(credentials): AppForm<Credentials>,
) -> Result<(StatusCode, Json<JSend<UserResponse>>), ApiError> {
    let user = accounts::register(
        &state,
        &credentials.username,
        &credentials.password,
        Role::User,
    )
    .await?;

    Ok((StatusCode::CREATED, JSend::success(user_to_response(&user))))
}

// ============================================================================
// Helpers
// ============================================================================

fn credentials_form(action: &'static str) -> FormDescriptor {
    FormDescriptor {
        action,
        method: "POST",
        enctype: "application/x-www-form-urlencoded",
        fields: CREDENTIAL_FIELDS,
        max_upload_size: None,
    }
}

pub(super) fn user_to_response(user: &UserRecord) -> UserResponse {
    UserResponse {
        created_at: user.created_at.to_rfc3339(),
        id: user.id.clone(),
        role: user.role,
        username: user.username.clone(),
    }
}
