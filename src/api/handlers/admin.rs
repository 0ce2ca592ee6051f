use axum::extract::{Path, State};
use axum::Json;
use serde::Serialize;
use std::sync::Arc;

use super::accounts::{user_to_response, UserResponse};
use super::files::{file_to_response, FileResponse};
use crate::accounts;
use crate::api::response::{ApiError, JSend};
use crate::auth::AdminUser;
use crate::error::AppError;
use crate::listing::{sort_files, SortCriterion};
use crate::transfer;
use crate::AppState;

// ============================================================================
// Types
// ============================================================================

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

#[derive(Debug, Serialize)]
pub struct DashboardResponse {
    pub files: Vec<FileResponse>,
    pub users: Vec<UserResponse>,
}

#[derive(Debug, Serialize)]
pub struct DeletedUserResponse {
    pub files_deleted: usize,
    pub user: UserResponse,
}

// ============================================================================
// Handlers
// ============================================================================

pub async fn health() -> Json<JSend<HealthResponse>> {
    JSend::success(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

pub async fn dashboard(
    State(state): State<Arc<AppState>>,
    AdminUser(_admin): AdminUser,
) -> Result<Json<JSend<DashboardResponse>>, ApiError> {
    let users = state.db.list_users().map_err(AppError::from)?;
    let files = state.db.get_all_files().map_err(AppError::from)?;

    Ok(JSend::success(DashboardResponse {
        files: files.iter().map(file_to_response).collect(),
        users: users.iter().map(user_to_response).collect(),
    }))
}

/// Every file, newest upload first.
pub async fn activity(
    State(state): State<Arc<AppState>>,
    AdminUser(_admin): AdminUser,
) -> Result<Json<JSend<Vec<FileResponse>>>, ApiError> {
    let mut files = state.db.get_all_files().map_err(AppError::from)?;
    sort_files(&mut files, SortCriterion::Date);
    Ok(JSend::success(files.iter().map(file_to_response).collect()))
}

pub async fn delete_user(
    State(state): State<Arc<AppState>>,
    AdminUser(admin): AdminUser,
    Path(user_id): Path<String>,
) -> Result<Json<JSend<DeletedUserResponse>>, ApiError> {
    let (user, files_deleted) = accounts::delete_user(&state, &admin, &user_id).await?;
    Ok(JSend::success(DeletedUserResponse {
        files_deleted,
        user: user_to_response(&user),
    }))
}

pub async fn delete_file_admin(
    State(state): State<Arc<AppState>>,
    AdminUser(admin): AdminUser,
    Path(file_id): Path<String>,
) -> Result<Json<JSend<FileResponse>>, ApiError> {
    let removed = transfer::delete(&state, &admin, &file_id).await?;
    Ok(JSend::success(file_to_response(&removed)))
}
