use axum::extract::{Path, State};
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::attachment;
use crate::api::response::{ApiError, AppForm, AppQuery, JSend, JSendPaginated};
use crate::auth::{check_file_access, CurrentUser, MaybeUser};
use crate::error::AppError;
use crate::listing::FileQuery;
use crate::preview::{self, Preview, PreviewKind};
use crate::storage::models::{FileRecord, UserRecord};
use crate::transfer::{self, FileRef};
use crate::AppState;

// ============================================================================
// Types
// ============================================================================

#[derive(Debug, Serialize)]
pub struct FileResponse {
    pub byte_size: u64,
    pub download_count: u64,
    pub filename: String,
    pub id: String,
    pub mime_type: String,
    pub owner: String,
    pub password_protected: bool,
    pub previewable: bool,
    pub uploaded_at: String,
}

#[derive(Debug, Serialize)]
pub struct ShareLink {
    pub link: String,
}

#[derive(Debug, Deserialize)]
pub struct DownloadForm {
    #[serde(default)]
    pub password: Option<String>,
}

type Listing = Json<JSendPaginated<FileResponse>>;

// ============================================================================
// Listing
// ============================================================================

/// `GET /` and `GET /files`: the caller's files, optionally searched, sorted
/// and paginated through the query string.
pub async fn list_files(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    AppQuery(query): AppQuery<FileQuery>,
) -> Result<Listing, ApiError> {
    own_listing(&state, &user, query)
}

pub async fn sort_files(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    Path(criteria): Path<String>,
    AppQuery(query): AppQuery<FileQuery>,
) -> Result<Listing, ApiError> {
    let query = FileQuery {
        sort: Some(criteria),
        ..query
    };
    own_listing(&state, &user, query)
}

pub async fn search_files(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    AppQuery(query): AppQuery<FileQuery>,
) -> Result<Listing, ApiError> {
    own_listing(&state, &user, query)
}

pub async fn page_files(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    Path(page): Path<String>,
    AppQuery(query): AppQuery<FileQuery>,
) -> Result<Listing, ApiError> {
    let page: u32 = page
        .parse()
        .map_err(|_| ApiError::bad_request("page must be a positive integer"))?;
    let query = FileQuery {
        page: Some(page),
        ..query
    };
    own_listing(&state, &user, query)
}

fn own_listing(state: &AppState, user: &UserRecord, query: FileQuery) -> Result<Listing, ApiError> {
    let files = state
        .db
        .get_files_by_owner(&user.username)
        .map_err(AppError::from)?;
    let page = query.apply(files, state.config.page_size)?;
    Ok(JSendPaginated::from_page(page, file_to_response))
}

// ============================================================================
// Single file
// ============================================================================

pub async fn share_file(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<String>,
) -> Result<Json<ShareLink>, ApiError> {
    let file = state
        .db
        .get_file(&id)
        .map_err(AppError::from)?
        .ok_or_else(|| ApiError::not_found("File not found"))?;
    check_file_access(&user, &file)?;

    let base = state.config.public_base_url.trim_end_matches('/');
    Ok(Json(ShareLink {
        link: format!("{base}/files/download/{}", file.id),
    }))
}

/// `GET /files/download/:file_id`. Works without a session; protected files
/// need the POST variant.
pub async fn download_file(
    State(state): State<Arc<AppState>>,
    MaybeUser(actor): MaybeUser,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    let download = transfer::download(&state, FileRef::Id(&id), None).await?;
    log_download(&download.file, actor.as_ref());
    Ok(attachment(download))
}

pub async fn download_file_with_password(
    State(state): State<Arc<AppState>>,
    MaybeUser(actor): MaybeUser,
    Path(id): Path<String>,
    AppForm(form): AppForm<DownloadForm>,
) -> Result<Response, ApiError> {
    let download = transfer::download(&state, FileRef::Id(&id), form.password.as_deref()).await?;
    log_download(&download.file, actor.as_ref());
    Ok(attachment(download))
}

pub async fn delete_file(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<String>,
) -> Result<Json<JSend<FileResponse>>, ApiError> {
    let removed = transfer::delete(&state, &user, &id).await?;
    Ok(JSend::success(file_to_response(&removed)))
}

/// Images come back with their own content type; text as `text/plain`, with
/// `X-Preview-Truncated` set when the content was cut short.
pub async fn preview_file(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    let response = match preview::preview_file(&state, &user, &id).await? {
        Preview::Image { mime_type, data } => {
            let content_type = mime_type
                .parse()
                .unwrap_or(HeaderValue::from_static("application/octet-stream"));
            (StatusCode::OK, [(header::CONTENT_TYPE, content_type)], data).into_response()
        }
        Preview::Text { content, truncated } => {
            let mut response = (
                StatusCode::OK,
                [(
                    header::CONTENT_TYPE,
                    HeaderValue::from_static("text/plain; charset=utf-8"),
                )],
                content,
            )
                .into_response();
            if truncated {
                response
                    .headers_mut()
                    .insert("x-preview-truncated", HeaderValue::from_static("true"));
            }
            response
        }
    };
    Ok(response)
}

// ============================================================================
// Helpers
// ============================================================================

fn log_download(file: &FileRecord, actor: Option<&UserRecord>) {
    let actor = actor.map_or("anonymous", |user| user.username.as_str());
    tracing::debug!(file_id = %file.id, owner = %file.owner, actor = %actor, "Download via link");
}

pub(super) fn file_to_response(file: &FileRecord) -> FileResponse {
    FileResponse {
        byte_size: file.byte_size,
        download_count: file.download_count,
        filename: file.filename.clone(),
        id: file.id.clone(),
        mime_type: file.mime_type.clone(),
        owner: file.owner.clone(),
        password_protected: file.is_protected(),
        previewable: PreviewKind::for_filename(&file.filename).is_some(),
        uploaded_at: file.uploaded_at.to_rfc3339(),
    }
}
