use axum::extract::multipart::MultipartError;
use axum::extract::{Multipart, Path, State};
use axum::http::StatusCode;
use axum::response::Response;
use axum::Json;
use bytes::BytesMut;
use std::sync::Arc;

use super::files::{file_to_response, FileResponse};
use super::{attachment, FormDescriptor};
use crate::api::response::{ApiError, JSend};
use crate::auth::CurrentUser;
use crate::error::AppError;
use crate::transfer::{self, FileRef, Upload};
use crate::AppState;

pub async fn upload_form(
    State(state): State<Arc<AppState>>,
    CurrentUser(_user): CurrentUser,
) -> Json<JSend<FormDescriptor>> {
    JSend::success(FormDescriptor {
        action: "/upload",
        method: "POST",
        enctype: "multipart/form-data",
        fields: &["file", "password"],
        max_upload_size: Some(state.config.max_upload_size),
    })
}

/// Accept a multipart upload with a `file` part and an optional `password`
/// part. The file part is read chunk by chunk and rejected as soon as it
/// passes the configured maximum.
pub async fn upload_file(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<JSend<FileResponse>>), ApiError> {
    let max = state.config.max_upload_size;
    let mut file: Option<(String, BytesMut)> = None;
    let mut password: Option<String> = None;

    while let Some(mut field) = multipart.next_field().await.map_err(multipart_error)? {
        let field_name = field.name().unwrap_or("").to_string();

        match field_name.as_str() {
            "file" => {
                let file_name = field.file_name().unwrap_or("").to_string();
                let mut buf = BytesMut::new();
                while let Some(chunk) = field.chunk().await.map_err(multipart_error)? {
                    if (buf.len() + chunk.len()) as u64 > max {
                        tracing::debug!(
                            username = %user.username,
                            filename = %file_name,
                            "Upload exceeds size limit"
                        );
                        return Err(AppError::PayloadTooLarge(max).into());
                    }
                    buf.extend_from_slice(&chunk);
                }
                file = Some((file_name, buf));
            }
            "password" => {
                password = Some(
                    field
                        .text()
                        .await
                        .map_err(|e| ApiError::bad_request(format!("Invalid password: {e}")))?,
                );
            }
            _ => {
                // Ignore unknown fields
            }
        }
    }

    let (filename, data) =
        file.ok_or_else(|| ApiError::bad_request("No file part in request"))?;

    let record = transfer::upload(
        &state,
        &user,
        Upload {
            filename,
            data: data.freeze(),
            password,
        },
    )
    .await?;

    Ok((StatusCode::CREATED, JSend::success(file_to_response(&record))))
}

/// `GET /uploads/:filename`: raw download by sanitized filename.
pub async fn serve_upload(
    State(state): State<Arc<AppState>>,
    Path(filename): Path<String>,
) -> Result<Response, ApiError> {
    let download = transfer::download(&state, FileRef::Name(&filename), None).await?;
    Ok(attachment(download))
}

fn multipart_error(e: MultipartError) -> ApiError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ApiError::payload_too_large(e.body_text())
    } else {
        ApiError::bad_request(format!("Invalid multipart data: {}", e.body_text()))
    }
}
