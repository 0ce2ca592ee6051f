mod accounts;
mod admin;
mod files;
mod uploads;

use axum::body::Body;
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use tokio_util::io::ReaderStream;

use crate::transfer::Download;

pub use accounts::{login, login_form, logout, register, register_form};
pub use admin::{activity, dashboard, delete_file_admin, delete_user, health};
pub use files::{
    delete_file, download_file, download_file_with_password, list_files, page_files,
    preview_file, search_files, share_file, sort_files,
};
pub use uploads::{serve_upload, upload_file, upload_form};

/// Describes the form a client should submit to the matching POST route.
#[derive(Debug, Serialize)]
pub struct FormDescriptor {
    pub action: &'static str,
    pub method: &'static str,
    pub enctype: &'static str,
    pub fields: &'static [&'static str],
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_upload_size: Option<u64>,
}

/// Stream an authorized download as an attachment.
fn attachment(download: Download) -> Response {
    let Download { file, reader, len } = download;

    let body = Body::from_stream(ReaderStream::new(reader));
    let mut response = (StatusCode::OK, body).into_response();
    let headers = response.headers_mut();

    headers.insert(
        header::CONTENT_TYPE,
        file.mime_type
            .parse()
            .unwrap_or(HeaderValue::from_static("application/octet-stream")),
    );
    headers.insert(header::CONTENT_LENGTH, HeaderValue::from(len));

    // Sanitized names never contain quotes
    if let Ok(value) = format!("attachment; filename=\"{}\"", file.filename).parse() {
        headers.insert(header::CONTENT_DISPOSITION, value);
    }

    // Every fetch has to reach the server to be counted
    headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-store"));

    response
}
