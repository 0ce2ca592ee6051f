//! Inline previews for images and text.

use bytes::Bytes;

use crate::auth::check_file_access;
use crate::error::{AppError, AppResult};
use crate::naming::extension;
use crate::storage::models::{FileRecord, UserRecord};
use crate::AppState;

/// Text previews are cut off after this many bytes.
pub const MAX_TEXT_PREVIEW: usize = 64 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PreviewKind {
    Image,
    Text,
}

/// Extension -> renderer. Adding a format means adding a row.
const PREVIEW_TABLE: &[(&str, PreviewKind)] = &[
    ("bmp", PreviewKind::Image),
    ("gif", PreviewKind::Image),
    ("jpeg", PreviewKind::Image),
    ("jpg", PreviewKind::Image),
    ("png", PreviewKind::Image),
    ("svg", PreviewKind::Image),
    ("webp", PreviewKind::Image),
    ("css", PreviewKind::Text),
    ("csv", PreviewKind::Text),
    ("html", PreviewKind::Text),
    ("js", PreviewKind::Text),
    ("json", PreviewKind::Text),
    ("log", PreviewKind::Text),
    ("md", PreviewKind::Text),
    ("py", PreviewKind::Text),
    ("rs", PreviewKind::Text),
    ("toml", PreviewKind::Text),
    ("txt", PreviewKind::Text),
    ("xml", PreviewKind::Text),
    ("yaml", PreviewKind::Text),
    ("yml", PreviewKind::Text),
];

impl PreviewKind {
    pub fn for_filename(filename: &str) -> Option<Self> {
        let ext = extension(filename)?;
        PREVIEW_TABLE
            .iter()
            .find(|(known, _)| *known == ext)
            .map(|(_, kind)| *kind)
    }
}

#[derive(Debug)]
pub enum Preview {
    Image { mime_type: String, data: Bytes },
    Text { content: String, truncated: bool },
}

impl Preview {
    /// Build a preview of `data` as `kind`.
    pub fn render(kind: PreviewKind, file: &FileRecord, data: Bytes) -> Self {
        match kind {
            PreviewKind::Image => Preview::Image {
                mime_type: file.mime_type.clone(),
                data,
            },
            PreviewKind::Text => {
                let truncated = data.len() > MAX_TEXT_PREVIEW;
                let end = data.len().min(MAX_TEXT_PREVIEW);
                Preview::Text {
                    content: String::from_utf8_lossy(&data[..end]).into_owned(),
                    truncated,
                }
            }
        }
    }
}

/// Preview a file the actor can access. Previews do not count as downloads.
pub async fn preview_file(state: &AppState, actor: &UserRecord, file_id: &str) -> AppResult<Preview> {
    let file = state
        .db
        .get_file(file_id)?
        .ok_or_else(|| AppError::not_found("File not found"))?;
    check_file_access(actor, &file)?;

    let kind = PreviewKind::for_filename(&file.filename)
        .ok_or_else(|| AppError::validation("Preview is not available for this file type"))?;

    let data = state.object_store.get(&file.filename).await?;
    Ok(Preview::render(kind, &file, data))
}
