//! Client filename sanitizing.

/// Longest storage key we accept, in bytes.
pub const MAX_FILENAME_LENGTH: usize = 255;

/// Turn a client-supplied filename into a safe storage key.
///
/// Only the last path component survives (both `/` and `\` count as
/// separators). Whitespace becomes `_`, anything outside ASCII
/// alphanumerics, `.`, `-` and `_` is dropped, and leading dots and
/// underscores are stripped so the result can never be hidden, relative or
/// a traversal. Returns `None` when nothing usable is left.
pub fn sanitize_filename(raw: &str) -> Option<String> {
    let last = raw.rsplit(['/', '\\']).next().unwrap_or("");

    let cleaned: String = last
        .chars()
        .filter_map(|c| match c {
            c if c.is_whitespace() => Some('_'),
            c if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') => Some(c),
            _ => None,
        })
        .collect();

    let trimmed = cleaned.trim_start_matches(['.', '_']);
    let mut name = trimmed.to_string();

    if name.len() > MAX_FILENAME_LENGTH {
        // Keep the extension when truncating
        match name.rfind('.') {
            Some(dot) if name.len() - dot <= 16 => {
                let ext = name[dot..].to_string();
                name.truncate(MAX_FILENAME_LENGTH - ext.len());
                name.push_str(&ext);
            }
            _ => name.truncate(MAX_FILENAME_LENGTH),
        }
    }

    if name.is_empty() || name.chars().all(|c| c == '.') {
        None
    } else {
        Some(name)
    }
}

/// Lowercased extension of a sanitized filename, without the dot.
pub fn extension(filename: &str) -> Option<String> {
    let (stem, ext) = filename.rsplit_once('.')?;
    if stem.is_empty() || ext.is_empty() {
        return None;
    }
    Some(ext.to_ascii_lowercase())
}
