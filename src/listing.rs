//! Sorting, searching and paginating file listings.

use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};
use crate::storage::models::FileRecord;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortCriterion {
    /// Newest upload first
    Date,
    /// Largest first
    Size,
    /// Alphabetical
    Name,
}

impl SortCriterion {
    /// Parse a criterion name. Unknown names yield `None`, which listings
    /// treat as "leave in upload order".
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "date" => Some(SortCriterion::Date),
            "size" => Some(SortCriterion::Size),
            "name" => Some(SortCriterion::Name),
            _ => None,
        }
    }
}

/// Stable sort; ties keep upload order.
pub fn sort_files(files: &mut [FileRecord], criterion: SortCriterion) {
    match criterion {
        SortCriterion::Date => files.sort_by(|a, b| b.uploaded_at.cmp(&a.uploaded_at)),
        SortCriterion::Size => files.sort_by(|a, b| b.byte_size.cmp(&a.byte_size)),
        SortCriterion::Name => files.sort_by(|a, b| a.filename.cmp(&b.filename)),
    }
}

/// Case-insensitive substring match on the filename. An empty query keeps
/// everything.
pub fn search_files(files: Vec<FileRecord>, query: &str) -> Vec<FileRecord> {
    let needle = query.trim().to_lowercase();
    if needle.is_empty() {
        return files;
    }
    files
        .into_iter()
        .filter(|f| f.filename.to_lowercase().contains(&needle))
        .collect()
}

/// One page of a listing plus its position in the whole.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub meta: PageMeta,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageMeta {
    pub page: u32,
    pub per_page: u32,
    pub total: u64,
    pub total_pages: u32,
    pub has_next: bool,
    pub has_prev: bool,
}

/// Slice out 1-based page `page`. Pages past the end are empty but still
/// report accurate totals.
pub fn paginate<T>(items: Vec<T>, page: u32, per_page: u32) -> AppResult<Page<T>> {
    if page == 0 {
        return Err(AppError::validation("page numbers start at 1"));
    }
    if per_page == 0 {
        return Err(AppError::validation("page size must be greater than 0"));
    }

    let total = items.len() as u64;
    let total_pages = total.div_ceil(per_page as u64) as u32;
    let offset = (page as usize - 1).saturating_mul(per_page as usize);

    let items: Vec<T> = items
        .into_iter()
        .skip(offset)
        .take(per_page as usize)
        .collect();

    Ok(Page {
        items,
        meta: PageMeta {
            page,
            per_page,
            total,
            total_pages,
            has_next: page < total_pages,
            has_prev: page > 1,
        },
    })
}

/// Combined listing request: search, then sort, then paginate.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FileQuery {
    #[serde(default)]
    pub sort: Option<String>,
    #[serde(default)]
    pub q: Option<String>,
    #[serde(default)]
    pub page: Option<u32>,
}

impl FileQuery {
    pub fn apply(&self, files: Vec<FileRecord>, per_page: u32) -> AppResult<Page<FileRecord>> {
        let mut files = match self.q.as_deref() {
            Some(q) => search_files(files, q),
            None => files,
        };

        if let Some(criterion) = self.sort.as_deref().and_then(SortCriterion::parse) {
            sort_files(&mut files, criterion);
        }

        paginate(files, self.page.unwrap_or(1), per_page)
    }
}
