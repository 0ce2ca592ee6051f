//! Upload, download and delete: the operations that touch both the object
//! store and the registry.
//!
//! Each one holds the storage key's lock from [`crate::locks::RecordLocks`]
//! while it changes bytes or metadata, so the two never drift apart.

use bytes::Bytes;
use chrono::Utc;

use crate::auth::password::{hash_password_blocking, verify_password_blocking};
use crate::auth::{check_file_access, PasswordError};
use crate::error::{AppError, AppResult};
use crate::naming::sanitize_filename;
use crate::object_store::ObjectReader;
use crate::storage::models::{FileRecord, UserRecord};
use crate::AppState;

/// A file as received from the client.
#[derive(Debug)]
pub struct Upload {
    /// Client-supplied name, not yet sanitized
    pub filename: String,
    pub data: Bytes,
    /// Optional access password; empty means none
    pub password: Option<String>,
}

pub async fn upload(state: &AppState, actor: &UserRecord, upload: Upload) -> AppResult<FileRecord> {
    if upload.filename.trim().is_empty() {
        return Err(AppError::validation("No file selected"));
    }
    let filename = sanitize_filename(&upload.filename)
        .ok_or_else(|| AppError::validation("Filename contains no usable characters"))?;

    let max = state.config.max_upload_size;
    if upload.data.len() as u64 > max {
        return Err(AppError::PayloadTooLarge(max));
    }

    let password_hash = match upload.password.filter(|p| !p.is_empty()) {
        Some(password) => Some(hash_password_blocking(password).await?),
        None => None,
    };

    let _guard = state.locks.lock(&filename).await;

    if state.db.filename_exists(&filename)? {
        return Err(AppError::conflict(format!(
            "A file named '{filename}' already exists"
        )));
    }

    // Phase 1: bytes
    let written = state.object_store.put(&filename, upload.data).await?;

    // Phase 2: metadata, rolling back the bytes if it does not land
    let record = FileRecord {
        id: uuid::Uuid::new_v4().to_string(),
        mime_type: mime_guess::from_path(&filename)
            .first_or_octet_stream()
            .to_string(),
        filename: filename.clone(),
        owner: actor.username.clone(),
        byte_size: written,
        download_count: 0,
        uploaded_at: Utc::now(),
        password_hash,
    };

    match state.db.insert_file(&record) {
        Ok(true) => {}
        Ok(false) => {
            // Only reachable if some writer skipped the key lock
            tracing::error!(filename = %filename, "Filename registered concurrently during upload");
            return Err(AppError::conflict(format!(
                "A file named '{filename}' already exists"
            )));
        }
        Err(e) => {
            if let Err(cleanup) = state.object_store.delete(&filename).await {
                tracing::error!(
                    filename = %filename,
                    error = %cleanup,
                    "Failed to remove bytes after metadata write failed"
                );
            }
            return Err(e.into());
        }
    }

    tracing::debug!(
        file_id = %record.id,
        filename = %record.filename,
        owner = %record.owner,
        byte_size = record.byte_size,
        protected = record.is_protected(),
        "Uploaded file"
    );
    Ok(record)
}

/// How a download names its file.
#[derive(Debug, Clone, Copy)]
pub enum FileRef<'a> {
    Id(&'a str),
    Name(&'a str),
}

/// An authorized download, ready to stream.
pub struct Download {
    /// Record after the counter increment
    pub file: FileRecord,
    pub reader: ObjectReader,
    pub len: u64,
}

/// Resolve and authorize a download, then count it.
///
/// Protected files require the matching password from every caller. The
/// counter moves only once the bytes are open, so failed requests never count.
pub async fn download(
    state: &AppState,
    target: FileRef<'_>,
    password: Option<&str>,
) -> AppResult<Download> {
    let file = match target {
        FileRef::Id(id) => state.db.get_file(id)?,
        FileRef::Name(name) => match sanitize_filename(name) {
            Some(name) => state.db.get_file_by_name(&name)?,
            None => None,
        },
    }
    .ok_or_else(|| AppError::not_found("File not found"))?;

    if let Some(hash) = file.password_hash.clone() {
        let submitted = password
            .filter(|p| !p.is_empty())
            .ok_or_else(|| AppError::unauthorized("This file is password protected"))?;

        verify_password_blocking(submitted.to_string(), hash)
            .await
            .map_err(|e| match e {
                PasswordError::VerificationFailed => {
                    tracing::warn!(file_id = %file.id, "Wrong password for protected file");
                    AppError::unauthorized("Incorrect password")
                }
                other => other.into(),
            })?;
    }

    let _guard = state.locks.lock(&file.filename).await;

    let (reader, len) = state.object_store.open(&file.filename).await?;
    let file = state
        .db
        .record_download(&file.id)?
        .ok_or_else(|| AppError::not_found("File not found"))?;

    tracing::debug!(
        file_id = %file.id,
        download_count = file.download_count,
        "Serving download"
    );
    Ok(Download { file, reader, len })
}

/// Delete a file on behalf of `actor` (owner or admin).
pub async fn delete(state: &AppState, actor: &UserRecord, file_id: &str) -> AppResult<FileRecord> {
    let file = state
        .db
        .get_file(file_id)?
        .ok_or_else(|| AppError::not_found("File not found"))?;
    check_file_access(actor, &file)?;

    let removed = remove_file(state, &file).await?;
    tracing::debug!(
        file_id = %removed.id,
        filename = %removed.filename,
        actor = %actor.username,
        "Deleted file"
    );
    Ok(removed)
}

/// Remove metadata and bytes together. If the bytes cannot be removed the
/// metadata is restored and the error surfaces.
pub(crate) async fn remove_file(state: &AppState, file: &FileRecord) -> AppResult<FileRecord> {
    let _guard = state.locks.lock(&file.filename).await;

    let removed = state
        .db
        .delete_file(&file.id)?
        .ok_or_else(|| AppError::not_found("File not found"))?;

    if let Err(e) = state.object_store.delete(&removed.filename).await {
        tracing::error!(
            file_id = %removed.id,
            error = %e,
            "Failed to delete stored bytes, restoring metadata"
        );
        if let Err(restore) = state.db.insert_file(&removed) {
            tracing::error!(file_id = %removed.id, error = %restore, "Failed to restore metadata");
        }
        return Err(e.into());
    }

    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::models::Role;
    use crate::testutil::{flaky_state, insert_user, test_state};
    use std::sync::Arc;
    use tokio::io::AsyncReadExt;

    fn upload_of(name: &str, data: &'static [u8], password: Option<&str>) -> Upload {
        Upload {
            filename: name.to_string(),
            data: Bytes::from_static(data),
            password: password.map(str::to_string),
        }
    }

    async fn read_all(download: Download) -> Vec<u8> {
        let mut reader = download.reader;
        let mut buf = Vec::new();
        reader.read_to_end(&mut buf).await.unwrap();
        buf
    }

    #[tokio::test]
    async fn test_upload_then_download_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let state = test_state(&dir);
        let alice = insert_user(&state, "alice", Role::User);

        let record = upload(&state, &alice, upload_of("hello.txt", b"hello world", None))
            .await
            .unwrap();
        assert_eq!(record.filename, "hello.txt");
        assert_eq!(record.owner, "alice");
        assert_eq!(record.byte_size, 11);
        assert_eq!(record.download_count, 0);
        assert_eq!(record.mime_type, "text/plain");

        let by_name = download(&state, FileRef::Name("hello.txt"), None).await.unwrap();
        assert_eq!(by_name.len, 11);
        assert_eq!(read_all(by_name).await, b"hello world");

        let by_id = download(&state, FileRef::Id(&record.id), None).await.unwrap();
        assert_eq!(by_id.file.download_count, 2);
    }

    #[tokio::test]
    async fn test_upload_sanitizes_name() {
        let dir = tempfile::tempdir().unwrap();
        let state = test_state(&dir);
        let alice = insert_user(&state, "alice", Role::User);

        let record = upload(&state, &alice, upload_of("../../etc/my notes.txt", b"x", None))
            .await
            .unwrap();
        assert_eq!(record.filename, "my_notes.txt");
        assert!(dir.path().join("uploads").join("my_notes.txt").exists());
    }

    #[tokio::test]
    async fn test_upload_rejects_unusable_names() {
        let dir = tempfile::tempdir().unwrap();
        let state = test_state(&dir);
        let alice = insert_user(&state, "alice", Role::User);

        for name in ["", "   ", "..", "/"] {
            let result = upload(&state, &alice, upload_of(name, b"x", None)).await;
            assert!(
                matches!(result, Err(AppError::Validation(_))),
                "{name:?} should be rejected"
            );
        }
        assert!(state.db.get_all_files().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_upload_too_large() {
        let dir = tempfile::tempdir().unwrap();
        let state = test_state(&dir);
        let alice = insert_user(&state, "alice", Role::User);

        let big = Upload {
            filename: "big.bin".to_string(),
            data: Bytes::from(vec![0u8; 1025]),
            password: None,
        };
        assert!(matches!(
            upload(&state, &alice, big).await,
            Err(AppError::PayloadTooLarge(1024))
        ));
        assert!(!state.db.filename_exists("big.bin").unwrap());
        assert!(!dir.path().join("uploads").join("big.bin").exists());
    }

    #[tokio::test]
    async fn test_duplicate_name_conflicts_and_keeps_original() {
        let dir = tempfile::tempdir().unwrap();
        let state = test_state(&dir);
        let alice = insert_user(&state, "alice", Role::User);
        let bob = insert_user(&state, "bob", Role::User);

        upload(&state, &alice, upload_of("shared.txt", b"original", None))
            .await
            .unwrap();
        let second = upload(&state, &bob, upload_of("shared.txt", b"imposter", None)).await;
        assert!(matches!(second, Err(AppError::Conflict(_))));

        let data = state.object_store.get("shared.txt").await.unwrap();
        assert_eq!(data, Bytes::from_static(b"original"));
    }

    #[tokio::test]
    async fn test_protected_download_requires_password() {
        let dir = tempfile::tempdir().unwrap();
        let state = test_state(&dir);
        let alice = insert_user(&state, "alice", Role::User);

        let record = upload(&state, &alice, upload_of("secret.txt", b"classified", Some("opensesame")))
            .await
            .unwrap();
        assert!(record.is_protected());
        assert_ne!(record.password_hash.as_deref(), Some("opensesame"));

        let missing = download(&state, FileRef::Id(&record.id), None).await;
        assert!(matches!(missing, Err(AppError::Unauthorized(_))));

        let wrong = download(&state, FileRef::Id(&record.id), Some("guess")).await;
        assert!(matches!(wrong, Err(AppError::Unauthorized(_))));

        let stored = state.db.get_file(&record.id).unwrap().unwrap();
        assert_eq!(stored.download_count, 0);

        let ok = download(&state, FileRef::Id(&record.id), Some("opensesame"))
            .await
            .unwrap();
        assert_eq!(ok.file.download_count, 1);
        assert_eq!(read_all(ok).await, b"classified");
    }

    #[tokio::test]
    async fn test_empty_password_means_unprotected() {
        let dir = tempfile::tempdir().unwrap();
        let state = test_state(&dir);
        let alice = insert_user(&state, "alice", Role::User);

        let record = upload(&state, &alice, upload_of("open.txt", b"x", Some("")))
            .await
            .unwrap();
        assert!(!record.is_protected());
    }

    #[tokio::test]
    async fn test_missing_bytes_is_not_found_and_not_counted() {
        let dir = tempfile::tempdir().unwrap();
        let state = test_state(&dir);
        let alice = insert_user(&state, "alice", Role::User);

        let record = upload(&state, &alice, upload_of("gone.txt", b"x", None))
            .await
            .unwrap();
        std::fs::remove_file(dir.path().join("uploads").join("gone.txt")).unwrap();

        let result = download(&state, FileRef::Id(&record.id), None).await;
        assert!(matches!(result, Err(AppError::NotFound(_))));
        let stored = state.db.get_file(&record.id).unwrap().unwrap();
        assert_eq!(stored.download_count, 0);
    }

    #[tokio::test]
    async fn test_failed_byte_delete_restores_record() {
        let dir = tempfile::tempdir().unwrap();
        let (state, store) = flaky_state(&dir);
        let alice = insert_user(&state, "alice", Role::User);

        let record = upload(&state, &alice, upload_of("stuck.txt", b"still here", None))
            .await
            .unwrap();

        store.fail_delete("stuck.txt");
        let result = delete(&state, &alice, &record.id).await;
        assert!(matches!(result, Err(AppError::Internal(_))));

        let restored = state.db.get_file(&record.id).unwrap().expect("record restored");
        assert_eq!(restored.filename, "stuck.txt");
        assert_eq!(state.db.get_files_by_owner("alice").unwrap().len(), 1);
        assert!(state.db.filename_exists("stuck.txt").unwrap());

        let again = download(&state, FileRef::Name("stuck.txt"), None).await.unwrap();
        assert_eq!(again.file.id, record.id);
        assert_eq!(read_all(again).await, b"still here");

        store.heal();
        delete(&state, &alice, &record.id).await.unwrap();
        assert!(state.db.get_file(&record.id).unwrap().is_none());
        assert!(!dir.path().join("uploads").join("stuck.txt").exists());
    }

    #[tokio::test]
    async fn test_upload_losing_registry_race_conflicts() {
        let dir = tempfile::tempdir().unwrap();
        let (state, store) = flaky_state(&dir);
        let alice = insert_user(&state, "alice", Role::User);

        // A writer that ignores the key lock registers the name mid-upload
        let db = state.db.clone();
        store.before_next_put(move || {
            let intruder = FileRecord {
                id: "intruder".to_string(),
                filename: "race.txt".to_string(),
                owner: "mallory".to_string(),
                mime_type: "text/plain".to_string(),
                byte_size: 0,
                download_count: 0,
                uploaded_at: Utc::now(),
                password_hash: None,
            };
            assert!(db.insert_file(&intruder).unwrap());
        });

        let result = upload(&state, &alice, upload_of("race.txt", b"mine", None)).await;
        assert!(matches!(result, Err(AppError::Conflict(_))));

        let registered = state.db.get_file_by_name("race.txt").unwrap().unwrap();
        assert_eq!(registered.id, "intruder");
        assert_eq!(state.db.get_all_files().unwrap().len(), 1);
        assert!(state.db.get_files_by_owner("alice").unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_delete_requires_ownership() {
        let dir = tempfile::tempdir().unwrap();
        let state = test_state(&dir);
        let alice = insert_user(&state, "alice", Role::User);
        let bob = insert_user(&state, "bob", Role::User);

        let record = upload(&state, &alice, upload_of("mine.txt", b"x", None))
            .await
            .unwrap();
        let result = delete(&state, &bob, &record.id).await;
        assert!(matches!(result, Err(AppError::PermissionDenied(_))));
        assert!(state.db.get_file(&record.id).unwrap().is_some());
    }

    #[tokio::test]
    async fn test_delete_removes_metadata_and_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let state = test_state(&dir);
        let alice = insert_user(&state, "alice", Role::User);

        let record = upload(&state, &alice, upload_of("bye.txt", b"x", None))
            .await
            .unwrap();
        delete(&state, &alice, &record.id).await.unwrap();

        assert!(state.db.get_file(&record.id).unwrap().is_none());
        assert!(!dir.path().join("uploads").join("bye.txt").exists());
        assert!(matches!(
            download(&state, FileRef::Id(&record.id), None).await,
            Err(AppError::NotFound(_))
        ));
        assert!(matches!(
            delete(&state, &alice, &record.id).await,
            Err(AppError::NotFound(_))
        ));

        // The name is free again
        upload(&state, &alice, upload_of("bye.txt", b"again", None))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_admin_deletes_any_file() {
        let dir = tempfile::tempdir().unwrap();
        let state = test_state(&dir);
        let alice = insert_user(&state, "alice", Role::User);
        let root = insert_user(&state, "root", Role::Admin);

        let record = upload(&state, &alice, upload_of("alice.txt", b"x", None))
            .await
            .unwrap();
        delete(&state, &root, &record.id).await.unwrap();
        assert!(state.db.get_files_by_owner("alice").unwrap().is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_downloads_are_all_counted() {
        let dir = tempfile::tempdir().unwrap();
        let state = test_state(&dir);
        let alice = insert_user(&state, "alice", Role::User);

        let record = upload(&state, &alice, upload_of("hot.txt", b"popular", None))
            .await
            .unwrap();

        let mut handles = Vec::new();
        for _ in 0..20 {
            let state = Arc::clone(&state);
            let id = record.id.clone();
            handles.push(tokio::spawn(async move {
                let dl = download(&state, FileRef::Id(&id), None).await.unwrap();
                read_all(dl).await
            }));
        }
        for handle in handles {
            assert_eq!(handle.await.unwrap(), b"popular");
        }

        let stored = state.db.get_file(&record.id).unwrap().unwrap();
        assert_eq!(stored.download_count, 20);
    }
}
