use chrono::{Duration, Utc};
use file_hosting::storage::models::{FileRecord, Role, UserRecord};
use file_hosting::storage::{Database, UserRemoval};

fn test_db() -> (tempfile::TempDir, Database) {
    let dir = tempfile::tempdir().unwrap();
    let db = Database::open(dir.path().join("data")).unwrap();
    (dir, db)
}

fn sample_file(id: &str, filename: &str, owner: &str) -> FileRecord {
    FileRecord {
        id: id.to_string(),
        filename: filename.to_string(),
        owner: owner.to_string(),
        mime_type: "text/plain".to_string(),
        byte_size: 1024,
        download_count: 0,
        uploaded_at: Utc::now(),
        password_hash: None,
    }
}

// ============================================================================
// Files
// ============================================================================

#[test]
fn test_insert_and_get_file() {
    let (_dir, db) = test_db();
    let file = sample_file("file-1", "notes.txt", "alice");

    assert!(db.insert_file(&file).unwrap());

    let retrieved = db.get_file("file-1").unwrap().expect("file should exist");
    assert_eq!(retrieved.filename, "notes.txt");
    assert_eq!(retrieved.owner, "alice");
    assert_eq!(retrieved.byte_size, 1024);
    assert_eq!(retrieved.download_count, 0);
    assert!(!retrieved.is_protected());
}

#[test]
fn test_get_file_by_name() {
    let (_dir, db) = test_db();
    db.insert_file(&sample_file("file-2", "readme.md", "alice"))
        .unwrap();

    let retrieved = db
        .get_file_by_name("readme.md")
        .unwrap()
        .expect("file should exist");
    assert_eq!(retrieved.id, "file-2");
    assert!(db.filename_exists("readme.md").unwrap());
    assert!(!db.filename_exists("other.md").unwrap());
}

#[test]
fn test_get_file_not_found() {
    let (_dir, db) = test_db();
    assert!(db.get_file("nonexistent").unwrap().is_none());
    assert!(db.get_file_by_name("nonexistent.txt").unwrap().is_none());
}

#[test]
fn test_duplicate_filename_rejected() {
    let (_dir, db) = test_db();
    assert!(db.insert_file(&sample_file("file-1", "same.txt", "alice")).unwrap());
    assert!(!db.insert_file(&sample_file("file-2", "same.txt", "bob")).unwrap());

    assert!(db.get_file("file-2").unwrap().is_none());
    assert!(db.get_files_by_owner("bob").unwrap().is_empty());
    assert_eq!(
        db.get_file_by_name("same.txt").unwrap().unwrap().owner,
        "alice"
    );
}

#[test]
fn test_files_by_owner_in_upload_order() {
    let (_dir, db) = test_db();
    db.insert_file(&sample_file("a1", "b.txt", "alice")).unwrap();
    db.insert_file(&sample_file("b1", "x.txt", "bob")).unwrap();
    db.insert_file(&sample_file("a2", "a.txt", "alice")).unwrap();

    let names: Vec<String> = db
        .get_files_by_owner("alice")
        .unwrap()
        .into_iter()
        .map(|f| f.filename)
        .collect();
    assert_eq!(names, vec!["b.txt", "a.txt"]);

    assert_eq!(db.get_files_by_owner("bob").unwrap().len(), 1);
    assert!(db.get_files_by_owner("carol").unwrap().is_empty());
    assert_eq!(db.get_all_files().unwrap().len(), 3);
}

#[test]
fn test_delete_file_cleans_indexes() {
    let (_dir, db) = test_db();
    db.insert_file(&sample_file("file-1", "gone.txt", "alice"))
        .unwrap();

    let removed = db.delete_file("file-1").unwrap().expect("file existed");
    assert_eq!(removed.filename, "gone.txt");

    assert!(db.get_file("file-1").unwrap().is_none());
    assert!(!db.filename_exists("gone.txt").unwrap());
    assert!(db.get_files_by_owner("alice").unwrap().is_empty());

    // The name is free again
    assert!(db.insert_file(&sample_file("file-3", "gone.txt", "bob")).unwrap());
}

#[test]
fn test_delete_file_not_found() {
    let (_dir, db) = test_db();
    assert!(db.delete_file("nonexistent").unwrap().is_none());
}

#[test]
fn test_record_download_increments() {
    let (_dir, db) = test_db();
    db.insert_file(&sample_file("file-1", "count.txt", "alice"))
        .unwrap();

    for expected in 1..=3 {
        let file = db.record_download("file-1").unwrap().unwrap();
        assert_eq!(file.download_count, expected);
    }
    assert_eq!(db.get_file("file-1").unwrap().unwrap().download_count, 3);
    assert!(db.record_download("missing").unwrap().is_none());
}

#[test]
fn test_record_download_concurrent_threads() {
    let (_dir, db) = test_db();
    db.insert_file(&sample_file("file-1", "hot.txt", "alice"))
        .unwrap();

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let db = db.clone();
            std::thread::spawn(move || {
                for _ in 0..10 {
                    db.record_download("file-1").unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(db.get_file("file-1").unwrap().unwrap().download_count, 80);
}

#[test]
fn test_password_hash_persists() {
    let (_dir, db) = test_db();
    let mut file = sample_file("file-1", "secret.txt", "alice");
    file.password_hash = Some("$argon2id$placeholder".to_string());
    file.uploaded_at = Utc::now() - Duration::hours(1);
    db.insert_file(&file).unwrap();

    let retrieved = db.get_file("file-1").unwrap().unwrap();
    assert!(retrieved.is_protected());
    assert_eq!(retrieved.uploaded_at, file.uploaded_at);
}

// ============================================================================
// Users
// ============================================================================

#[test]
fn test_create_and_get_user() {
    let (_dir, db) = test_db();
    let user = UserRecord::new("alice", "hash".to_string(), Role::User);
    assert!(db.create_user(&user).unwrap());

    let by_id = db.get_user(&user.id).unwrap().expect("user should exist");
    assert_eq!(by_id.username, "alice");
    assert_eq!(by_id.role, Role::User);

    let by_name = db.get_user_by_username("alice").unwrap().unwrap();
    assert_eq!(by_name.id, user.id);
}

#[test]
fn test_duplicate_username_rejected() {
    let (_dir, db) = test_db();
    let first = UserRecord::new("alice", "first".to_string(), Role::User);
    let second = UserRecord::new("alice", "second".to_string(), Role::Admin);

    assert!(db.create_user(&first).unwrap());
    assert!(!db.create_user(&second).unwrap());

    let stored = db.get_user_by_username("alice").unwrap().unwrap();
    assert_eq!(stored.id, first.id);
    assert_eq!(stored.password_hash, "first");
    assert!(db.get_user(&second.id).unwrap().is_none());
}

#[test]
fn test_list_users_oldest_first() {
    let (_dir, db) = test_db();
    let mut older = UserRecord::new("older", "h".to_string(), Role::Admin);
    older.created_at = Utc::now() - Duration::days(1);
    let newer = UserRecord::new("newer", "h".to_string(), Role::User);

    db.create_user(&newer).unwrap();
    db.create_user(&older).unwrap();

    let names: Vec<String> = db
        .list_users()
        .unwrap()
        .into_iter()
        .map(|u| u.username)
        .collect();
    assert_eq!(names, vec!["older", "newer"]);
}

#[test]
fn test_delete_user_frees_username() {
    let (_dir, db) = test_db();
    let user = UserRecord::new("alice", "hash".to_string(), Role::User);
    db.create_user(&user).unwrap();

    let removed = match db.delete_user(&user.id).unwrap() {
        UserRemoval::Removed(removed) => removed,
        other => panic!("expected removal, got {other:?}"),
    };
    assert_eq!(removed.username, "alice");
    assert!(db.get_user(&user.id).unwrap().is_none());
    assert!(db.get_user_by_username("alice").unwrap().is_none());
    assert!(matches!(
        db.delete_user(&user.id).unwrap(),
        UserRemoval::NotFound
    ));

    let again = UserRecord::new("alice", "hash".to_string(), Role::User);
    assert!(db.create_user(&again).unwrap());
}

#[test]
fn test_delete_user_refused_while_files_remain() {
    let (_dir, db) = test_db();
    let user = UserRecord::new("alice", "hash".to_string(), Role::User);
    db.create_user(&user).unwrap();
    db.insert_file(&sample_file("file-1", "kept.txt", "alice"))
        .unwrap();

    assert!(matches!(
        db.delete_user(&user.id).unwrap(),
        UserRemoval::OwnsFiles(1)
    ));
    assert!(db.get_user_by_username("alice").unwrap().is_some());

    db.delete_file("file-1").unwrap();
    assert!(matches!(
        db.delete_user(&user.id).unwrap(),
        UserRemoval::Removed(_)
    ));
}

#[test]
fn test_username_with_leftover_files_cannot_be_registered() {
    let (_dir, db) = test_db();
    db.insert_file(&sample_file("file-1", "orphan.txt", "alice"))
        .unwrap();

    let user = UserRecord::new("alice", "hash".to_string(), Role::User);
    assert!(!db.create_user(&user).unwrap());
    assert!(db.get_user(&user.id).unwrap().is_none());

    db.delete_file("file-1").unwrap();
    assert!(db.create_user(&user).unwrap());
}

#[test]
fn test_bump_session_epoch() {
    let (_dir, db) = test_db();
    let user = UserRecord::new("alice", "hash".to_string(), Role::User);
    db.create_user(&user).unwrap();
    assert_eq!(user.session_epoch, 0);

    let bumped = db.bump_session_epoch(&user.id).unwrap().unwrap();
    assert_eq!(bumped.session_epoch, 1);
    assert_eq!(db.get_user(&user.id).unwrap().unwrap().session_epoch, 1);
    assert_eq!(bumped.password_hash, "hash");

    assert!(db.bump_session_epoch("missing").unwrap().is_none());
}

#[test]
fn test_reopen_keeps_data() {
    let dir = tempfile::tempdir().unwrap();
    let user = UserRecord::new("alice", "hash".to_string(), Role::User);
    {
        let db = Database::open(dir.path().join("data")).unwrap();
        db.create_user(&user).unwrap();
        db.insert_file(&sample_file("file-1", "durable.txt", "alice"))
            .unwrap();
    }

    let db = Database::open(dir.path().join("data")).unwrap();
    assert!(db.get_user(&user.id).unwrap().is_some());
    assert!(db.get_file_by_name("durable.txt").unwrap().is_some());
}
