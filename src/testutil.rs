//! Shared test helpers for in-crate tests.

use std::collections::HashSet;
use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use bytes::Bytes;

use crate::config::{Config, NodeConfig, StorageConfig};
use crate::object_store::{LocalStore, ObjectReader, ObjectStore, ObjectStoreError};
use crate::storage::models::{Role, UserRecord};
use crate::storage::Database;
use crate::AppState;

fn test_config(temp_dir: &tempfile::TempDir) -> Config {
    Config {
        node: NodeConfig {
            bind_address: "127.0.0.1:0".to_string(),
            data_dir: temp_dir.path().join("data").to_string_lossy().to_string(),
        },
        storage: StorageConfig {
            upload_dir: temp_dir.path().join("uploads").to_string_lossy().to_string(),
        },
        max_upload_size: 1024,
        page_size: 3,
        ..Default::default()
    }
}

fn state_with_store(temp_dir: &tempfile::TempDir, store: Arc<dyn ObjectStore>) -> Arc<AppState> {
    let config = test_config(temp_dir);
    let db = Database::open(&config.node.data_dir).expect("Failed to open test database");
    Arc::new(AppState::new(config, db, store))
}

/// Create a test AppState with a temporary database and local object store.
pub fn test_state(temp_dir: &tempfile::TempDir) -> Arc<AppState> {
    let object_store = LocalStore::new(temp_dir.path().join("uploads"))
        .expect("Failed to create test object store");
    state_with_store(temp_dir, Arc::new(object_store))
}

/// Like [`test_state`], but backed by a [`FlakyStore`] the test can steer.
pub fn flaky_state(temp_dir: &tempfile::TempDir) -> (Arc<AppState>, Arc<FlakyStore>) {
    let store = Arc::new(FlakyStore::new(temp_dir.path().join("uploads")));
    let state = state_with_store(temp_dir, Arc::clone(&store) as Arc<dyn ObjectStore>);
    (state, store)
}

/// Insert a user directly, skipping password hashing.
pub fn insert_user(state: &AppState, username: &str, role: Role) -> UserRecord {
    let user = UserRecord::new(username, "unused".to_string(), role);
    assert!(state.db.create_user(&user).expect("Failed to create user"));
    user
}

type PutHook = Box<dyn FnOnce() + Send>;

/// Local store that fails deletes of chosen keys and can run a hook just
/// before the next write.
pub struct FlakyStore {
    inner: LocalStore,
    failing_deletes: Mutex<HashSet<String>>,
    before_put: Mutex<Option<PutHook>>,
}

impl FlakyStore {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            inner: LocalStore::new(path).expect("Failed to create test object store"),
            failing_deletes: Mutex::new(HashSet::new()),
            before_put: Mutex::new(None),
        }
    }

    pub fn fail_delete(&self, key: &str) {
        self.failing_deletes.lock().unwrap().insert(key.to_string());
    }

    /// Stop failing deletes.
    pub fn heal(&self) {
        self.failing_deletes.lock().unwrap().clear();
    }

    pub fn before_next_put(&self, hook: impl FnOnce() + Send + 'static) {
        *self.before_put.lock().unwrap() = Some(Box::new(hook));
    }
}

#[async_trait]
impl ObjectStore for FlakyStore {
    async fn put(&self, key: &str, data: Bytes) -> Result<u64, ObjectStoreError> {
        let hook = self.before_put.lock().unwrap().take();
        if let Some(hook) = hook {
            hook();
        }
        self.inner.put(key, data).await
    }

    async fn get(&self, key: &str) -> Result<Bytes, ObjectStoreError> {
        self.inner.get(key).await
    }

    async fn open(&self, key: &str) -> Result<(ObjectReader, u64), ObjectStoreError> {
        self.inner.open(key).await
    }

    async fn delete(&self, key: &str) -> Result<(), ObjectStoreError> {
        let failing = self.failing_deletes.lock().unwrap().contains(key);
        if failing {
            return Err(ObjectStoreError::Io(std::io::Error::other("disk unavailable")));
        }
        self.inner.delete(key).await
    }
}
