//! file-hosting - A multi-user file hosting service
//!
//! This crate provides account registration, file upload and download, and
//! an admin console with:
//! - Per-user listings with sorting, search and pagination
//! - Optional per-file access passwords (Argon2id) and shareable links
//! - Image and text previews
//! - redb embedded database for metadata (ACID, MVCC, crash-safe)
//! - Swappable object storage (local filesystem)

pub mod accounts;
pub mod api;
pub mod auth;
pub mod config;
pub mod error;
pub mod listing;
pub mod locks;
pub mod naming;
pub mod object_store;
pub mod preview;
pub mod storage;
pub mod transfer;
#[cfg(test)]
pub mod testutil;

use std::sync::Arc;

use auth::SessionKeys;
use config::Config;
use locks::RecordLocks;
use storage::Database;

/// Shared application state
pub struct AppState {
    pub config: Config,
    pub db: Database,
    pub locks: RecordLocks,
    pub object_store: Arc<dyn object_store::ObjectStore>,
    pub sessions: SessionKeys,
}

impl AppState {
    pub fn new(config: Config, db: Database, object_store: Arc<dyn object_store::ObjectStore>) -> Self {
        let sessions = SessionKeys::new(&config.auth.secret_key, config.auth.session_ttl_secs);
        Self {
            config,
            db,
            locks: RecordLocks::new(),
            object_store,
            sessions,
        }
    }
}
