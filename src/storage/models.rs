use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Account role. Admins may act on every user and file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    #[default]
    User,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::User => "user",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A user account stored in redb
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserRecord {
    pub id: String,
    pub username: String,
    /// Argon2id PHC string
    pub password_hash: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,
    /// Sessions signed with an older epoch are rejected
    #[serde(default)]
    pub session_epoch: u64,
}

impl UserRecord {
    pub fn new(username: impl Into<String>, password_hash: String, role: Role) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            username: username.into(),
            password_hash,
            role,
            created_at: Utc::now(),
            session_epoch: 0,
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

/// A file record stored in redb
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileRecord {
    pub id: String,
    /// Sanitized filename, also the object store key
    pub filename: String,
    /// Username of the uploader
    pub owner: String,
    pub mime_type: String,
    pub byte_size: u64,
    pub download_count: u64,
    pub uploaded_at: DateTime<Utc>,

    /// Argon2id hash of the access password, if the file is protected
    #[serde(default)]
    pub password_hash: Option<String>,
}

impl FileRecord {
    pub fn is_protected(&self) -> bool {
        self.password_hash.is_some()
    }
}
