//! Ownership and role checks.
//!
//! Owners may act on their own files; admins may act on every file and user.

use crate::error::{AppError, AppResult};
use crate::storage::models::{FileRecord, Role, UserRecord};

/// Whether `actor` may read, preview, share or delete `file`.
pub fn can_access(actor: &UserRecord, file: &FileRecord) -> bool {
    can_manage_users(actor) || file.owner == actor.username
}

/// Whether `actor` may manage other users and their files.
pub fn can_manage_users(actor: &UserRecord) -> bool {
    actor.role == Role::Admin
}

pub fn check_file_access(actor: &UserRecord, file: &FileRecord) -> AppResult<()> {
    if can_access(actor, file) {
        Ok(())
    } else {
        tracing::warn!(
            actor = %actor.username,
            file_id = %file.id,
            "Denied access to file owned by another user"
        );
        Err(AppError::permission_denied(
            "You do not have permission to access this file",
        ))
    }
}

pub fn require_admin(actor: &UserRecord) -> AppResult<()> {
    if can_manage_users(actor) {
        Ok(())
    } else {
        tracing::warn!(actor = %actor.username, "Denied admin operation");
        Err(AppError::permission_denied("Admin privileges required"))
    }
}
