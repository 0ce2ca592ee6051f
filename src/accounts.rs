//! Registration, login and account removal.

use crate::auth::password::{dummy_hash, hash_password_blocking, verify_password_blocking};
use crate::auth::{require_admin, validate_password};
use crate::error::{AppError, AppResult};
use crate::storage::models::{Role, UserRecord};
use crate::storage::UserRemoval;
use crate::transfer;
use crate::AppState;

pub const MIN_USERNAME_LENGTH: usize = 3;
pub const MAX_USERNAME_LENGTH: usize = 32;

pub fn validate_username(username: &str) -> AppResult<()> {
    if username.len() < MIN_USERNAME_LENGTH || username.len() > MAX_USERNAME_LENGTH {
        return Err(AppError::validation(format!(
            "username must be {MIN_USERNAME_LENGTH} to {MAX_USERNAME_LENGTH} characters"
        )));
    }
    if !username
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'))
    {
        return Err(AppError::validation(
            "username may only contain letters, digits, '_', '-' and '.'",
        ));
    }
    Ok(())
}

/// Create an account. A taken username fails with `Conflict` and leaves the
/// existing account untouched.
pub async fn register(
    state: &AppState,
    username: &str,
    password: &str,
    role: Role,
) -> AppResult<UserRecord> {
    validate_username(username)?;
    validate_password(password)?;

    if state.db.get_user_by_username(username)?.is_some() {
        return Err(AppError::conflict("Username already exists"));
    }

    let password_hash = hash_password_blocking(password.to_string()).await?;
    let user = UserRecord::new(username, password_hash, role);

    // The insert re-checks uniqueness inside its write transaction, and also
    // refuses names that leftover file records still point at
    if !state.db.create_user(&user)? {
        return Err(AppError::conflict("Username is not available"));
    }

    tracing::info!(username = %user.username, role = %user.role, "Registered user");
    Ok(user)
}

/// Check credentials. Unknown users and wrong passwords are indistinguishable.
pub async fn authenticate(state: &AppState, username: &str, password: &str) -> AppResult<UserRecord> {
    let invalid = || AppError::unauthorized("Invalid username or password");

    let Some(user) = state.db.get_user_by_username(username)? else {
        // Same Argon2 cost as a real account
        if let Some(hash) = dummy_hash() {
            let _ = verify_password_blocking(password.to_string(), hash.to_string()).await;
        }
        tracing::warn!(username = %username, "Login for unknown user");
        return Err(invalid());
    };

    verify_password_blocking(password.to_string(), user.password_hash.clone())
        .await
        .map_err(|e| {
            tracing::warn!(username = %username, error = %e, "Login failed");
            invalid()
        })?;

    Ok(user)
}

/// Create the configured admin account if it does not exist yet.
///
/// Returns `true` when an account was created.
pub async fn bootstrap_admin(state: &AppState) -> AppResult<bool> {
    let (Some(username), Some(password)) = (
        state.config.auth.admin_username.as_deref(),
        state.config.auth.admin_password.as_deref(),
    ) else {
        return Ok(false);
    };

    if let Some(existing) = state.db.get_user_by_username(username)? {
        if !existing.is_admin() {
            tracing::warn!(username = %username, "ADMIN_USERNAME belongs to a non-admin account");
        }
        return Ok(false);
    }

    register(state, username, password, Role::Admin).await?;
    Ok(true)
}

/// Delete a user and every file they own.
///
/// Files go first, each with the same guarantees as a normal delete. The
/// account is removed last and only once it owns nothing, so a failure
/// part way leaves the account in place and the call can simply be retried.
/// Returns the removed account and how many files went with it.
pub async fn delete_user(
    state: &AppState,
    actor: &UserRecord,
    user_id: &str,
) -> AppResult<(UserRecord, usize)> {
    require_admin(actor)?;
    if actor.id == user_id {
        return Err(AppError::validation("Admins cannot delete their own account"));
    }

    let user = state
        .db
        .get_user(user_id)?
        .ok_or_else(|| AppError::not_found("User not found"))?;

    let files = state.db.get_files_by_owner(&user.username)?;
    let mut removed = 0;
    for file in &files {
        match transfer::remove_file(state, file).await {
            Ok(_) => removed += 1,
            // Deleted concurrently
            Err(AppError::NotFound(_)) => {}
            Err(e) => {
                tracing::error!(
                    username = %user.username,
                    file_id = %file.id,
                    error = %e,
                    "Failed to delete file of user, keeping the account"
                );
                return Err(e);
            }
        }
    }

    let user = match state.db.delete_user(user_id)? {
        UserRemoval::Removed(user) => user,
        UserRemoval::NotFound => return Err(AppError::not_found("User not found")),
        UserRemoval::OwnsFiles(count) => {
            tracing::warn!(
                username = %user.username,
                remaining = count,
                "User uploaded files during deletion"
            );
            return Err(AppError::conflict(
                "User uploaded new files during deletion; try again",
            ));
        }
    };

    tracing::info!(
        username = %user.username,
        files_removed = removed,
        actor = %actor.username,
        "Deleted user"
    );
    Ok((user, removed))
}
