//! Identity, credentials and access rules.

pub mod access;
pub mod password;
pub mod session;

pub use access::{can_access, can_manage_users, check_file_access, require_admin};
pub use password::{hash_password, validate_password, verify_password, PasswordError};
pub use session::{AdminUser, CurrentUser, MaybeUser, SessionKeys, SESSION_COOKIE};
