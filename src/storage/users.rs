use redb::{ReadableTable, WriteTransaction};

use super::db::{Database, DatabaseError};
use super::models::UserRecord;
use super::tables::*;

/// Outcome of [`Database::delete_user`].
#[derive(Debug)]
pub enum UserRemoval {
    Removed(UserRecord),
    NotFound,
    /// The account still owns this many files and was kept.
    OwnsFiles(usize),
}

impl Database {
    // ========================================================================
    // User operations
    // ========================================================================

    /// Store a new user. Returns `false` if the username is already taken, or
    /// if file records still name it as their owner.
    pub fn create_user(&self, user: &UserRecord) -> Result<bool, DatabaseError> {
        let write_txn = self.begin_write()?;
        let created = {
            let mut name_table = write_txn.open_table(USERNAMES)?;
            let taken = name_table.get(user.username.as_str())?.is_some()
                || owned_file_count(&write_txn, &user.username)? > 0;
            if taken {
                false
            } else {
                name_table.insert(user.username.as_str(), user.id.as_str())?;
                let mut table = write_txn.open_table(USERS)?;
                let data = rmp_serde::to_vec_named(user)?;
                table.insert(user.id.as_str(), data.as_slice())?;
                true
            }
        };

        if created {
            write_txn.commit()?;
        } else {
            write_txn.abort()?;
        }
        Ok(created)
    }

    pub fn get_user(&self, id: &str) -> Result<Option<UserRecord>, DatabaseError> {
        let read_txn = self.begin_read()?;
        let table = read_txn.open_table(USERS)?;

        match table.get(id)? {
            Some(data) => Ok(Some(rmp_serde::from_slice(data.value())?)),
            None => Ok(None),
        }
    }

    pub fn get_user_by_username(
        &self,
        username: &str,
    ) -> Result<Option<UserRecord>, DatabaseError> {
        let read_txn = self.begin_read()?;
        let name_table = read_txn.open_table(USERNAMES)?;

        let id = match name_table.get(username)? {
            Some(data) => data.value().to_string(),
            None => return Ok(None),
        };

        let table = read_txn.open_table(USERS)?;
        match table.get(id.as_str())? {
            Some(data) => Ok(Some(rmp_serde::from_slice(data.value())?)),
            None => Ok(None),
        }
    }

    /// All users, oldest account first
    pub fn list_users(&self) -> Result<Vec<UserRecord>, DatabaseError> {
        let read_txn = self.begin_read()?;
        let table = read_txn.open_table(USERS)?;

        let mut users = Vec::new();
        for result in table.iter()? {
            let (_, value) = result?;
            let user: UserRecord = rmp_serde::from_slice(value.value())?;
            users.push(user);
        }
        users.sort_by(|a, b| a.created_at.cmp(&b.created_at));

        Ok(users)
    }

    /// Delete a user record and its username index entry.
    ///
    /// Only an account that owns no files is removed; the check and the
    /// delete share one write transaction, so an upload cannot slip in
    /// between them.
    pub fn delete_user(&self, id: &str) -> Result<UserRemoval, DatabaseError> {
        let write_txn = self.begin_write()?;

        let existing: Option<UserRecord> = {
            let table = write_txn.open_table(USERS)?;
            let result = match table.get(id)? {
                Some(data) => Some(rmp_serde::from_slice(data.value())?),
                None => None,
            };
            result
        };

        let Some(user) = existing else {
            write_txn.abort()?;
            return Ok(UserRemoval::NotFound);
        };

        let owned = owned_file_count(&write_txn, &user.username)?;
        if owned > 0 {
            write_txn.abort()?;
            return Ok(UserRemoval::OwnsFiles(owned));
        }

        {
            let mut table = write_txn.open_table(USERS)?;
            table.remove(id)?;
        }
        {
            let mut name_table = write_txn.open_table(USERNAMES)?;
            name_table.remove(user.username.as_str())?;
        }

        write_txn.commit()?;
        Ok(UserRemoval::Removed(user))
    }

    /// Increment a user's session epoch, revoking every token issued before.
    pub fn bump_session_epoch(&self, id: &str) -> Result<Option<UserRecord>, DatabaseError> {
        let write_txn = self.begin_write()?;

        let updated = {
            let mut table = write_txn.open_table(USERS)?;
            let user: Option<UserRecord> = match table.get(id)? {
                Some(data) => Some(rmp_serde::from_slice(data.value())?),
                None => None,
            };

            match user {
                Some(mut user) => {
                    user.session_epoch = user.session_epoch.wrapping_add(1);
                    let data = rmp_serde::to_vec_named(&user)?;
                    table.insert(id, data.as_slice())?;
                    Some(user)
                }
                None => None,
            }
        };

        write_txn.commit()?;
        Ok(updated)
    }
}

fn owned_file_count(write_txn: &WriteTransaction, owner: &str) -> Result<usize, DatabaseError> {
    let owner_table = write_txn.open_table(OWNER_FILES)?;
    let count = match owner_table.get(owner)? {
        Some(data) => {
            let ids: Vec<String> = rmp_serde::from_slice(data.value())?;
            ids.len()
        }
        None => 0,
    };
    Ok(count)
}
