use redb::{ReadableTable, WriteTransaction};

use super::db::{Database, DatabaseError};
use super::models::FileRecord;
use super::tables::*;

impl Database {
    // ========================================================================
    // File operations
    // ========================================================================

    /// Store a new file record and update the filename and owner indexes.
    ///
    /// Returns `false` without writing anything when the filename is already
    /// registered.
    pub fn insert_file(&self, file: &FileRecord) -> Result<bool, DatabaseError> {
        debug_assert!(!file.id.is_empty(), "file id must not be empty");
        debug_assert!(!file.filename.is_empty(), "filename must not be empty");

        let write_txn = self.begin_write()?;
        let inserted = {
            let mut name_table = write_txn.open_table(FILE_NAMES)?;
            let taken = name_table.get(file.filename.as_str())?.is_some();
            if taken {
                false
            } else {
                name_table.insert(file.filename.as_str(), file.id.as_str())?;

                let mut table = write_txn.open_table(FILES)?;
                let data = rmp_serde::to_vec_named(file)?;
                table.insert(file.id.as_str(), data.as_slice())?;

                push_owner_index(&write_txn, &file.owner, &file.id)?;
                true
            }
        };

        if inserted {
            write_txn.commit()?;
        } else {
            write_txn.abort()?;
        }
        Ok(inserted)
    }

    /// Get a file by its UUID
    pub fn get_file(&self, id: &str) -> Result<Option<FileRecord>, DatabaseError> {
        let read_txn = self.begin_read()?;
        let table = read_txn.open_table(FILES)?;

        match table.get(id)? {
            Some(data) => {
                let file: FileRecord = rmp_serde::from_slice(data.value())?;
                Ok(Some(file))
            }
            None => Ok(None),
        }
    }

    /// Get a file by its sanitized filename (resolves filename -> uuid -> file)
    pub fn get_file_by_name(&self, filename: &str) -> Result<Option<FileRecord>, DatabaseError> {
        let read_txn = self.begin_read()?;
        let name_table = read_txn.open_table(FILE_NAMES)?;

        let id = match name_table.get(filename)? {
            Some(data) => data.value().to_string(),
            None => return Ok(None),
        };

        let files_table = read_txn.open_table(FILES)?;
        match files_table.get(id.as_str())? {
            Some(data) => {
                let file: FileRecord = rmp_serde::from_slice(data.value())?;
                Ok(Some(file))
            }
            None => Ok(None),
        }
    }

    /// Check if a filename is already registered
    pub fn filename_exists(&self, filename: &str) -> Result<bool, DatabaseError> {
        let read_txn = self.begin_read()?;
        let table = read_txn.open_table(FILE_NAMES)?;
        Ok(table.get(filename)?.is_some())
    }

    /// Get all files uploaded by `owner`, in upload order
    pub fn get_files_by_owner(&self, owner: &str) -> Result<Vec<FileRecord>, DatabaseError> {
        let read_txn = self.begin_read()?;
        let owner_table = read_txn.open_table(OWNER_FILES)?;
        let files_table = read_txn.open_table(FILES)?;

        let file_ids: Vec<String> = match owner_table.get(owner)? {
            Some(data) => rmp_serde::from_slice(data.value())?,
            None => return Ok(Vec::new()),
        };

        let mut files = Vec::with_capacity(file_ids.len());
        for file_id in file_ids {
            if let Some(data) = files_table.get(file_id.as_str())? {
                let file: FileRecord = rmp_serde::from_slice(data.value())?;
                files.push(file);
            }
        }

        Ok(files)
    }

    /// Get every file in the registry
    pub fn get_all_files(&self) -> Result<Vec<FileRecord>, DatabaseError> {
        let read_txn = self.begin_read()?;
        let table = read_txn.open_table(FILES)?;

        let mut files = Vec::new();
        for result in table.iter()? {
            let (_, value) = result?;
            let file: FileRecord = rmp_serde::from_slice(value.value())?;
            files.push(file);
        }

        Ok(files)
    }

    /// Delete a file by its UUID and clean up the filename and owner indexes.
    ///
    /// Returns the removed record so the caller can drop the stored bytes, or
    /// put the record back if that fails.
    pub fn delete_file(&self, id: &str) -> Result<Option<FileRecord>, DatabaseError> {
        let write_txn = self.begin_write()?;

        let existing: Option<FileRecord> = {
            let table = write_txn.open_table(FILES)?;
            let result = match table.get(id)? {
                Some(data) => Some(rmp_serde::from_slice(data.value())?),
                None => None,
            };
            result
        };

        if let Some(ref file) = existing {
            {
                let mut table = write_txn.open_table(FILES)?;
                table.remove(id)?;
            }
            {
                let mut name_table = write_txn.open_table(FILE_NAMES)?;
                name_table.remove(file.filename.as_str())?;
            }
            remove_owner_index(&write_txn, &file.owner, id)?;
        }

        write_txn.commit()?;
        Ok(existing)
    }

    /// Increment the download counter of a file.
    ///
    /// Returns the updated record, or `None` if the file no longer exists.
    pub fn record_download(&self, id: &str) -> Result<Option<FileRecord>, DatabaseError> {
        let write_txn = self.begin_write()?;

        let updated = {
            let mut table = write_txn.open_table(FILES)?;
            let existing: Option<FileRecord> = match table.get(id)? {
                Some(data) => Some(rmp_serde::from_slice(data.value())?),
                None => None,
            };

            match existing {
                Some(mut file) => {
                    file.download_count += 1;
                    let data = rmp_serde::to_vec_named(&file)?;
                    table.insert(id, data.as_slice())?;
                    Some(file)
                }
                None => None,
            }
        };

        write_txn.commit()?;
        Ok(updated)
    }
}

fn push_owner_index(
    write_txn: &WriteTransaction,
    owner: &str,
    id: &str,
) -> Result<(), DatabaseError> {
    let mut owner_table = write_txn.open_table(OWNER_FILES)?;
    let mut file_ids: Vec<String> = match owner_table.get(owner)? {
        Some(data) => rmp_serde::from_slice(data.value())?,
        None => Vec::new(),
    };

    if !file_ids.iter().any(|fid| fid == id) {
        file_ids.push(id.to_string());
        let data = rmp_serde::to_vec_named(&file_ids)?;
        owner_table.insert(owner, data.as_slice())?;
    }
    Ok(())
}

fn remove_owner_index(
    write_txn: &WriteTransaction,
    owner: &str,
    id: &str,
) -> Result<(), DatabaseError> {
    let mut owner_table = write_txn.open_table(OWNER_FILES)?;
    let file_ids: Option<Vec<String>> = match owner_table.get(owner)? {
        Some(data) => Some(rmp_serde::from_slice(data.value())?),
        None => None,
    };

    if let Some(mut ids) = file_ids {
        ids.retain(|fid| fid != id);
        if ids.is_empty() {
            owner_table.remove(owner)?;
        } else {
            let data = rmp_serde::to_vec_named(&ids)?;
            owner_table.insert(owner, data.as_slice())?;
        }
    }
    Ok(())
}
