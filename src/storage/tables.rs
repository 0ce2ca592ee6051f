use redb::TableDefinition;

/// User records: uuid -> UserRecord (msgpack)
pub const USERS: TableDefinition<&str, &[u8]> = TableDefinition::new("users");

/// Username index: username -> uuid (login and uniqueness checks)
pub const USERNAMES: TableDefinition<&str, &str> = TableDefinition::new("usernames");

/// File records: uuid -> FileRecord (msgpack)
pub const FILES: TableDefinition<&str, &[u8]> = TableDefinition::new("files");

/// Filename index: sanitized filename -> uuid (for /uploads/ route lookups)
pub const FILE_NAMES: TableDefinition<&str, &str> = TableDefinition::new("file_names");

/// Owner index: username -> msgpack Vec of file UUIDs, in upload order
pub const OWNER_FILES: TableDefinition<&str, &[u8]> = TableDefinition::new("owner_files");
