//! SQLite backend
//!
//! Keeps every collection document as one row of the `storage` table, so a
//! single database file can hold several collections.

use std::path::Path;
use std::sync::Mutex;

use rusqlite::{params, Connection, OptionalExtension};

use super::backend::StorageBackend;
use super::error::{StorageError, StorageResult};

/// Current schema version of the storage database
pub const SCHEMA_VERSION: i32 = 1;

/// Initialize the database schema, refusing databases of another version
fn init_schema(conn: &Connection) -> StorageResult<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS schema_info (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS storage (
            key TEXT PRIMARY KEY,
            data BLOB NOT NULL,
            updated_at TEXT NOT NULL
        );
        "#,
    )?;

    let found: Option<String> = conn
        .query_row(
            "SELECT value FROM schema_info WHERE key = 'version'",
            [],
            |row| row.get(0),
        )
        .optional()?;

    match found {
        None => {
            conn.execute(
                "INSERT INTO schema_info (key, value) VALUES ('version', ?1)",
                params![SCHEMA_VERSION.to_string()],
            )?;
        }
        Some(version) if version == SCHEMA_VERSION.to_string() => {}
        Some(version) => {
            return Err(StorageError::SchemaMismatch {
                found: version,
                expected: SCHEMA_VERSION,
            });
        }
    }

    Ok(())
}

/// SQLite-backed storage for one collection
pub struct SqliteBackend {
    conn: Mutex<Connection>,
    key: String,
    location: String,
}

impl SqliteBackend {
    /// Open or create the database at `path`, storing the document under `key`
    pub fn open(path: impl AsRef<Path>, key: &str) -> StorageResult<Self> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|source| StorageError::CreateDirectory {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        let conn = Connection::open(path)?;
        init_schema(&conn)?;

        Ok(Self {
            conn: Mutex::new(conn),
            key: key.to_string(),
            location: format!("{}#{}", path.display(), key),
        })
    }

    /// Open an in-memory database (for testing)
    pub fn open_in_memory(key: &str) -> StorageResult<Self> {
        let conn = Connection::open_in_memory()?;
        init_schema(&conn)?;

        Ok(Self {
            conn: Mutex::new(conn),
            key: key.to_string(),
            location: format!(":memory:#{}", key),
        })
    }
}

impl StorageBackend for SqliteBackend {
    fn load(&self) -> StorageResult<Option<Vec<u8>>> {
        let conn = self.conn.lock().unwrap_or_else(|e| e.into_inner());
        let data = conn
            .query_row(
                "SELECT data FROM storage WHERE key = ?1",
                params![self.key],
                |row| row.get::<_, Vec<u8>>(0),
            )
            .optional()?;
        Ok(data)
    }

    fn save(&self, data: &[u8]) -> StorageResult<()> {
        let conn = self.conn.lock().unwrap_or_else(|e| e.into_inner());
        conn.execute(
            "INSERT INTO storage (key, data, updated_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(key) DO UPDATE SET data = excluded.data, updated_at = excluded.updated_at",
            params![self.key, data, chrono::Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }

    fn location(&self) -> String {
        self.location.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_in_memory_roundtrip() {
        let backend = SqliteBackend::open_in_memory("tag").unwrap();

        assert!(backend.load().unwrap().is_none());

        backend.save(b"one").unwrap();
        backend.save(b"two").unwrap();
        assert_eq!(backend.load().unwrap().unwrap(), b"two");
    }

    #[test]
    fn test_keys_are_isolated() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("tagstore.db");

        let tags = SqliteBackend::open(&path, "tag").unwrap();
        let other = SqliteBackend::open(&path, "other").unwrap();

        tags.save(b"tags").unwrap();
        assert!(other.load().unwrap().is_none());
        assert_eq!(tags.load().unwrap().unwrap(), b"tags");
    }

    #[test]
    fn test_open_rejects_other_schema_version() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("tagstore.db");

        SqliteBackend::open(&path, "tag").unwrap();
        Connection::open(&path)
            .unwrap()
            .execute("UPDATE schema_info SET value = '2' WHERE key = 'version'", [])
            .unwrap();

        let err = SqliteBackend::open(&path, "tag").err().unwrap();
        assert!(matches!(
            err,
            StorageError::SchemaMismatch { ref found, expected: 1 } if found == "2"
        ));
        assert!(err.recovery_suggestion().is_some());
    }

    #[test]
    fn test_data_survives_reopen() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("nested").join("tagstore.db");

        {
            let backend = SqliteBackend::open(&path, "tag").unwrap();
            backend.save(b"persisted").unwrap();
        }

        let reopened = SqliteBackend::open(&path, "tag").unwrap();
        assert_eq!(reopened.load().unwrap().unwrap(), b"persisted");
        assert!(reopened.location().ends_with("tagstore.db#tag"));
    }
}
