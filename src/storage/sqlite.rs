use super::traits::KeyValueStore;
use crate::model::StorageError;
use chrono::Utc;
use rusqlite::{Connection, OptionalExtension, params};

pub struct SqliteStorage {
    conn: Connection,
}

impl SqliteStorage {
    /// Opens the database file and creates the key-value table if needed.
    pub fn new(db_path: &str) -> Result<Self, StorageError> {
        let conn = Connection::open(db_path)?;
        Self::migrate(&conn)?;
        Ok(Self { conn })
    }

    pub fn in_memory() -> Result<Self, StorageError> {
        let conn = Connection::open_in_memory()?;
        Self::migrate(&conn)?;
        Ok(Self { conn })
    }

    fn migrate(conn: &Connection) -> Result<(), StorageError> {
        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS kv (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );
            ",
        )?;
        Ok(())
    }

    /// Last write time of a key, as stored (RFC 3339).
    pub fn updated_at(&self, key: &str) -> Result<Option<String>, StorageError> {
        let updated = self
            .conn
            .query_row("SELECT updated_at FROM kv WHERE key = ?1", params![key], |row| row.get(0))
            .optional()?;
        Ok(updated)
    }
}

impl KeyValueStore for SqliteStorage {
    fn get_raw(&self, key: &str) -> Result<Option<String>, StorageError> {
        let value = self
            .conn
            .query_row("SELECT value FROM kv WHERE key = ?1", params![key], |row| row.get(0))
            .optional()?;
        Ok(value)
    }

    fn put_raw(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.conn.execute(
            "INSERT OR REPLACE INTO kv (key, value, updated_at) VALUES (?1, ?2, ?3)",
            params![key, value, Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.conn.execute("DELETE FROM kv WHERE key = ?1", params![key])?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{Deserialize, Serialize};

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Item {
        name: String,
        count: u32,
    }

    #[test]
    fn test_raw_roundtrip_and_overwrite() {
        let store = SqliteStorage::in_memory().unwrap();
        assert_eq!(store.get_raw("a").unwrap(), None);

        store.put_raw("a", "1").unwrap();
        store.put_raw("a", "2").unwrap();
        assert_eq!(store.get_raw("a").unwrap().as_deref(), Some("2"));
        assert!(store.updated_at("a").unwrap().is_some());

        store.remove("a").unwrap();
        assert_eq!(store.get_raw("a").unwrap(), None);
        assert_eq!(store.updated_at("a").unwrap(), None);
    }

    #[test]
    fn test_json_helpers() {
        let store = SqliteStorage::in_memory().unwrap();
        let item = Item { name: "jacka".into(), count: 3 };
        store.put_json("item", &item).unwrap();
        assert_eq!(store.get_json::<Item>("item").unwrap(), Some(item));
    }

    #[test]
    fn test_corrupt_value_is_reported() {
        let store = SqliteStorage::in_memory().unwrap();
        store.put_raw("item", "{not json").unwrap();
        let err = store.get_json::<Item>("item").unwrap_err();
        assert!(matches!(err, StorageError::Corrupt { ref key, .. } if key == "item"));
    }

    #[test]
    fn test_file_database_persists() {
        let path = std::env::temp_dir().join(format!("pricewatch-kv-{}.db", std::process::id()));
        let path_str = path.to_string_lossy().to_string();
        {
            let store = SqliteStorage::new(&path_str).unwrap();
            store.put_raw("k", "v").unwrap();
        }
        let reopened = SqliteStorage::new(&path_str).unwrap();
        assert_eq!(reopened.get_raw("k").unwrap().as_deref(), Some("v"));
        drop(reopened);
        let _ = std::fs::remove_file(&path);
    }
}
