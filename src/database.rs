//! Durable key/value storage backed by SQLite.
//!
//! Two tables: `config` for user settings and `kv_store` for namespaced
//! blobs (the serialized collection and the directory grant).

use crate::models::MediaItem;
use crate::source::directory::DirectoryGrant;
use rusqlite::{Connection, OptionalExtension, Result};
use std::path::Path;
use std::sync::Mutex;
use time::OffsetDateTime;

pub const STORAGE_NAMESPACE: &str = "visionary";
pub const COLLECTION_KEY: &str = "visionary_gallery_data";
pub const CREDENTIAL_KEY: &str = "gallery_handle";

pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    /// Get a connection. A poisoned mutex is reported as a database error.
    pub fn get_conn(&self) -> Result<std::sync::MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|e| {
            log::warn!("Recovering from poisoned database mutex");
            rusqlite::Error::SqliteFailure(
                rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_ERROR),
                Some(format!("Mutex poisoned: {}", e)),
            )
        })
    }

    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        let conn = Connection::open(path)?;
        Self::migrate(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::migrate(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn migrate(conn: &Connection) -> Result<()> {
        let version: i32 = conn.query_row("PRAGMA user_version;", [], |row| row.get(0))?;
        log::info!("Database schema version: {}", version);

        if version < 1 {
            conn.execute_batch(
                "BEGIN;
                CREATE TABLE IF NOT EXISTS config (
                    key TEXT PRIMARY KEY,
                    value TEXT NOT NULL,
                    updated_at INTEGER NOT NULL
                );

                CREATE TABLE IF NOT EXISTS kv_store (
                    namespace TEXT NOT NULL,
                    key TEXT NOT NULL,
                    value TEXT NOT NULL,
                    updated_at INTEGER NOT NULL,
                    PRIMARY KEY (namespace, key)
                );

                PRAGMA user_version = 1;
                COMMIT;",
            )?;
            log::info!("Migrated database to version 1");
        }

        Ok(())
    }

    // --- Config Operations (Settings) ---

    /// Get a config value by key
    pub fn get_config(&self, key: &str) -> Result<Option<String>> {
        let conn = self.get_conn()?;
        conn.query_row("SELECT value FROM config WHERE key = ?1", [key], |row| {
            row.get(0)
        })
        .optional()
    }

    /// Set a config value
    pub fn set_config(&self, key: &str, value: &str) -> Result<()> {
        let conn = self.get_conn()?;
        let now = OffsetDateTime::now_utc().unix_timestamp();
        conn.execute(
            "INSERT OR REPLACE INTO config (key, value, updated_at) VALUES (?1, ?2, ?3)",
            (key, value, now),
        )?;
        Ok(())
    }

    /// Delete a config key
    pub fn remove_config(&self, key: &str) -> Result<()> {
        let conn = self.get_conn()?;
        conn.execute("DELETE FROM config WHERE key = ?1", [key])?;
        Ok(())
    }

    pub fn config_enabled(&self, key: &str) -> bool {
        matches!(self.get_config(key), Ok(Some(value)) if value.eq_ignore_ascii_case("true"))
    }

    // --- Namespaced blobs ---

    pub fn get_value(&self, key: &str) -> Result<Option<String>> {
        let conn = self.get_conn()?;
        conn.query_row(
            "SELECT value FROM kv_store WHERE namespace = ?1 AND key = ?2",
            (STORAGE_NAMESPACE, key),
            |row| row.get(0),
        )
        .optional()
    }

    pub fn put_value(&self, key: &str, value: &str) -> Result<()> {
        let conn = self.get_conn()?;
        let now = OffsetDateTime::now_utc().unix_timestamp();
        conn.execute(
            "INSERT OR REPLACE INTO kv_store (namespace, key, value, updated_at) VALUES (?1, ?2, ?3, ?4)",
            (STORAGE_NAMESPACE, key, value, now),
        )?;
        Ok(())
    }

    pub fn delete_value(&self, key: &str) -> Result<()> {
        let conn = self.get_conn()?;
        conn.execute(
            "DELETE FROM kv_store WHERE namespace = ?1 AND key = ?2",
            (STORAGE_NAMESPACE, key),
        )?;
        Ok(())
    }
}

impl Database {
    // --- Collection persistence ---

    pub fn save_collection(&self, items: &[MediaItem]) -> crate::errors::AppResult<()> {
        let json = serde_json::to_string(items)?;
        self.put_value(COLLECTION_KEY, &json)?;
        log::debug!("Saved {} item(s) to storage", items.len());
        Ok(())
    }

    /// Returns `None` when nothing was saved yet or the saved entry is unreadable.
    pub fn load_collection(&self) -> Option<Vec<MediaItem>> {
        let raw = match self.get_value(COLLECTION_KEY) {
            Ok(raw) => raw?,
            Err(e) => {
                log::error!("Failed to read gallery data: {}", e);
                return None;
            }
        };
        match serde_json::from_str::<Vec<MediaItem>>(&raw) {
            Ok(items) => Some(items),
            Err(e) => {
                log::error!("Failed to load gallery data: {}", e);
                None
            }
        }
    }

    // --- Directory credential ---

    pub fn save_credential(&self, grant: &DirectoryGrant) -> crate::errors::AppResult<()> {
        let json = serde_json::to_string(grant)?;
        self.put_value(CREDENTIAL_KEY, &json)?;
        Ok(())
    }

    pub fn load_credential(&self) -> Option<DirectoryGrant> {
        let raw = match self.get_value(CREDENTIAL_KEY) {
            Ok(raw) => raw?,
            Err(e) => {
                log::warn!("Failed to read directory credential: {}", e);
                return None;
            }
        };
        serde_json::from_str(&raw)
            .map_err(|e| log::warn!("Ignoring unreadable directory credential: {}", e))
            .ok()
    }

    pub fn remove_credential(&self) -> crate::errors::AppResult<()> {
        self.delete_value(CREDENTIAL_KEY)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{MediaKind, MediaMetadata};
    use std::path::PathBuf;

    fn item(name: &str) -> MediaItem {
        MediaItem {
            id: format!("id-{}", name),
            url: format!("/pics/{}", name),
            kind: MediaKind::Image,
            name: name.to_string(),
            timestamp: 1,
            metadata: Some(MediaMetadata::unanalyzed()),
        }
    }

    #[test]
    fn test_config_roundtrip() {
        let db = Database::open_in_memory().unwrap();
        assert_eq!(db.get_config("ai_mode_enabled").unwrap(), None);
        assert!(!db.config_enabled("ai_mode_enabled"));

        db.set_config("ai_mode_enabled", "TRUE").unwrap();
        assert!(db.config_enabled("ai_mode_enabled"));

        db.remove_config("ai_mode_enabled").unwrap();
        assert!(!db.config_enabled("ai_mode_enabled"));
    }

    #[test]
    fn test_collection_persists_across_connections() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("library.db");

        {
            let db = Database::new(&path).unwrap();
            assert!(db.load_collection().is_none());
            db.save_collection(&[item("a.jpg"), item("b.jpg")]).unwrap();
        }

        let db = Database::new(&path).unwrap();
        let loaded = db.load_collection().unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded[1].name, "b.jpg");
    }

    #[test]
    fn test_corrupt_collection_loads_as_absent() {
        let db = Database::open_in_memory().unwrap();
        db.put_value(COLLECTION_KEY, "{not json").unwrap();
        assert!(db.load_collection().is_none());
    }

    #[test]
    fn test_credential_lifecycle() {
        let db = Database::open_in_memory().unwrap();
        assert!(db.load_credential().is_none());

        let grant = DirectoryGrant {
            root: PathBuf::from("/home/me/Pictures"),
            granted_at: 1_700_000_000_000,
        };
        db.save_credential(&grant).unwrap();
        assert_eq!(db.load_credential(), Some(grant));

        db.remove_credential().unwrap();
        assert!(db.load_credential().is_none());
    }

    #[test]
    fn test_unreadable_storage_yields_no_credential() {
        let db = Database::open_in_memory().unwrap();
        db.get_conn()
            .unwrap()
            .execute("DROP TABLE kv_store", [])
            .unwrap();
        assert!(db.get_value(CREDENTIAL_KEY).is_err());
        assert!(db.load_credential().is_none());
    }

    #[test]
    fn test_poisoned_mutex_is_an_error() {
        let db = Database::open_in_memory().unwrap();
        std::thread::scope(|scope| {
            let handle = scope.spawn(|| {
                let _conn = db.get_conn().unwrap();
                panic!("poison the connection lock");
            });
            assert!(handle.join().is_err());
        });
        assert!(db.get_conn().is_err());
        assert!(db.get_config("ai_mode_enabled").is_err());
    }
}
