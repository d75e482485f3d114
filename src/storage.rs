use anyhow::{Context, Result};
use rusqlite::{params, Connection};
use std::path::{Path, PathBuf};

/// Key under which the bearer token is persisted.
pub const TOKEN_KEY: &str = "jobby_jwt";

/// Durable home for the session token.
pub trait TokenStore: Send {
    fn load(&self) -> Result<Option<String>>;
    fn save(&self, token: &str) -> Result<()>;
    fn clear(&self) -> Result<()>;
}

/// Small key-value store on top of SQLite.
pub struct Storage {
    conn: Connection,
    path: Option<PathBuf>,
}

impl Storage {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create data directory {}", parent.display()))?;
        }
        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open session database {}", path.display()))?;
        let storage = Self {
            conn,
            path: Some(path.to_path_buf()),
        };
        storage.init()?;
        Ok(storage)
    }

    pub fn open_in_memory() -> Result<Self> {
        let storage = Self {
            conn: Connection::open_in_memory()?,
            path: None,
        };
        storage.init()?;
        Ok(storage)
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    fn init(&self) -> Result<()> {
        self.conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS kv (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );
            "#,
        )?;
        Ok(())
    }

    pub fn get_item(&self, key: &str) -> Result<Option<String>> {
        let result = self
            .conn
            .query_row("SELECT value FROM kv WHERE key = ?1", [key], |row| row.get(0));
        match result {
            Ok(value) => Ok(Some(value)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    pub fn set_item(&self, key: &str, value: &str) -> Result<()> {
        let now = chrono::Utc::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO kv (key, value, updated_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
            params![key, value, now],
        )?;
        Ok(())
    }

    pub fn remove_item(&self, key: &str) -> Result<()> {
        self.conn.execute("DELETE FROM kv WHERE key = ?1", [key])?;
        Ok(())
    }

    /// When `key` was last written, if it exists.
    pub fn updated_at(&self, key: &str) -> Result<Option<chrono::DateTime<chrono::Utc>>> {
        let result: rusqlite::Result<String> = self
            .conn
            .query_row("SELECT updated_at FROM kv WHERE key = ?1", [key], |row| row.get(0));
        let raw = match result {
            Ok(raw) => raw,
            Err(rusqlite::Error::QueryReturnedNoRows) => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let parsed = chrono::DateTime::parse_from_rfc3339(&raw)
            .with_context(|| format!("Bad timestamp in kv table: {}", raw))?;
        Ok(Some(parsed.with_timezone(&chrono::Utc)))
    }
}

impl TokenStore for Storage {
    fn load(&self) -> Result<Option<String>> {
        // An empty slot is the same as no token
        Ok(self.get_item(TOKEN_KEY)?.filter(|t| !t.is_empty()))
    }

    fn save(&self, token: &str) -> Result<()> {
        self.set_item(TOKEN_KEY, token)
    }

    fn clear(&self) -> Result<()> {
        self.remove_item(TOKEN_KEY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_get_remove() {
        let storage = Storage::open_in_memory().unwrap();
        assert_eq!(storage.get_item("a").unwrap(), None);

        storage.set_item("a", "1").unwrap();
        assert_eq!(storage.get_item("a").unwrap().as_deref(), Some("1"));

        storage.set_item("a", "2").unwrap();
        assert_eq!(storage.get_item("a").unwrap().as_deref(), Some("2"));
        assert!(storage.updated_at("a").unwrap().is_some());

        storage.remove_item("a").unwrap();
        assert_eq!(storage.get_item("a").unwrap(), None);
        assert_eq!(storage.updated_at("a").unwrap(), None);

        // removing a missing key is fine
        storage.remove_item("a").unwrap();
    }

    #[test]
    fn test_token_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("jobby.db");

        {
            let storage = Storage::open(&path).unwrap();
            storage.save("tok123").unwrap();
        }

        let storage = Storage::open(&path).unwrap();
        assert_eq!(storage.load().unwrap().as_deref(), Some("tok123"));
        assert_eq!(storage.path(), Some(path.as_path()));

        storage.clear().unwrap();
        drop(storage);
        let storage = Storage::open(&path).unwrap();
        assert_eq!(storage.load().unwrap(), None);
    }

    #[test]
    fn test_empty_token_reads_as_absent() {
        let storage = Storage::open_in_memory().unwrap();
        storage.set_item(TOKEN_KEY, "").unwrap();
        assert_eq!(storage.load().unwrap(), None);
    }
}
