//! Key-value settings store used by the dashboard browser extension.
//!
//! The store is the extension's Chromium "Local Storage" SQLite file: a single `ItemTable` of
//! unique keys.

use crate::{HalError, HalResult};
use rusqlite::{params, Connection, OpenFlags, OptionalExtension};
use std::path::Path;

pub trait SettingsStoreOps {
    fn get_entry(&self, store: &Path, key: &str) -> HalResult<Option<String>>;
    fn set_entry(&self, store: &Path, key: &str, value: &str) -> HalResult<()>;
}

const CREATE_ITEM_TABLE: &str = "CREATE TABLE IF NOT EXISTS ItemTable \
     (key TEXT UNIQUE ON CONFLICT REPLACE PRIMARY KEY NOT NULL, value BLOB NOT NULL)";

fn store_err(store: &Path, err: rusqlite::Error) -> HalError {
    HalError::SettingsStore {
        path: store.to_path_buf(),
        reason: err.to_string(),
    }
}

fn open_store(store: &Path) -> HalResult<Connection> {
    let conn = Connection::open(store).map_err(|e| store_err(store, e))?;
    conn.execute(CREATE_ITEM_TABLE, [])
        .map_err(|e| store_err(store, e))?;
    Ok(conn)
}

fn has_item_table(conn: &Connection) -> rusqlite::Result<bool> {
    conn.query_row(
        "SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = 'ItemTable'",
        [],
        |_| Ok(()),
    )
    .optional()
    .map(|row| row.is_some())
}

/// Read a value without modifying the store; values written by the browser may be BLOBs.
pub(crate) fn sqlite_get_entry(store: &Path, key: &str) -> HalResult<Option<String>> {
    if !store.exists() {
        return Ok(None);
    }
    let conn = Connection::open_with_flags(store, OpenFlags::SQLITE_OPEN_READ_ONLY)
        .map_err(|e| store_err(store, e))?;
    if !has_item_table(&conn).map_err(|e| store_err(store, e))? {
        return Ok(None);
    }
    let value: Option<rusqlite::types::Value> = conn
        .query_row(
            "SELECT value FROM ItemTable WHERE key = ?1",
            params![key],
            |row| row.get(0),
        )
        .optional()
        .map_err(|e| store_err(store, e))?;
    Ok(value.map(|v| match v {
        rusqlite::types::Value::Text(s) => s,
        rusqlite::types::Value::Blob(b) => String::from_utf8_lossy(&b).into_owned(),
        rusqlite::types::Value::Integer(i) => i.to_string(),
        rusqlite::types::Value::Real(r) => r.to_string(),
        rusqlite::types::Value::Null => String::new(),
    }))
}

pub(crate) fn sqlite_set_entry(store: &Path, key: &str, value: &str) -> HalResult<()> {
    if let Some(parent) = store.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let conn = open_store(store)?;
    conn.execute(
        "INSERT OR REPLACE INTO ItemTable (key, value) VALUES (?1, ?2)",
        params![key, value],
    )
    .map_err(|e| store_err(store, e))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn set_then_get_returns_value() {
        let dir = tempdir().unwrap();
        let store = dir.path().join("Local Storage/ext_0.localstorage");

        sqlite_set_entry(&store, "serverAddress", "dash.example.com:8081").unwrap();

        let value = sqlite_get_entry(&store, "serverAddress").unwrap();
        assert_eq!(value.as_deref(), Some("dash.example.com:8081"));
    }

    #[test]
    fn set_replaces_existing_key() {
        let dir = tempdir().unwrap();
        let store = dir.path().join("store.localstorage");

        sqlite_set_entry(&store, "installationName", "old").unwrap();
        sqlite_set_entry(&store, "installationName", "new").unwrap();

        let conn = Connection::open(&store).unwrap();
        let rows: i64 = conn
            .query_row("SELECT COUNT(*) FROM ItemTable", [], |row| row.get(0))
            .unwrap();
        assert_eq!(rows, 1);
        assert_eq!(
            sqlite_get_entry(&store, "installationName").unwrap().as_deref(),
            Some("new")
        );
    }

    #[test]
    fn reading_store_without_item_table_leaves_it_untouched() {
        let dir = tempdir().unwrap();
        let store = dir.path().join("fresh.localstorage");
        Connection::open(&store)
            .unwrap()
            .execute("CREATE TABLE meta (key TEXT, value TEXT)", [])
            .unwrap();
        let before = std::fs::read(&store).unwrap();

        assert_eq!(sqlite_get_entry(&store, "serverAddress").unwrap(), None);

        let conn = Connection::open(&store).unwrap();
        assert!(!has_item_table(&conn).unwrap());
        drop(conn);
        assert_eq!(std::fs::read(&store).unwrap(), before);
    }

    #[test]
    fn missing_store_has_no_entries() {
        let dir = tempdir().unwrap();
        let store = dir.path().join("absent.localstorage");
        assert_eq!(sqlite_get_entry(&store, "serverAddress").unwrap(), None);
        assert!(!store.exists());
    }
}
