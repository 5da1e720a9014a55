//! Persistent local storage (auth token, admin session) backed by SQLite.

use color_eyre::{eyre::eyre, Result as EyreResult};
use rusqlite::{params, Connection, OptionalExtension};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::error::{ApiError, Result};

pub const TOKEN_KEY: &str = "auth_token";
pub const ADMIN_SESSION_KEY: &str = "admin_session";

const STORAGE_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS local_storage (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL,
    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
);
"#;

/// Small string key/value store that survives restarts.
pub struct SqliteStorage {
  conn: Mutex<Connection>,
}

impl SqliteStorage {
  /// Open or create the storage at the default location.
  pub fn open() -> EyreResult<Self> {
    let path = Self::default_path()?;
    Self::open_at(&path)
  }

  pub fn open_at(path: &Path) -> EyreResult<Self> {
    // Ensure parent directory exists
    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent)
        .map_err(|e| eyre!("Failed to create storage directory: {}", e))?;
    }

    let conn = Connection::open(path)
      .map_err(|e| eyre!("Failed to open storage at {}: {}", path.display(), e))?;
    Self::from_connection(conn).map_err(|e| eyre!("Failed to run storage migrations: {}", e))
  }

  /// Storage that lives only as long as this value.
  pub fn open_in_memory() -> Result<Self> {
    Self::from_connection(Connection::open_in_memory()?)
  }

  fn from_connection(conn: Connection) -> Result<Self> {
    conn.execute_batch(STORAGE_SCHEMA)?;
    Ok(Self {
      conn: Mutex::new(conn),
    })
  }

  /// Get the default storage path.
  fn default_path() -> EyreResult<PathBuf> {
    Ok(data_dir()?.join("storage.db"))
  }

  pub fn get_item(&self, key: &str) -> Result<Option<String>> {
    let conn = self.lock()?;
    let value = conn
      .query_row(
        "SELECT value FROM local_storage WHERE key = ?",
        params![key],
        |row| row.get(0),
      )
      .optional()?;
    Ok(value)
  }

  pub fn set_item(&self, key: &str, value: &str) -> Result<()> {
    let conn = self.lock()?;
    conn.execute(
      "INSERT OR REPLACE INTO local_storage (key, value, updated_at)
       VALUES (?, ?, datetime('now'))",
      params![key, value],
    )?;
    Ok(())
  }

  pub fn remove_item(&self, key: &str) -> Result<()> {
    let conn = self.lock()?;
    conn.execute("DELETE FROM local_storage WHERE key = ?", params![key])?;
    Ok(())
  }

  fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>> {
    self.conn.lock().map_err(|_| ApiError::StorageUnavailable)
  }
}

/// Application data directory (`$XDG_DATA_HOME/storefront`).
pub fn data_dir() -> EyreResult<PathBuf> {
  let data_dir = dirs::data_dir()
    .or_else(|| dirs::home_dir().map(|p| p.join(".local/share")))
    .ok_or_else(|| eyre!("Could not determine data directory"))?;

  Ok(data_dir.join("storefront"))
}

/// Typed view over the storage for the signed-in session.
///
/// Read failures are logged and treated as "not signed in".
pub struct Session {
  storage: SqliteStorage,
}

impl Session {
  pub fn new(storage: SqliteStorage) -> Self {
    Self { storage }
  }

  pub fn token(&self) -> Option<String> {
    match self.storage.get_item(TOKEN_KEY) {
      Ok(token) => token.filter(|t| !t.is_empty()),
      Err(e) => {
        tracing::warn!(error = %e, "failed to read auth token");
        None
      }
    }
  }

  pub fn set_token(&self, token: &str) -> Result<()> {
    self.storage.set_item(TOKEN_KEY, token)
  }

  /// Cached admin profile, if the signed-in user is an admin.
  pub fn admin_session(&self) -> Option<Value> {
    let raw = match self.storage.get_item(ADMIN_SESSION_KEY) {
      Ok(raw) => raw?,
      Err(e) => {
        tracing::warn!(error = %e, "failed to read admin session");
        return None;
      }
    };
    serde_json::from_str(&raw).ok()
  }

  pub fn set_admin_session(&self, profile: &Value) -> Result<()> {
    self
      .storage
      .set_item(ADMIN_SESSION_KEY, &profile.to_string())
  }

  /// Forget the token and the admin profile.
  pub fn clear(&self) -> Result<()> {
    self.storage.remove_item(TOKEN_KEY)?;
    self.storage.remove_item(ADMIN_SESSION_KEY)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  #[test]
  fn test_item_roundtrip_and_remove() {
    let storage = SqliteStorage::open_in_memory().unwrap();
    assert_eq!(storage.get_item("k").unwrap(), None);

    storage.set_item("k", "v1").unwrap();
    storage.set_item("k", "v2").unwrap();
    assert_eq!(storage.get_item("k").unwrap(), Some("v2".into()));

    storage.remove_item("k").unwrap();
    assert_eq!(storage.get_item("k").unwrap(), None);
  }

  #[test]
  fn test_storage_persists_on_disk() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("storage.db");

    SqliteStorage::open_at(&path)
      .unwrap()
      .set_item(TOKEN_KEY, "abc")
      .unwrap();

    let reopened = SqliteStorage::open_at(&path).unwrap();
    assert_eq!(reopened.get_item(TOKEN_KEY).unwrap(), Some("abc".into()));
  }

  #[test]
  fn test_session_clear() {
    let session = Session::new(SqliteStorage::open_in_memory().unwrap());
    session.set_token("tok").unwrap();
    session
      .set_admin_session(&json!({"name": "Ada", "isAdmin": true}))
      .unwrap();

    assert_eq!(session.token(), Some("tok".into()));
    assert_eq!(session.admin_session().unwrap()["name"], "Ada");

    session.clear().unwrap();
    assert_eq!(session.token(), None);
    assert_eq!(session.admin_session(), None);
  }
}
