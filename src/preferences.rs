//! Persisted user configuration
//!
//! A single boolean flag, `user_config`, records that the user has been
//! through the first-launch welcome. It is stored in the `preferences`
//! key-value table and observed through a `watch` channel.

use tokio::sync::watch;

use crate::db::DbPool;
use crate::{Error, Result};

/// Preference key for the first-launch flag
pub const USER_CONFIG_KEY: &str = "user_config";

/// Reads and writes the persisted user configuration flag
pub struct UserConfigStore {
    db: DbPool,
    tx: watch::Sender<bool>,
}

impl UserConfigStore {
    /// Open the store, loading the current flag value
    ///
    /// # Errors
    ///
    /// Returns error if the initial read fails
    pub fn new(db: DbPool) -> Result<Self> {
        let initial = read_bool(&db, USER_CONFIG_KEY)?.unwrap_or(false);
        let (tx, _rx) = watch::channel(initial);
        Ok(Self { db, tx })
    }

    /// Current value of the flag (`false` until written)
    #[must_use]
    pub fn read_user_config(&self) -> bool {
        *self.tx.borrow()
    }

    /// Subscribe to changes of the flag
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.tx.subscribe()
    }

    /// Record that the user has completed the first-launch welcome
    ///
    /// # Errors
    ///
    /// Returns error if the database write fails
    pub fn write_user_config(&self) -> Result<()> {
        write_bool(&self.db, USER_CONFIG_KEY, true)?;
        self.tx.send_replace(true);
        tracing::debug!(key = USER_CONFIG_KEY, "user config written");
        Ok(())
    }
}

fn read_bool(db: &DbPool, key: &str) -> Result<Option<bool>> {
    let conn = db.get().map_err(|e| Error::Database(e.to_string()))?;
    let result = conn.query_row(
        "SELECT value FROM preferences WHERE key = ?1",
        rusqlite::params![key],
        |row| row.get::<_, String>(0),
    );
    match result {
        Ok(value) => Ok(Some(value == "true")),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(Error::Database(e.to_string())),
    }
}

fn write_bool(db: &DbPool, key: &str, value: bool) -> Result<()> {
    let conn = db.get().map_err(|e| Error::Database(e.to_string()))?;
    conn.execute(
        "INSERT INTO preferences (key, value, updated_at)
         VALUES (?1, ?2, datetime('now'))
         ON CONFLICT(key) DO UPDATE SET
            value = excluded.value,
            updated_at = excluded.updated_at",
        rusqlite::params![key, if value { "true" } else { "false" }],
    )
    .map_err(|e| Error::Database(e.to_string()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_db() -> DbPool {
        crate::db::init_memory().unwrap()
    }

    #[test]
    fn defaults_to_false() {
        let store = UserConfigStore::new(test_db()).unwrap();
        assert!(!store.read_user_config());
    }

    #[test]
    fn write_persists_across_instances() {
        let db = test_db();
        UserConfigStore::new(db.clone())
            .unwrap()
            .write_user_config()
            .unwrap();

        let reopened = UserConfigStore::new(db).unwrap();
        assert!(reopened.read_user_config());
    }

    #[test]
    fn subscribers_observe_write() {
        let store = UserConfigStore::new(test_db()).unwrap();
        let mut rx = store.subscribe();
        assert!(!*rx.borrow_and_update());

        store.write_user_config().unwrap();
        assert!(rx.has_changed().unwrap());
        assert!(*rx.borrow());
    }
}
