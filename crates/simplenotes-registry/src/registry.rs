use std::sync::{Mutex, MutexGuard};

use rusqlite::{params, OptionalExtension};
use simplenotes_core::UserId;
use tracing::{debug, instrument};

use crate::db::init_db;
use crate::error::{RegistryError, Result};
use crate::types::Connection;

/// Source of truth for which push channels are live.
///
/// Every method is a single atomic unit against the backing store, so
/// callers on different tasks may interleave freely; deletes and heartbeat
/// updates on missing ids are no-ops, not errors.
pub trait ConnectionRegistry: Send + Sync {
    /// Insert, or update an existing `connection_id` in place. A re-save
    /// keeps the original `created_at` and never moves the heartbeat back.
    fn save(&self, conn: &Connection) -> Result<()>;

    /// Remove a connection. Deleting an unknown id succeeds.
    fn delete(&self, connection_id: &str) -> Result<()>;

    fn find(&self, connection_id: &str) -> Result<Option<Connection>>;

    /// All connection ids of `user_id`, in no particular order.
    fn find_connection_ids(&self, user_id: UserId) -> Result<Vec<String>>;

    /// Every connection id across all users.
    fn find_all_connection_ids(&self) -> Result<Vec<String>>;

    /// Connections with `expires_at < now` OR `last_heartbeat_at < heartbeat_cutoff`.
    fn find_stale(&self, now: i64, heartbeat_cutoff: i64) -> Result<Vec<Connection>>;

    /// Record a heartbeat. Unknown ids are ignored; the stored value never
    /// moves backwards.
    fn update_heartbeat(&self, connection_id: &str, now: i64) -> Result<()>;

    fn count(&self) -> Result<usize>;
}

/// [`ConnectionRegistry`] over a single SQLite connection.
///
/// The `Mutex` gives single-writer discipline: SQLite serialises writers
/// anyway, and one handle avoids `SQLITE_BUSY` between pooled connections.
pub struct SqliteConnectionRegistry {
    db: Mutex<rusqlite::Connection>,
}

impl SqliteConnectionRegistry {
    /// Wrap an open connection, creating the schema if needed.
    pub fn new(conn: rusqlite::Connection) -> Result<Self> {
        init_db(&conn)?;
        Ok(Self {
            db: Mutex::new(conn),
        })
    }

    /// Registry backed by a private in-memory database.
    pub fn in_memory() -> Result<Self> {
        Self::new(rusqlite::Connection::open_in_memory()?)
    }

    fn lock(&self) -> Result<MutexGuard<'_, rusqlite::Connection>> {
        self.db.lock().map_err(|_| RegistryError::LockPoisoned)
    }
}

impl ConnectionRegistry for SqliteConnectionRegistry {
    #[instrument(skip(self, conn), fields(conn_id = %conn.connection_id, user_id = %conn.user_id))]
    fn save(&self, conn: &Connection) -> Result<()> {
        let db = self.lock()?;
        db.execute(
            "INSERT INTO connections
             (connection_id, user_id, expires_at, last_heartbeat_at, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(connection_id) DO UPDATE SET
                user_id           = excluded.user_id,
                expires_at        = excluded.expires_at,
                last_heartbeat_at = MAX(last_heartbeat_at, excluded.last_heartbeat_at)",
            params![
                conn.connection_id,
                conn.user_id.get(),
                conn.expires_at,
                conn.last_heartbeat_at,
                conn.created_at
            ],
        )?;
        debug!("connection saved");
        Ok(())
    }

    #[instrument(skip(self))]
    fn delete(&self, connection_id: &str) -> Result<()> {
        let db = self.lock()?;
        let n = db.execute(
            "DELETE FROM connections WHERE connection_id = ?1",
            params![connection_id],
        )?;
        debug!(rows = n, "connection deleted");
        Ok(())
    }

    #[instrument(skip(self))]
    fn find(&self, connection_id: &str) -> Result<Option<Connection>> {
        let db = self.lock()?;
        let conn = db
            .query_row(
                "SELECT connection_id, user_id, expires_at, last_heartbeat_at, created_at
                 FROM connections WHERE connection_id = ?1",
                params![connection_id],
                row_to_connection,
            )
            .optional()?;
        Ok(conn)
    }

    #[instrument(skip(self))]
    fn find_connection_ids(&self, user_id: UserId) -> Result<Vec<String>> {
        let db = self.lock()?;
        let mut stmt =
            db.prepare_cached("SELECT connection_id FROM connections WHERE user_id = ?1")?;
        let ids = stmt
            .query_map(params![user_id.get()], |row| row.get::<_, String>(0))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(ids)
    }

    #[instrument(skip(self))]
    fn find_all_connection_ids(&self) -> Result<Vec<String>> {
        let db = self.lock()?;
        let mut stmt = db.prepare_cached("SELECT connection_id FROM connections")?;
        let ids = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(ids)
    }

    #[instrument(skip(self))]
    fn find_stale(&self, now: i64, heartbeat_cutoff: i64) -> Result<Vec<Connection>> {
        let db = self.lock()?;
        let mut stmt = db.prepare_cached(
            "SELECT connection_id, user_id, expires_at, last_heartbeat_at, created_at
             FROM connections
             WHERE expires_at < ?1 OR last_heartbeat_at < ?2",
        )?;
        let stale = stmt
            .query_map(params![now, heartbeat_cutoff], row_to_connection)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(stale)
    }

    #[instrument(skip(self))]
    fn update_heartbeat(&self, connection_id: &str, now: i64) -> Result<()> {
        let db = self.lock()?;
        let n = db.execute(
            "UPDATE connections
             SET last_heartbeat_at = MAX(last_heartbeat_at, ?2)
             WHERE connection_id = ?1",
            params![connection_id, now],
        )?;
        if n == 0 {
            // Reaped or disconnected between the ping and this update.
            debug!("heartbeat for unknown connection ignored");
        }
        Ok(())
    }

    fn count(&self) -> Result<usize> {
        let db = self.lock()?;
        let n: i64 = db.query_row("SELECT COUNT(*) FROM connections", [], |row| row.get(0))?;
        Ok(usize::try_from(n).unwrap_or_default())
    }
}

/// Map a SQLite row (column order as in the SELECTs above) to a `Connection`.
fn row_to_connection(row: &rusqlite::Row<'_>) -> rusqlite::Result<Connection> {
    Ok(Connection {
        connection_id: row.get(0)?,
        user_id: UserId(row.get(1)?),
        expires_at: row.get(2)?,
        last_heartbeat_at: row.get(3)?,
        created_at: row.get(4)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> SqliteConnectionRegistry {
        SqliteConnectionRegistry::in_memory().expect("in-memory registry")
    }

    fn conn(id: &str, user: i64, expires_at: i64, heartbeat: i64) -> Connection {
        Connection {
            connection_id: id.to_string(),
            user_id: UserId(user),
            expires_at,
            last_heartbeat_at: heartbeat,
            created_at: heartbeat,
        }
    }

    #[test]
    fn save_is_an_upsert() {
        let reg = registry();
        reg.save(&conn("a", 1, 100, 10)).unwrap();
        reg.save(&conn("a", 1, 200, 20)).unwrap();

        assert_eq!(reg.count().unwrap(), 1);
        let stored = reg.find("a").unwrap().expect("row exists");
        assert_eq!(stored.expires_at, 200);
        assert_eq!(stored.last_heartbeat_at, 20);
        assert_eq!(stored.created_at, 10);
    }

    #[test]
    fn resave_keeps_created_at_and_heartbeat() {
        let reg = registry();
        let mut first = conn("a", 1, 100_000, 500);
        first.created_at = 100;
        reg.save(&first).unwrap();

        // replayed handshake with an older clock reading
        let mut replay = conn("a", 1, 200_000, 200);
        replay.created_at = 200;
        reg.save(&replay).unwrap();

        let stored = reg.find("a").unwrap().expect("row exists");
        assert_eq!(stored.created_at, 100);
        assert_eq!(stored.last_heartbeat_at, 500);
        assert_eq!(stored.expires_at, 200_000);
    }

    #[test]
    fn delete_is_idempotent() {
        let reg = registry();
        reg.save(&conn("a", 1, 100, 10)).unwrap();
        reg.delete("a").unwrap();
        reg.delete("a").unwrap();
        reg.delete("never-existed").unwrap();
        assert!(reg.find("a").unwrap().is_none());
    }

    #[test]
    fn finds_ids_per_user_and_globally() {
        let reg = registry();
        reg.save(&conn("a", 1, 100, 10)).unwrap();
        reg.save(&conn("b", 1, 100, 10)).unwrap();
        reg.save(&conn("c", 2, 100, 10)).unwrap();

        let mut mine = reg.find_connection_ids(UserId(1)).unwrap();
        mine.sort();
        assert_eq!(mine, vec!["a", "b"]);
        assert!(reg.find_connection_ids(UserId(99)).unwrap().is_empty());

        let mut all = reg.find_all_connection_ids().unwrap();
        all.sort();
        assert_eq!(all, vec!["a", "b", "c"]);
    }

    #[test]
    fn stale_matches_either_condition() {
        let reg = registry();
        let now = 10_000;
        let cutoff = 5_000;
        reg.save(&conn("fresh", 1, 20_000, 9_000)).unwrap();
        reg.save(&conn("expired", 1, 9_999, 9_000)).unwrap();
        reg.save(&conn("idle", 1, 20_000, 4_999)).unwrap();
        reg.save(&conn("both", 1, 1, 1)).unwrap();
        reg.save(&conn("boundary", 1, now, cutoff)).unwrap();

        let mut stale: Vec<String> = reg
            .find_stale(now, cutoff)
            .unwrap()
            .into_iter()
            .map(|c| c.connection_id)
            .collect();
        stale.sort();
        assert_eq!(stale, vec!["both", "expired", "idle"]);
    }

    #[test]
    fn heartbeat_never_moves_backwards() {
        let reg = registry();
        reg.save(&conn("a", 1, 100_000, 50)).unwrap();

        reg.update_heartbeat("a", 80).unwrap();
        assert_eq!(reg.find("a").unwrap().unwrap().last_heartbeat_at, 80);

        reg.update_heartbeat("a", 60).unwrap();
        assert_eq!(reg.find("a").unwrap().unwrap().last_heartbeat_at, 80);
    }

    #[test]
    fn heartbeat_for_missing_connection_is_a_no_op() {
        let reg = registry();
        reg.update_heartbeat("gone", 123).unwrap();
        assert_eq!(reg.count().unwrap(), 0);
    }
}
