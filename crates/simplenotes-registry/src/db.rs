use rusqlite::Connection;

use crate::error::Result;

/// Initialise the connections table and its indexes.
///
/// Safe to call on every startup: uses `IF NOT EXISTS` throughout.
pub fn init_db(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS connections (
            connection_id     TEXT    NOT NULL PRIMARY KEY,
            user_id           INTEGER NOT NULL,
            expires_at        INTEGER NOT NULL,   -- epoch ms
            last_heartbeat_at INTEGER NOT NULL,   -- epoch ms
            created_at        INTEGER NOT NULL    -- epoch ms
        ) STRICT;

        CREATE INDEX IF NOT EXISTS idx_connections_user
            ON connections (user_id);
        -- stale sweep: ... WHERE expires_at < ? OR last_heartbeat_at < ?
        CREATE INDEX IF NOT EXISTS idx_connections_heartbeat
            ON connections (last_heartbeat_at);",
    )?;
    Ok(())
}
