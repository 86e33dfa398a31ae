use rusqlite::Connection;

use crate::error::Result;

pub const SCHEMA_VERSION: i64 = 1;

pub fn initialize(conn: &Connection) -> Result<()> {
    conn.execute_batch("PRAGMA journal_mode = WAL;")?;
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    conn.pragma_update(None, "busy_timeout", 5000)?;

    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS metadata (
            key   TEXT PRIMARY KEY,
            value TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS codebooks (
            key           TEXT PRIMARY KEY,
            element_count INTEGER NOT NULL,
            phase_states  TEXT NOT NULL,
            threshold     REAL NOT NULL,
            weighting     TEXT NOT NULL,
            source        TEXT NOT NULL,
            total         INTEGER NOT NULL,
            created_at    TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS codebook_entries (
            codebook_key TEXT NOT NULL REFERENCES codebooks(key) ON DELETE CASCADE,
            idx          INTEGER NOT NULL,
            states       TEXT NOT NULL,
            phase        REAL NOT NULL,
            magnitude    REAL NOT NULL,
            PRIMARY KEY (codebook_key, idx)
        );
        ",
    )?;

    let version: Option<i64> = conn
        .query_row(
            "SELECT value FROM metadata WHERE key = 'schema_version'",
            [],
            |row| row.get::<_, String>(0),
        )
        .ok()
        .and_then(|v| v.parse().ok());

    if version.is_none() {
        conn.execute(
            "INSERT OR REPLACE INTO metadata (key, value) VALUES ('schema_version', ?1)",
            [SCHEMA_VERSION.to_string()],
        )?;
        tracing::info!("initialized codebook cache schema v{SCHEMA_VERSION}");
    }

    Ok(())
}
