//! Database schema and migrations
//!
//! Uses SQLite with embedded migrations managed via PRAGMA user_version.

use rusqlite::Connection;

/// Current schema version
pub const SCHEMA_VERSION: i32 = 1;

/// SQL migrations, indexed by version number
const MIGRATIONS: &[&str] = &[
    // Version 1: Initial schema
    r#"
    -- ============================================
    -- Identities
    -- ============================================

    -- A (name, phone_number) pair. The number may be '' and is still part
    -- of the identity.
    CREATE TABLE IF NOT EXISTS contact (
        id               INTEGER PRIMARY KEY AUTOINCREMENT,
        name             TEXT NOT NULL,
        phone_number     TEXT NOT NULL DEFAULT '',
        UNIQUE(name, phone_number)
    );

    -- ============================================
    -- Conversations
    -- ============================================

    CREATE TABLE IF NOT EXISTS conversation (
        id               INTEGER PRIMARY KEY AUTOINCREMENT,
        type             TEXT NOT NULL,
        timestamp        DATETIME,             -- RFC 3339 UTC, millisecond precision
        duration         TEXT,
        transcript       TEXT,
        source_file      TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS participant (
        id               INTEGER PRIMARY KEY AUTOINCREMENT,
        conversation_id  INTEGER NOT NULL REFERENCES conversation(id) ON DELETE CASCADE,
        contact_id       INTEGER NOT NULL REFERENCES contact(id),
        UNIQUE(conversation_id, contact_id)
    );

    CREATE TABLE IF NOT EXISTS message (
        id                INTEGER PRIMARY KEY AUTOINCREMENT,
        conversation_id   INTEGER NOT NULL REFERENCES conversation(id) ON DELETE CASCADE,
        timestamp         DATETIME,
        sender_contact_id INTEGER NOT NULL REFERENCES contact(id),
        content           TEXT NOT NULL DEFAULT ''
    );

    CREATE TABLE IF NOT EXISTS image (
        id               INTEGER PRIMARY KEY AUTOINCREMENT,
        message_id       INTEGER NOT NULL REFERENCES message(id) ON DELETE CASCADE,
        position         INTEGER NOT NULL,
        image_url        TEXT NOT NULL
    );

    -- Attachment bytes captured at import time
    CREATE TABLE IF NOT EXISTS media_file (
        id               INTEGER PRIMARY KEY AUTOINCREMENT,
        image_id         INTEGER NOT NULL UNIQUE REFERENCES image(id) ON DELETE CASCADE,
        file_name        TEXT NOT NULL,
        content          BLOB NOT NULL
    );

    -- ============================================
    -- Import tracking
    -- ============================================

    CREATE TABLE IF NOT EXISTS source_file (
        path             TEXT PRIMARY KEY,
        content_hash     TEXT NOT NULL,
        conversation_id  INTEGER REFERENCES conversation(id) ON DELETE SET NULL,
        imported_at      DATETIME NOT NULL
    );

    CREATE INDEX IF NOT EXISTS idx_conversation_timestamp ON conversation(timestamp);
    CREATE INDEX IF NOT EXISTS idx_participant_contact ON participant(contact_id);
    CREATE INDEX IF NOT EXISTS idx_message_conversation ON message(conversation_id, timestamp);
    CREATE INDEX IF NOT EXISTS idx_message_sender ON message(sender_contact_id);
    CREATE INDEX IF NOT EXISTS idx_image_message ON image(message_id, position);
    "#,
];

/// Run all pending migrations
pub fn run_migrations(conn: &Connection) -> crate::error::Result<()> {
    let current_version: i32 = conn
        .query_row("PRAGMA user_version", [], |r| r.get(0))
        .unwrap_or(0);

    tracing::info!(
        current_version,
        target_version = SCHEMA_VERSION,
        "Checking database migrations"
    );

    for (i, migration) in MIGRATIONS.iter().enumerate() {
        let version = (i + 1) as i32;
        if version > current_version {
            tracing::info!(version, "Running migration");
            conn.execute_batch(migration)?;
            conn.execute(&format!("PRAGMA user_version = {}", version), [])?;
        }
    }

    if current_version < SCHEMA_VERSION {
        tracing::info!(
            from = current_version,
            to = SCHEMA_VERSION,
            "Migrations complete"
        );
    }

    Ok(())
}

/// Get the current schema version from the database
pub fn get_schema_version(conn: &Connection) -> crate::error::Result<i32> {
    let version: i32 = conn.query_row("PRAGMA user_version", [], |r| r.get(0))?;
    Ok(version)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_migrations_idempotent() {
        let conn = Connection::open_in_memory().unwrap();

        run_migrations(&conn).unwrap();
        run_migrations(&conn).unwrap();

        let version = get_schema_version(&conn).unwrap();
        assert_eq!(version, SCHEMA_VERSION);
    }

    #[test]
    fn test_tables_created() {
        let conn = Connection::open_in_memory().unwrap();
        run_migrations(&conn).unwrap();

        let tables = [
            "contact",
            "conversation",
            "participant",
            "message",
            "image",
            "media_file",
            "source_file",
        ];

        for table in tables {
            let exists: i32 = conn
                .query_row(
                    "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name=?",
                    [table],
                    |r| r.get(0),
                )
                .unwrap();
            assert_eq!(exists, 1, "Table {} should exist", table);
        }
    }

    #[test]
    fn test_contact_identity_includes_empty_number() {
        let conn = Connection::open_in_memory().unwrap();
        run_migrations(&conn).unwrap();

        conn.execute(
            "INSERT INTO contact (name, phone_number) VALUES ('Alex', '')",
            [],
        )
        .unwrap();
        conn.execute(
            "INSERT INTO contact (name, phone_number) VALUES ('Alex', '+1')",
            [],
        )
        .unwrap();
        assert!(conn
            .execute(
                "INSERT INTO contact (name, phone_number) VALUES ('Alex', '')",
                [],
            )
            .is_err());
    }

    #[test]
    fn test_foreign_keys() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute("PRAGMA foreign_keys = ON", []).unwrap();
        run_migrations(&conn).unwrap();

        let fk_list: Vec<(String, String)> = conn
            .prepare("PRAGMA foreign_key_list(participant)")
            .unwrap()
            .query_map([], |row| {
                Ok((row.get::<_, String>(2)?, row.get::<_, String>(3)?))
            })
            .unwrap()
            .filter_map(|r| r.ok())
            .collect();

        assert!(
            fk_list.iter().any(|(table, _)| table == "conversation"),
            "participant should reference conversation"
        );
        assert!(
            fk_list.iter().any(|(table, _)| table == "contact"),
            "participant should reference contact"
        );
    }
}
