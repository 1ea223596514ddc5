use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch("CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL);")?;

    let version: i64 =
        conn.query_row("SELECT COALESCE(MAX(version), 0) FROM schema_version", [], |r| r.get(0))?;

    if version < 1 {
        info!("Running migration v1 (initial schema)");
        // No ON DELETE CASCADE: channel removal is an explicit transaction in
        // queries::delete_channel.
        conn.execute_batch(
            "
            CREATE TABLE users (
                nick                TEXT PRIMARY KEY,
                email               TEXT NOT NULL,
                registration_time   TEXT NOT NULL
            );

            CREATE TABLE notification_targets (
                address     TEXT PRIMARY KEY,
                owner       TEXT NOT NULL REFERENCES users(nick)
            );

            CREATE TABLE channels (
                id                  INTEGER PRIMARY KEY AUTOINCREMENT,
                owner               TEXT NOT NULL REFERENCES users(nick),
                title               TEXT NOT NULL DEFAULT '',
                description         TEXT NOT NULL DEFAULT '',
                write_key           TEXT NOT NULL,
                max_fields          INTEGER NOT NULL CHECK (max_fields > 0),
                last_update         TEXT NOT NULL,
                notification_target TEXT REFERENCES notification_targets(address)
            );

            CREATE TABLE field_encodings (
                channel_id  INTEGER NOT NULL REFERENCES channels(id),
                field_no    INTEGER NOT NULL CHECK (field_no > 0),
                encoding    TEXT NOT NULL CHECK (encoding IN ('float', 'integer', 'string')),
                UNIQUE(channel_id, field_no)
            );

            CREATE TABLE rules (
                id              INTEGER PRIMARY KEY AUTOINCREMENT,
                channel_id      INTEGER NOT NULL REFERENCES channels(id),
                condition_op    TEXT NOT NULL CHECK (condition_op IN
                    ('lt', 'le', 'eq', 'ne', 'gt', 'ge', 'bt', 'ot', 'cn', 'nc', 'sw', 'ew')),
                field_no        INTEGER NOT NULL,
                value           TEXT NOT NULL,
                value_optional  TEXT,
                action          TEXT NOT NULL CHECK (action IN ('notification', 'log')),
                CHECK (condition_op NOT IN ('bt', 'ot') OR value_optional IS NOT NULL)
            );

            CREATE INDEX idx_rules_channel ON rules(channel_id, id);

            CREATE TABLE records (
                id              INTEGER PRIMARY KEY AUTOINCREMENT,
                channel_id      INTEGER NOT NULL REFERENCES channels(id),
                insertion_time  TEXT NOT NULL
            );

            CREATE INDEX idx_records_channel ON records(channel_id, insertion_time);

            CREATE TABLE fields (
                record_id   INTEGER NOT NULL REFERENCES records(id),
                field_no    INTEGER NOT NULL,
                value       TEXT NOT NULL,
                UNIQUE(record_id, field_no)
            );

            INSERT INTO schema_version (version) VALUES (1);
            ",
        )?;
    }

    info!("Database migrations complete");
    Ok(())
}
