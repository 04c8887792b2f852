//! Mapping table schema.

use rusqlite::Connection;

/// Table, lookup index and `updated_at` trigger. Every statement is
/// idempotent so the batch can run on every start.
const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS users (
        user_id    INTEGER PRIMARY KEY,
        topic_id   INTEGER NOT NULL UNIQUE,
        created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP,
        updated_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP
    );

    CREATE INDEX IF NOT EXISTS idx_topic_id ON users (topic_id);

    CREATE TRIGGER IF NOT EXISTS update_users_timestamp
    AFTER UPDATE ON users
    BEGIN
        UPDATE users SET updated_at = CURRENT_TIMESTAMP
        WHERE user_id = NEW.user_id;
    END;
";

/// Switch the file to WAL, enable foreign keys and create the schema in one
/// transaction.
pub(crate) fn apply(conn: &mut Connection) -> rusqlite::Result<()> {
    let mode: String =
        conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
    if !mode.eq_ignore_ascii_case("wal") {
        tracing::warn!(journal_mode = %mode, "Database did not switch to WAL");
    }
    conn.pragma_update(None, "foreign_keys", true)?;

    let tx = conn.transaction()?;
    tx.execute_batch(SCHEMA)?;
    tx.commit()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn apply_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let mut conn = Connection::open(dir.path().join("schema.db")).unwrap();

        apply(&mut conn).unwrap();
        apply(&mut conn).unwrap();

        let objects: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master
                 WHERE name IN ('users', 'idx_topic_id', 'update_users_timestamp')",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(objects, 3);
    }

    #[test]
    fn topic_id_is_unique() {
        let dir = tempfile::tempdir().unwrap();
        let mut conn = Connection::open(dir.path().join("schema.db")).unwrap();
        apply(&mut conn).unwrap();

        conn.execute("INSERT INTO users (user_id, topic_id) VALUES (1, 10)", []).unwrap();
        let dup = conn.execute("INSERT INTO users (user_id, topic_id) VALUES (2, 10)", []);
        assert!(dup.is_err());
    }
}
