use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch("CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL);")?;

    let version: i64 = conn
        .query_row("SELECT COALESCE(MAX(version), 0) FROM schema_version", [], |r| r.get(0))?;

    if version < 1 {
        info!("Running migration v1 (initial schema)");
        conn.execute_batch(
            "
            CREATE TABLE users (
                id          INTEGER PRIMARY KEY AUTOINCREMENT,
                username    TEXT NOT NULL,
                phone       TEXT NOT NULL UNIQUE,
                password    TEXT NOT NULL,
                created_at  TEXT NOT NULL DEFAULT (datetime('now')),
                updated_at  TEXT NOT NULL DEFAULT (datetime('now'))
            );

            CREATE TABLE rooms (
                id          INTEGER PRIMARY KEY AUTOINCREMENT,
                id_user1    INTEGER NOT NULL REFERENCES users(id),
                id_user2    INTEGER NOT NULL REFERENCES users(id),
                last_msg    TEXT NOT NULL DEFAULT '',
                created_at  TEXT NOT NULL DEFAULT (datetime('now')),
                updated_at  TEXT NOT NULL DEFAULT (datetime('now'))
            );

            -- One room per unordered pair, whichever column holds which user
            CREATE UNIQUE INDEX idx_rooms_pair
                ON rooms(min(id_user1, id_user2), max(id_user1, id_user2));

            CREATE TABLE messages (
                id              INTEGER PRIMARY KEY AUTOINCREMENT,
                id_sender       INTEGER NOT NULL REFERENCES users(id),
                id_recipient    INTEGER NOT NULL REFERENCES users(id),
                id_room         INTEGER NOT NULL REFERENCES rooms(id),
                content         TEXT NOT NULL,
                created_at      TEXT NOT NULL DEFAULT (datetime('now')),
                updated_at      TEXT NOT NULL DEFAULT (datetime('now'))
            );

            CREATE INDEX idx_messages_room
                ON messages(id_room, created_at);

            INSERT INTO schema_version (version) VALUES (1);
            ",
        )?;
    }

    info!("Database migrations complete");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn migrations_are_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        run(&conn).unwrap();
        run(&conn).unwrap();

        let versions: i64 = conn
            .query_row("SELECT COUNT(*) FROM schema_version", [], |r| r.get(0))
            .unwrap();
        assert_eq!(versions, 1);
    }

    #[test]
    fn pair_index_rejects_swapped_duplicate() {
        let conn = Connection::open_in_memory().unwrap();
        run(&conn).unwrap();
        conn.execute_batch(
            "INSERT INTO users (username, phone, password) VALUES ('a', '1', 'x'), ('b', '2', 'x');
             INSERT INTO rooms (id_user1, id_user2) VALUES (1, 2);",
        )
        .unwrap();

        let dup = conn.execute("INSERT INTO rooms (id_user1, id_user2) VALUES (2, 1)", []);
        assert!(dup.is_err());
    }
}
