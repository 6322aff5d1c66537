use crate::models::{MessageRow, RoomRow, UserRow};
use crate::Database;
use anyhow::{Result, anyhow, bail};
use justtext_types::models::RoomView;
use rusqlite::{Connection, ErrorCode, Row};
use tracing::info;

const USER_COLUMNS: &str = "id, username, phone, password, created_at, updated_at";

const MESSAGE_COLUMNS: &str = "id, id_sender, id_recipient, id_room, content, created_at, updated_at";

// JOIN both participants so a room can be projected for either of them
const ROOM_SELECT: &str = "SELECT r.id, r.id_user1, u1.username, u1.phone,
                                  r.id_user2, u2.username, u2.phone,
                                  r.last_msg, r.created_at, r.updated_at
                           FROM rooms r
                           JOIN users u1 ON u1.id = r.id_user1
                           JOIN users u2 ON u2.id = r.id_user2";

/// Result of `Database::update_user`.
#[derive(Debug, PartialEq, Eq)]
pub enum UserUpdate {
    Updated,
    NotFound,
    PhoneTaken,
}

impl Database {
    // -- Users --

    /// Insert a user. Returns `None` when the phone is already registered.
    pub fn create_user(&self, username: &str, phone: &str, password_hash: &str) -> Result<Option<i64>> {
        self.with_conn(|conn| {
            let inserted = conn
                .execute(
                    "INSERT INTO users (username, phone, password) VALUES (?1, ?2, ?3)",
                    (username, phone, password_hash),
                )
                .unique_violation()?;

            Ok(inserted.map(|_| conn.last_insert_rowid()))
        })
    }

    pub fn get_user_by_phone(&self, phone: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| {
            let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE phone = ?1");
            conn.query_row(&sql, [phone], user_from_row).optional()
        })
    }

    pub fn get_user_by_id(&self, id: i64) -> Result<Option<UserRow>> {
        self.with_conn(|conn| {
            let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1");
            conn.query_row(&sql, [id], user_from_row).optional()
        })
    }

    pub fn list_users(&self) -> Result<Vec<UserRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!("SELECT {USER_COLUMNS} FROM users ORDER BY id"))?;
            let rows = stmt
                .query_map([], user_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn update_user(&self, id: i64, username: &str, phone: &str) -> Result<UserUpdate> {
        self.with_conn(|conn| {
            let changed = conn
                .execute(
                    "UPDATE users SET username = ?2, phone = ?3, updated_at = datetime('now') WHERE id = ?1",
                    rusqlite::params![id, username, phone],
                )
                .unique_violation()?;

            Ok(match changed {
                None => UserUpdate::PhoneTaken,
                Some(0) => UserUpdate::NotFound,
                Some(_) => UserUpdate::Updated,
            })
        })
    }

    // -- Rooms --

    pub fn get_room_by_id(&self, id: i64) -> Result<Option<RoomRow>> {
        self.with_conn(|conn| query_room_by_id(conn, id))
    }

    pub fn find_room_between(&self, a: i64, b: i64) -> Result<Option<RoomRow>> {
        self.with_conn(|conn| query_room_between(conn, a, b))
    }

    /// Find the room shared by `my_id` and `other_id`, creating it if this is
    /// their first contact. The lookup, insert and re-fetch run in one
    /// transaction, and the unique pair index turns a lost race into a no-op
    /// insert followed by a successful re-fetch.
    pub fn find_or_create_room(&self, my_id: i64, other_id: i64) -> Result<RoomView> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;

            let row = match query_room_between(&tx, my_id, other_id)? {
                Some(row) => row,
                None => {
                    let inserted = tx.execute(
                        "INSERT OR IGNORE INTO rooms (id_user1, id_user2, last_msg) VALUES (?1, ?2, '')",
                        (other_id, my_id),
                    )?;
                    if inserted > 0 {
                        info!("Created room {} for users {} and {}", tx.last_insert_rowid(), my_id, other_id);
                    }
                    query_room_between(&tx, my_id, other_id)?
                        .ok_or_else(|| anyhow!("Room for users {} and {} vanished after insert", my_id, other_id))?
                }
            };

            tx.commit()?;
            Ok(row.into_view(my_id))
        })
    }

    /// All rooms `user_id` takes part in, most recently active first.
    pub fn list_rooms_for_user(&self, user_id: i64) -> Result<Vec<RoomView>> {
        self.with_conn(|conn| {
            let sql = format!(
                "{ROOM_SELECT} WHERE r.id_user1 = ?1 OR r.id_user2 = ?1 ORDER BY r.updated_at DESC, r.id DESC"
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map([user_id], room_from_row)?
                .map(|row| row.map(|r| r.into_view(user_id)))
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    // -- Messages --

    /// Store a message in `room_id` and refresh the room's last-message cache.
    /// Both writes commit together. Returns `None` without writing anything
    /// when the room does not exist.
    pub fn append_message(&self, room_id: i64, sender_id: i64, content: &str) -> Result<Option<MessageRow>> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;

            let Some(room) = query_room_by_id(&tx, room_id)? else {
                return Ok(None);
            };
            if !room.has_participant(sender_id) {
                bail!("User {} is not a participant of room {}", sender_id, room_id);
            }

            tx.execute(
                "INSERT INTO messages (id_sender, id_recipient, id_room, content) VALUES (?1, ?2, ?3, ?4)",
                rusqlite::params![sender_id, room.other_participant(sender_id), room_id, content],
            )?;
            let message_id = tx.last_insert_rowid();

            tx.execute(
                "UPDATE rooms SET last_msg = ?1, updated_at = datetime('now') WHERE id = ?2",
                rusqlite::params![content, room_id],
            )?;

            let sql = format!("SELECT {MESSAGE_COLUMNS} FROM messages WHERE id = ?1");
            let message = tx.query_row(&sql, [message_id], message_from_row)?;

            tx.commit()?;
            Ok(Some(message))
        })
    }

    /// Messages of a room in the order they were sent.
    pub fn list_messages(&self, room_id: i64) -> Result<Vec<MessageRow>> {
        self.with_conn(|conn| {
            let sql = format!("SELECT {MESSAGE_COLUMNS} FROM messages WHERE id_room = ?1 ORDER BY created_at, id");
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map([room_id], message_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }
}

fn query_room_by_id(conn: &Connection, id: i64) -> Result<Option<RoomRow>> {
    let sql = format!("{ROOM_SELECT} WHERE r.id = ?1");
    conn.query_row(&sql, [id], room_from_row).optional()
}

fn query_room_between(conn: &Connection, a: i64, b: i64) -> Result<Option<RoomRow>> {
    let sql = format!(
        "{ROOM_SELECT} WHERE (r.id_user1 = ?1 AND r.id_user2 = ?2) OR (r.id_user1 = ?2 AND r.id_user2 = ?1)"
    );
    conn.query_row(&sql, [a, b], room_from_row).optional()
}

fn user_from_row(row: &Row<'_>) -> rusqlite::Result<UserRow> {
    Ok(UserRow {
        id: row.get(0)?,
        username: row.get(1)?,
        phone: row.get(2)?,
        password: row.get(3)?,
        created_at: row.get(4)?,
        updated_at: row.get(5)?,
    })
}

fn room_from_row(row: &Row<'_>) -> rusqlite::Result<RoomRow> {
    Ok(RoomRow {
        id: row.get(0)?,
        id_user1: row.get(1)?,
        user1_username: row.get(2)?,
        user1_phone: row.get(3)?,
        id_user2: row.get(4)?,
        user2_username: row.get(5)?,
        user2_phone: row.get(6)?,
        last_msg: row.get(7)?,
        created_at: row.get(8)?,
        updated_at: row.get(9)?,
    })
}

fn message_from_row(row: &Row<'_>) -> rusqlite::Result<MessageRow> {
    Ok(MessageRow {
        id: row.get(0)?,
        id_sender: row.get(1)?,
        id_recipient: row.get(2)?,
        id_room: row.get(3)?,
        content: row.get(4)?,
        created_at: row.get(5)?,
        updated_at: row.get(6)?,
    })
}

/// Extension trait for optional query results
trait OptionalExt<T> {
    fn optional(self) -> Result<Option<T>>;
}

impl<T> OptionalExt<T> for std::result::Result<T, rusqlite::Error> {
    fn optional(self) -> Result<Option<T>> {
        match self {
            Ok(val) => Ok(Some(val)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

/// Maps a UNIQUE constraint failure to `None` so callers can report a
/// conflict instead of a storage error.
trait UniqueViolationExt<T> {
    fn unique_violation(self) -> Result<Option<T>>;
}

impl<T> UniqueViolationExt<T> for std::result::Result<T, rusqlite::Error> {
    fn unique_violation(self) -> Result<Option<T>> {
        match self {
            Ok(val) => Ok(Some(val)),
            Err(rusqlite::Error::SqliteFailure(e, _))
                if e.code == ErrorCode::ConstraintViolation
                    && e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE =>
            {
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }
}
