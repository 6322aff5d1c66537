//! Database row types. These map directly to SQLite rows and are converted
//! into the `justtext-types` models at the edge of this crate.

use chrono::{DateTime, NaiveDateTime, Utc};
use justtext_types::models::{Message, RoomView, User};
use tracing::warn;

pub struct UserRow {
    pub id: i64,
    pub username: String,
    pub phone: String,
    pub password: String,
    pub created_at: String,
    pub updated_at: String,
}

/// A room joined with both participants' public details.
pub struct RoomRow {
    pub id: i64,
    pub id_user1: i64,
    pub user1_username: String,
    pub user1_phone: String,
    pub id_user2: i64,
    pub user2_username: String,
    pub user2_phone: String,
    pub last_msg: String,
    pub created_at: String,
    pub updated_at: String,
}

pub struct MessageRow {
    pub id: i64,
    pub id_sender: i64,
    pub id_recipient: i64,
    pub id_room: i64,
    pub content: String,
    pub created_at: String,
    pub updated_at: String,
}

impl UserRow {
    pub fn into_user(self) -> User {
        User {
            created_at: parse_timestamp(&self.created_at),
            updated_at: parse_timestamp(&self.updated_at),
            id: self.id,
            username: self.username,
            phone: self.phone,
        }
    }
}

impl RoomRow {
    pub fn has_participant(&self, user_id: i64) -> bool {
        self.id_user1 == user_id || self.id_user2 == user_id
    }

    /// Id of the participant that is not `user_id`.
    pub fn other_participant(&self, user_id: i64) -> i64 {
        if self.id_user1 == user_id { self.id_user2 } else { self.id_user1 }
    }

    /// Project the room for `viewer`: the recipient is whoever is not the
    /// viewer, regardless of storage column.
    pub fn into_view(self, viewer: i64) -> RoomView {
        let (id_recipient, recipient_username, recipient_phone) = if self.id_user1 == viewer {
            (self.id_user2, self.user2_username, self.user2_phone)
        } else {
            (self.id_user1, self.user1_username, self.user1_phone)
        };

        RoomView {
            id: self.id,
            id_recipient,
            recipient_username,
            recipient_phone,
            created_at: parse_timestamp(&self.created_at),
            updated_at: parse_timestamp(&self.updated_at),
            last_msg: self.last_msg,
        }
    }
}

impl MessageRow {
    pub fn into_message(self) -> Message {
        Message {
            created_at: parse_timestamp(&self.created_at),
            updated_at: parse_timestamp(&self.updated_at),
            id: self.id,
            id_sender: self.id_sender,
            id_recipient: self.id_recipient,
            id_room: self.id_room,
            content: self.content,
        }
    }
}

/// SQLite stores timestamps as "YYYY-MM-DD HH:MM:SS" without timezone.
/// Parse as naive UTC; fall back to RFC 3339 for values written elsewhere.
pub fn parse_timestamp(raw: &str) -> DateTime<Utc> {
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S")
        .map(|ndt| ndt.and_utc())
        .or_else(|_| raw.parse::<DateTime<Utc>>())
        .unwrap_or_else(|e| {
            warn!("Corrupt timestamp '{}': {}", raw, e);
            DateTime::default()
        })
}
