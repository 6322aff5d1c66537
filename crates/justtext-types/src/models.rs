use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Public view of a user. The password hash never leaves the DB layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub phone: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A room as seen by one of its two participants. The `recipient_*` fields
/// always describe the *other* participant, whichever storage column holds
/// them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoomView {
    pub id: i64,
    pub id_recipient: i64,
    pub recipient_username: String,
    pub recipient_phone: String,
    pub last_msg: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: i64,
    pub id_sender: i64,
    pub id_recipient: i64,
    pub id_room: i64,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn room_view_serializes_recipient_fields() {
        let now = Utc::now();
        let view = RoomView {
            id: 7,
            id_recipient: 2,
            recipient_username: "bob".into(),
            recipient_phone: "0002".into(),
            last_msg: String::new(),
            created_at: now,
            updated_at: now,
        };

        let json = serde_json::to_value(&view).unwrap();
        assert_eq!(json["id"], 7);
        assert_eq!(json["id_recipient"], 2);
        assert_eq!(json["recipient_phone"], "0002");
        assert_eq!(json["last_msg"], "");
    }
}
