use axum::{
    Extension, Json,
    extract::{Path, State},
};

use justtext_db::models::RoomRow;
use justtext_types::api::Claims;
use justtext_types::models::{Message, RoomView};

use crate::auth::{AppState, AppStateInner, run_blocking};
use crate::error::ApiError;

/// Load a room the caller takes part in.
pub(crate) fn member_room(state: &AppStateInner, caller: i64, room_id: i64) -> Result<RoomRow, ApiError> {
    let room = state
        .db
        .get_room_by_id(room_id)?
        .ok_or_else(|| ApiError::NotFound("no room found".into()))?;

    if !room.has_participant(caller) {
        return Err(ApiError::Forbidden("not a member of this room".into()));
    }
    Ok(room)
}

/// Find or create the caller's room with `other_id`.
pub fn resolve_room(state: &AppStateInner, caller: i64, other_id: i64) -> Result<RoomView, ApiError> {
    if caller == other_id {
        return Err(ApiError::Validation("cannot open a room with yourself".into()));
    }
    Ok(state.db.find_or_create_room(caller, other_id)?)
}

/// Resolve the caller's room with whoever owns `phone`.
pub fn resolve_room_by_phone(state: &AppStateInner, caller: i64, phone: &str) -> Result<RoomView, ApiError> {
    let other = state
        .db
        .get_user_by_phone(phone.trim())?
        .ok_or_else(|| ApiError::NotFound("no user found".into()))?;

    resolve_room(state, caller, other.id)
}

pub fn room_history(state: &AppStateInner, caller: i64, room_id: i64) -> Result<Vec<Message>, ApiError> {
    member_room(state, caller, room_id)?;

    Ok(state
        .db
        .list_messages(room_id)?
        .into_iter()
        .map(|row| row.into_message())
        .collect())
}

pub async fn list_rooms(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<Vec<RoomView>>, ApiError> {
    let rooms = run_blocking(&state, move |s| Ok(s.db.list_rooms_for_user(claims.id)?)).await?;
    Ok(Json(rooms))
}

pub async fn open_room(
    State(state): State<AppState>,
    Path(room_id): Path<i64>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<Vec<Message>>, ApiError> {
    let messages = run_blocking(&state, move |s| room_history(s, claims.id, room_id)).await?;
    Ok(Json(messages))
}

pub async fn find_room_by_phone(
    State(state): State<AppState>,
    Path(phone): Path<String>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<RoomView>, ApiError> {
    let room = run_blocking(&state, move |s| resolve_room_by_phone(s, claims.id, &phone)).await?;
    Ok(Json(room))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::TokenSigner;
    use chrono::Duration;
    use justtext_db::Database;

    fn state_with_users() -> (AppStateInner, i64, i64) {
        let state = AppStateInner::new(
            Database::open_in_memory().unwrap(),
            TokenSigner::new("test-secret", Duration::minutes(30)),
        );
        let alice = state.db.create_user("alice", "0001", "h").unwrap().unwrap();
        let bob = state.db.create_user("bob", "0002", "h").unwrap().unwrap();
        (state, alice, bob)
    }

    #[test]
    fn resolve_by_phone_from_both_sides() {
        let (state, alice, bob) = state_with_users();

        let mine = resolve_room_by_phone(&state, alice, "0002").unwrap();
        assert_eq!(mine.id_recipient, bob);
        assert_eq!(mine.recipient_phone, "0002");

        let theirs = resolve_room_by_phone(&state, bob, "0001").unwrap();
        assert_eq!(theirs.id, mine.id);
        assert_eq!(theirs.recipient_username, "alice");
    }

    #[test]
    fn unknown_phone_is_not_found() {
        let (state, alice, _) = state_with_users();
        assert!(matches!(resolve_room_by_phone(&state, alice, "0404"), Err(ApiError::NotFound(_))));
    }

    #[test]
    fn self_room_rejected() {
        let (state, alice, _) = state_with_users();
        assert!(matches!(resolve_room_by_phone(&state, alice, "0001"), Err(ApiError::Validation(_))));
    }

    #[test]
    fn history_requires_membership() {
        let (state, alice, bob) = state_with_users();
        let carol = state.db.create_user("carol", "0003", "h").unwrap().unwrap();
        let room = resolve_room(&state, alice, bob).unwrap();

        assert!(room_history(&state, bob, room.id).unwrap().is_empty());
        assert!(matches!(room_history(&state, carol, room.id), Err(ApiError::Forbidden(_))));
        assert!(matches!(room_history(&state, alice, 999), Err(ApiError::NotFound(_))));
    }
}
