use axum::{
    Extension, Json,
    extract::{Path, State},
};
use tracing::debug;

use justtext_types::api::{Claims, DirectMessageRequest, SendMessageRequest};
use justtext_types::models::Message;

use crate::auth::{AppState, AppStateInner, run_blocking};
use crate::error::{ApiError, require};
use crate::rooms::{member_room, resolve_room};

/// Post `content` into an existing room as `sender`.
pub fn post_to_room(state: &AppStateInner, sender: i64, room_id: i64, content: &str) -> Result<Message, ApiError> {
    require("content", content)?;
    member_room(state, sender, room_id)?;

    let row = state
        .db
        .append_message(room_id, sender, content)?
        .ok_or_else(|| ApiError::NotFound("no room found".into()))?;

    debug!("User {} posted message {} to room {}", sender, row.id, room_id);
    Ok(row.into_message())
}

/// Post `content` to `recipient`, opening their shared room on first contact.
pub fn post_to_user(state: &AppStateInner, sender: i64, recipient: i64, content: &str) -> Result<Message, ApiError> {
    require("content", content)?;
    if state.db.get_user_by_id(recipient)?.is_none() {
        return Err(ApiError::NotFound("no user found".into()));
    }

    let room = resolve_room(state, sender, recipient)?;
    post_to_room(state, sender, room.id, content)
}

pub async fn send_message(
    State(state): State<AppState>,
    Path(room_id): Path<i64>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<SendMessageRequest>,
) -> Result<Json<Message>, ApiError> {
    let message = run_blocking(&state, move |s| post_to_room(s, claims.id, room_id, &req.content)).await?;
    Ok(Json(message))
}

pub async fn send_direct(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<DirectMessageRequest>,
) -> Result<Json<Message>, ApiError> {
    let message = run_blocking(&state, move |s| {
        post_to_user(s, claims.id, req.id_recipient, &req.content)
    })
    .await?;
    Ok(Json(message))
}
