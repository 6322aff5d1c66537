use axum::{
    Extension, Json,
    extract::{Path, State},
};
use tracing::info;

use justtext_db::queries::UserUpdate;
use justtext_types::api::{Claims, UpdateUserRequest, UpdateUserResponse};
use justtext_types::models::User;

use crate::auth::{AppState, AppStateInner, run_blocking};
use crate::error::{ApiError, require};

pub async fn list_users(State(state): State<AppState>) -> Result<Json<Vec<User>>, ApiError> {
    let users = run_blocking(&state, |s| {
        Ok(s.db.list_users()?.into_iter().map(|row| row.into_user()).collect())
    })
    .await?;

    Ok(Json(users))
}

pub async fn get_user(
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
) -> Result<Json<User>, ApiError> {
    let user = run_blocking(&state, move |s| {
        s.db
            .get_user_by_id(user_id)?
            .map(|row| row.into_user())
            .ok_or_else(|| ApiError::NotFound("no user found".into()))
    })
    .await?;

    Ok(Json(user))
}

/// Change a user's username and phone. Only the user themself may do so.
pub fn update_profile(
    state: &AppStateInner,
    caller: i64,
    user_id: i64,
    username: &str,
    phone: &str,
) -> Result<(), ApiError> {
    if caller != user_id {
        return Err(ApiError::Forbidden("cannot update another user".into()));
    }
    let (username, phone) = (username.trim(), phone.trim());
    require("username", username)?;
    require("phone", phone)?;

    match state.db.update_user(user_id, username, phone)? {
        UserUpdate::Updated => Ok(()),
        UserUpdate::NotFound => Err(ApiError::NotFound("no user found".into())),
        UserUpdate::PhoneTaken => Err(ApiError::Conflict("phone already registered".into())),
    }
}

pub async fn update_user(
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<UpdateUserRequest>,
) -> Result<Json<UpdateUserResponse>, ApiError> {
    run_blocking(&state, move |s| {
        update_profile(s, claims.id, user_id, &req.username, &req.phone)
    })
    .await?;
    info!("Updated user {}", user_id);

    Ok(Json(UpdateUserResponse {
        id: user_id,
        message: "user updated successfully".into(),
    }))
}
