use axum::{
    Json, Router, middleware,
    routing::{get, post},
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::auth::{self, AppState};
use crate::middleware::require_auth;
use crate::{messages, rooms, users};

async fn home() -> Json<&'static str> {
    Json("Welcome to the awesome chat app")
}

/// Full HTTP surface. Everything outside `public_routes` requires a token.
pub fn router(state: AppState) -> Router {
    let public_routes = Router::new()
        .route("/", get(home))
        .route("/register", post(auth::register))
        .route("/login", post(auth::login))
        .with_state(state.clone());

    let protected_routes = Router::new()
        .route("/users", get(users::list_users))
        .route("/user/{id}", get(users::get_user).put(users::update_user))
        .route("/room", get(rooms::list_rooms))
        .route("/room/{id}", get(rooms::open_room))
        .route("/phone/{phone}", get(rooms::find_room_by_phone))
        .route("/msg", post(messages::send_direct))
        .route("/msg/{id}", post(messages::send_message))
        .layer(middleware::from_fn_with_state(state.clone(), require_auth))
        .with_state(state);

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}
