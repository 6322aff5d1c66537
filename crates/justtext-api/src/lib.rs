pub mod auth;
pub mod error;
pub mod messages;
pub mod middleware;
pub mod rooms;
pub mod routes;
pub mod token;
pub mod users;
