use serde::{Deserialize, Serialize};

// -- JWT Claims --

/// Token claims shared by the credential service (issuing) and the request
/// authenticator (verifying).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub id: i64,
    pub username: String,
    pub phone: String,
    pub exp: i64,
}

// -- Auth --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RegisterRequest {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub password: String,
}

/// Plain acknowledgement body used by register and home.
#[derive(Debug, Serialize, Deserialize)]
pub struct BasicResponse {
    pub message: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoginRequest {
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LoginResponse {
    pub id: i64,
    pub username: String,
    pub phone: String,
    pub exp: i64,
    pub token: String,
}

// -- Users --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateUserRequest {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub phone: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UpdateUserResponse {
    pub id: i64,
    pub message: String,
}

// -- Messages --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SendMessageRequest {
    #[serde(default)]
    pub content: String,
}

/// Message addressed to a user rather than a room; the room is resolved
/// (or created) server side.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DirectMessageRequest {
    pub id_recipient: i64,
    #[serde(default)]
    pub content: String,
}

// -- Errors --

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}
