use std::sync::Arc;

use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier, password_hash::{SaltString, rand_core::OsRng}};
use axum::{Json, extract::State};
use tracing::{error, info};

use justtext_db::Database;
use justtext_types::api::{BasicResponse, LoginRequest, LoginResponse, RegisterRequest};

use crate::error::{ApiError, require};
use crate::token::{IssuedToken, TokenSigner};

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Database,
    pub tokens: TokenSigner,
}

impl AppStateInner {
    pub fn new(db: Database, tokens: TokenSigner) -> Self {
        Self { db, tokens }
    }

    /// Create a user with an Argon2id hash of `password`. Returns the new id.
    pub fn register(&self, username: &str, phone: &str, password: &str) -> Result<i64, ApiError> {
        let (username, phone) = (username.trim(), phone.trim());
        require("username", username)?;
        require("phone", phone)?;
        require("password", password)?;

        if self.db.get_user_by_phone(phone)?.is_some() {
            return Err(ApiError::Conflict("user already exist".into()));
        }

        let salt = SaltString::generate(&mut OsRng);
        let password_hash = Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| anyhow::anyhow!("Password hashing failed: {}", e))?
            .to_string();

        // A concurrent registration can still win the UNIQUE(phone) race
        self.db
            .create_user(username, phone, &password_hash)?
            .ok_or_else(|| ApiError::Conflict("user already exist".into()))
    }

    /// Check `password` against the stored hash for `phone` and issue a token.
    pub fn authenticate(&self, phone: &str, password: &str) -> Result<IssuedToken, ApiError> {
        let phone = phone.trim();
        require("phone", phone)?;
        require("password", password)?;

        let user = self
            .db
            .get_user_by_phone(phone)?
            .ok_or_else(|| ApiError::NotFound("no user found".into()))?;

        let parsed_hash = PasswordHash::new(&user.password)
            .map_err(|e| anyhow::anyhow!("Corrupt password hash for user {}: {}", user.id, e))?;

        Argon2::default()
            .verify_password(password.as_bytes(), &parsed_hash)
            .map_err(|_| ApiError::InvalidCredentials)?;

        self.tokens.issue(user.id, &user.username, &user.phone)
    }
}

/// Run blocking DB / hashing work off the async runtime.
pub(crate) async fn run_blocking<F, T>(state: &AppState, f: F) -> Result<T, ApiError>
where
    F: FnOnce(&AppStateInner) -> Result<T, ApiError> + Send + 'static,
    T: Send + 'static,
{
    let state = state.clone();
    tokio::task::spawn_blocking(move || f(&state))
        .await
        .map_err(|e| {
            error!("spawn_blocking join error: {}", e);
            ApiError::Storage(e.into())
        })?
}

pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> Result<Json<BasicResponse>, ApiError> {
    let user_id = run_blocking(&state, move |s| s.register(&req.username, &req.phone, &req.password)).await?;
    info!("Registered user {}", user_id);

    Ok(Json(BasicResponse {
        message: "user created successfully".into(),
    }))
}

pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, ApiError> {
    // Unknown phones answer exactly like wrong passwords so login does not
    // reveal which numbers are registered
    let issued = run_blocking(&state, move |s| s.authenticate(&req.phone, &req.password))
        .await
        .map_err(|e| match e {
            ApiError::NotFound(_) => ApiError::InvalidCredentials,
            other => other,
        })?;

    Ok(Json(LoginResponse {
        id: issued.claims.id,
        username: issued.claims.username,
        phone: issued.claims.phone,
        exp: issued.claims.exp,
        token: issued.token,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn state() -> AppStateInner {
        AppStateInner::new(
            Database::open_in_memory().unwrap(),
            TokenSigner::new("test-secret", Duration::minutes(30)),
        )
    }

    #[test]
    fn register_then_authenticate() {
        let state = state();
        let id = state.register("alice", "0001", "pw1").unwrap();

        let issued = state.authenticate("0001", "pw1").unwrap();
        assert_eq!(issued.claims.id, id);
        assert_eq!(issued.claims.username, "alice");

        let claims = state.tokens.verify(&issued.token).unwrap();
        assert_eq!(claims.id, id);
    }

    #[test]
    fn password_is_not_stored_in_clear() {
        let state = state();
        state.register("alice", "0001", "pw1").unwrap();

        let row = state.db.get_user_by_phone("0001").unwrap().unwrap();
        assert_ne!(row.password, "pw1");
        assert!(row.password.starts_with("$argon2"));
    }

    #[test]
    fn wrong_password_is_invalid_credentials() {
        let state = state();
        state.register("alice", "0001", "pw1").unwrap();

        assert!(matches!(state.authenticate("0001", "pw2"), Err(ApiError::InvalidCredentials)));
    }

    #[test]
    fn unknown_phone_is_not_found() {
        let state = state();
        assert!(matches!(state.authenticate("0404", "pw"), Err(ApiError::NotFound(_))));
    }

    #[test]
    fn duplicate_phone_conflicts() {
        let state = state();
        state.register("alice", "0001", "pw1").unwrap();

        assert!(matches!(state.register("mallory", "0001", "pw9"), Err(ApiError::Conflict(_))));
    }

    #[test]
    fn blank_fields_fail_validation() {
        let state = state();
        assert!(matches!(state.register("", "0001", "pw"), Err(ApiError::Validation(_))));
        assert!(matches!(state.register("alice", " ", "pw"), Err(ApiError::Validation(_))));
        assert!(matches!(state.register("alice", "0001", ""), Err(ApiError::Validation(_))));
        assert!(matches!(state.authenticate("", "pw"), Err(ApiError::Validation(_))));
    }
}
