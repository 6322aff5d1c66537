use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;
use tracing::error;

use justtext_types::api::ErrorResponse;

/// Every failure a handler can report. Rendered as `{"error": "..."}`.
///
/// Caller mistakes map to 4xx. `Storage` is the exception and maps to 500,
/// since a broken database is not something the caller can fix by retrying
/// with different input.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    NotFound(String),

    #[error("invalid phone or password")]
    InvalidCredentials,

    #[error("unauthorized token")]
    Unauthorized,

    #[error("invalid token")]
    InvalidToken,

    #[error("{0}")]
    Forbidden(String),

    /// Database or other server-side failure; details are logged, not returned.
    #[error("internal server error")]
    Storage(#[from] anyhow::Error),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Validation(_) | Self::Conflict(_) | Self::InvalidCredentials => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Unauthorized | Self::InvalidToken => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if let Self::Storage(e) = &self {
            error!("Request failed: {:#}", e);
        }

        let body = Json(ErrorResponse {
            error: self.to_string(),
        });
        (self.status(), body).into_response()
    }
}

/// Reject blank required fields.
pub(crate) fn require(field: &str, value: &str) -> Result<(), ApiError> {
    if value.trim().is_empty() {
        return Err(ApiError::Validation(format!("required {}", field)));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_mapping() {
        assert_eq!(ApiError::Validation("x".into()).status(), StatusCode::BAD_REQUEST);
        assert_eq!(ApiError::InvalidCredentials.status(), StatusCode::BAD_REQUEST);
        assert_eq!(ApiError::NotFound("x".into()).status(), StatusCode::NOT_FOUND);
        assert_eq!(ApiError::InvalidToken.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(ApiError::Forbidden("x".into()).status(), StatusCode::FORBIDDEN);
        assert_eq!(
            ApiError::from(anyhow::anyhow!("disk on fire")).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn storage_details_are_hidden() {
        let err = ApiError::from(anyhow::anyhow!("no such table: users"));
        assert_eq!(err.to_string(), "internal server error");
    }

    #[test]
    fn require_rejects_blank() {
        assert!(require("phone", "0001").is_ok());
        assert!(matches!(require("phone", "   "), Err(ApiError::Validation(m)) if m == "required phone"));
    }
}
