use axum::{
    extract::{Query, Request, State},
    http::header,
    middleware::Next,
    response::Response,
};
use serde::Deserialize;

use justtext_types::api::Claims;

use crate::auth::AppState;
use crate::error::ApiError;
use crate::token::TokenSigner;

#[derive(Debug, Deserialize)]
struct TokenQuery {
    token: Option<String>,
}

/// Token from the `token` query parameter, else from `Authorization: Bearer`.
pub fn extract_token(req: &Request) -> Option<String> {
    let from_query = Query::<TokenQuery>::try_from_uri(req.uri())
        .ok()
        .and_then(|Query(q)| q.token)
        .filter(|t| !t.is_empty());
    if from_query.is_some() {
        return from_query;
    }

    req.headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
}

pub fn authenticate_request(tokens: &TokenSigner, req: &Request) -> Result<Claims, ApiError> {
    let token = extract_token(req).ok_or(ApiError::Unauthorized)?;
    tokens.verify(&token)
}

/// Reject the request unless it carries a valid token; hands the claims to
/// handlers through request extensions.
pub async fn require_auth(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let claims = authenticate_request(&state.tokens, &req)?;
    req.extensions_mut().insert(claims);
    Ok(next.run(req).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http;
    use chrono::Duration;

    fn request(uri: &str, auth: Option<&str>) -> Request {
        let mut builder = http::Request::builder().uri(uri);
        if let Some(value) = auth {
            builder = builder.header(header::AUTHORIZATION, value);
        }
        builder.body(Body::empty()).unwrap()
    }

    #[test]
    fn query_token_takes_precedence() {
        let req = request("/room?token=from-query", Some("Bearer from-header"));
        assert_eq!(extract_token(&req).as_deref(), Some("from-query"));
    }

    #[test]
    fn falls_back_to_bearer_header() {
        assert_eq!(extract_token(&request("/room", Some("Bearer abc"))).as_deref(), Some("abc"));
        assert_eq!(extract_token(&request("/room?token=", Some("Bearer abc"))).as_deref(), Some("abc"));
        assert_eq!(extract_token(&request("/room", Some("Basic abc"))), None);
        assert_eq!(extract_token(&request("/room", None)), None);
    }

    #[test]
    fn missing_token_is_unauthorized() {
        let signer = TokenSigner::new("test-secret", Duration::minutes(30));
        let result = authenticate_request(&signer, &request("/room", None));
        assert!(matches!(result, Err(ApiError::Unauthorized)));
    }

    #[test]
    fn valid_token_yields_claims() {
        let signer = TokenSigner::new("test-secret", Duration::minutes(30));
        let issued = signer.issue(7, "bob", "0002").unwrap();

        let uri = format!("/room?token={}", issued.token);
        let claims = authenticate_request(&signer, &request(&uri, None)).unwrap();
        assert_eq!(claims.id, 7);

        let header = format!("Bearer {}", issued.token);
        let claims = authenticate_request(&signer, &request("/room", Some(&header))).unwrap();
        assert_eq!(claims.phone, "0002");
    }

    #[test]
    fn bad_token_is_invalid() {
        let signer = TokenSigner::new("test-secret", Duration::minutes(30));
        let result = authenticate_request(&signer, &request("/room", Some("Bearer nope")));
        assert!(matches!(result, Err(ApiError::InvalidToken)));
    }
}
