use chrono::{Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};

use justtext_types::api::Claims;

use crate::error::ApiError;

/// Signs and verifies HS256 identity tokens with a secret injected at startup.
pub struct TokenSigner {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl: Duration,
}

pub struct IssuedToken {
    pub token: String,
    pub claims: Claims,
}

impl TokenSigner {
    pub fn new(secret: &str, ttl: Duration) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            ttl,
        }
    }

    pub fn issue(&self, id: i64, username: &str, phone: &str) -> Result<IssuedToken, ApiError> {
        let exp = Utc::now()
            .checked_add_signed(self.ttl)
            .ok_or_else(|| anyhow::anyhow!("Token ttl {} overflows the clock", self.ttl))?;

        let claims = Claims {
            id,
            username: username.to_string(),
            phone: phone.to_string(),
            exp: exp.timestamp(),
        };

        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(anyhow::Error::from)?;

        Ok(IssuedToken { token, claims })
    }

    /// Check signature, algorithm and expiry, returning the typed claims.
    pub fn verify(&self, token: &str) -> Result<Claims, ApiError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;

        decode::<Claims>(token, &self.decoding, &validation)
            .map(|data| data.claims)
            .map_err(|_| ApiError::InvalidToken)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn signer() -> TokenSigner {
        TokenSigner::new("test-secret", Duration::minutes(30))
    }

    fn sign_raw(alg: Algorithm, secret: &str, exp: i64) -> String {
        let claims = Claims {
            id: 1,
            username: "alice".into(),
            phone: "0001".into(),
            exp,
        };
        encode(&Header::new(alg), &claims, &EncodingKey::from_secret(secret.as_bytes())).unwrap()
    }

    #[test]
    fn issued_token_verifies() {
        let signer = signer();
        let issued = signer.issue(42, "alice", "0001").unwrap();

        let claims = signer.verify(&issued.token).unwrap();
        assert_eq!(claims.id, 42);
        assert_eq!(claims.username, "alice");
        assert_eq!(claims.phone, "0001");
        assert_eq!(claims.exp, issued.claims.exp);

        let expected = (Utc::now() + Duration::minutes(30)).timestamp();
        assert!((claims.exp - expected).abs() <= 5);
    }

    #[test]
    fn oversized_ttl_is_an_error_not_a_panic() {
        let signer = TokenSigner::new("test-secret", Duration::minutes(1_000_000_000_000));
        assert!(matches!(signer.issue(1, "alice", "0001"), Err(ApiError::Storage(_))));
    }

    #[test]
    fn expired_token_rejected() {
        let token = sign_raw(Algorithm::HS256, "test-secret", (Utc::now() - Duration::minutes(1)).timestamp());
        assert!(matches!(signer().verify(&token), Err(ApiError::InvalidToken)));
    }

    #[test]
    fn wrong_secret_rejected() {
        let token = sign_raw(Algorithm::HS256, "other-secret", (Utc::now() + Duration::minutes(5)).timestamp());
        assert!(matches!(signer().verify(&token), Err(ApiError::InvalidToken)));
    }

    #[test]
    fn unexpected_algorithm_rejected() {
        let token = sign_raw(Algorithm::HS512, "test-secret", (Utc::now() + Duration::minutes(5)).timestamp());
        assert!(matches!(signer().verify(&token), Err(ApiError::InvalidToken)));
    }

    #[test]
    fn garbage_rejected() {
        assert!(matches!(signer().verify("not.a.token"), Err(ApiError::InvalidToken)));
    }
}
