//! Stateless access tokens: an HS256 JWT whose subject is the user's id.

use chrono::{Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::error::{ErrorMessage, HttpError};

/// Registered claims carried by an access token. `sub` is the decimal user
/// id, kept as a string on the wire as RFC 7519 expects.
#[derive(Debug, Serialize, Deserialize)]
pub struct TokenClaims {
    pub sub: String,
    pub iat: i64,
    pub exp: i64,
}

impl TokenClaims {
    fn for_user(user_id: i64, ttl_seconds: i64) -> Self {
        let issued = Utc::now();
        TokenClaims {
            sub: user_id.to_string(),
            iat: issued.timestamp(),
            exp: (issued + Duration::seconds(ttl_seconds)).timestamp(),
        }
    }
}

/// Sign a token for `user_id` that expires `ttl_seconds` from now
pub fn create_token(
    user_id: i64,
    secret: &[u8],
    ttl_seconds: i64,
) -> Result<String, jsonwebtoken::errors::Error> {
    jsonwebtoken::encode(
        &Header::new(Algorithm::HS256),
        &TokenClaims::for_user(user_id, ttl_seconds),
        &EncodingKey::from_secret(secret),
    )
}

/// Check signature and expiry and return the user id the token was issued for.
/// Any failure, a non-numeric subject included, is a 401.
pub fn decode_token(token: &str, secret: &[u8]) -> Result<i64, HttpError> {
    let invalid = || HttpError::unauthorized(ErrorMessage::InvalidToken.to_string());

    let data = jsonwebtoken::decode::<TokenClaims>(
        token,
        &DecodingKey::from_secret(secret),
        &Validation::new(Algorithm::HS256),
    )
    .map_err(|_| invalid())?;

    data.claims.sub.parse::<i64>().map_err(|_| invalid())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;

    const SECRET: &[u8] = b"test-secret";

    #[test]
    fn subject_is_the_user_id() {
        let token = create_token(42, SECRET, 60).unwrap();
        assert_eq!(decode_token(&token, SECRET).unwrap(), 42);
    }

    #[test]
    fn foreign_signature_is_rejected() {
        let token = create_token(42, b"other-secret", 60).unwrap();
        let err = decode_token(&token, SECRET).unwrap_err();
        assert_eq!(err.status, StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn expired_token_is_rejected() {
        // well past the default 60s leeway
        let token = create_token(42, SECRET, -3600).unwrap();
        assert!(decode_token(&token, SECRET).is_err());
    }

    #[test]
    fn non_numeric_subject_is_rejected() {
        let claims = TokenClaims {
            sub: "0b4f6c1e-uuid".to_string(),
            iat: Utc::now().timestamp(),
            exp: Utc::now().timestamp() + 60,
        };
        let token = jsonwebtoken::encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(SECRET),
        )
        .unwrap();
        assert!(decode_token(&token, SECRET).is_err());
    }
}
