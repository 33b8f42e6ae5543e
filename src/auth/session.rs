//! Session token verification
//!
//! The identity provider signs session tokens with HS256 and the web client
//! carries them in a cookie. This service only verifies tokens; issuing is
//! test-only.

use jsonwebtoken::{decode, DecodingKey, Validation};
use serde::{Deserialize, Serialize};

use crate::types::MarketError;

/// Claims carried in a session token
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionClaims {
    /// Identity-provider subject (user id)
    pub sub: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// Issued at (Unix timestamp)
    pub iat: u64,
    /// Expiration time (Unix timestamp)
    pub exp: u64,
}

/// Result of session validation
#[derive(Debug)]
pub struct SessionValidationResult {
    pub valid: bool,
    pub claims: Option<SessionClaims>,
    pub error: Option<String>,
}

impl SessionValidationResult {
    pub fn valid(claims: SessionClaims) -> Self {
        Self {
            valid: true,
            claims: Some(claims),
            error: None,
        }
    }

    pub fn invalid(error: impl Into<String>) -> Self {
        Self {
            valid: false,
            claims: None,
            error: Some(error.into()),
        }
    }
}

/// Session token verifier
#[derive(Clone)]
pub struct SessionVerifier {
    secret: String,
}

impl SessionVerifier {
    /// Returns an error if the secret is empty or too short
    pub fn new(secret: String) -> Result<Self, MarketError> {
        if secret.is_empty() {
            return Err(MarketError::Config("SESSION_SECRET must not be empty".into()));
        }

        if secret.len() < 32 {
            return Err(MarketError::Config(
                "SESSION_SECRET must be at least 32 characters".into(),
            ));
        }

        Ok(Self { secret })
    }

    /// Verify and decode a session token
    pub fn verify(&self, token: &str) -> SessionValidationResult {
        let validation = Validation::default();

        match decode::<SessionClaims>(
            token,
            &DecodingKey::from_secret(self.secret.as_bytes()),
            &validation,
        ) {
            Ok(token_data) => {
                if token_data.claims.sub.is_empty() {
                    SessionValidationResult::invalid("Session has no subject")
                } else {
                    SessionValidationResult::valid(token_data.claims)
                }
            }
            Err(err) => {
                use jsonwebtoken::errors::ErrorKind;
                let error_msg = match err.kind() {
                    ErrorKind::ExpiredSignature => "Session expired",
                    ErrorKind::InvalidToken => "Invalid session",
                    ErrorKind::InvalidSignature => "Invalid signature",
                    _ => "Session validation failed",
                };
                SessionValidationResult::invalid(error_msg)
            }
        }
    }

    /// Sign a token the way the identity provider does
    #[cfg(test)]
    pub fn issue(&self, sub: &str, ttl_seconds: u64) -> String {
        use jsonwebtoken::{encode, EncodingKey, Header};
        use std::time::{SystemTime, UNIX_EPOCH};

        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_secs();
        let claims = SessionClaims {
            sub: sub.to_string(),
            email: None,
            iat: now,
            exp: now + ttl_seconds,
        };
        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.secret.as_bytes()),
        )
        .unwrap()
    }
}

/// Extract token from Authorization header.
/// Supports "Bearer <token>" format only.
pub fn extract_token_from_header(auth_header: Option<&str>) -> Option<&str> {
    let token = auth_header?.strip_prefix("Bearer ")?.trim();
    if token.is_empty() {
        None
    } else {
        Some(token)
    }
}

/// Extract the value of cookie `name` from a Cookie header
pub fn extract_token_from_cookie<'a>(cookie_header: Option<&'a str>, name: &str) -> Option<&'a str> {
    cookie_header?
        .split(';')
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value.trim())
        .filter(|value| !value.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "test-secret-that-is-at-least-32-characters-long";

    fn verifier() -> SessionVerifier {
        SessionVerifier::new(SECRET.into()).unwrap()
    }

    #[test]
    fn test_issue_and_verify() {
        let v = verifier();
        let token = v.issue("user-1", 3600);

        let result = v.verify(&token);
        assert!(result.valid);
        assert_eq!(result.claims.unwrap().sub, "user-1");
    }

    #[test]
    fn test_invalid_token() {
        let result = verifier().verify("not-a-token");
        assert!(!result.valid);
        assert!(result.error.is_some());
    }

    #[test]
    fn test_wrong_secret() {
        let token = verifier().issue("user-1", 3600);
        let other =
            SessionVerifier::new("different-secret-that-is-at-least-32-characters".into()).unwrap();
        assert!(!other.verify(&token).valid);
    }

    #[test]
    fn test_secret_validation() {
        assert!(SessionVerifier::new("".into()).is_err());
        assert!(SessionVerifier::new("short".into()).is_err());
        assert!(SessionVerifier::new(SECRET.into()).is_ok());
    }

    #[test]
    fn test_extract_token_from_header() {
        assert_eq!(extract_token_from_header(Some("Bearer abc123")), Some("abc123"));
        assert_eq!(extract_token_from_header(Some("Bearer ")), None);
        assert_eq!(extract_token_from_header(Some("Basic abc123")), None);
        assert_eq!(extract_token_from_header(None), None);
    }

    #[test]
    fn test_extract_token_from_cookie() {
        assert_eq!(
            extract_token_from_cookie(Some("theme=dark; __session=tok123"), "__session"),
            Some("tok123")
        );
        assert_eq!(
            extract_token_from_cookie(Some("__session=tok123"), "__session"),
            Some("tok123")
        );
        assert_eq!(extract_token_from_cookie(Some("theme=dark"), "__session"), None);
        assert_eq!(extract_token_from_cookie(Some("__session="), "__session"), None);
        assert_eq!(extract_token_from_cookie(None, "__session"), None);
    }
}
