//! Session token handling
//!
//! Sessions are HS256 JWTs binding a user id, carried in an HttpOnly
//! cookie. The Authorization header ("Bearer <token>") is accepted as a
//! fallback for non-browser clients.

use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::types::{ApiError, Result};

/// Name of the session cookie
pub const SESSION_COOKIE: &str = "lattice_session";

/// Payload stored in the session token
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// User id (hex ObjectId)
    pub user_id: String,
    /// Issued at (Unix timestamp)
    pub iat: u64,
    /// Expiration time (Unix timestamp)
    pub exp: u64,
}

/// Session token generator and validator
#[derive(Clone)]
pub struct SessionValidator {
    secret: String,
    expiry_seconds: u64,
}

impl SessionValidator {
    /// Create a new validator
    ///
    /// Returns an error if the secret is empty or too short.
    pub fn new(secret: String, expiry_seconds: u64) -> Result<Self> {
        if secret.len() < 32 {
            return Err(ApiError::Config(
                "JWT secret must be at least 32 characters".into(),
            ));
        }

        Ok(Self {
            secret,
            expiry_seconds,
        })
    }

    /// Seconds a freshly issued token remains valid
    pub fn expiry_seconds(&self) -> u64 {
        self.expiry_seconds
    }

    /// Issue a session token for an authenticated user
    pub fn issue(&self, user_id: &str) -> Result<String> {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_err(|e| ApiError::Internal(format!("System time error: {}", e)))?
            .as_secs();

        let claims = Claims {
            user_id: user_id.to_string(),
            iat: now,
            exp: now + self.expiry_seconds,
        };

        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.secret.as_bytes()),
        )
        .map_err(|e| ApiError::Internal(format!("Failed to issue session token: {}", e)))
    }

    /// Verify and decode a session token
    pub fn verify(&self, token: &str) -> Result<Claims> {
        decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.secret.as_bytes()),
            &Validation::default(),
        )
        .map(|data| data.claims)
        .map_err(|err| {
            use jsonwebtoken::errors::ErrorKind;
            let msg = match err.kind() {
                ErrorKind::ExpiredSignature => "Session expired",
                ErrorKind::InvalidSignature => "Invalid session signature",
                _ => "Invalid session token",
            };
            ApiError::Unauthorized(msg.into())
        })
    }
}

/// Build the Set-Cookie value that installs a session token
pub fn session_cookie(token: &str, max_age_seconds: u64, secure: bool) -> String {
    let mut cookie = format!(
        "{}={}; Max-Age={}; Path=/; HttpOnly; SameSite=Strict",
        SESSION_COOKIE, token, max_age_seconds
    );
    if secure {
        cookie.push_str("; Secure");
    }
    cookie
}

/// Build the Set-Cookie value that clears the session cookie
pub fn clear_session_cookie(secure: bool) -> String {
    session_cookie("", 0, secure)
}

/// Extract the session token from a Cookie header value
pub fn token_from_cookie_header(header: &str) -> Option<&str> {
    for pair in header.split(';') {
        let pair = pair.trim();
        if let Some((name, value)) = pair.split_once('=') {
            if name == SESSION_COOKIE && !value.is_empty() {
                return Some(value);
            }
        }
    }
    None
}

/// Extract a bearer token from an Authorization header value
pub fn token_from_auth_header(header: &str) -> Option<&str> {
    let token = header.strip_prefix("Bearer ")?.trim();
    if token.is_empty() {
        None
    } else {
        Some(token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_validator() -> SessionValidator {
        SessionValidator::new(
            "test-secret-that-is-at-least-32-characters-long".into(),
            3600,
        )
        .unwrap()
    }

    #[test]
    fn test_issue_and_verify() {
        let validator = test_validator();
        let token = validator.issue("64f000000000000000000001").unwrap();
        assert!(!token.is_empty());

        let claims = validator.verify(&token).unwrap();
        assert_eq!(claims.user_id, "64f000000000000000000001");
        assert!(claims.exp > claims.iat);
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let validator = test_validator();
        let other = SessionValidator::new(
            "different-secret-that-is-at-least-32-chars".into(),
            3600,
        )
        .unwrap();

        let token = validator.issue("abc").unwrap();
        assert!(other.verify(&token).is_err());
    }

    #[test]
    fn test_garbage_token_rejected() {
        let validator = test_validator();
        assert!(validator.verify("not-a-token").is_err());
    }

    #[test]
    fn test_secret_length_enforced() {
        assert!(SessionValidator::new("short".into(), 3600).is_err());
    }

    #[test]
    fn test_cookie_round_trip() {
        let cookie = session_cookie("tok123", 604800, false);
        assert!(cookie.starts_with("lattice_session=tok123;"));
        assert!(cookie.contains("HttpOnly"));
        assert!(!cookie.contains("Secure"));

        let secure = session_cookie("tok123", 604800, true);
        assert!(secure.contains("Secure"));

        // A browser echoes the cookie back among others
        let header = format!("theme=dark; {}=tok123; other=1", SESSION_COOKIE);
        assert_eq!(token_from_cookie_header(&header), Some("tok123"));
    }

    #[test]
    fn test_clear_cookie_expires_immediately() {
        let cookie = clear_session_cookie(false);
        assert!(cookie.contains("Max-Age=0"));
    }

    #[test]
    fn test_cookie_header_without_session() {
        assert_eq!(token_from_cookie_header("theme=dark; sidebar=open"), None);
        assert_eq!(token_from_cookie_header(""), None);
    }

    #[test]
    fn test_bearer_fallback() {
        assert_eq!(token_from_auth_header("Bearer abc123"), Some("abc123"));
        assert_eq!(token_from_auth_header("Basic abc123"), None);
        assert_eq!(token_from_auth_header("Bearer "), None);
    }
}
