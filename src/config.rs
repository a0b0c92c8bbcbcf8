//! Configuration for lattice
//!
//! CLI arguments and environment variable handling using clap.

use clap::Parser;
use std::net::SocketAddr;

use crate::types::{ApiError, Result};

/// Lattice - REST backend for the Lattice professional network
#[derive(Parser, Debug, Clone)]
#[command(name = "lattice")]
#[command(about = "REST API server for the Lattice professional network")]
pub struct Args {
    /// Address to listen on
    #[arg(long, env = "LISTEN", default_value = "0.0.0.0:8080")]
    pub listen: SocketAddr,

    /// MongoDB connection URI
    #[arg(long, env = "MONGODB_URI", default_value = "mongodb://localhost:27017")]
    pub mongodb_uri: String,

    /// MongoDB database name
    #[arg(long, env = "MONGODB_DB", default_value = "lattice")]
    pub mongodb_db: String,

    /// JWT secret for session token signing (required)
    #[arg(long, env = "JWT_SECRET")]
    pub jwt_secret: Option<String>,

    /// Session token expiry in seconds (default 7 days)
    #[arg(long, env = "JWT_EXPIRY_SECONDS", default_value = "604800")]
    pub jwt_expiry_seconds: u64,

    /// Mark session cookies as Secure (send over HTTPS only)
    #[arg(long, env = "SECURE_COOKIES", default_value = "false")]
    pub secure_cookies: bool,

    /// Public URL of the single-page frontend, used for CORS and for
    /// profile/post links embedded in emails
    #[arg(long, env = "CLIENT_URL", default_value = "http://localhost:5173")]
    pub client_url: String,

    /// Transactional email API endpoint (Brevo-compatible)
    #[arg(long, env = "MAIL_API_URL", default_value = "https://api.brevo.com/v3/smtp/email")]
    pub mail_api_url: String,

    /// Transactional email API key. Email dispatch is disabled when unset.
    #[arg(long, env = "MAIL_API_KEY")]
    pub mail_api_key: Option<String>,

    /// Sender email address for outgoing mail
    #[arg(long, env = "MAIL_SENDER_EMAIL", default_value = "no-reply@lattice.example")]
    pub mail_sender_email: String,

    /// Sender display name for outgoing mail
    #[arg(long, env = "MAIL_SENDER_NAME", default_value = "Lattice")]
    pub mail_sender_name: String,

    /// Maximum queued email jobs before new jobs are dropped
    #[arg(long, env = "MAIL_QUEUE_SIZE", default_value = "256")]
    pub mail_queue_size: usize,

    /// Image host upload endpoint. Image fields are rejected when unset.
    #[arg(long, env = "IMAGE_API_URL")]
    pub image_api_url: Option<String>,

    /// Image host API key
    #[arg(long, env = "IMAGE_API_KEY")]
    pub image_api_key: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,
}

impl Args {
    /// Validate configuration at startup
    pub fn validate(&self) -> Result<()> {
        let secret = self
            .jwt_secret
            .as_deref()
            .ok_or_else(|| ApiError::Config("JWT_SECRET is required".into()))?;

        if secret.len() < 32 {
            return Err(ApiError::Config(
                "JWT_SECRET must be at least 32 characters".into(),
            ));
        }

        if self.mail_queue_size == 0 {
            return Err(ApiError::Config("MAIL_QUEUE_SIZE must be non-zero".into()));
        }

        Ok(())
    }

    /// Effective JWT secret. Call after `validate()`.
    pub fn jwt_secret(&self) -> &str {
        self.jwt_secret.as_deref().unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_args() -> Args {
        Args::parse_from(["lattice"])
    }

    #[test]
    fn test_validate_requires_jwt_secret() {
        let args = base_args();
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_short_secret() {
        let mut args = base_args();
        args.jwt_secret = Some("too-short".into());
        assert!(args.validate().is_err());

        args.jwt_secret = Some("a-secret-that-is-at-least-32-characters".into());
        assert!(args.validate().is_ok());
    }
}
