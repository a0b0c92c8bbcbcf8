//! Signup, login, logout and session identity.

use bson::doc;
use bytes::Bytes;
use http_body_util::Full;
use hyper::body::Incoming;
use hyper::{Method, Request, Response, StatusCode};
use serde::Deserialize;
use std::sync::Arc;
use tracing::info;

use crate::auth::{
    authenticate, clear_session_cookie, hash_password, session_cookie, verify_password,
};
use crate::db::schemas::{UserDoc, UserProfile, USER_COLLECTION};
use crate::email::EmailJob;
use crate::server::AppState;
use crate::types::{ApiError, Result};

use super::{json_response, message_response, parse_json_body};

#[derive(Debug, Deserialize)]
pub struct SignupRequest {
    pub name: String,
    pub username: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub identifier: String,
    pub password: String,
}

pub async fn handle(
    state: Arc<AppState>,
    req: Request<Incoming>,
    method: &Method,
    path: &str,
) -> Result<Response<Full<Bytes>>> {
    match (method, path) {
        (&Method::POST, "/auth/signup") => signup(state, req).await,
        (&Method::POST, "/auth/login") => login(state, req).await,
        (&Method::POST, "/auth/logout") => logout(state).await,
        (&Method::GET, "/auth/me") => me(state, req).await,
        _ => Err(ApiError::NotFound(format!("No route for {}", path))),
    }
}

/// Loose shape check matching what browsers consider an email address.
pub fn is_valid_email(candidate: &str) -> bool {
    if candidate.chars().any(char::is_whitespace) {
        return false;
    }
    let Some((local, domain)) = candidate.split_once('@') else {
        return false;
    };
    !local.is_empty() && domain.contains('.') && !domain.starts_with('.') && !domain.ends_with('.')
}

async fn signup(state: Arc<AppState>, req: Request<Incoming>) -> Result<Response<Full<Bytes>>> {
    let body: SignupRequest = parse_json_body(req).await?;

    let name = body.name.trim();
    let username = body.username.trim();
    let email = body.email.trim().to_lowercase();

    if name.is_empty() || username.is_empty() || email.is_empty() || body.password.is_empty() {
        return Err(ApiError::BadRequest("All fields are required".into()));
    }
    if !is_valid_email(&email) {
        return Err(ApiError::BadRequest("Invalid email format".into()));
    }
    if body.password.len() < 6 {
        return Err(ApiError::BadRequest(
            "Password must be at least 6 characters".into(),
        ));
    }

    let users = state.mongo.collection::<UserDoc>(USER_COLLECTION).await?;

    if users.find_one(doc! { "email": &email }).await?.is_some() {
        return Err(ApiError::Conflict("Email already exists".into()));
    }
    if users.find_one(doc! { "username": username }).await?.is_some() {
        return Err(ApiError::Conflict("Username already exists".into()));
    }

    let password_hash = hash_password(&body.password)?;
    let user = UserDoc::new(
        name.to_string(),
        username.to_string(),
        email.clone(),
        password_hash,
    );

    // A concurrent signup can still win the race; the unique index turns
    // that into a duplicate-key error, reported like the lookups above.
    let user_id = match users.insert_one(user).await {
        Ok(id) => id,
        Err(ApiError::Database(msg)) if msg.contains("E11000") => {
            return Err(ApiError::Conflict("Email or username already exists".into()));
        }
        Err(e) => return Err(e),
    };

    info!("New user registered: {}", username);

    let token = state.sessions.issue(&user_id.to_hex())?;
    let cookie = session_cookie(
        &token,
        state.sessions.expiry_seconds(),
        state.args.secure_cookies,
    );

    let profile_url = format!("{}/profile/{}", state.args.client_url, username);
    state.mailer.enqueue(EmailJob::Welcome {
        to: email,
        name: name.to_string(),
        profile_url,
    });

    let mut response = message_response(StatusCode::OK, "User registered successfully");
    response
        .headers_mut()
        .insert(hyper::header::SET_COOKIE, cookie.parse()?);
    Ok(response)
}

async fn login(state: Arc<AppState>, req: Request<Incoming>) -> Result<Response<Full<Bytes>>> {
    let body: LoginRequest = parse_json_body(req).await?;

    let identifier = body.identifier.trim();
    if identifier.is_empty() || body.password.is_empty() {
        return Err(ApiError::BadRequest("All fields are required".into()));
    }

    let filter = if is_valid_email(identifier) {
        doc! { "email": identifier.to_lowercase() }
    } else {
        doc! { "username": identifier }
    };

    let users = state.mongo.collection::<UserDoc>(USER_COLLECTION).await?;

    // Same message for unknown user and bad password.
    let user = users
        .find_one(filter)
        .await?
        .ok_or_else(|| ApiError::BadRequest("Invalid credentials".into()))?;

    if !verify_password(&body.password, &user.password_hash)? {
        return Err(ApiError::BadRequest("Invalid credentials".into()));
    }

    let user_id = user
        .id
        .ok_or_else(|| ApiError::Internal("Stored user has no id".into()))?;

    let token = state.sessions.issue(&user_id.to_hex())?;
    let cookie = session_cookie(
        &token,
        state.sessions.expiry_seconds(),
        state.args.secure_cookies,
    );

    info!("User logged in: {}", user.username);

    let mut response = message_response(StatusCode::OK, "Logged in successfully");
    response
        .headers_mut()
        .insert(hyper::header::SET_COOKIE, cookie.parse()?);
    Ok(response)
}

async fn logout(state: Arc<AppState>) -> Result<Response<Full<Bytes>>> {
    let cookie = clear_session_cookie(state.args.secure_cookies);

    let mut response = message_response(StatusCode::OK, "Logged out successfully");
    response
        .headers_mut()
        .insert(hyper::header::SET_COOKIE, cookie.parse()?);
    Ok(response)
}

async fn me(state: Arc<AppState>, req: Request<Incoming>) -> Result<Response<Full<Bytes>>> {
    let user = authenticate(&state, &req).await?;
    Ok(json_response(StatusCode::OK, &UserProfile::from(&user)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_ordinary_addresses() {
        assert!(is_valid_email("ada@example.com"));
        assert!(is_valid_email("a.b+tag@sub.example.co"));
    }

    #[test]
    fn rejects_malformed_addresses() {
        assert!(!is_valid_email("not-an-email"));
        assert!(!is_valid_email("two words@example.com"));
        assert!(!is_valid_email("@example.com"));
        assert!(!is_valid_email("ada@nodot"));
        assert!(!is_valid_email("ada@.com"));
        assert!(!is_valid_email("ada@example."));
    }
}
