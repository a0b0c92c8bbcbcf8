//! Authentication for lattice
//!
//! Provides:
//! - Session token (JWT) issuance and validation
//! - Cookie handling for browser sessions
//! - Password hashing with Argon2
//! - The `authenticate` collaborator used by protected route handlers

pub mod jwt;
pub mod password;

pub use jwt::{
    clear_session_cookie, session_cookie, token_from_auth_header, token_from_cookie_header,
    Claims, SessionValidator, SESSION_COOKIE,
};
pub use password::{hash_password, verify_password};

use bson::{doc, oid::ObjectId};
use hyper::body::Incoming;
use hyper::Request;

use crate::db::schemas::{UserDoc, USER_COLLECTION};
use crate::server::AppState;
use crate::types::{ApiError, Result};

/// Pull the session token from a request, preferring the session cookie
/// and falling back to an Authorization bearer token.
pub fn extract_session_token(req: &Request<Incoming>) -> Option<&str> {
    if let Some(cookie_header) = req
        .headers()
        .get(hyper::header::COOKIE)
        .and_then(|v| v.to_str().ok())
    {
        if let Some(token) = token_from_cookie_header(cookie_header) {
            return Some(token);
        }
    }

    req.headers()
        .get(hyper::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(token_from_auth_header)
}

/// Resolve the authenticated identity behind a request.
///
/// Verifies the session token and loads the matching user record. Every
/// protected handler calls this first and receives the identity explicitly
/// rather than reading it off shared request state.
pub async fn authenticate(state: &AppState, req: &Request<Incoming>) -> Result<UserDoc> {
    let token =
        extract_session_token(req).ok_or_else(|| ApiError::Unauthorized("Not authorized".into()))?;

    let claims = state.sessions.verify(token)?;

    let user_id = ObjectId::parse_str(&claims.user_id)
        .map_err(|_| ApiError::Unauthorized("Invalid session subject".into()))?;

    let users = state.mongo.collection::<UserDoc>(USER_COLLECTION).await?;
    users
        .find_one(doc! { "_id": user_id })
        .await?
        .ok_or_else(|| ApiError::Unauthorized("User not found".into()))
}
