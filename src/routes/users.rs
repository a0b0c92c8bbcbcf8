//! User discovery and profile endpoints.

use bson::{doc, oid::ObjectId, Document};
use bytes::Bytes;
use http_body_util::Full;
use hyper::body::Incoming;
use hyper::{Method, Request, Response, StatusCode};
use serde::Deserialize;
use std::sync::Arc;

use crate::auth::authenticate;
use crate::db::schemas::{
    user::{Education, Experience},
    UserDoc, UserProfile, UserSummary, USER_COLLECTION,
};
use crate::server::AppState;
use crate::types::{ApiError, Result};

use super::{json_response, parse_json_body, path_param};

const SUGGESTION_LIMIT: i64 = 5;

#[derive(Debug, Deserialize)]
pub struct UpdateProfileRequest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub headline: Option<String>,
    #[serde(default)]
    pub about: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    /// Image data payload, uploaded to the image host
    #[serde(default)]
    pub profile_picture: Option<String>,
    /// Image data payload, uploaded to the image host
    #[serde(default)]
    pub banner_img: Option<String>,
    #[serde(default)]
    pub skills: Option<Vec<String>>,
    #[serde(default)]
    pub experience: Option<Vec<Experience>>,
    #[serde(default)]
    pub education: Option<Vec<Education>>,
}

pub async fn handle(
    state: Arc<AppState>,
    req: Request<Incoming>,
    method: &Method,
    path: &str,
) -> Result<Response<Full<Bytes>>> {
    let user = authenticate(&state, &req).await?;

    match (method, path) {
        (&Method::GET, "/users/suggestions") => suggestions(state, &user).await,
        (&Method::PUT, "/users/update_profile") => update_profile(state, req, &user).await,
        (&Method::GET, _) => {
            let username = path_param(path, "/users/")
                .ok_or_else(|| ApiError::NotFound(format!("No route for {}", path)))?;
            profile_by_username(state, username).await
        }
        _ => Err(ApiError::NotFound(format!("No route for {}", path))),
    }
}

async fn suggestions(state: Arc<AppState>, user: &UserDoc) -> Result<Response<Full<Bytes>>> {
    let user_id = user
        .id
        .ok_or_else(|| ApiError::Internal("Authenticated user has no id".into()))?;

    let mut exclude: Vec<ObjectId> = user.connections.clone();
    exclude.push(user_id);

    let users = state.mongo.collection::<UserDoc>(USER_COLLECTION).await?;
    let candidates = users
        .find_many_sorted(
            doc! { "_id": { "$nin": exclude } },
            None,
            Some(SUGGESTION_LIMIT),
        )
        .await?;

    let summaries: Vec<UserSummary> = candidates.iter().map(UserSummary::from).collect();
    Ok(json_response(StatusCode::OK, &summaries))
}

async fn profile_by_username(
    state: Arc<AppState>,
    username: &str,
) -> Result<Response<Full<Bytes>>> {
    let users = state.mongo.collection::<UserDoc>(USER_COLLECTION).await?;
    let user = users
        .find_one(doc! { "username": username })
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found".into()))?;

    Ok(json_response(StatusCode::OK, &UserProfile::from(&user)))
}

async fn update_profile(
    state: Arc<AppState>,
    req: Request<Incoming>,
    user: &UserDoc,
) -> Result<Response<Full<Bytes>>> {
    let body: UpdateProfileRequest = parse_json_body(req).await?;

    let user_id = user
        .id
        .ok_or_else(|| ApiError::Internal("Authenticated user has no id".into()))?;

    let mut set = Document::new();

    if let Some(name) = body.name {
        let name = name.trim().to_string();
        if name.is_empty() {
            return Err(ApiError::BadRequest("Name cannot be empty".into()));
        }
        set.insert("name", name);
    }
    if let Some(headline) = body.headline {
        set.insert("headline", headline);
    }
    if let Some(about) = body.about {
        set.insert("about", about);
    }
    if let Some(location) = body.location {
        set.insert("location", location);
    }
    if let Some(skills) = body.skills {
        set.insert("skills", skills);
    }
    if let Some(experience) = body.experience {
        let value = bson::to_bson(&experience)
            .map_err(|e| ApiError::Internal(format!("Failed to encode experience: {}", e)))?;
        set.insert("experience", value);
    }
    if let Some(education) = body.education {
        let value = bson::to_bson(&education)
            .map_err(|e| ApiError::Internal(format!("Failed to encode education: {}", e)))?;
        set.insert("education", value);
    }

    if let Some(payload) = body.profile_picture.as_deref() {
        if !payload.is_empty() {
            let url = state.images.upload(payload).await?;
            if !user.profile_picture.is_empty() {
                state.images.delete(&user.profile_picture).await;
            }
            set.insert("profile_picture", url);
        }
    }
    if let Some(payload) = body.banner_img.as_deref() {
        if !payload.is_empty() {
            let url = state.images.upload(payload).await?;
            if !user.banner_img.is_empty() {
                state.images.delete(&user.banner_img).await;
            }
            set.insert("banner_img", url);
        }
    }

    if set.is_empty() {
        return Err(ApiError::BadRequest("No updatable fields provided".into()));
    }

    set.insert("metadata.updated_at", bson::DateTime::now());

    let users = state.mongo.collection::<UserDoc>(USER_COLLECTION).await?;
    users
        .update_one(doc! { "_id": user_id }, doc! { "$set": set })
        .await?;

    let updated = users
        .find_one(doc! { "_id": user_id })
        .await?
        .ok_or_else(|| ApiError::Internal("User vanished during update".into()))?;

    Ok(json_response(StatusCode::OK, &UserProfile::from(&updated)))
}
