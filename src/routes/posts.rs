//! Post, comment, like and feed endpoints.

use bson::{doc, oid::ObjectId};
use bytes::Bytes;
use http_body_util::Full;
use hyper::body::Incoming;
use hyper::{Method, Request, Response, StatusCode};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::auth::authenticate;
use crate::db::schemas::{
    Comment, NotificationDoc, NotificationKind, PostDoc, UserDoc, UserSummary,
    NOTIFICATION_COLLECTION, POST_COLLECTION, USER_COLLECTION,
};
use crate::email::EmailJob;
use crate::server::AppState;
use crate::types::{ApiError, Result};

use super::{fetch_user_summaries, json_response, message_response, parse_json_body, parse_object_id};

const TRENDING_LIMIT: i64 = 10;
const SUGGESTED_LIMIT: i64 = 10;

#[derive(Debug, Deserialize)]
pub struct CreatePostRequest {
    pub content: String,
    #[serde(default)]
    pub image: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CommentRequest {
    pub content: String,
}

/// A comment with its author hydrated
#[derive(Debug, Serialize)]
pub struct CommentView {
    pub user: UserSummary,
    pub content: String,
    pub created_at: String,
}

/// A post with author and comment users hydrated
#[derive(Debug, Serialize)]
pub struct PostView {
    pub id: String,
    pub author: UserSummary,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    pub likes: Vec<String>,
    pub comments: Vec<CommentView>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
}

pub async fn handle(
    state: Arc<AppState>,
    req: Request<Incoming>,
    method: &Method,
    path: &str,
) -> Result<Response<Full<Bytes>>> {
    let user = authenticate(&state, &req).await?;

    match (method, path) {
        (&Method::GET, "/posts/feed") => return feed(state, &user).await,
        (&Method::POST, "/posts") => return create(state, req, &user).await,
        _ => {}
    }

    // Remaining routes carry a post id segment.
    let rest = path
        .strip_prefix("/posts/")
        .ok_or_else(|| ApiError::NotFound(format!("No route for {}", path)))?;
    let segments: Vec<&str> = rest.split('/').collect();

    match (method, segments.as_slice()) {
        (&Method::DELETE, ["delete", raw]) => remove(state, &user, raw).await,
        (&Method::GET, [raw]) => get_one(state, raw).await,
        (&Method::POST, [raw, "comment"]) => comment(state, req, &user, raw).await,
        (&Method::POST, [raw, "like"]) => like(state, &user, raw).await,
        _ => Err(ApiError::NotFound(format!("No route for {}", path))),
    }
}

/// Merge feed sections by id. Position follows first appearance; a later
/// duplicate replaces the earlier document in place.
pub fn merge_feed(sections: Vec<Vec<PostDoc>>) -> Vec<PostDoc> {
    let mut order: Vec<ObjectId> = Vec::new();
    let mut by_id: std::collections::HashMap<ObjectId, PostDoc> = std::collections::HashMap::new();

    for section in sections {
        for post in section {
            let Some(id) = post.id else { continue };
            if !by_id.contains_key(&id) {
                order.push(id);
            }
            by_id.insert(id, post);
        }
    }

    order.into_iter().filter_map(|id| by_id.remove(&id)).collect()
}

async fn feed(state: Arc<AppState>, user: &UserDoc) -> Result<Response<Full<Bytes>>> {
    let posts = state.mongo.collection::<PostDoc>(POST_COLLECTION).await?;

    let user_id = user
        .id
        .ok_or_else(|| ApiError::Internal("Authenticated user has no id".into()))?;

    let mut network: Vec<ObjectId> = user.connections.clone();
    network.push(user_id);

    let own = posts
        .find_many_sorted(
            doc! { "author": { "$in": network.clone() } },
            Some(doc! { "metadata.created_at": -1 }),
            None,
        )
        .await?;

    // Array-length ordering on the likes field, same contract the product
    // has always shipped.
    let trending = posts
        .find_many_sorted(doc! {}, Some(doc! { "likes": -1 }), Some(TRENDING_LIMIT))
        .await?;

    let suggested = posts
        .find_many_sorted(
            doc! { "author": { "$nin": network } },
            Some(doc! { "metadata.created_at": -1 }),
            Some(SUGGESTED_LIMIT),
        )
        .await?;

    let merged = merge_feed(vec![own, trending, suggested]);
    let views = hydrate_posts(&state, merged).await?;

    Ok(json_response(StatusCode::OK, &views))
}

async fn create(
    state: Arc<AppState>,
    req: Request<Incoming>,
    user: &UserDoc,
) -> Result<Response<Full<Bytes>>> {
    let body: CreatePostRequest = parse_json_body(req).await?;

    let content = body.content.trim();
    if content.is_empty() {
        return Err(ApiError::BadRequest("Post content is required".into()));
    }

    let image_url = match body.image.as_deref() {
        Some(payload) if !payload.is_empty() => Some(state.images.upload(payload).await?),
        _ => None,
    };

    let author = user
        .id
        .ok_or_else(|| ApiError::Internal("Authenticated user has no id".into()))?;

    let posts = state.mongo.collection::<PostDoc>(POST_COLLECTION).await?;
    let post_id = posts
        .insert_one(PostDoc::new(author, content.to_string(), image_url))
        .await?;

    let post = posts
        .find_one(doc! { "_id": post_id })
        .await?
        .ok_or_else(|| ApiError::Internal("Post vanished after insert".into()))?;

    let views = hydrate_posts(&state, vec![post]).await?;
    let view = views
        .into_iter()
        .next()
        .ok_or_else(|| ApiError::Internal("Failed to render post".into()))?;

    Ok(json_response(StatusCode::CREATED, &view))
}

async fn remove(state: Arc<AppState>, user: &UserDoc, raw: &str) -> Result<Response<Full<Bytes>>> {
    let post_id = parse_object_id(raw, "post")?;

    let posts = state.mongo.collection::<PostDoc>(POST_COLLECTION).await?;
    let post = posts
        .find_one(doc! { "_id": post_id })
        .await?
        .ok_or_else(|| ApiError::NotFound("Post not found".into()))?;

    if Some(post.author) != user.id {
        return Err(ApiError::Forbidden(
            "You are not authorized to delete this post".into(),
        ));
    }

    if let Some(image_url) = &post.image {
        state.images.delete(image_url).await;
    }

    posts.soft_delete(doc! { "_id": post_id }).await?;

    Ok(message_response(StatusCode::OK, "Post deleted successfully"))
}

async fn get_one(state: Arc<AppState>, raw: &str) -> Result<Response<Full<Bytes>>> {
    let post_id = parse_object_id(raw, "post")?;

    let posts = state.mongo.collection::<PostDoc>(POST_COLLECTION).await?;
    let post = posts
        .find_one(doc! { "_id": post_id })
        .await?
        .ok_or_else(|| ApiError::NotFound("Post not found".into()))?;

    let views = hydrate_posts(&state, vec![post]).await?;
    let view = views
        .into_iter()
        .next()
        .ok_or_else(|| ApiError::Internal("Failed to render post".into()))?;

    Ok(json_response(StatusCode::OK, &view))
}

async fn comment(
    state: Arc<AppState>,
    req: Request<Incoming>,
    user: &UserDoc,
    raw: &str,
) -> Result<Response<Full<Bytes>>> {
    let post_id = parse_object_id(raw, "post")?;
    let body: CommentRequest = parse_json_body(req).await?;

    let content = body.content.trim();
    if content.is_empty() {
        return Err(ApiError::BadRequest("Comment content is required".into()));
    }

    let user_id = user
        .id
        .ok_or_else(|| ApiError::Internal("Authenticated user has no id".into()))?;

    let posts = state.mongo.collection::<PostDoc>(POST_COLLECTION).await?;
    let post = posts
        .find_one(doc! { "_id": post_id })
        .await?
        .ok_or_else(|| ApiError::NotFound("Post not found".into()))?;

    let comment = Comment {
        user: user_id,
        content: content.to_string(),
        created_at: bson::DateTime::now(),
    };
    let comment_bson = bson::to_bson(&comment)
        .map_err(|e| ApiError::Internal(format!("Failed to encode comment: {}", e)))?;

    posts
        .update_one(
            doc! { "_id": post_id },
            doc! {
                "$push": { "comments": comment_bson },
                "$set": { "metadata.updated_at": bson::DateTime::now() },
            },
        )
        .await?;

    // The author hears about comments from everyone but themselves.
    if post.author != user_id {
        let notifications = state
            .mongo
            .collection::<NotificationDoc>(NOTIFICATION_COLLECTION)
            .await?;
        notifications
            .insert_one(NotificationDoc::new(
                post.author,
                NotificationKind::Comment,
                user_id,
                Some(post_id),
            ))
            .await?;

        let users = state.mongo.collection::<UserDoc>(USER_COLLECTION).await?;
        if let Some(author) = users.find_one(doc! { "_id": post.author }).await? {
            let post_url = format!("{}/post/{}", state.args.client_url, post_id.to_hex());
            state.mailer.enqueue(EmailJob::CommentNotification {
                to: author.email.clone(),
                recipient_name: author.name.clone(),
                commenter_name: user.name.clone(),
                post_url,
                comment_content: content.to_string(),
            });
        }
    }

    Ok(message_response(StatusCode::OK, "Comment added successfully"))
}

async fn like(state: Arc<AppState>, user: &UserDoc, raw: &str) -> Result<Response<Full<Bytes>>> {
    let post_id = parse_object_id(raw, "post")?;

    let user_id = user
        .id
        .ok_or_else(|| ApiError::Internal("Authenticated user has no id".into()))?;

    let posts = state.mongo.collection::<PostDoc>(POST_COLLECTION).await?;
    let post = posts
        .find_one(doc! { "_id": post_id })
        .await?
        .ok_or_else(|| ApiError::NotFound("Post not found".into()))?;

    let liked = post.is_liked_by(&user_id);

    posts
        .update_one(doc! { "_id": post_id }, like_toggle_update(liked, user_id))
        .await?;

    if should_notify_like(liked, &post.author, &user_id) {
        let notifications = state
            .mongo
            .collection::<NotificationDoc>(NOTIFICATION_COLLECTION)
            .await?;
        notifications
            .insert_one(NotificationDoc::new(
                post.author,
                NotificationKind::Like,
                user_id,
                Some(post_id),
            ))
            .await?;
    }

    let message = if liked { "Post unliked" } else { "Post liked" };
    Ok(message_response(StatusCode::OK, message))
}

/// The update that flips like membership for one user.
fn like_toggle_update(already_liked: bool, user_id: ObjectId) -> bson::Document {
    if already_liked {
        doc! {
            "$pull": { "likes": user_id },
            "$set": { "metadata.updated_at": bson::DateTime::now() },
        }
    } else {
        doc! {
            "$addToSet": { "likes": user_id },
            "$set": { "metadata.updated_at": bson::DateTime::now() },
        }
    }
}

/// Only a fresh like by someone other than the author notifies; unlike
/// and self-like are silent.
fn should_notify_like(already_liked: bool, author: &ObjectId, actor: &ObjectId) -> bool {
    !already_liked && author != actor
}

/// Hydrate authors and comment users. Posts whose author no longer resolves
/// are dropped; comments with missing users are skipped.
async fn hydrate_posts(state: &AppState, posts: Vec<PostDoc>) -> Result<Vec<PostView>> {
    let mut user_ids: Vec<ObjectId> = Vec::new();
    for post in &posts {
        user_ids.push(post.author);
        for comment in &post.comments {
            user_ids.push(comment.user);
        }
    }
    user_ids.sort();
    user_ids.dedup();

    let summaries = fetch_user_summaries(&state.mongo, &user_ids).await?;

    let mut views = Vec::with_capacity(posts.len());
    for post in posts {
        let Some(author) = summaries.get(&post.author) else {
            continue;
        };

        let comments = post
            .comments
            .iter()
            .filter_map(|c| {
                summaries.get(&c.user).and_then(|user| {
                    c.created_at.try_to_rfc3339_string().ok().map(|created_at| {
                        CommentView {
                            user: user.clone(),
                            content: c.content.clone(),
                            created_at,
                        }
                    })
                })
            })
            .collect();

        views.push(PostView {
            id: post.id.map(|id| id.to_hex()).unwrap_or_default(),
            author: author.clone(),
            content: post.content,
            image: post.image,
            likes: post.likes.iter().map(|id| id.to_hex()).collect(),
            comments,
            created_at: post
                .metadata
                .created_at
                .and_then(|dt| dt.try_to_rfc3339_string().ok()),
        });
    }

    Ok(views)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn post_with_id(id: ObjectId, content: &str) -> PostDoc {
        let mut post = PostDoc::new(ObjectId::new(), content.to_string(), None);
        post.id = Some(id);
        post
    }

    #[test]
    fn merge_keeps_first_position_and_deduplicates() {
        let a = ObjectId::new();
        let b = ObjectId::new();
        let c = ObjectId::new();

        let merged = merge_feed(vec![
            vec![post_with_id(a, "own"), post_with_id(b, "own-2")],
            vec![post_with_id(b, "trending"), post_with_id(c, "trending-2")],
        ]);

        assert_eq!(merged.len(), 3);
        assert_eq!(merged[0].id, Some(a));
        assert_eq!(merged[1].id, Some(b));
        assert_eq!(merged[2].id, Some(c));
    }

    #[test]
    fn merge_takes_the_last_written_copy() {
        let a = ObjectId::new();
        let merged = merge_feed(vec![
            vec![post_with_id(a, "stale")],
            vec![post_with_id(a, "fresh")],
        ]);

        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].content, "fresh");
    }

    #[test]
    fn like_toggle_adds_then_removes() {
        let user = ObjectId::new();

        let add = like_toggle_update(false, user);
        assert!(add.contains_key("$addToSet"));
        assert!(add.contains_key("$set"));

        let remove = like_toggle_update(true, user);
        assert!(remove.contains_key("$pull"));
        assert!(remove.contains_key("$set"));
    }

    #[test]
    fn fresh_like_by_someone_else_notifies() {
        let author = ObjectId::new();
        let actor = ObjectId::new();
        assert!(should_notify_like(false, &author, &actor));
    }

    #[test]
    fn unlike_is_silent() {
        let author = ObjectId::new();
        let actor = ObjectId::new();
        assert!(!should_notify_like(true, &author, &actor));
    }

    #[test]
    fn self_like_is_silent() {
        let author = ObjectId::new();
        assert!(!should_notify_like(false, &author, &author));
    }

    #[test]
    fn merge_skips_posts_without_ids() {
        let merged = merge_feed(vec![vec![PostDoc::new(
            ObjectId::new(),
            "no id".to_string(),
            None,
        )]]);
        assert!(merged.is_empty());
    }
}
