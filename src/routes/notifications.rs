//! Notification endpoints, always scoped to the authenticated recipient.

use bson::doc;
use bytes::Bytes;
use http_body_util::Full;
use hyper::body::Incoming;
use hyper::{Method, Request, Response, StatusCode};
use serde::Serialize;
use std::sync::Arc;

use crate::auth::authenticate;
use crate::db::schemas::{
    NotificationDoc, NotificationKind, PostDoc, UserSummary, NOTIFICATION_COLLECTION,
    POST_COLLECTION,
};
use crate::server::AppState;
use crate::types::{ApiError, Result};

use super::{fetch_user_summaries, json_response, message_response, parse_object_id, path_param};

/// A post reference embedded in a notification view
#[derive(Debug, Serialize)]
pub struct PostRef {
    pub id: String,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
}

/// A hydrated notification
#[derive(Debug, Serialize)]
pub struct NotificationView {
    pub id: String,
    pub kind: NotificationKind,
    pub related_user: UserSummary,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub related_post: Option<PostRef>,
    pub is_read: bool,
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
    let user_id = user
        .id
        .ok_or_else(|| ApiError::Internal("Authenticated user has no id".into()))?;

    if let Some(raw) = path_param(path, "/notifications/read/") {
        if method == Method::PUT {
            return mark_read(state, user_id, raw).await;
        }
    }

    if let Some(raw) = path_param(path, "/notifications/delete/") {
        if method == Method::DELETE {
            return remove(state, user_id, raw).await;
        }
    }

    match (method, path) {
        (&Method::GET, "/notifications") => list(state, user_id).await,
        _ => Err(ApiError::NotFound(format!("No route for {}", path))),
    }
}

async fn list(state: Arc<AppState>, user_id: bson::oid::ObjectId) -> Result<Response<Full<Bytes>>> {
    let notifications = state
        .mongo
        .collection::<NotificationDoc>(NOTIFICATION_COLLECTION)
        .await?;
    let posts = state.mongo.collection::<PostDoc>(POST_COLLECTION).await?;

    let docs = notifications
        .find_many_sorted(
            doc! { "recipient": user_id },
            Some(doc! { "metadata.created_at": -1 }),
            None,
        )
        .await?;

    let user_ids: Vec<_> = docs.iter().map(|n| n.related_user).collect();
    let summaries = fetch_user_summaries(&state.mongo, &user_ids).await?;

    let mut views = Vec::with_capacity(docs.len());
    for notification in docs {
        let Some(related_user) = summaries.get(&notification.related_user) else {
            continue;
        };

        let related_post = match notification.related_post {
            Some(post_id) => posts
                .find_one(doc! { "_id": post_id })
                .await?
                .map(|p| PostRef {
                    id: post_id.to_hex(),
                    content: p.content,
                    image: p.image,
                }),
            None => None,
        };

        views.push(NotificationView {
            id: notification.id.map(|id| id.to_hex()).unwrap_or_default(),
            kind: notification.kind,
            related_user: related_user.clone(),
            related_post,
            is_read: notification.is_read,
            created_at: notification
                .metadata
                .created_at
                .and_then(|dt| dt.try_to_rfc3339_string().ok()),
        });
    }

    Ok(json_response(StatusCode::OK, &views))
}

/// Filter scoping a notification to its recipient and excluding records
/// that were already soft-deleted. `update_one` goes straight to the raw
/// collection, so the wrapper's deletion filter does not apply here.
fn recipient_filter(id: bson::oid::ObjectId, recipient: bson::oid::ObjectId) -> bson::Document {
    doc! {
        "_id": id,
        "recipient": recipient,
        "metadata.is_deleted": { "$ne": true },
    }
}

async fn mark_read(
    state: Arc<AppState>,
    user_id: bson::oid::ObjectId,
    raw: &str,
) -> Result<Response<Full<Bytes>>> {
    let id = parse_object_id(raw, "notification")?;

    let notifications = state
        .mongo
        .collection::<NotificationDoc>(NOTIFICATION_COLLECTION)
        .await?;

    let result = notifications
        .update_one(
            recipient_filter(id, user_id),
            doc! { "$set": { "is_read": true, "metadata.updated_at": bson::DateTime::now() } },
        )
        .await?;

    if result.matched_count == 0 {
        return Err(ApiError::NotFound("Notification not found".into()));
    }

    Ok(message_response(StatusCode::OK, "Notification marked as read"))
}

async fn remove(
    state: Arc<AppState>,
    user_id: bson::oid::ObjectId,
    raw: &str,
) -> Result<Response<Full<Bytes>>> {
    let id = parse_object_id(raw, "notification")?;

    let notifications = state
        .mongo
        .collection::<NotificationDoc>(NOTIFICATION_COLLECTION)
        .await?;

    let result = notifications
        .soft_delete(doc! { "_id": id, "recipient": user_id })
        .await?;

    if result.matched_count == 0 {
        return Err(ApiError::NotFound("Notification not found".into()));
    }

    Ok(message_response(StatusCode::OK, "Notification deleted"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::oid::ObjectId;

    #[test]
    fn recipient_filter_excludes_deleted_records() {
        let id = ObjectId::new();
        let recipient = ObjectId::new();
        let filter = recipient_filter(id, recipient);

        assert_eq!(filter.get_object_id("_id").unwrap(), id);
        assert_eq!(filter.get_object_id("recipient").unwrap(), recipient);
        assert_eq!(
            filter.get_document("metadata.is_deleted").unwrap(),
            &doc! { "$ne": true }
        );
    }
}
