//! Connection request lifecycle and the symmetric connection graph.
//!
//! Requests are directional ledger records; the graph itself lives in each
//! user's `connections` array. Both sides of an accept or removal are
//! written in a single MongoDB session transaction when the deployment
//! supports one, with a sequential fallback otherwise.

use bson::{doc, oid::ObjectId};
use serde::Serialize;
use tracing::warn;

use crate::db::mongo::MongoClient;
use crate::db::schemas::{
    ConnectionRequestDoc, NotificationDoc, NotificationKind, RequestStatus, UserDoc, UserSummary,
    CONNECTION_REQUEST_COLLECTION, NOTIFICATION_COLLECTION, USER_COLLECTION,
};
use crate::types::{ApiError, Result};

/// Relationship between two users as seen from the current user
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ConnectionStatus {
    Connected,
    Pending,
    Received { request_id: String },
    NotConnected,
}

/// A pending request hydrated with its sender
#[derive(Debug, Clone, Serialize)]
pub struct PendingRequest {
    pub id: String,
    pub sender: UserSummary,
    pub status: RequestStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
}

/// Guard for sending a new request.
///
/// The duplicate check is directional on purpose: a pending request in the
/// opposite direction does not block this one.
pub fn ensure_sendable(
    sender: &UserDoc,
    recipient_id: &ObjectId,
    pending_exists: bool,
) -> Result<()> {
    if sender.id.as_ref() == Some(recipient_id) {
        return Err(ApiError::InvalidOperation(
            "You cannot send a connection request to yourself".into(),
        ));
    }
    if sender.is_connected_to(recipient_id) {
        return Err(ApiError::Conflict("You are already connected".into()));
    }
    if pending_exists {
        return Err(ApiError::Conflict(
            "A connection request already exists".into(),
        ));
    }
    Ok(())
}

/// Guard for accepting or rejecting a request.
pub fn ensure_actionable(request: &ConnectionRequestDoc, acting_user: &ObjectId) -> Result<()> {
    if &request.recipient != acting_user {
        return Err(ApiError::Forbidden(
            "Not authorized to respond to this request".into(),
        ));
    }
    if request.status != RequestStatus::Pending {
        return Err(ApiError::InvalidOperation(format!(
            "This request has already been {}",
            match request.status {
                RequestStatus::Accepted => "accepted",
                RequestStatus::Rejected => "rejected",
                RequestStatus::Pending => "processed",
            }
        )));
    }
    Ok(())
}

/// Resolve the relationship status from the current user's view.
pub fn resolve_status(
    current: &UserDoc,
    target: &ObjectId,
    pending: Option<&ConnectionRequestDoc>,
) -> ConnectionStatus {
    if current.is_connected_to(target) {
        return ConnectionStatus::Connected;
    }
    match pending {
        Some(req) if Some(&req.sender) == current.id.as_ref() => ConnectionStatus::Pending,
        Some(req) => ConnectionStatus::Received {
            request_id: req.id.map(|id| id.to_hex()).unwrap_or_default(),
        },
        None => ConnectionStatus::NotConnected,
    }
}

/// Create a pending request from `sender` to `recipient_id`.
pub async fn send_request(
    mongo: &MongoClient,
    sender: &UserDoc,
    recipient_id: ObjectId,
) -> Result<ObjectId> {
    let users = mongo.collection::<UserDoc>(USER_COLLECTION).await?;
    let requests = mongo
        .collection::<ConnectionRequestDoc>(CONNECTION_REQUEST_COLLECTION)
        .await?;

    if users
        .find_one(doc! { "_id": recipient_id })
        .await?
        .is_none()
    {
        return Err(ApiError::NotFound("User not found".into()));
    }

    let sender_id = sender
        .id
        .ok_or_else(|| ApiError::Internal("Authenticated user has no id".into()))?;

    let pending = requests
        .find_one(doc! {
            "sender": sender_id,
            "recipient": recipient_id,
            "status": "pending",
        })
        .await?;

    ensure_sendable(sender, &recipient_id, pending.is_some())?;

    requests
        .insert_one(ConnectionRequestDoc::new(sender_id, recipient_id))
        .await
}

/// Accept a pending request addressed to `acting_user`.
///
/// Returns the sender's user document so callers can notify them.
pub async fn accept_request(
    mongo: &MongoClient,
    request_id: ObjectId,
    acting_user: &UserDoc,
) -> Result<UserDoc> {
    let requests = mongo
        .collection::<ConnectionRequestDoc>(CONNECTION_REQUEST_COLLECTION)
        .await?;
    let users = mongo.collection::<UserDoc>(USER_COLLECTION).await?;
    let notifications = mongo
        .collection::<NotificationDoc>(NOTIFICATION_COLLECTION)
        .await?;

    let request = requests
        .find_one(doc! { "_id": request_id })
        .await?
        .ok_or_else(|| ApiError::NotFound("Connection request not found".into()))?;

    let acting_id = acting_user
        .id
        .ok_or_else(|| ApiError::Internal("Authenticated user has no id".into()))?;

    ensure_actionable(&request, &acting_id)?;

    let sender = users
        .find_one(doc! { "_id": request.sender })
        .await?
        .ok_or_else(|| ApiError::NotFound("Sender no longer exists".into()))?;

    requests
        .update_one(
            doc! { "_id": request_id },
            doc! { "$set": { "status": "accepted", "metadata.updated_at": bson::DateTime::now() } },
        )
        .await?;

    link_users(mongo, &request.sender, &request.recipient).await?;

    notifications
        .insert_one(NotificationDoc::new(
            request.sender,
            NotificationKind::ConnectionAccepted,
            request.recipient,
            None,
        ))
        .await?;

    Ok(sender)
}

/// Reject a pending request addressed to `acting_user`.
pub async fn reject_request(
    mongo: &MongoClient,
    request_id: ObjectId,
    acting_user: &UserDoc,
) -> Result<()> {
    let requests = mongo
        .collection::<ConnectionRequestDoc>(CONNECTION_REQUEST_COLLECTION)
        .await?;

    let request = requests
        .find_one(doc! { "_id": request_id })
        .await?
        .ok_or_else(|| ApiError::NotFound("Connection request not found".into()))?;

    let acting_id = acting_user
        .id
        .ok_or_else(|| ApiError::Internal("Authenticated user has no id".into()))?;

    ensure_actionable(&request, &acting_id)?;

    requests
        .update_one(
            doc! { "_id": request_id },
            doc! { "$set": { "status": "rejected", "metadata.updated_at": bson::DateTime::now() } },
        )
        .await?;

    Ok(())
}

/// Remove the edge between two users. Idempotent; the request ledger is
/// left untouched as an audit trail.
pub async fn remove_connection(mongo: &MongoClient, a: &ObjectId, b: &ObjectId) -> Result<()> {
    unlink_users(mongo, a, b).await
}

/// Relationship status between the current user and `target`.
pub async fn status(
    mongo: &MongoClient,
    current: &UserDoc,
    target: &ObjectId,
) -> Result<ConnectionStatus> {
    if current.is_connected_to(target) {
        return Ok(ConnectionStatus::Connected);
    }

    let requests = mongo
        .collection::<ConnectionRequestDoc>(CONNECTION_REQUEST_COLLECTION)
        .await?;

    let current_id = current
        .id
        .ok_or_else(|| ApiError::Internal("Authenticated user has no id".into()))?;

    let pending = requests
        .find_one(doc! {
            "$or": [
                { "sender": current_id, "recipient": target },
                { "sender": target, "recipient": current_id },
            ],
            "status": "pending",
        })
        .await?;

    Ok(resolve_status(current, target, pending.as_ref()))
}

/// Pending requests addressed to `recipient`, senders hydrated.
pub async fn pending_for(mongo: &MongoClient, recipient: &ObjectId) -> Result<Vec<PendingRequest>> {
    let requests = mongo
        .collection::<ConnectionRequestDoc>(CONNECTION_REQUEST_COLLECTION)
        .await?;
    let users = mongo.collection::<UserDoc>(USER_COLLECTION).await?;

    let pending = requests
        .find_many_sorted(
            doc! { "recipient": recipient, "status": "pending" },
            Some(doc! { "metadata.created_at": -1 }),
            None,
        )
        .await?;

    let mut hydrated = Vec::with_capacity(pending.len());
    for request in pending {
        let Some(sender) = users.find_one(doc! { "_id": request.sender }).await? else {
            continue;
        };
        hydrated.push(PendingRequest {
            id: request.id.map(|id| id.to_hex()).unwrap_or_default(),
            sender: UserSummary::from(&sender),
            status: request.status,
            created_at: request
                .metadata
                .created_at
                .and_then(|dt| dt.try_to_rfc3339_string().ok()),
        });
    }

    Ok(hydrated)
}

/// The user's connections as summaries.
pub async fn connections_of(mongo: &MongoClient, user: &UserDoc) -> Result<Vec<UserSummary>> {
    let users = mongo.collection::<UserDoc>(USER_COLLECTION).await?;

    let connected = users
        .find_many(doc! { "_id": { "$in": user.connections.clone() } })
        .await?;

    Ok(connected.iter().map(UserSummary::from).collect())
}

/// Add each user to the other's connection list, atomically when possible.
async fn link_users(mongo: &MongoClient, a: &ObjectId, b: &ObjectId) -> Result<()> {
    dual_update(
        mongo,
        *a,
        doc! { "$addToSet": { "connections": b } },
        *b,
        doc! { "$addToSet": { "connections": a } },
    )
    .await
}

/// Remove each user from the other's connection list.
async fn unlink_users(mongo: &MongoClient, a: &ObjectId, b: &ObjectId) -> Result<()> {
    dual_update(
        mongo,
        *a,
        doc! { "$pull": { "connections": b } },
        *b,
        doc! { "$pull": { "connections": a } },
    )
    .await
}

/// Apply two user updates inside one transaction, falling back to
/// sequential updates when the topology does not support transactions.
async fn dual_update(
    mongo: &MongoClient,
    first_id: ObjectId,
    first_update: bson::Document,
    second_id: ObjectId,
    second_update: bson::Document,
) -> Result<()> {
    let raw_users = mongo
        .inner()
        .database(mongo.db_name())
        .collection::<UserDoc>(USER_COLLECTION);

    let transactional = async {
        let mut session = mongo.inner().start_session().await?;
        session.start_transaction().await?;

        let applied = async {
            raw_users
                .update_one(doc! { "_id": first_id }, first_update.clone())
                .session(&mut session)
                .await?;
            raw_users
                .update_one(doc! { "_id": second_id }, second_update.clone())
                .session(&mut session)
                .await?;
            session.commit_transaction().await
        }
        .await;

        if applied.is_err() {
            let _ = session.abort_transaction().await;
        }
        applied
    }
    .await;

    if let Err(e) = transactional {
        // Standalone deployments reject transactions; apply both writes
        // sequentially instead.
        warn!(
            "Transactional connection update failed ({}), applying sequentially",
            e
        );
        raw_users
            .update_one(doc! { "_id": first_id }, first_update)
            .await
            .map_err(|e| ApiError::Database(format!("Update failed: {}", e)))?;
        raw_users
            .update_one(doc! { "_id": second_id }, second_update)
            .await
            .map_err(|e| ApiError::Database(format!("Update failed: {}", e)))?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user_with_id(id: ObjectId) -> UserDoc {
        let mut user = UserDoc::new(
            "Test User".to_string(),
            "test".to_string(),
            "test@example.com".to_string(),
            "hash".to_string(),
        );
        user.id = Some(id);
        user
    }

    #[test]
    fn sending_to_self_is_invalid() {
        let id = ObjectId::new();
        let user = user_with_id(id);
        let err = ensure_sendable(&user, &id, false).unwrap_err();
        assert!(matches!(err, ApiError::InvalidOperation(_)));
    }

    #[test]
    fn sending_to_existing_connection_conflicts() {
        let mut user = user_with_id(ObjectId::new());
        let other = ObjectId::new();
        user.connections.push(other);
        let err = ensure_sendable(&user, &other, false).unwrap_err();
        assert!(matches!(err, ApiError::Conflict(_)));
    }

    #[test]
    fn duplicate_pending_request_conflicts() {
        let user = user_with_id(ObjectId::new());
        let other = ObjectId::new();
        let err = ensure_sendable(&user, &other, true).unwrap_err();
        assert!(matches!(err, ApiError::Conflict(_)));
    }

    #[test]
    fn fresh_request_is_sendable() {
        let user = user_with_id(ObjectId::new());
        let other = ObjectId::new();
        assert!(ensure_sendable(&user, &other, false).is_ok());
    }

    #[test]
    fn only_recipient_may_act() {
        let request = ConnectionRequestDoc::new(ObjectId::new(), ObjectId::new());
        let stranger = ObjectId::new();
        let err = ensure_actionable(&request, &stranger).unwrap_err();
        assert!(matches!(err, ApiError::Forbidden(_)));
    }

    #[test]
    fn settled_request_cannot_be_reacted() {
        let recipient = ObjectId::new();
        let mut request = ConnectionRequestDoc::new(ObjectId::new(), recipient);
        request.status = RequestStatus::Accepted;
        let err = ensure_actionable(&request, &recipient).unwrap_err();
        assert!(matches!(err, ApiError::InvalidOperation(_)));

        request.status = RequestStatus::Rejected;
        let err = ensure_actionable(&request, &recipient).unwrap_err();
        assert!(matches!(err, ApiError::InvalidOperation(_)));
    }

    #[test]
    fn pending_request_for_recipient_is_actionable() {
        let recipient = ObjectId::new();
        let request = ConnectionRequestDoc::new(ObjectId::new(), recipient);
        assert!(ensure_actionable(&request, &recipient).is_ok());
    }

    #[test]
    fn connected_users_resolve_connected() {
        let mut user = user_with_id(ObjectId::new());
        let target = ObjectId::new();
        user.connections.push(target);
        assert_eq!(
            resolve_status(&user, &target, None),
            ConnectionStatus::Connected
        );
    }

    #[test]
    fn outbound_pending_resolves_pending() {
        let sender_id = ObjectId::new();
        let target = ObjectId::new();
        let user = user_with_id(sender_id);
        let request = ConnectionRequestDoc::new(sender_id, target);
        assert_eq!(
            resolve_status(&user, &target, Some(&request)),
            ConnectionStatus::Pending
        );
    }

    #[test]
    fn inbound_pending_resolves_received_with_id() {
        let current_id = ObjectId::new();
        let target = ObjectId::new();
        let user = user_with_id(current_id);
        let mut request = ConnectionRequestDoc::new(target, current_id);
        let request_id = ObjectId::new();
        request.id = Some(request_id);
        assert_eq!(
            resolve_status(&user, &target, Some(&request)),
            ConnectionStatus::Received {
                request_id: request_id.to_hex()
            }
        );
    }

    #[test]
    fn strangers_resolve_not_connected() {
        let user = user_with_id(ObjectId::new());
        assert_eq!(
            resolve_status(&user, &ObjectId::new(), None),
            ConnectionStatus::NotConnected
        );
    }

    #[test]
    fn status_serializes_snake_case_tag() {
        let json = serde_json::to_string(&ConnectionStatus::NotConnected).unwrap();
        assert_eq!(json, "{\"status\":\"not_connected\"}");

        let json = serde_json::to_string(&ConnectionStatus::Received {
            request_id: "abc".to_string(),
        })
        .unwrap();
        assert!(json.contains("\"status\":\"received\""));
        assert!(json.contains("\"request_id\":\"abc\""));
    }
}
