use bson::{doc, oid::ObjectId, Document};
use mongodb::options::IndexOptions;
use serde::{Deserialize, Serialize};

use super::metadata::Metadata;
use crate::db::mongo::{IntoIndexes, MutMetadata};

pub const CONNECTION_REQUEST_COLLECTION: &str = "connection_requests";

/// Lifecycle status of a connection request.
///
/// Transitions are one-way: pending may become accepted or rejected,
/// after which the record is immutable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestStatus {
    Pending,
    Accepted,
    Rejected,
}

/// A directional connection request from sender to recipient
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionRequestDoc {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub sender: ObjectId,
    pub recipient: ObjectId,
    pub status: RequestStatus,
    #[serde(default)]
    pub metadata: Metadata,
}

impl ConnectionRequestDoc {
    pub fn new(sender: ObjectId, recipient: ObjectId) -> Self {
        Self {
            id: None,
            sender,
            recipient,
            status: RequestStatus::Pending,
            metadata: Metadata::default(),
        }
    }
}

impl IntoIndexes for ConnectionRequestDoc {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        vec![
            (doc! { "sender": 1, "recipient": 1, "status": 1 }, None),
            (doc! { "recipient": 1, "status": 1 }, None),
        ]
    }
}

impl MutMetadata for ConnectionRequestDoc {
    fn mut_metadata(&mut self) -> &mut Metadata {
        &mut self.metadata
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_serializes_lowercase() {
        assert_eq!(
            serde_json::to_string(&RequestStatus::Pending).unwrap(),
            "\"pending\""
        );
        assert_eq!(
            serde_json::to_string(&RequestStatus::Accepted).unwrap(),
            "\"accepted\""
        );
        assert_eq!(
            serde_json::to_string(&RequestStatus::Rejected).unwrap(),
            "\"rejected\""
        );
    }

    #[test]
    fn new_request_starts_pending() {
        let req = ConnectionRequestDoc::new(ObjectId::new(), ObjectId::new());
        assert_eq!(req.status, RequestStatus::Pending);
        assert!(req.id.is_none());
    }
}
