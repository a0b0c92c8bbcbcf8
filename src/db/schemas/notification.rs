use bson::{doc, oid::ObjectId, Document};
use mongodb::options::IndexOptions;
use serde::{Deserialize, Serialize};

use super::metadata::Metadata;
use crate::db::mongo::{IntoIndexes, MutMetadata};

pub const NOTIFICATION_COLLECTION: &str = "notifications";

/// Event kinds surfaced to a user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum NotificationKind {
    ConnectionAccepted,
    Like,
    Comment,
}

/// A notification addressed to a single recipient
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationDoc {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub recipient: ObjectId,
    pub kind: NotificationKind,
    pub related_user: ObjectId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub related_post: Option<ObjectId>,
    #[serde(default)]
    pub is_read: bool,
    #[serde(default)]
    pub metadata: Metadata,
}

impl NotificationDoc {
    pub fn new(
        recipient: ObjectId,
        kind: NotificationKind,
        related_user: ObjectId,
        related_post: Option<ObjectId>,
    ) -> Self {
        Self {
            id: None,
            recipient,
            kind,
            related_user,
            related_post,
            is_read: false,
            metadata: Metadata::default(),
        }
    }
}

impl IntoIndexes for NotificationDoc {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        vec![(doc! { "recipient": 1 }, None)]
    }
}

impl MutMetadata for NotificationDoc {
    fn mut_metadata(&mut self) -> &mut Metadata {
        &mut self.metadata
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_serializes_camel_case() {
        assert_eq!(
            serde_json::to_string(&NotificationKind::ConnectionAccepted).unwrap(),
            "\"connectionAccepted\""
        );
        assert_eq!(
            serde_json::to_string(&NotificationKind::Like).unwrap(),
            "\"like\""
        );
        assert_eq!(
            serde_json::to_string(&NotificationKind::Comment).unwrap(),
            "\"comment\""
        );
    }

    #[test]
    fn new_notification_is_unread() {
        let n = NotificationDoc::new(
            ObjectId::new(),
            NotificationKind::Like,
            ObjectId::new(),
            Some(ObjectId::new()),
        );
        assert!(!n.is_read);
    }
}
