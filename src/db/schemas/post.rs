use bson::{doc, oid::ObjectId, DateTime, Document};
use mongodb::options::IndexOptions;
use serde::{Deserialize, Serialize};

use super::metadata::Metadata;
use crate::db::mongo::{IntoIndexes, MutMetadata};

pub const POST_COLLECTION: &str = "posts";

/// A comment embedded in a post, append-only
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Comment {
    pub user: ObjectId,
    pub content: String,
    pub created_at: DateTime,
}

/// A feed post
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostDoc {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub author: ObjectId,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(default)]
    pub likes: Vec<ObjectId>,
    #[serde(default)]
    pub comments: Vec<Comment>,
    #[serde(default)]
    pub metadata: Metadata,
}

impl PostDoc {
    pub fn new(author: ObjectId, content: String, image: Option<String>) -> Self {
        Self {
            id: None,
            author,
            content,
            image,
            likes: Vec::new(),
            comments: Vec::new(),
            metadata: Metadata::default(),
        }
    }

    pub fn is_liked_by(&self, user: &ObjectId) -> bool {
        self.likes.contains(user)
    }
}

impl IntoIndexes for PostDoc {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        vec![
            (doc! { "author": 1 }, None),
            (doc! { "metadata.created_at": -1 }, None),
        ]
    }
}

impl MutMetadata for PostDoc {
    fn mut_metadata(&mut self) -> &mut Metadata {
        &mut self.metadata
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_post_has_no_likes_or_comments() {
        let post = PostDoc::new(ObjectId::new(), "hello".to_string(), None);
        assert!(post.likes.is_empty());
        assert!(post.comments.is_empty());
        assert!(post.image.is_none());
    }

    #[test]
    fn is_liked_by_checks_membership() {
        let mut post = PostDoc::new(ObjectId::new(), "hello".to_string(), None);
        let user = ObjectId::new();
        assert!(!post.is_liked_by(&user));
        post.likes.push(user);
        assert!(post.is_liked_by(&user));
    }
}
