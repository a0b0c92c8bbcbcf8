use bson::{doc, oid::ObjectId, Document};
use mongodb::options::IndexOptions;
use serde::{Deserialize, Serialize};

use super::metadata::Metadata;
use crate::db::mongo::{IntoIndexes, MutMetadata};

pub const USER_COLLECTION: &str = "users";

pub const DEFAULT_HEADLINE: &str = "Lattice user";
pub const DEFAULT_LOCATION: &str = "Earth";

/// A position held at a company
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Experience {
    pub title: String,
    pub company: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// An education entry
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Education {
    pub school: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field_of_study: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_year: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_year: Option<i32>,
}

/// User account document
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserDoc {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub name: String,
    pub username: String,
    pub email: String,
    /// Argon2id PHC string, never exposed through the API
    pub password_hash: String,
    #[serde(default)]
    pub headline: String,
    #[serde(default)]
    pub about: String,
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub profile_picture: String,
    #[serde(default)]
    pub banner_img: String,
    #[serde(default)]
    pub skills: Vec<String>,
    #[serde(default)]
    pub experience: Vec<Experience>,
    #[serde(default)]
    pub education: Vec<Education>,
    #[serde(default)]
    pub connections: Vec<ObjectId>,
    #[serde(default)]
    pub metadata: Metadata,
}

impl UserDoc {
    pub fn new(name: String, username: String, email: String, password_hash: String) -> Self {
        Self {
            id: None,
            name,
            username,
            email,
            password_hash,
            headline: DEFAULT_HEADLINE.to_string(),
            about: String::new(),
            location: DEFAULT_LOCATION.to_string(),
            profile_picture: String::new(),
            banner_img: String::new(),
            skills: Vec::new(),
            experience: Vec::new(),
            education: Vec::new(),
            connections: Vec::new(),
            metadata: Metadata::default(),
        }
    }

    pub fn is_connected_to(&self, other: &ObjectId) -> bool {
        self.connections.contains(other)
    }
}

impl IntoIndexes for UserDoc {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        vec![
            (
                doc! { "username": 1 },
                Some(IndexOptions::builder().unique(true).build()),
            ),
            (
                doc! { "email": 1 },
                Some(IndexOptions::builder().unique(true).build()),
            ),
        ]
    }
}

impl MutMetadata for UserDoc {
    fn mut_metadata(&mut self) -> &mut Metadata {
        &mut self.metadata
    }
}

/// Compact user rendering for lists and hydrated references
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserSummary {
    pub id: String,
    pub name: String,
    pub username: String,
    pub profile_picture: String,
    pub headline: String,
    pub connection_count: usize,
}

impl From<&UserDoc> for UserSummary {
    fn from(user: &UserDoc) -> Self {
        Self {
            id: user.id.map(|id| id.to_hex()).unwrap_or_default(),
            name: user.name.clone(),
            username: user.username.clone(),
            profile_picture: user.profile_picture.clone(),
            headline: user.headline.clone(),
            connection_count: user.connections.len(),
        }
    }
}

/// Full profile rendering, credentials excluded
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: String,
    pub name: String,
    pub username: String,
    pub email: String,
    pub headline: String,
    pub about: String,
    pub location: String,
    pub profile_picture: String,
    pub banner_img: String,
    pub skills: Vec<String>,
    pub experience: Vec<Experience>,
    pub education: Vec<Education>,
    pub connections: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
}

impl From<&UserDoc> for UserProfile {
    fn from(user: &UserDoc) -> Self {
        Self {
            id: user.id.map(|id| id.to_hex()).unwrap_or_default(),
            name: user.name.clone(),
            username: user.username.clone(),
            email: user.email.clone(),
            headline: user.headline.clone(),
            about: user.about.clone(),
            location: user.location.clone(),
            profile_picture: user.profile_picture.clone(),
            banner_img: user.banner_img.clone(),
            skills: user.skills.clone(),
            experience: user.experience.clone(),
            education: user.education.clone(),
            connections: user.connections.iter().map(|c| c.to_hex()).collect(),
            created_at: user
                .metadata
                .created_at
                .and_then(|dt| dt.try_to_rfc3339_string().ok()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_user() -> UserDoc {
        UserDoc::new(
            "Ada Lovelace".to_string(),
            "ada".to_string(),
            "ada@example.com".to_string(),
            "$argon2id$v=19$m=19456,t=2,p=1$abc$def".to_string(),
        )
    }

    #[test]
    fn new_user_gets_defaults() {
        let user = sample_user();
        assert_eq!(user.headline, DEFAULT_HEADLINE);
        assert_eq!(user.location, DEFAULT_LOCATION);
        assert!(user.connections.is_empty());
        assert!(!user.metadata.is_deleted);
    }

    #[test]
    fn summary_never_carries_credentials() {
        let mut user = sample_user();
        user.id = Some(ObjectId::new());
        let summary = UserSummary::from(&user);
        let json = serde_json::to_string(&summary).unwrap();
        assert!(!json.contains("argon2"));
        assert!(!json.contains("password"));
        assert_eq!(summary.connection_count, 0);
    }

    #[test]
    fn profile_never_carries_credentials() {
        let mut user = sample_user();
        user.id = Some(ObjectId::new());
        user.connections.push(ObjectId::new());
        let profile = UserProfile::from(&user);
        let json = serde_json::to_string(&profile).unwrap();
        assert!(!json.contains("argon2"));
        assert!(!json.contains("password"));
        assert_eq!(profile.connections.len(), 1);
    }

    #[test]
    fn is_connected_to_checks_membership() {
        let mut user = sample_user();
        let other = ObjectId::new();
        assert!(!user.is_connected_to(&other));
        user.connections.push(other);
        assert!(user.is_connected_to(&other));
    }

    #[test]
    fn unique_indexes_on_username_and_email() {
        let indices = UserDoc::into_indices();
        assert_eq!(indices.len(), 2);
        for (_, opts) in indices {
            assert_eq!(opts.unwrap().unique, Some(true));
        }
    }
}
