use bson::DateTime;
use serde::{Deserialize, Serialize};

/// Common document metadata for soft deletion and audit timestamps
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Metadata {
    pub is_deleted: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<DateTime>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime>,
}
