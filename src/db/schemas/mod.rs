pub mod connection_request;
pub mod metadata;
pub mod notification;
pub mod post;
pub mod user;

pub use connection_request::{
    ConnectionRequestDoc, RequestStatus, CONNECTION_REQUEST_COLLECTION,
};
pub use metadata::Metadata;
pub use notification::{NotificationDoc, NotificationKind, NOTIFICATION_COLLECTION};
pub use post::{Comment, PostDoc, POST_COLLECTION};
pub use user::{UserDoc, UserProfile, UserSummary, USER_COLLECTION};
