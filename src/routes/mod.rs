//! HTTP route handlers.

pub mod auth_routes;
pub mod connections;
pub mod health;
pub mod notifications;
pub mod posts;
pub mod users;

use std::collections::HashMap;

use bson::{doc, oid::ObjectId};
use bytes::Bytes;
use http_body_util::{BodyExt, Full, Limited};
use hyper::body::Incoming;
use hyper::{Request, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::db::mongo::MongoClient;
use crate::db::schemas::{UserDoc, UserSummary, USER_COLLECTION};
use crate::types::{ApiError, Result};

/// Request bodies above this size abort during the read (image data
/// payloads arrive through this path).
const MAX_BODY_BYTES: usize = 10 * 1024 * 1024;

/// Deserialize a JSON request body, capped at 10 MiB.
pub async fn parse_json_body<T: DeserializeOwned>(req: Request<Incoming>) -> Result<T> {
    from_json_body(req.into_body()).await
}

async fn from_json_body<T, B>(body: B) -> Result<T>
where
    T: DeserializeOwned,
    B: hyper::body::Body,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    // Limited stops buffering as soon as the cap is crossed, so a hostile
    // client cannot make us allocate an unbounded body.
    let collected = Limited::new(body, MAX_BODY_BYTES)
        .collect()
        .await
        .map_err(|_| ApiError::BadRequest("Request body too large".into()))?;

    serde_json::from_slice(&collected.to_bytes())
        .map_err(|e| ApiError::BadRequest(format!("Invalid JSON body: {}", e)))
}

/// Serialize a value as a JSON response.
pub fn json_response<T: Serialize>(status: StatusCode, body: &T) -> Response<Full<Bytes>> {
    let json = serde_json::to_string(body).unwrap_or_else(|_| "{}".to_string());

    Response::builder()
        .status(status)
        .header("Content-Type", "application/json")
        .body(Full::new(Bytes::from(json)))
        .unwrap()
}

/// A `{ "message": ... }` JSON response.
pub fn message_response(status: StatusCode, message: &str) -> Response<Full<Bytes>> {
    json_response(status, &serde_json::json!({ "message": message }))
}

/// Parse a hex ObjectId path parameter.
pub fn parse_object_id(raw: &str, what: &str) -> Result<ObjectId> {
    ObjectId::parse_str(raw).map_err(|_| ApiError::BadRequest(format!("Invalid {} id", what)))
}

/// The trailing path parameter after `prefix`, if the remainder is a single
/// segment.
pub fn path_param<'a>(path: &'a str, prefix: &str) -> Option<&'a str> {
    let rest = path.strip_prefix(prefix)?;
    if rest.is_empty() || rest.contains('/') {
        return None;
    }
    Some(rest)
}

/// Fetch user summaries for a set of ids, keyed by id. Missing users are
/// simply absent from the map.
pub async fn fetch_user_summaries(
    mongo: &MongoClient,
    ids: &[ObjectId],
) -> Result<HashMap<ObjectId, UserSummary>> {
    if ids.is_empty() {
        return Ok(HashMap::new());
    }

    let users = mongo.collection::<UserDoc>(USER_COLLECTION).await?;
    let docs = users
        .find_many(doc! { "_id": { "$in": ids.to_vec() } })
        .await?;

    Ok(docs
        .iter()
        .filter_map(|u| u.id.map(|id| (id, UserSummary::from(u))))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn path_param_extracts_single_trailing_segment() {
        assert_eq!(
            path_param("/connections/accept/abc123", "/connections/accept/"),
            Some("abc123")
        );
        assert_eq!(path_param("/connections/accept/", "/connections/accept/"), None);
        assert_eq!(
            path_param("/connections/accept/a/b", "/connections/accept/"),
            None
        );
        assert_eq!(path_param("/other", "/connections/accept/"), None);
    }

    #[test]
    fn malformed_object_id_is_a_bad_request() {
        let err = parse_object_id("not-an-id", "post").unwrap_err();
        assert!(matches!(err, ApiError::BadRequest(_)));

        let id = ObjectId::new();
        assert_eq!(parse_object_id(&id.to_hex(), "post").unwrap(), id);
    }

    #[tokio::test]
    async fn json_body_within_cap_parses() {
        let body = Full::new(Bytes::from(r#"{"content":"hello"}"#));
        let value: serde_json::Value = from_json_body(body).await.unwrap();
        assert_eq!(value["content"], "hello");
    }

    #[tokio::test]
    async fn oversized_body_is_rejected() {
        let body = Full::new(Bytes::from(vec![b'a'; MAX_BODY_BYTES + 1]));
        let err = from_json_body::<serde_json::Value, _>(body)
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::BadRequest(_)));
    }

    #[tokio::test]
    async fn malformed_json_body_is_a_bad_request() {
        let body = Full::new(Bytes::from("{not json"));
        let err = from_json_body::<serde_json::Value, _>(body)
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::BadRequest(_)));
    }
}
