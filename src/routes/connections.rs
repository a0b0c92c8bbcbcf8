//! Connection request and graph endpoints.

use bytes::Bytes;
use http_body_util::Full;
use hyper::body::Incoming;
use hyper::{Method, Request, Response, StatusCode};
use std::sync::Arc;

use crate::auth::authenticate;
use crate::connections;
use crate::email::EmailJob;
use crate::server::AppState;
use crate::types::{ApiError, Result};

use super::{json_response, message_response, parse_object_id, path_param};

pub async fn handle(
    state: Arc<AppState>,
    req: Request<Incoming>,
    method: &Method,
    path: &str,
) -> Result<Response<Full<Bytes>>> {
    let user = authenticate(&state, &req).await?;

    if let Some(raw) = path_param(path, "/connections/request/") {
        if method == Method::POST {
            let recipient = parse_object_id(raw, "user")?;
            connections::send_request(&state.mongo, &user, recipient).await?;
            return Ok(message_response(
                StatusCode::CREATED,
                "Connection request sent successfully",
            ));
        }
    }

    if let Some(raw) = path_param(path, "/connections/accept/") {
        if method == Method::PUT {
            let request_id = parse_object_id(raw, "request")?;
            let sender = connections::accept_request(&state.mongo, request_id, &user).await?;

            let profile_url = format!("{}/profile/{}", state.args.client_url, user.username);
            state.mailer.enqueue(EmailJob::ConnectionAccepted {
                to: sender.email.clone(),
                sender_name: sender.name.clone(),
                recipient_name: user.name.clone(),
                profile_url,
            });

            return Ok(message_response(
                StatusCode::OK,
                "Connection accepted successfully",
            ));
        }
    }

    if let Some(raw) = path_param(path, "/connections/reject/") {
        if method == Method::PUT {
            let request_id = parse_object_id(raw, "request")?;
            connections::reject_request(&state.mongo, request_id, &user).await?;
            return Ok(message_response(
                StatusCode::OK,
                "Connection request rejected",
            ));
        }
    }

    if let Some(raw) = path_param(path, "/connections/remove/") {
        if method == Method::DELETE {
            let other = parse_object_id(raw, "user")?;
            let my_id = user
                .id
                .ok_or_else(|| ApiError::Internal("Authenticated user has no id".into()))?;
            connections::remove_connection(&state.mongo, &my_id, &other).await?;
            return Ok(message_response(
                StatusCode::OK,
                "Connection removed successfully",
            ));
        }
    }

    if let Some(raw) = path_param(path, "/connections/status/") {
        if method == Method::GET {
            let target = parse_object_id(raw, "user")?;
            let status = connections::status(&state.mongo, &user, &target).await?;
            return Ok(json_response(StatusCode::OK, &status));
        }
    }

    match (method, path) {
        (&Method::GET, "/connections") => {
            let list = connections::connections_of(&state.mongo, &user).await?;
            Ok(json_response(StatusCode::OK, &list))
        }
        (&Method::GET, "/connections/requests") => {
            let my_id = user
                .id
                .ok_or_else(|| ApiError::Internal("Authenticated user has no id".into()))?;
            let pending = connections::pending_for(&state.mongo, &my_id).await?;
            Ok(json_response(StatusCode::OK, &pending))
        }
        _ => Err(ApiError::NotFound(format!("No route for {}", path))),
    }
}
