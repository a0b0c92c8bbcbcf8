//! HTTP server implementation
//!
//! Uses hyper http1 with TokioIo for async handling. Routing is a prefix
//! dispatch over the top-level path segment; each route module handles its
//! own sub-paths. CORS headers are applied centrally so the browser client
//! can send the session cookie cross-origin.

use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{error, info};

use crate::auth::SessionValidator;
use crate::config::Args;
use crate::db::mongo::MongoClient;
use crate::email::Mailer;
use crate::routes;
use crate::services::ImageHost;
use crate::types::{ApiError, Result};

pub type BoxBody = http_body_util::combinators::BoxBody<Bytes, hyper::Error>;

/// Shared application state
pub struct AppState {
    pub args: Args,
    pub mongo: MongoClient,
    pub sessions: SessionValidator,
    pub mailer: Mailer,
    pub images: ImageHost,
}

/// Start the HTTP server
pub async fn run(state: Arc<AppState>) -> Result<()> {
    let listener = TcpListener::bind(state.args.listen).await?;

    info!("Lattice listening on {}", state.args.listen);

    loop {
        match listener.accept().await {
            Ok((stream, addr)) => {
                let state = Arc::clone(&state);
                tokio::spawn(async move {
                    let io = TokioIo::new(stream);

                    let service = service_fn(move |req| {
                        let state = Arc::clone(&state);
                        async move { handle_request(state, addr, req).await }
                    });

                    if let Err(err) = http1::Builder::new()
                        .preserve_header_case(true)
                        .serve_connection(io, service)
                        .await
                    {
                        error!("Error serving connection from {}: {:?}", addr, err);
                    }
                });
            }
            Err(e) => {
                error!("Error accepting connection: {:?}", e);
            }
        }
    }
}

/// Route incoming HTTP requests
async fn handle_request(
    state: Arc<AppState>,
    addr: SocketAddr,
    req: Request<Incoming>,
) -> std::result::Result<Response<BoxBody>, hyper::Error> {
    let method = req.method().clone();
    let path = req.uri().path().split('?').next().unwrap_or("").to_string();

    info!("[{}] {} {}", addr, method, path);

    if method == Method::OPTIONS {
        return Ok(with_cors(&state, preflight_response()));
    }

    let result = match first_segment(&path) {
        "auth" => routes::auth_routes::handle(state.clone(), req, &method, &path).await,
        "connections" => routes::connections::handle(state.clone(), req, &method, &path).await,
        "notifications" => routes::notifications::handle(state.clone(), req, &method, &path).await,
        "posts" => routes::posts::handle(state.clone(), req, &method, &path).await,
        "users" => routes::users::handle(state.clone(), req, &method, &path).await,
        "health" if method == Method::GET => routes::health::health_check(&state).await,
        "version" if method == Method::GET => Ok(routes::health::version_info()),
        _ => Err(ApiError::NotFound(format!("No route for {}", path))),
    };

    let response = match result {
        Ok(response) => response,
        Err(e) => error_response(&e),
    };

    Ok(with_cors(&state, response))
}

fn first_segment(path: &str) -> &str {
    path.trim_start_matches('/')
        .split('/')
        .next()
        .unwrap_or("")
}

/// Render an error as a JSON response. Internal detail on 5xx errors is
/// logged and replaced with a generic message.
pub fn error_response(err: &ApiError) -> Response<Full<Bytes>> {
    let status = err.status_code();

    if status.is_server_error() {
        error!("Request failed: {}", err);
    }

    let body = serde_json::json!({ "message": err.public_message() });

    Response::builder()
        .status(status)
        .header("Content-Type", "application/json")
        .body(Full::new(Bytes::from(body.to_string())))
        .unwrap()
}

/// Add CORS headers for the configured browser client.
fn with_cors(state: &AppState, response: Response<Full<Bytes>>) -> Response<BoxBody> {
    let mut response = response;
    let headers = response.headers_mut();

    if let Ok(origin) = state.args.client_url.parse() {
        headers.insert("Access-Control-Allow-Origin", origin);
    }
    headers.insert(
        "Access-Control-Allow-Credentials",
        hyper::header::HeaderValue::from_static("true"),
    );

    response.map(|body| body.map_err(|never| match never {}).boxed())
}

fn preflight_response() -> Response<Full<Bytes>> {
    Response::builder()
        .status(StatusCode::NO_CONTENT)
        .header(
            "Access-Control-Allow-Methods",
            "GET, POST, PUT, DELETE, OPTIONS",
        )
        .header("Access-Control-Allow-Headers", "Content-Type, Authorization")
        .header("Access-Control-Max-Age", "86400")
        .body(Full::new(Bytes::new()))
        .unwrap()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_segment_extracts_route_prefix() {
        assert_eq!(first_segment("/auth/login"), "auth");
        assert_eq!(first_segment("/posts/123/comment"), "posts");
        assert_eq!(first_segment("/"), "");
    }

    #[test]
    fn server_errors_hide_detail() {
        let err = ApiError::Database("connection string leaked".to_string());
        let response = error_response(&err);
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn client_errors_keep_their_message() {
        let err = ApiError::NotFound("Post not found".to_string());
        let response = error_response(&err);
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
