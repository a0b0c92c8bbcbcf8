//! Liveness and build info endpoints.

use bytes::Bytes;
use http_body_util::Full;
use hyper::{Response, StatusCode};
use serde::Serialize;

use crate::server::AppState;
use crate::types::Result;

use super::json_response;

#[derive(Serialize)]
pub struct HealthResponse {
    pub healthy: bool,
    pub database: bool,
    pub version: &'static str,
    pub timestamp: String,
}

/// Liveness plus a database ping. The service reports healthy as long as
/// it is serving; database state is a separate field.
pub async fn health_check(state: &AppState) -> Result<Response<Full<Bytes>>> {
    let database = state.mongo.ping().await.is_ok();

    let body = HealthResponse {
        healthy: true,
        database,
        version: env!("CARGO_PKG_VERSION"),
        timestamp: chrono::Utc::now().to_rfc3339(),
    };

    Ok(json_response(StatusCode::OK, &body))
}

/// Build information captured at compile time.
pub fn version_info() -> Response<Full<Bytes>> {
    json_response(
        StatusCode::OK,
        &serde_json::json!({
            "version": env!("CARGO_PKG_VERSION"),
            "commit": env!("GIT_COMMIT_SHORT"),
            "built": env!("BUILD_TIMESTAMP"),
        }),
    )
}
