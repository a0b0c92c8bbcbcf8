//! Opaque image host client: payload in, URL out.

use serde::Deserialize;
use serde_json::json;
use tracing::warn;

use crate::config::Args;
use crate::types::{ApiError, Result};

#[derive(Debug, Deserialize)]
struct UploadResponse {
    url: String,
}

/// Client for the configured image hosting API
#[derive(Clone)]
pub struct ImageHost {
    api_url: Option<String>,
    api_key: Option<String>,
    client: reqwest::Client,
}

impl ImageHost {
    pub fn new(args: &Args) -> Self {
        Self {
            api_url: args.image_api_url.clone(),
            api_key: args.image_api_key.clone(),
            client: reqwest::Client::new(),
        }
    }

    fn credentials(&self) -> Result<(&str, &str)> {
        match (&self.api_url, &self.api_key) {
            (Some(url), Some(key)) => Ok((url, key)),
            _ => Err(ApiError::Config(
                "Image host is not configured".to_string(),
            )),
        }
    }

    /// Upload an image payload (typically a data URL) and return its
    /// hosted URL.
    pub async fn upload(&self, payload: &str) -> Result<String> {
        let (url, key) = self.credentials()?;

        let resp = self
            .client
            .post(url)
            .header("api-key", key)
            .json(&json!({ "file": payload }))
            .send()
            .await?;

        if !resp.status().is_success() {
            return Err(ApiError::Http(format!(
                "Image upload failed with status {}",
                resp.status()
            )));
        }

        let body: UploadResponse = resp.json().await?;
        Ok(body.url)
    }

    /// Best-effort deletion of a previously uploaded image. Failures are
    /// logged and swallowed.
    pub async fn delete(&self, image_url: &str) {
        let Ok((url, key)) = self.credentials() else {
            return;
        };

        let result = self
            .client
            .delete(url)
            .header("api-key", key)
            .json(&json!({ "url": image_url }))
            .send()
            .await;

        match result {
            Ok(resp) if !resp.status().is_success() => {
                warn!("Image delete returned {} for {}", resp.status(), image_url);
            }
            Err(e) => {
                warn!("Image delete failed for {}: {}", image_url, e);
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[tokio::test]
    async fn upload_without_configuration_is_a_config_error() {
        let args = Args::parse_from(["lattice"]);
        let host = ImageHost::new(&args);
        let err = host.upload("data:image/png;base64,AAAA").await.unwrap_err();
        assert!(matches!(err, ApiError::Config(_)));
    }

    #[tokio::test]
    async fn delete_without_configuration_is_silent() {
        let args = Args::parse_from(["lattice"]);
        let host = ImageHost::new(&args);
        host.delete("https://img.example.com/x.png").await;
    }
}
