// src/ingest/image.rs
use anyhow::{anyhow, Context, Result};
use base64::engine::general_purpose::STANDARD as B64;
use base64::Engine as _;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::ImageSource;

pub const DEFAULT_IMAGES_URL: &str = "https://api.openai.com/v1/images/generations";

#[derive(Clone)]
pub struct OpenAiImageSource {
    api_url: String,
    api_key: String,
    model: String,
    size: String,
    quality: String,
    client: Client,
    timeout: Duration,
}

impl OpenAiImageSource {
    pub fn new(api_key: String) -> Self {
        Self {
            api_url: DEFAULT_IMAGES_URL.to_string(),
            api_key,
            model: "gpt-image-1".to_string(),
            size: "1536x1024".to_string(),
            quality: "medium".to_string(),
            client: Client::new(),
            timeout: Duration::from_secs(120),
        }
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.api_url = url.into();
        self
    }

    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout = Duration::from_secs(secs);
        self
    }

    pub fn with_quality(mut self, quality: impl Into<String>) -> Self {
        self.quality = quality.into();
        self
    }

    /// The service answers with inline base64 or with a URL to fetch.
    async fn bytes_of(&self, item: ImageItem) -> Result<Vec<u8>> {
        if let Some(b64) = item.b64_json.filter(|s| !s.is_empty()) {
            return B64.decode(b64.as_bytes()).context("decoding b64_json image");
        }
        if let Some(url) = item.url.filter(|s| !s.is_empty()) {
            let bytes = self
                .client
                .get(&url)
                .timeout(Duration::from_secs(30))
                .send()
                .await
                .context("downloading generated image")?
                .error_for_status()
                .context("image download HTTP error")?
                .bytes()
                .await?;
            return Ok(bytes.to_vec());
        }
        Err(anyhow!("image reply carries neither b64_json nor url"))
    }
}

#[async_trait::async_trait]
impl ImageSource for OpenAiImageSource {
    async fn generate(&self, prompt: &str) -> Result<Vec<u8>> {
        let body = ImageRequest {
            model: &self.model,
            prompt,
            size: &self.size,
            quality: &self.quality,
            n: 1,
        };
        let reply: ImageReply = self
            .client
            .post(&self.api_url)
            .bearer_auth(&self.api_key)
            .timeout(self.timeout)
            .json(&body)
            .send()
            .await
            .context("image request failed")?
            .error_for_status()
            .context("image service HTTP error")?
            .json()
            .await
            .context("image reply body")?;

        let item = reply
            .data
            .into_iter()
            .next()
            .ok_or_else(|| anyhow!("image reply has no data"))?;
        let bytes = self.bytes_of(item).await?;
        tracing::info!(target: "ingest", bytes = bytes.len(), "comic image generated");
        Ok(bytes)
    }

    fn name(&self) -> &'static str {
        "openai-images"
    }
}

#[derive(Serialize)]
struct ImageRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    size: &'a str,
    quality: &'a str,
    n: u8,
}

#[derive(Deserialize)]
struct ImageReply {
    #[serde(default)]
    data: Vec<ImageItem>,
}

#[derive(Deserialize)]
struct ImageItem {
    b64_json: Option<String>,
    url: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn inline_base64_is_decoded() {
        let src = OpenAiImageSource::new("k".into());
        let item = ImageItem {
            b64_json: Some(B64.encode(b"\x89PNG")),
            url: None,
        };
        assert_eq!(src.bytes_of(item).await.unwrap(), b"\x89PNG".to_vec());
    }

    #[tokio::test]
    async fn empty_item_is_error() {
        let src = OpenAiImageSource::new("k".into());
        let item = ImageItem {
            b64_json: None,
            url: None,
        };
        assert!(src.bytes_of(item).await.is_err());
    }
}
