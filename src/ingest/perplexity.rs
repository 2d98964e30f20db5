// src/ingest/perplexity.rs
use anyhow::{anyhow, Context, Result};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::{NewsRequest, NewsSource};

pub const DEFAULT_API_URL: &str = "https://api.perplexity.ai/chat/completions";
pub const DEFAULT_MODEL: &str = "sonar-pro";

/// Research service speaking the OpenAI-compatible chat completions dialect.
#[derive(Clone)]
pub struct PerplexityNewsSource {
    api_url: String,
    api_key: String,
    model: String,
    client: Client,
    timeout: Duration,
    max_retries: u8,
}

impl PerplexityNewsSource {
    pub fn new(api_key: String) -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            api_key,
            model: DEFAULT_MODEL.to_string(),
            client: Client::new(),
            timeout: Duration::from_secs(300),
            max_retries: 3,
        }
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.api_url = url.into();
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout = Duration::from_secs(secs);
        self
    }

    pub fn with_retries(mut self, retries: u8) -> Self {
        self.max_retries = retries.max(1);
        self
    }

    fn body<'a>(&'a self, req: &'a NewsRequest) -> ChatRequest<'a> {
        ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: &req.system,
                },
                ChatMessage {
                    role: "user",
                    content: &req.prompt,
                },
            ],
            max_tokens: req.max_tokens,
            temperature: 0.2,
            top_p: 0.9,
        }
    }

    async fn send_once(&self, body: &ChatRequest<'_>) -> Result<String> {
        let rsp = self
            .client
            .post(&self.api_url)
            .bearer_auth(&self.api_key)
            .timeout(self.timeout)
            .json(body)
            .send()
            .await
            .context("perplexity request failed")?
            .error_for_status()
            .context("perplexity HTTP error")?;
        let reply: ChatReply = rsp.json().await.context("perplexity reply body")?;
        first_choice(reply)
    }
}

#[async_trait::async_trait]
impl NewsSource for PerplexityNewsSource {
    async fn fetch(&self, req: &NewsRequest) -> Result<String> {
        let body = self.body(req);
        let mut attempt: u8 = 0;
        loop {
            attempt += 1;
            match self.send_once(&body).await {
                Ok(content) => {
                    tracing::debug!(
                        target: "ingest",
                        len = content.chars().count(),
                        has_sources_header = content.contains(crate::parse::SOURCES_HEADER),
                        has_markers = content.contains("[1]"),
                        "research reply received"
                    );
                    return Ok(content);
                }
                Err(e) if attempt < self.max_retries => {
                    tracing::warn!(target: "ingest", attempt, error = %e, "research request failed, retrying");
                    tokio::time::sleep(Duration::from_millis(500u64 << (attempt - 1))).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    fn name(&self) -> &'static str {
        "perplexity"
    }
}

fn first_choice(reply: ChatReply) -> Result<String> {
    reply
        .choices
        .into_iter()
        .next()
        .map(|c| c.message.content)
        .ok_or_else(|| anyhow!("reply has no choices"))
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    max_tokens: u32,
    temperature: f32,
    top_p: f32,
}

#[derive(Deserialize)]
struct ChatReply {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatReplyMessage,
}

#[derive(Deserialize)]
struct ChatReplyMessage {
    #[serde(default)]
    content: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_body_carries_both_messages() {
        let src = PerplexityNewsSource::new("k".into()).with_model("sonar");
        let req = NewsRequest {
            system: "sys".into(),
            prompt: "ask".into(),
            max_tokens: 900,
        };
        let v = serde_json::to_value(src.body(&req)).unwrap();
        assert_eq!(v["model"], "sonar");
        assert_eq!(v["messages"][0]["role"], "system");
        assert_eq!(v["messages"][1]["content"], "ask");
        assert_eq!(v["max_tokens"], 900);
    }

    #[test]
    fn reply_content_is_first_choice() {
        let reply: ChatReply = serde_json::from_str(
            r#"{"choices":[{"message":{"role":"assistant","content":"📜 Закон"}}]}"#,
        )
        .unwrap();
        assert_eq!(first_choice(reply).unwrap(), "📜 Закон");
    }

    #[test]
    fn reply_without_choices_is_error() {
        let reply: ChatReply = serde_json::from_str(r#"{"id":"x"}"#).unwrap();
        assert!(first_choice(reply).is_err());
    }
}
