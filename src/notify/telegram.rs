// src/notify/telegram.rs
use anyhow::{anyhow, Context, Result};
use reqwest::multipart::{Form, Part};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::Transport;

const DEFAULT_API_BASE: &str = "https://api.telegram.org";
const PHOTO_FILE_NAME: &str = "legal_comic.png";

/// Telegram Bot API transport posting HTML messages to one channel.
#[derive(Clone)]
pub struct TelegramTransport {
    api_base: String,
    token: String,
    chat_id: String,
    client: Client,
    timeout: Duration,
    max_retries: u8,
    pacing: Duration,
}

impl TelegramTransport {
    pub fn new(token: String, chat_id: String) -> Self {
        Self {
            api_base: DEFAULT_API_BASE.to_string(),
            token,
            chat_id,
            client: Client::new(),
            timeout: Duration::from_secs(30),
            max_retries: 3,
            pacing: Duration::from_secs(1),
        }
    }

    pub fn with_api_base(mut self, base: impl Into<String>) -> Self {
        self.api_base = base.into().trim_end_matches('/').to_string();
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

    pub fn with_pacing(mut self, pacing: Duration) -> Self {
        self.pacing = pacing;
        self
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/bot{}/{}", self.api_base, self.token, method)
    }

    /// Connection check: resolves the bot's username.
    pub async fn get_me(&self) -> Result<String> {
        let rsp: BotReply<BotUser> = self
            .client
            .get(self.method_url("getMe"))
            .timeout(self.timeout)
            .send()
            .await
            .context("telegram getMe request failed")?
            .error_for_status()
            .context("telegram getMe HTTP error")?
            .json()
            .await
            .context("telegram getMe body")?;
        match rsp.result {
            Some(user) if rsp.ok => Ok(user.username.unwrap_or_default()),
            _ => Err(anyhow!(
                "telegram getMe rejected: {}",
                rsp.description.unwrap_or_default()
            )),
        }
    }

    async fn backoff(attempt: u8) {
        tokio::time::sleep(Duration::from_millis(500u64 << (attempt - 1))).await;
    }
}

#[async_trait::async_trait]
impl Transport for TelegramTransport {
    async fn send_text(&self, text: &str) -> Result<()> {
        let payload = SendMessage {
            chat_id: &self.chat_id,
            text,
            parse_mode: "HTML",
            disable_web_page_preview: true,
        };

        let mut attempt: u8 = 0;
        loop {
            attempt += 1;
            let res = self
                .client
                .post(self.method_url("sendMessage"))
                .timeout(self.timeout)
                .json(&payload)
                .send()
                .await;

            match res {
                Ok(rsp) => {
                    if let Err(e) = rsp.error_for_status_ref() {
                        if attempt < self.max_retries {
                            Self::backoff(attempt).await;
                            continue;
                        }
                        return Err(anyhow!("telegram sendMessage HTTP error: {e}"));
                    }
                    tracing::debug!(target: "telegram", attempt, "text part sent");
                    return Ok(());
                }
                Err(e) => {
                    if attempt < self.max_retries {
                        Self::backoff(attempt).await;
                        continue;
                    }
                    return Err(anyhow!("telegram sendMessage request failed: {e}"));
                }
            }
        }
    }

    async fn send_photo(&self, image: &[u8], caption: Option<&str>) -> Result<()> {
        let mut attempt: u8 = 0;
        loop {
            attempt += 1;
            // multipart forms are consumed by send, rebuild per attempt
            let photo = Part::bytes(image.to_vec())
                .file_name(PHOTO_FILE_NAME)
                .mime_str("image/png")?;
            let mut form = Form::new()
                .text("chat_id", self.chat_id.clone())
                .part("photo", photo);
            if let Some(caption) = caption {
                form = form
                    .text("caption", caption.to_string())
                    .text("parse_mode", "HTML");
            }

            let res = self
                .client
                .post(self.method_url("sendPhoto"))
                .timeout(self.timeout)
                .multipart(form)
                .send()
                .await;

            match res {
                Ok(rsp) => {
                    if let Err(e) = rsp.error_for_status_ref() {
                        if attempt < self.max_retries {
                            Self::backoff(attempt).await;
                            continue;
                        }
                        return Err(anyhow!("telegram sendPhoto HTTP error: {e}"));
                    }
                    tracing::debug!(target: "telegram", attempt, captioned = caption.is_some(), "photo sent");
                    return Ok(());
                }
                Err(e) => {
                    if attempt < self.max_retries {
                        Self::backoff(attempt).await;
                        continue;
                    }
                    return Err(anyhow!("telegram sendPhoto request failed: {e}"));
                }
            }
        }
    }

    async fn pace(&self) {
        tokio::time::sleep(self.pacing).await;
    }

    fn name(&self) -> &'static str {
        "telegram"
    }
}

#[derive(Serialize)]
struct SendMessage<'a> {
    chat_id: &'a str,
    text: &'a str,
    parse_mode: &'a str,
    disable_web_page_preview: bool,
}

#[derive(Deserialize)]
struct BotReply<T> {
    ok: bool,
    result: Option<T>,
    description: Option<String>,
}

#[derive(Deserialize)]
struct BotUser {
    username: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn method_url_uses_token_and_trimmed_base() {
        let t = TelegramTransport::new("123:abc".into(), "@chan".into())
            .with_api_base("http://localhost:8081/");
        assert_eq!(t.method_url("sendMessage"), "http://localhost:8081/bot123:abc/sendMessage");
    }

    #[test]
    fn send_message_payload_is_html_without_preview() {
        let p = SendMessage {
            chat_id: "@chan",
            text: "<b>x</b>",
            parse_mode: "HTML",
            disable_web_page_preview: true,
        };
        let v = serde_json::to_value(&p).unwrap();
        assert_eq!(v["parse_mode"], "HTML");
        assert_eq!(v["disable_web_page_preview"], true);
        assert_eq!(v["chat_id"], "@chan");
    }
}
