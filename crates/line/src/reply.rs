use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use thiserror::Error;

/// Platform limit for a single text message.
pub const MAX_TEXT_CHARS: usize = 5000;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ReplyError {
    #[error("reply request failed: {0}")]
    Transport(String),
    #[error("reply rejected with status {status}: {detail}")]
    Rejected { status: u16, detail: String },
}

/// Outbound channel addressed by the single-use reply token of an inbound event.
#[async_trait]
pub trait ReplyChannel: Send + Sync {
    async fn send(&self, reply_token: &str, text: &str) -> Result<(), ReplyError>;
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ReplyRequest<'a> {
    reply_token: &'a str,
    messages: [TextMessage<'a>; 1],
}

#[derive(Serialize)]
struct TextMessage<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    text: &'a str,
}

/// Messaging API reply client (`POST /v2/bot/message/reply`).
#[derive(Clone)]
pub struct LineReplyClient {
    http: Client,
    base_url: String,
    access_token: SecretString,
}

impl LineReplyClient {
    pub fn new(http: Client, base_url: impl Into<String>, access_token: SecretString) -> Self {
        Self { http, base_url: base_url.into(), access_token }
    }

    fn reply_url(&self) -> String {
        format!("{}/v2/bot/message/reply", self.base_url.trim_end_matches('/'))
    }
}

#[async_trait]
impl ReplyChannel for LineReplyClient {
    async fn send(&self, reply_token: &str, text: &str) -> Result<(), ReplyError> {
        let text = truncate_text(text);
        let request =
            ReplyRequest { reply_token, messages: [TextMessage { kind: "text", text: &text }] };

        let response = self
            .http
            .post(self.reply_url())
            .bearer_auth(self.access_token.expose_secret())
            .json(&request)
            .send()
            .await
            .map_err(|error| ReplyError::Transport(error.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(ReplyError::Rejected { status: status.as_u16(), detail });
        }

        Ok(())
    }
}

fn truncate_text(text: &str) -> String {
    text.chars().take(MAX_TEXT_CHARS).collect()
}
