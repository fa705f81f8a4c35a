use reqwest::StatusCode;
use serde_json::{json, Value};
use std::time::Duration;

use crate::core::notify::{DeliveryError, NotificationChannel, SendFuture};
use crate::core::report::Message;

pub const DEFAULT_API_BASE_URL: &str = "https://api.telegram.org";

/// Bot API limit for one `sendMessage` text.
const MAX_MESSAGE_CHARS: usize = 4096;
const TIMEOUT_SECS: u64 = 30;
const CHANNEL: &str = "telegram";

/// Delivers reports through the Telegram Bot API.
pub struct TelegramChannel {
    client: reqwest::Client,
    base_url: String,
    bot_token: String,
    chat_id: String,
}

impl TelegramChannel {
    /// The bot token travels in the URL path, so `base_url` must be HTTPS.
    pub fn new(base_url: String, bot_token: String, chat_id: String) -> Result<Self, DeliveryError> {
        if !base_url.starts_with("https://") {
            return Err(DeliveryError::Config {
                channel: CHANNEL,
                reason: format!("Bot API endpoint must use HTTPS, got: {}", base_url),
            });
        }
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(TIMEOUT_SECS))
            .build()
            .map_err(|e| DeliveryError::Config {
                channel: CHANNEL,
                reason: format!("failed to build HTTP client: {}", e),
            })?;
        Ok(Self {
            client,
            base_url,
            bot_token,
            chat_id,
        })
    }

    fn api_url(&self, method: &str) -> String {
        let base = self.base_url.trim_end_matches('/');
        format!("{}/bot{}/{}", base, self.bot_token, method)
    }

    async fn send_chunk(&self, text: &str) -> Result<(), DeliveryError> {
        let body = json!({
            "chat_id": self.chat_id,
            "text": text,
            "disable_web_page_preview": true,
        });
        let resp = self
            .client
            .post(self.api_url("sendMessage"))
            .json(&body)
            .send()
            .await
            .map_err(|e| DeliveryError::Transport {
                channel: CHANNEL,
                // reqwest errors include the URL, which carries the token
                reason: e.without_url().to_string(),
            })?;

        let status = resp.status();
        let body_text = resp.text().await.unwrap_or_default();
        check_response(status, &body_text)
    }

    async fn deliver(&self, message: &Message) -> Result<(), DeliveryError> {
        let chunks = split_message(&message.text, MAX_MESSAGE_CHARS);
        for chunk in &chunks {
            self.send_chunk(chunk).await?;
        }
        tracing::info!(chat = %self.chat_id, parts = chunks.len(), "report sent via Telegram");
        Ok(())
    }
}

impl NotificationChannel for TelegramChannel {
    fn name(&self) -> &'static str {
        CHANNEL
    }

    fn send<'a>(&'a self, message: &'a Message) -> SendFuture<'a> {
        Box::pin(self.deliver(message))
    }
}

fn check_response(status: StatusCode, body_text: &str) -> Result<(), DeliveryError> {
    let parsed: Value = serde_json::from_str(body_text).unwrap_or(Value::Null);
    let ok = parsed
        .get("ok")
        .and_then(Value::as_bool)
        .unwrap_or(status.is_success());
    if ok {
        return Ok(());
    }

    let reason = parsed
        .get("description")
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| format!("HTTP {}", status));

    if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
        Err(DeliveryError::Transport {
            channel: CHANNEL,
            reason,
        })
    } else {
        Err(DeliveryError::Rejected {
            channel: CHANNEL,
            reason,
        })
    }
}

/// Split on line boundaries so each part fits in `max` characters. A single
/// line longer than `max` is cut at character boundaries.
fn split_message(text: &str, max: usize) -> Vec<String> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut current_len = 0;

    for line in text.split('\n') {
        let line_len = line.chars().count();
        let needed = if current.is_empty() { line_len } else { line_len + 1 };
        if current_len + needed <= max {
            if !current.is_empty() {
                current.push('\n');
            }
            current.push_str(line);
            current_len += needed;
            continue;
        }
        if !current.is_empty() {
            parts.push(std::mem::take(&mut current));
        }
        let chars: Vec<char> = line.chars().collect();
        let mut pieces = chars.chunks(max.max(1)).peekable();
        while let Some(piece) = pieces.next() {
            let piece: String = piece.iter().collect();
            if pieces.peek().is_some() {
                parts.push(piece);
            } else {
                current_len = piece.chars().count();
                current = piece;
            }
        }
        if chars.is_empty() {
            current_len = 0;
        }
    }
    if !current.is_empty() || parts.is_empty() {
        parts.push(current);
    }
    parts
}
