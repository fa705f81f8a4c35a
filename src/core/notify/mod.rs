pub mod relay;
pub mod telegram;

use std::future::Future;
use std::pin::Pin;
use thiserror::Error;

use crate::core::config::NotifyConfig;
use crate::core::report::Message;

#[derive(Error, Debug)]
pub enum DeliveryError {
    #[error("{channel} delivery failed: {reason}")]
    Transport { channel: &'static str, reason: String },
    #[error("{channel} rejected the message: {reason}")]
    Rejected { channel: &'static str, reason: String },
    #[error("{channel} is misconfigured: {reason}")]
    Config { channel: &'static str, reason: String },
}

pub type SendFuture<'a> = Pin<Box<dyn Future<Output = Result<(), DeliveryError>> + Send + 'a>>;

/// Somewhere a report can be delivered to.
pub trait NotificationChannel: Send + Sync {
    fn name(&self) -> &'static str;
    fn send<'a>(&'a self, message: &'a Message) -> SendFuture<'a>;
}

/// Build the configured channel. `Ok(None)` means notifications are off
/// (`channel = "none"` or no recipient) and delivery should be skipped
/// quietly. An unset channel defaults to Telegram.
pub fn from_config(
    config: &NotifyConfig,
) -> Result<Option<Box<dyn NotificationChannel>>, DeliveryError> {
    let channel = config
        .channel
        .as_deref()
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .unwrap_or("telegram");
    if channel.eq_ignore_ascii_case("none") {
        return Ok(None);
    }
    let Some(target) = config
        .target
        .as_deref()
        .map(str::trim)
        .filter(|t| !t.is_empty())
    else {
        return Ok(None);
    };

    if !channel.eq_ignore_ascii_case("telegram") {
        tracing::warn!(channel, "unsupported notification channel, skipping delivery");
        return Ok(None);
    }

    let built: Box<dyn NotificationChannel> =
        match config.bot_token.as_deref().filter(|t| !t.trim().is_empty()) {
            Some(token) => Box::new(telegram::TelegramChannel::new(
                config
                    .api_base_url
                    .clone()
                    .unwrap_or_else(|| telegram::DEFAULT_API_BASE_URL.to_string()),
                token.trim().to_string(),
                target.to_string(),
            )?),
            None => Box::new(relay::RelayChannel::new(
                config.relay_command.clone(),
                "telegram",
                target.to_string(),
            )),
        };
    Ok(Some(built))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(channel: Option<&str>, target: Option<&str>, token: Option<&str>) -> NotifyConfig {
        NotifyConfig {
            channel: channel.map(String::from),
            target: target.map(String::from),
            bot_token: token.map(String::from),
            ..Default::default()
        }
    }

    #[test]
    fn disabled_channel_or_missing_target_skips() {
        assert!(from_config(&config(Some("none"), Some("123"), None)).unwrap().is_none());
        assert!(from_config(&config(None, None, None)).unwrap().is_none());
        assert!(from_config(&config(Some("telegram"), None, None)).unwrap().is_none());
        assert!(from_config(&config(Some("telegram"), Some("  "), None)).unwrap().is_none());
    }

    #[test]
    fn unset_channel_defaults_to_telegram() {
        let ch = from_config(&config(None, Some("123"), None)).unwrap().unwrap();
        assert_eq!(ch.name(), "relay");
    }

    #[test]
    fn unknown_channel_skips() {
        assert!(from_config(&config(Some("carrier-pigeon"), Some("123"), None)).unwrap().is_none());
    }

    #[test]
    fn bot_token_selects_bot_api() {
        let ch = from_config(&config(Some("telegram"), Some("123"), Some("abc"))).unwrap().unwrap();
        assert_eq!(ch.name(), "telegram");
    }

    #[test]
    fn no_token_falls_back_to_relay() {
        let ch = from_config(&config(Some("Telegram"), Some("123"), None)).unwrap().unwrap();
        assert_eq!(ch.name(), "relay");
    }

    #[test]
    fn plain_http_bot_api_is_refused() {
        let mut cfg = config(Some("telegram"), Some("123"), Some("abc"));
        cfg.api_base_url = Some("http://api.telegram.org".to_string());
        match from_config(&cfg) {
            Err(DeliveryError::Config { reason, .. }) => assert!(reason.contains("HTTPS")),
            Err(other) => panic!("unexpected error: {}", other),
            Ok(_) => panic!("plain HTTP bot API accepted"),
        }
    }
}
