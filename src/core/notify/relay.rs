use std::time::Duration;

use crate::core::notify::{DeliveryError, NotificationChannel, SendFuture};
use crate::core::process::{resolve_command, run_command};
use crate::core::report::Message;

const TIMEOUT_SECS: u64 = 60;
const CHANNEL: &str = "relay";

/// Hands the report to the local agent gateway, which owns the messaging
/// credentials: `<command> message send --channel C --target T --message M`.
pub struct RelayChannel {
    command: String,
    channel: String,
    target: String,
}

impl RelayChannel {
    pub fn new(command: String, channel: impl Into<String>, target: String) -> Self {
        Self {
            command,
            channel: channel.into(),
            target,
        }
    }

    fn args<'a>(&'a self, text: &'a str) -> [&'a str; 8] {
        [
            "message",
            "send",
            "--channel",
            &self.channel,
            "--target",
            &self.target,
            "--message",
            text,
        ]
    }

    async fn deliver(&self, message: &Message) -> Result<(), DeliveryError> {
        if resolve_command(&self.command).is_none() {
            return Err(DeliveryError::Transport {
                channel: CHANNEL,
                reason: format!("`{}` not found in PATH", self.command),
            });
        }
        run_command(
            &self.command,
            &self.args(&message.text),
            Duration::from_secs(TIMEOUT_SECS),
        )
        .await
        .map_err(|e| DeliveryError::Transport {
            channel: CHANNEL,
            reason: format!("{:#}", e),
        })?;
        tracing::info!(channel = %self.channel, target = %self.target, "report handed to gateway");
        Ok(())
    }
}

impl NotificationChannel for RelayChannel {
    fn name(&self) -> &'static str {
        CHANNEL
    }

    fn send<'a>(&'a self, message: &'a Message) -> SendFuture<'a> {
        Box::pin(self.deliver(message))
    }
}
