use anyhow::{Context, Result};
use chrono::{DateTime, Utc};

use crate::cli::update_cmd::{run_update, update_windows, UpdateContext};
use crate::core::config::AppConfig;
use crate::core::models::record::DayWindow;
use crate::core::notify::{self, NotificationChannel};
use crate::core::report::{self, Message};
use crate::core::store::JsonStore;

/// Update path for the daily job: refresh yesterday and today.
async fn update(config: &AppConfig, now: DateTime<Utc>) -> Result<()> {
    let ctx = UpdateContext::from_config(config)?;
    run_update(&ctx, &update_windows(None, now.date_naive())?).await?;
    Ok(())
}

async fn deliver(channel: &dyn NotificationChannel, message: &Message) -> Result<()> {
    channel
        .send(message)
        .await
        .with_context(|| format!("Failed to deliver report via {}", channel.name()))
}

/// Refresh the store (unless skipped) and build the comparison message.
async fn prepare(config: &AppConfig, skip_update: bool, now: DateTime<Utc>) -> Result<Message> {
    if !skip_update {
        update(config, now).await?;
    }
    let store = JsonStore::new(config.data_path());
    report::build_comparison(
        &store,
        &DayWindow::today(now),
        &DayWindow::yesterday(now),
        now,
    )
    .context("Failed to build usage report")
}

/// Daily job: update, then send the comparison. When either step fails the
/// failure itself is sent and the command exits non-zero. A broken channel
/// setup is reported only after the update has run.
pub async fn run(config: &AppConfig, skip_update: bool) -> Result<()> {
    let now = Utc::now();
    let channel = notify::from_config(&config.notify);
    match &channel {
        Ok(None) => tracing::info!("no notification destination configured, delivery skipped"),
        Err(e) => tracing::error!(error = %e, "notification channel unavailable"),
        Ok(Some(_)) => {}
    }

    let message = match prepare(config, skip_update, now).await {
        Ok(message) => message,
        Err(e) => {
            tracing::error!(error = %format!("{:#}", e), "usage report failed");
            if let Ok(Some(ch)) = &channel {
                if let Err(send_err) = deliver(ch.as_ref(), &report::failure_message(&e)).await {
                    tracing::error!(error = %format!("{:#}", send_err), "failure notice not delivered");
                }
            }
            return Err(e);
        }
    };

    match channel.context("Failed to set up report delivery")? {
        Some(ch) => deliver(ch.as_ref(), &message).await?,
        None => println!("{}", message.text),
    }
    Ok(())
}
