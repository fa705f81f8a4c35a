use chrono::{DateTime, TimeZone, Utc};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::time::Duration;

use crate::core::config::MoonshotConfig;
use crate::core::models::record::DayWindow;
use crate::core::models::usage::ModelUsage;
use crate::core::process::{resolve_command, run_command};
use crate::core::providers::fetch::{FetchFuture, ProviderUsage};
use crate::core::providers::{Provider, ProviderError, UsageProvider};

const MOONSHOT_MODELS: &[&str] = &["kimi-k2", "kimi-k2-thinking", "kimi-k2.5", "kimi-k2-turbo-preview"];

/// Share of `totalTokens` attributed to input when a session does not report
/// the split itself.
const ESTIMATED_INPUT_SHARE: f64 = 0.9;

// --- Response types ---

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SessionRaw {
    #[serde(default)]
    model: String,
    updated_at: Option<f64>,
    #[serde(default)]
    total_tokens: u64,
    input_tokens: Option<u64>,
    output_tokens: Option<u64>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum SessionList {
    Wrapped { sessions: Vec<SessionRaw> },
    Bare(Vec<SessionRaw>),
}

impl SessionList {
    fn into_sessions(self) -> Vec<SessionRaw> {
        match self {
            Self::Wrapped { sessions } | Self::Bare(sessions) => sessions,
        }
    }
}

/// Canonical Moonshot model id for `model`, or `None` for other providers.
fn moonshot_model(model: &str) -> Option<String> {
    let lower = model.trim().to_lowercase();
    let name = lower.strip_prefix("moonshot/").unwrap_or(&lower);
    if name.starts_with("kimi-") || MOONSHOT_MODELS.contains(&name) {
        Some(name.to_string())
    } else {
        None
    }
}

/// `updatedAt` may be epoch seconds or milliseconds.
fn session_time(updated_at: f64) -> Option<DateTime<Utc>> {
    let seconds = if updated_at > 1e12 {
        updated_at / 1000.0
    } else {
        updated_at
    };
    Utc.timestamp_opt(seconds as i64, 0).single()
}

fn token_split(session: &SessionRaw) -> (u64, u64) {
    match (session.input_tokens, session.output_tokens) {
        (Some(input), Some(output)) => (input, output),
        (Some(input), None) => (input, session.total_tokens.saturating_sub(input)),
        (None, Some(output)) => (session.total_tokens.saturating_sub(output), output),
        (None, None) => {
            let input = (session.total_tokens as f64 * ESTIMATED_INPUT_SHARE) as u64;
            (input, session.total_tokens - input)
        }
    }
}

/// Sum Moonshot sessions that were active inside `window`, per model.
/// Sessions without a timestamp are counted.
fn usage_from_sessions(sessions: Vec<SessionRaw>, window: &DayWindow) -> Vec<ModelUsage> {
    let mut by_model: BTreeMap<String, ModelUsage> = BTreeMap::new();
    for session in sessions {
        let Some(model) = moonshot_model(&session.model) else {
            continue;
        };
        if let Some(ts) = session.updated_at.filter(|t| *t > 0.0) {
            match session_time(ts) {
                Some(t) if window.contains(t) => {}
                _ => continue,
            }
        }
        let (input, output) = token_split(&session);
        let entry = by_model
            .entry(model.clone())
            .or_insert_with(|| ModelUsage::new(model));
        entry.input_tokens += input;
        entry.output_tokens += output;
        entry.requests += 1;
    }
    by_model.into_values().collect()
}

// --- Provider ---

/// Secondary provider: Kimi usage read from the local agent gateway's
/// session list.
pub struct MoonshotProvider {
    command: String,
    session_limit: u32,
    timeout: Duration,
}

impl MoonshotProvider {
    pub fn from_config(config: &MoonshotConfig) -> Result<Self, ProviderError> {
        if resolve_command(&config.command).is_none() {
            return Err(ProviderError::unavailable(
                Provider::Moonshot,
                format!("`{}` not found in PATH", config.command),
            ));
        }
        Ok(Self {
            command: config.command.clone(),
            session_limit: config.session_limit,
            timeout: Duration::from_secs(config.timeout_secs),
        })
    }

    async fn fetch_day(&self, window: &DayWindow) -> Result<ProviderUsage, ProviderError> {
        let limit = self.session_limit.to_string();
        let stdout = run_command(
            &self.command,
            &["sessions", "list", "--limit", limit.as_str(), "--json"],
            self.timeout,
        )
        .await
        .map_err(|e| ProviderError::unavailable(Provider::Moonshot, format!("{:#}", e)))?;

        let list: SessionList = serde_json::from_str(&stdout).map_err(|e| {
            ProviderError::unavailable(
                Provider::Moonshot,
                format!("failed to parse session list: {}", e),
            )
        })?;

        let usage = usage_from_sessions(list.into_sessions(), window);
        tracing::debug!(date = %window.label(), models = usage.len(), "Moonshot sessions summed");
        Ok(ProviderUsage::new(Provider::Moonshot, usage))
    }
}

impl UsageProvider for MoonshotProvider {
    fn provider(&self) -> Provider {
        Provider::Moonshot
    }

    fn fetch<'a>(&'a self, window: &'a DayWindow) -> FetchFuture<'a> {
        Box::pin(self.fetch_day(window))
    }
}
