pub mod fetch;
pub mod moonshot;
pub mod openai;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::config::AppConfig;
use crate::core::models::record::DayWindow;
use crate::core::providers::fetch::{FetchFuture, ProviderUsage};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Provider {
    #[serde(rename = "openai")]
    OpenAi,
    #[serde(rename = "moonshot")]
    Moonshot,
}

impl Provider {
    pub fn id(&self) -> &'static str {
        match self {
            Self::OpenAi => "openai",
            Self::Moonshot => "moonshot",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Self::OpenAi => "OpenAI",
            Self::Moonshot => "Moonshot",
        }
    }

    /// All providers in report order (primary first).
    pub fn all() -> &'static [Provider] {
        &[Provider::OpenAi, Provider::Moonshot]
    }

    pub fn auth_hint(&self) -> &'static str {
        match self {
            Self::OpenAi => "OPENAI_ADMIN_KEY or openai.admin_key_path",
            Self::Moonshot => "openclaw CLI in PATH",
        }
    }

    /// Best-effort attribution for records that predate per-provider slices.
    pub fn guess_from_model(model: &str) -> Self {
        let lower = model.to_lowercase();
        if lower.starts_with("kimi-") || lower.starts_with("moonshot/") {
            Self::Moonshot
        } else {
            Self::OpenAi
        }
    }
}

impl std::fmt::Display for Provider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.display_name())
    }
}

/// Failure of a single provider fetch. Never fatal to the run as a whole.
#[derive(Error, Debug, Clone)]
pub enum ProviderError {
    #[error("{provider}: authentication failed: {reason}")]
    Auth { provider: Provider, reason: String },
    #[error("{provider}: unavailable: {reason}")]
    Unavailable { provider: Provider, reason: String },
}

impl ProviderError {
    pub fn auth(provider: Provider, reason: impl Into<String>) -> Self {
        Self::Auth {
            provider,
            reason: reason.into(),
        }
    }

    pub fn unavailable(provider: Provider, reason: impl Into<String>) -> Self {
        Self::Unavailable {
            provider,
            reason: reason.into(),
        }
    }

    pub fn provider(&self) -> Provider {
        match self {
            Self::Auth { provider, .. } | Self::Unavailable { provider, .. } => *provider,
        }
    }
}

/// A source of per-model daily usage.
pub trait UsageProvider: Send + Sync {
    fn provider(&self) -> Provider;

    /// Fetch usage for one day. No usage is an empty result, not an error.
    fn fetch<'a>(&'a self, window: &'a DayWindow) -> FetchFuture<'a>;
}

/// Build every enabled provider whose credentials are available.
///
/// Providers that cannot be built are returned alongside so the caller can
/// log them; they never prevent the others from running.
pub fn configured(
    config: &AppConfig,
) -> (Vec<Box<dyn UsageProvider>>, Vec<ProviderError>) {
    let mut providers: Vec<Box<dyn UsageProvider>> = Vec::new();
    let mut skipped = Vec::new();

    for provider in Provider::all() {
        let built: Option<Result<Box<dyn UsageProvider>, ProviderError>> = match provider {
            Provider::OpenAi if config.openai.enabled => Some(
                openai::OpenAiProvider::from_config(&config.openai)
                    .map(|p| Box::new(p) as Box<dyn UsageProvider>),
            ),
            Provider::Moonshot if config.moonshot.enabled => Some(
                moonshot::MoonshotProvider::from_config(&config.moonshot)
                    .map(|p| Box::new(p) as Box<dyn UsageProvider>),
            ),
            _ => None,
        };
        match built {
            Some(Ok(p)) => providers.push(p),
            Some(Err(e)) => skipped.push(e),
            None => tracing::debug!(provider = provider.id(), "provider disabled in config"),
        }
    }

    (providers, skipped)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn guess_from_model_detects_kimi() {
        assert_eq!(Provider::guess_from_model("kimi-k2.5"), Provider::Moonshot);
        assert_eq!(
            Provider::guess_from_model("moonshot/kimi-k2"),
            Provider::Moonshot
        );
        assert_eq!(
            Provider::guess_from_model("gpt-5.1-codex-mini"),
            Provider::OpenAi
        );
    }

    #[test]
    fn provider_serializes_as_id() {
        assert_eq!(serde_json::to_string(&Provider::OpenAi).unwrap(), r#""openai""#);
        let p: Provider = serde_json::from_str(r#""moonshot""#).unwrap();
        assert_eq!(p, Provider::Moonshot);
    }

    #[test]
    fn error_names_provider() {
        let err = ProviderError::unavailable(Provider::OpenAi, "timed out");
        assert_eq!(err.provider(), Provider::OpenAi);
        assert_eq!(err.to_string(), "OpenAI: unavailable: timed out");
    }

    #[test]
    fn disabled_providers_are_not_built() {
        let mut config = AppConfig::default();
        config.openai.enabled = false;
        config.moonshot.enabled = false;
        let (providers, skipped) = configured(&config);
        assert!(providers.is_empty());
        assert!(skipped.is_empty());
    }

    #[test]
    fn missing_openai_key_is_skipped_as_auth() {
        let mut config = AppConfig::default();
        config.openai.admin_key = None;
        config.openai.admin_key_path = Some("/nonexistent/tokboard/key".into());
        config.moonshot.enabled = false;
        let (providers, skipped) = configured(&config);
        assert!(providers.is_empty());
        assert_eq!(skipped.len(), 1);
        assert!(matches!(skipped[0], ProviderError::Auth { provider: Provider::OpenAi, .. }));
    }
}
