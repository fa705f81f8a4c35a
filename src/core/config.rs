use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::core::aggregate::OverlapPolicy;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config: {0}")]
    ReadError(#[from] std::io::Error),
    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),
    #[error("Failed to serialize config: {0}")]
    SerializeError(#[from] toml::ser::Error),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Location of the JSON usage document.
    pub data_path: Option<PathBuf>,
    /// JSON pricing table for providers that do not report cost.
    pub pricing_path: Option<PathBuf>,
    #[serde(default = "default_color")]
    pub color: String,
}

fn default_color() -> String {
    "auto".to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            data_path: None,
            pricing_path: None,
            color: default_color(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenAiConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    pub admin_key: Option<String>,
    pub admin_key_path: Option<PathBuf>,
    pub project_id: Option<String>,
    pub base_url: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            admin_key: None,
            admin_key_path: None,
            project_id: None,
            base_url: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MoonshotConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Gateway CLI that lists agent sessions.
    #[serde(default = "default_gateway_command")]
    pub command: String,
    #[serde(default = "default_session_limit")]
    pub session_limit: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for MoonshotConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            command: default_gateway_command(),
            session_limit: default_session_limit(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotifyConfig {
    /// `telegram`, or `none`/unset to disable notifications.
    pub channel: Option<String>,
    /// Chat id (or handle) of the recipient.
    pub target: Option<String>,
    /// Bot API token. Without one, messages go through the gateway CLI.
    pub bot_token: Option<String>,
    pub api_base_url: Option<String>,
    #[serde(default = "default_gateway_command")]
    pub relay_command: String,
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self {
            channel: None,
            target: None,
            bot_token: None,
            api_base_url: None,
            relay_command: default_gateway_command(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DashboardConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Serve this HTML file instead of the built-in page.
    pub page_path: Option<PathBuf>,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            port: default_port(),
            page_path: None,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AggregateConfig {
    #[serde(default)]
    pub overlap: OverlapPolicy,
}

fn default_true() -> bool {
    true
}
fn default_timeout_secs() -> u64 {
    30
}
fn default_gateway_command() -> String {
    "openclaw".to_string()
}
fn default_session_limit() -> u32 {
    100
}
fn default_bind() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    18888
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub settings: Settings,
    #[serde(default)]
    pub openai: OpenAiConfig,
    #[serde(default)]
    pub moonshot: MoonshotConfig,
    #[serde(default)]
    pub notify: NotifyConfig,
    #[serde(default)]
    pub dashboard: DashboardConfig,
    #[serde(default)]
    pub aggregate: AggregateConfig,
}

fn xdg_dir(var: &str, fallback: &str) -> PathBuf {
    std::env::var(var)
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("~"))
                .join(fallback)
        })
}

impl AppConfig {
    /// Get the config file path, respecting XDG_CONFIG_HOME
    pub fn config_path() -> PathBuf {
        xdg_dir("XDG_CONFIG_HOME", ".config")
            .join("tokboard")
            .join("config.toml")
    }

    /// Default location of the usage document, respecting XDG_DATA_HOME
    pub fn default_data_path() -> PathBuf {
        xdg_dir("XDG_DATA_HOME", ".local/share")
            .join("tokboard")
            .join("token_usage.json")
    }

    pub fn data_path(&self) -> PathBuf {
        self.settings
            .data_path
            .clone()
            .unwrap_or_else(Self::default_data_path)
    }

    /// Load config from `path` (or the default path), falling back to defaults if not found
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let path = path.map(Path::to_path_buf).unwrap_or_else(Self::config_path);
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(&path)?;
        let config: AppConfig = toml::from_str(&content)?;
        Ok(config)
    }

    /// Load the file, then apply overrides from the process environment.
    pub fn resolve(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = Self::load(path)?;
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Apply environment overrides. Empty values are ignored.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = get("OPENAI_ADMIN_KEY") {
            self.openai.admin_key = Some(v.trim().to_string());
        }
        if let Some(v) = get("OPENAI_ADMIN_KEY_PATH") {
            self.openai.admin_key_path = Some(PathBuf::from(v));
        }
        if let Some(v) = get("OPENAI_PROJECT_ID") {
            self.openai.project_id = Some(v);
        }
        if let Some(v) = get("TOKEN_DATA_PATH") {
            self.settings.data_path = Some(PathBuf::from(v));
        }
        if let Some(v) = get("MOONSHOT_PRICING_PATH") {
            self.settings.pricing_path = Some(PathBuf::from(v));
        }
        if let Some(v) = get("NOTIFY_CHANNEL") {
            self.notify.channel = Some(v);
        }
        if let Some(v) = get("TELEGRAM_TARGET") {
            self.notify.target = Some(v);
        }
        if let Some(v) = get("TELEGRAM_BOT_TOKEN") {
            self.notify.bot_token = Some(v);
        }
    }

    /// Serialize and write this config to `path`.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Validate the config
    pub fn validate(&self) -> Vec<String> {
        let mut issues = Vec::new();
        if !["auto", "always", "never"].contains(&self.settings.color.as_str()) {
            issues.push(format!(
                "Invalid color: '{}' (must be 'auto', 'always', or 'never')",
                self.settings.color
            ));
        }
        if let Some(url) = &self.openai.base_url {
            if !url.starts_with("https://") {
                issues.push(format!("openai.base_url must use HTTPS, got: {}", url));
            }
        }
        if let Some(url) = &self.notify.api_base_url {
            if !url.starts_with("https://") {
                issues.push(format!("notify.api_base_url must use HTTPS, got: {}", url));
            }
        }
        if self.openai.timeout_secs == 0 || self.moonshot.timeout_secs == 0 {
            issues.push("timeout_secs must be greater than zero".to_string());
        }
        if let Some(channel) = &self.notify.channel {
            if !["telegram", "none"].contains(&channel.as_str()) {
                issues.push(format!(
                    "Invalid notify.channel: '{}' (must be 'telegram' or 'none')",
                    channel
                ));
            }
        }
        if self.dashboard.port == 0 {
            issues.push("dashboard.port must be non-zero".to_string());
        }
        if let Some(page) = &self.dashboard.page_path {
            if !page.exists() {
                issues.push(format!("dashboard.page_path not found: {}", page.display()));
            }
        }
        issues
    }
}
