// src/config.rs
//! Runtime configuration: tracked channels + tuning knobs from a config
//! file, credentials strictly from the environment (never from baked-in
//! defaults).

use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

const ENV_CONFIG_PATH: &str = "VIEWTRACK_CONFIG_PATH";
const DEFAULT_TOML_PATH: &str = "config/viewtrack.toml";
const DEFAULT_JSON_PATH: &str = "config/viewtrack.json";

/// One tracked channel, defined statically in the config file.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ChannelConfig {
    pub id: String,
    pub name: String,
}

/// Tuning knobs with the production defaults inline.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AppConfig {
    pub channels: Vec<ChannelConfig>,
    /// Short window, in samples back ("last hour" at hourly cadence).
    #[serde(default = "default_short_window")]
    pub short_window_samples: usize,
    /// Long window, in samples back ("last 48 hours" at hourly cadence).
    #[serde(default = "default_long_window")]
    pub long_window_samples: usize,
    #[serde(default = "default_surge_threshold")]
    pub surge_threshold_percent: f64,
    /// Videos tracked per channel per run; the rest are invisible to
    /// surge detection.
    #[serde(default = "default_top_videos")]
    pub top_videos: usize,
    #[serde(default = "default_max_pages")]
    pub max_pages: usize,
    /// Duration ceiling for a video to count as a Short.
    #[serde(default = "default_max_duration")]
    pub max_duration_secs: u32,
    #[serde(default = "default_surge_display_limit")]
    pub surge_display_limit: usize,
    /// History depth kept per series; defaults to the long window plus
    /// a small margin when unset.
    #[serde(default)]
    pub retain_samples: Option<usize>,
}

fn default_short_window() -> usize {
    1
}
fn default_long_window() -> usize {
    48
}
fn default_surge_threshold() -> f64 {
    crate::surge::DEFAULT_SURGE_THRESHOLD_PERCENT
}
fn default_top_videos() -> usize {
    50
}
fn default_max_pages() -> usize {
    10
}
fn default_max_duration() -> u32 {
    90
}
fn default_surge_display_limit() -> usize {
    crate::report::DEFAULT_SURGE_DISPLAY_LIMIT
}

impl AppConfig {
    pub fn retain_samples(&self) -> usize {
        self.retain_samples
            .unwrap_or(self.long_window_samples + 2)
    }

    /// Load from an explicit path. Supports TOML or JSON formats.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("reading config from {}", path.display()))?;
        let ext = path
            .extension()
            .and_then(|s| s.to_str())
            .unwrap_or_default()
            .to_ascii_lowercase();
        let cfg = parse_config(&content, ext.as_str())?;
        if cfg.channels.is_empty() {
            return Err(anyhow!("config has no channels; nothing to track"));
        }
        Ok(cfg)
    }

    /// Load using env var + fallbacks:
    /// 1) $VIEWTRACK_CONFIG_PATH
    /// 2) config/viewtrack.toml
    /// 3) config/viewtrack.json
    pub fn load_default() -> Result<Self> {
        if let Ok(p) = std::env::var(ENV_CONFIG_PATH) {
            let pb = PathBuf::from(p);
            if pb.exists() {
                return Self::load_from(&pb);
            }
            return Err(anyhow!("VIEWTRACK_CONFIG_PATH points to non-existent path"));
        }
        let toml_p = PathBuf::from(DEFAULT_TOML_PATH);
        if toml_p.exists() {
            return Self::load_from(&toml_p);
        }
        let json_p = PathBuf::from(DEFAULT_JSON_PATH);
        if json_p.exists() {
            return Self::load_from(&json_p);
        }
        Err(anyhow!(
            "no config found (set {ENV_CONFIG_PATH} or create {DEFAULT_TOML_PATH})"
        ))
    }
}

fn parse_config(s: &str, hint_ext: &str) -> Result<AppConfig> {
    if hint_ext == "json" {
        return serde_json::from_str(s).context("parsing JSON config");
    }
    // TOML is the documented format; fall back to JSON for tooling that
    // writes it.
    match toml::from_str::<AppConfig>(s) {
        Ok(cfg) => Ok(cfg),
        Err(toml_err) => serde_json::from_str(s)
            .map_err(|_| toml_err)
            .context("parsing TOML config"),
    }
}

/// Telegram bot credentials; absent = notifications disabled.
#[derive(Debug, Clone)]
pub struct TelegramCredentials {
    pub bot_token: String,
    pub chat_id: String,
}

/// GitHub mirror credentials; absent = local-only persistence.
#[derive(Debug, Clone)]
pub struct GithubCredentials {
    pub token: String,
    /// `owner/repo` of the history mirror.
    pub repo: String,
}

/// Secrets resolved from the environment at startup. Missing REQUIRED
/// credentials are the one fatal misconfiguration in the system.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub youtube_api_key: String,
    pub telegram: Option<TelegramCredentials>,
    pub github: Option<GithubCredentials>,
}

impl Credentials {
    pub fn from_env() -> Result<Self> {
        let youtube_api_key = std::env::var("YOUTUBE_API_KEY")
            .ok()
            .filter(|v| !v.is_empty())
            .ok_or_else(|| anyhow!("YOUTUBE_API_KEY is required"))?;

        let telegram = match (
            non_empty_env("TELEGRAM_BOT_TOKEN"),
            non_empty_env("TELEGRAM_CHAT_ID"),
        ) {
            (Some(bot_token), Some(chat_id)) => Some(TelegramCredentials { bot_token, chat_id }),
            (None, None) => None,
            _ => {
                return Err(anyhow!(
                    "TELEGRAM_BOT_TOKEN and TELEGRAM_CHAT_ID must be set together"
                ))
            }
        };

        let github = match (non_empty_env("GITHUB_TOKEN"), non_empty_env("GITHUB_REPO")) {
            (Some(token), Some(repo)) => Some(GithubCredentials { token, repo }),
            (None, _) => None,
            (Some(_), None) => return Err(anyhow!("GITHUB_REPO is required with GITHUB_TOKEN")),
        };

        Ok(Self {
            youtube_api_key,
            telegram,
            github,
        })
    }
}

fn non_empty_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.is_empty())
}
