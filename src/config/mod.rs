// src/config/mod.rs
//! Runtime configuration: secrets and endpoints from the environment, tuning from an optional TOML file.

use std::env;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::PipelineError;
use crate::ingest::ScheduleConfig;
use crate::notify::DeliveryLimits;
use crate::parse::{FreshnessPolicy, ImplicitYear};

pub const ENV_CONFIG_PATH: &str = "NEWSMAKER_CONFIG_PATH";
pub const DEFAULT_CONFIG_PATH: &str = "config/newsmaker.toml";
const DEFAULT_TIMEOUT_SECS: u64 = 300;

/// `[pipeline]` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub max_age_days: i64,
    pub implicit_year: ImplicitYear,
    pub message_limit: usize,
    pub caption_limit: usize,
    pub with_images: bool,
    /// Stale or undated replies are not published when set.
    pub skip_stale: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        let limits = DeliveryLimits::default();
        Self {
            max_age_days: 3,
            implicit_year: ImplicitYear::RequireExplicit,
            message_limit: limits.message_limit,
            caption_limit: limits.caption_limit,
            with_images: true,
            skip_stale: false,
        }
    }
}

impl PipelineConfig {
    pub fn freshness_policy(&self) -> FreshnessPolicy {
        FreshnessPolicy {
            max_age_days: self.max_age_days,
            implicit_year: self.implicit_year,
        }
    }

    pub fn limits(&self) -> DeliveryLimits {
        DeliveryLimits {
            message_limit: self.message_limit,
            caption_limit: self.caption_limit,
        }
    }
}

/// Shape of the TOML file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    pub pipeline: PipelineConfig,
    pub schedule: ScheduleConfig,
}

impl FileConfig {
    pub fn parse(s: &str) -> Result<Self, PipelineError> {
        toml::from_str(s).map_err(|e| PipelineError::Config(format!("invalid config TOML: {e}")))
    }

    /// A missing file yields defaults; an unreadable or malformed one is an error.
    pub fn load(path: &Path) -> Result<Self, PipelineError> {
        if !path.exists() {
            tracing::debug!(target: "config", path = %path.display(), "no config file, using defaults");
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path).map_err(|e| {
            PipelineError::Config(format!("reading {}: {e}", path.display()))
        })?;
        Self::parse(&content)
    }
}

#[derive(Clone)]
pub struct AppConfig {
    pub perplexity_api_key: Option<String>,
    pub perplexity_api_url: String,
    pub perplexity_model: String,
    pub openai_api_key: Option<String>,
    pub telegram_bot_token: Option<String>,
    pub telegram_channel_id: Option<String>,
    pub request_timeout_secs: u64,
    pub config_path: PathBuf,
    pub pipeline: PipelineConfig,
    pub schedule: ScheduleConfig,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, PipelineError> {
        let config_path = env::var(ENV_CONFIG_PATH)
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH));
        let file = FileConfig::load(&config_path)?;

        let request_timeout_secs = match non_empty("REQUEST_TIMEOUT_SECS") {
            Some(v) => v.parse().map_err(|_| {
                PipelineError::Config(format!("REQUEST_TIMEOUT_SECS is not a number: {v}"))
            })?,
            None => DEFAULT_TIMEOUT_SECS,
        };

        let cfg = Self {
            perplexity_api_key: non_empty("PERPLEXITY_API_KEY"),
            perplexity_api_url: non_empty("PERPLEXITY_API_URL")
                .unwrap_or_else(|| crate::ingest::perplexity::DEFAULT_API_URL.to_string()),
            perplexity_model: non_empty("PERPLEXITY_MODEL")
                .unwrap_or_else(|| crate::ingest::perplexity::DEFAULT_MODEL.to_string()),
            openai_api_key: non_empty("OPENAI_API_KEY"),
            telegram_bot_token: non_empty("TELEGRAM_BOT_TOKEN"),
            telegram_channel_id: non_empty("TELEGRAM_CHANNEL_ID"),
            request_timeout_secs,
            config_path,
            pipeline: file.pipeline,
            schedule: file.schedule,
        };
        cfg.log_summary();
        Ok(cfg)
    }

    /// News source and channel are both configured.
    pub fn can_publish(&self) -> bool {
        self.perplexity_api_key.is_some()
            && self.telegram_bot_token.is_some()
            && self.telegram_channel_id.is_some()
    }

    fn log_summary(&self) {
        // lengths only, never the secrets
        tracing::info!(
            target: "config",
            path = %self.config_path.display(),
            perplexity_key_len = key_len(&self.perplexity_api_key),
            openai_key_len = key_len(&self.openai_api_key),
            telegram_token_len = key_len(&self.telegram_bot_token),
            channel_set = self.telegram_channel_id.is_some(),
            model = %self.perplexity_model,
            "configuration loaded"
        );
    }
}

impl fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppConfig")
            .field("perplexity_key_len", &key_len(&self.perplexity_api_key))
            .field("perplexity_api_url", &self.perplexity_api_url)
            .field("perplexity_model", &self.perplexity_model)
            .field("openai_key_len", &key_len(&self.openai_api_key))
            .field("telegram_token_len", &key_len(&self.telegram_bot_token))
            .field("telegram_channel_id", &self.telegram_channel_id)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("config_path", &self.config_path)
            .field("pipeline", &self.pipeline)
            .field("schedule", &self.schedule)
            .finish()
    }
}

fn non_empty(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn key_len(v: &Option<String>) -> usize {
    v.as_ref().map_or(0, String::len)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_file_keeps_defaults() {
        let cfg = FileConfig::parse("[pipeline]\nmax_age_days = 5\n").unwrap();
        assert_eq!(cfg.pipeline.max_age_days, 5);
        assert_eq!(cfg.pipeline.message_limit, 4000);
        assert_eq!(cfg.schedule, ScheduleConfig::default());
    }

    #[test]
    fn implicit_year_is_snake_case() {
        let cfg = FileConfig::parse("[pipeline]\nimplicit_year = \"current_year\"\n").unwrap();
        assert_eq!(cfg.pipeline.implicit_year, ImplicitYear::CurrentYear);
    }

    #[test]
    fn malformed_file_is_config_error() {
        let err = FileConfig::parse("[pipeline\nmax_age_days = ").unwrap_err();
        assert_eq!(err.kind(), "config");
    }

    #[test]
    fn debug_hides_secrets() {
        let cfg = AppConfig {
            perplexity_api_key: Some("pplx-secret".into()),
            perplexity_api_url: "u".into(),
            perplexity_model: "m".into(),
            openai_api_key: None,
            telegram_bot_token: Some("123:token".into()),
            telegram_channel_id: Some("@c".into()),
            request_timeout_secs: 1,
            config_path: PathBuf::from("x.toml"),
            pipeline: PipelineConfig::default(),
            schedule: ScheduleConfig::default(),
        };
        let shown = format!("{cfg:?}");
        assert!(!shown.contains("pplx-secret"));
        assert!(!shown.contains("123:token"));
        assert!(cfg.can_publish());
    }
}
