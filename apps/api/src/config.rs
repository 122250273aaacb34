use std::time::Duration;

use anyhow::{Context, Result};

use crate::preview::PreviewConfig;
use crate::wizard::autosave::AutosaveConfig;

/// Application configuration loaded from environment variables.
/// Startup fails if required variables are missing or malformed.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub port: u16,
    pub rust_log: String,
    pub autosave_debounce_ms: u64,
    pub autosave_indicator_ms: u64,
    pub autosave_max_attempts: u32,
    pub autosave_retry_backoff_ms: u64,
    pub preview_base_font_pt: f32,
    pub preview_min_font_pt: f32,
    /// Sessions and cached documents untouched this long are dropped.
    pub session_idle_ttl_secs: u64,
    pub idle_sweep_interval_secs: u64,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        let config = Config {
            database_url: require_env("DATABASE_URL")?,
            port: env_or("PORT", 8080).context("PORT must be a valid port number")?,
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
            autosave_debounce_ms: env_or("AUTOSAVE_DEBOUNCE_MS", 500)?,
            autosave_indicator_ms: env_or("AUTOSAVE_INDICATOR_MS", 1500)?,
            autosave_max_attempts: env_or("AUTOSAVE_MAX_ATTEMPTS", 3)?,
            autosave_retry_backoff_ms: env_or("AUTOSAVE_RETRY_BACKOFF_MS", 1000)?,
            preview_base_font_pt: env_or("PREVIEW_BASE_FONT_PT", 11.0)?,
            preview_min_font_pt: env_or("PREVIEW_MIN_FONT_PT", 8.0)?,
            session_idle_ttl_secs: env_or("SESSION_IDLE_TTL_SECS", 1800)?,
            idle_sweep_interval_secs: env_or("IDLE_SWEEP_INTERVAL_SECS", 60)?,
        };

        if config.preview_min_font_pt > config.preview_base_font_pt {
            anyhow::bail!(
                "PREVIEW_MIN_FONT_PT ({}) must not exceed PREVIEW_BASE_FONT_PT ({})",
                config.preview_min_font_pt,
                config.preview_base_font_pt
            );
        }
        Ok(config)
    }

    pub fn autosave(&self) -> AutosaveConfig {
        AutosaveConfig {
            debounce: Duration::from_millis(self.autosave_debounce_ms),
            indicator: Duration::from_millis(self.autosave_indicator_ms),
            max_attempts: self.autosave_max_attempts.max(1),
            retry_backoff: Duration::from_millis(self.autosave_retry_backoff_ms),
        }
    }

    pub fn session_idle_ttl(&self) -> Duration {
        Duration::from_secs(self.session_idle_ttl_secs)
    }

    /// Never zero; `tokio::time::interval` rejects a zero period.
    pub fn idle_sweep_interval(&self) -> Duration {
        Duration::from_secs(self.idle_sweep_interval_secs.max(1))
    }

    pub fn preview(&self) -> PreviewConfig {
        PreviewConfig {
            base_font_pt: self.preview_base_font_pt,
            min_font_pt: self.preview_min_font_pt,
            ..PreviewConfig::default()
        }
    }
}

fn require_env(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("Required environment variable '{key}' is not set"))
}

/// Parses `key` if set, otherwise returns `default`.
fn env_or<T>(key: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .with_context(|| format!("Environment variable '{key}' has an invalid value '{raw}'")),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> Config {
        Config {
            database_url: "postgres://localhost/resumeletter".to_string(),
            port: 8080,
            rust_log: "info".to_string(),
            autosave_debounce_ms: 500,
            autosave_indicator_ms: 1500,
            autosave_max_attempts: 0,
            autosave_retry_backoff_ms: 1000,
            preview_base_font_pt: 10.5,
            preview_min_font_pt: 8.0,
            session_idle_ttl_secs: 1800,
            idle_sweep_interval_secs: 0,
        }
    }

    #[test]
    fn test_derived_sub_configs() {
        let config = config();
        let autosave = config.autosave();
        assert_eq!(autosave.debounce, Duration::from_millis(500));
        assert_eq!(autosave.max_attempts, 1);

        let preview = config.preview();
        assert_eq!(preview.base_font_pt, 10.5);
        assert_eq!(preview.step_pt, PreviewConfig::default().step_pt);

        assert_eq!(config.session_idle_ttl(), Duration::from_secs(1800));
        assert_eq!(config.idle_sweep_interval(), Duration::from_secs(1));
    }

    #[test]
    fn test_env_or_reports_bad_values() {
        std::env::set_var("RESUMELETTER_TEST_BAD_PORT", "eighty");
        let err = env_or::<u16>("RESUMELETTER_TEST_BAD_PORT", 8080).unwrap_err();
        assert!(err.to_string().contains("RESUMELETTER_TEST_BAD_PORT"));
        assert_eq!(env_or::<u16>("RESUMELETTER_TEST_UNSET_PORT", 8080).unwrap(), 8080);
    }
}
