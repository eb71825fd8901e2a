//! Configuration types and loading.
//!
//! Config is loaded from a JSON file (e.g. `~/.quip/config.json`) and environment.
//! Every field has a default, so a missing or empty file is a valid configuration.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Top-level application config.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// Where locale catalogs live and which locale to fall back to.
    #[serde(default)]
    pub localization: LocalizationConfig,

    /// Channel settings (e.g. Telegram).
    #[serde(default)]
    pub channels: ChannelsConfig,

    /// Inbound processing settings.
    #[serde(default)]
    pub server: ServerConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocalizationConfig {
    /// Override the locale catalog directory. Relative paths are resolved against the config
    /// file's parent. Omit to use the `locales` subdirectory of the config directory.
    #[serde(default)]
    pub directory: Option<PathBuf>,

    /// Locale used when a player's locale is unknown or lacks a phrase (default "en").
    #[serde(default = "default_locale")]
    pub default_locale: String,
}

fn default_locale() -> String {
    "en".to_string()
}

impl Default for LocalizationConfig {
    fn default() -> Self {
        Self {
            directory: None,
            default_locale: default_locale(),
        }
    }
}

/// Per-channel config (e.g. Telegram bot token).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelsConfig {
    #[serde(default)]
    pub telegram: TelegramChannelConfig,
}

/// Telegram channel config.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TelegramChannelConfig {
    /// Bot token from BotFather. Overridden by TELEGRAM_BOT_TOKEN env when set.
    pub bot_token: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerConfig {
    /// Capacity of the inbound message queue between channels and the game server, and of
    /// each player's pending-turn queue (default 64).
    #[serde(default = "default_inbound_buffer")]
    pub inbound_buffer: usize,

    /// Seconds a player's worker waits for another message before exiting (default 60).
    #[serde(default = "default_worker_idle_secs")]
    pub worker_idle_secs: u64,
}

fn default_inbound_buffer() -> usize {
    64
}

fn default_worker_idle_secs() -> u64 {
    60
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            inbound_buffer: default_inbound_buffer(),
            worker_idle_secs: default_worker_idle_secs(),
        }
    }
}

/// Resolve the Telegram bot token: env TELEGRAM_BOT_TOKEN overrides config.
pub fn resolve_telegram_token(config: &Config) -> Option<String> {
    std::env::var("TELEGRAM_BOT_TOKEN")
        .ok()
        .and_then(|s| {
            let t = s.trim();
            if t.is_empty() {
                None
            } else {
                Some(t.to_string())
            }
        })
        .or_else(|| {
            config
                .channels
                .telegram
                .bot_token
                .as_ref()
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
        })
}

/// Resolve config path from env or default.
pub fn default_config_path() -> PathBuf {
    std::env::var("QUIP_CONFIG_PATH").map(PathBuf::from).unwrap_or_else(|_| {
        dirs::home_dir()
            .map(|h| h.join(".quip").join("config.json"))
            .unwrap_or_else(|| PathBuf::from("config.json"))
    })
}

/// Load config from the given path (or the default path). Missing file => default config.
/// Returns the config and the path that was used (for resolving the config directory).
pub fn load_config(path: Option<PathBuf>) -> Result<(Config, PathBuf)> {
    let path = path.unwrap_or_else(default_config_path);
    let config = if !path.exists() {
        log::debug!("config file not found, using defaults: {}", path.display());
        Config::default()
    } else {
        let s = std::fs::read_to_string(&path)
            .with_context(|| format!("reading config from {}", path.display()))?;
        serde_json::from_str(&s)
            .with_context(|| format!("parsing config from {}", path.display()))?
    };
    Ok((config, path))
}

fn config_dir(config_path: &Path) -> &Path {
    config_path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."))
}

/// Default locale directory when no override is set: `locales` next to the config file.
pub fn locales_dir(config_path: &Path) -> PathBuf {
    config_dir(config_path).join("locales")
}

/// Resolve the locale catalog directory: `config.localization.directory` if set (relative paths
/// resolved against the config file's parent), otherwise the default `locales` subdirectory.
pub fn resolve_locales_dir(config: &Config, config_path: &Path) -> PathBuf {
    match &config.localization.directory {
        Some(d) if !d.as_os_str().is_empty() => {
            if d.is_absolute() {
                d.clone()
            } else {
                config_dir(config_path).join(d)
            }
        }
        _ => locales_dir(config_path),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_object_uses_defaults() {
        let config: Config = serde_json::from_str("{}").unwrap();
        assert_eq!(config.localization.default_locale, "en");
        assert_eq!(config.server.inbound_buffer, 64);
        assert_eq!(config.server.worker_idle_secs, 60);
        assert!(config.channels.telegram.bot_token.is_none());
    }

    #[test]
    fn camel_case_fields_parse() {
        let config: Config = serde_json::from_str(
            r#"{"localization":{"defaultLocale":"ru","directory":"lang"},
                "channels":{"telegram":{"botToken":"abc"}},
                "server":{"inboundBuffer":8,"workerIdleSecs":5}}"#,
        )
        .unwrap();
        assert_eq!(config.localization.default_locale, "ru");
        assert_eq!(config.channels.telegram.bot_token.as_deref(), Some("abc"));
        assert_eq!(config.server.inbound_buffer, 8);
        assert_eq!(config.server.worker_idle_secs, 5);
    }

    #[test]
    fn resolve_locales_dir_default() {
        let config = Config::default();
        let path = Path::new("/home/user/.quip/config.json");
        assert_eq!(
            resolve_locales_dir(&config, path),
            PathBuf::from("/home/user/.quip/locales")
        );
    }

    #[test]
    fn resolve_locales_dir_override_relative() {
        let mut config = Config::default();
        config.localization.directory = Some(PathBuf::from("custom/locales"));
        let path = Path::new("/home/user/.quip/config.json");
        assert_eq!(
            resolve_locales_dir(&config, path),
            PathBuf::from("/home/user/.quip/custom/locales")
        );
    }

    #[test]
    fn resolve_locales_dir_override_absolute() {
        let mut config = Config::default();
        config.localization.directory = Some(PathBuf::from("/srv/locales"));
        let path = Path::new("/home/user/.quip/config.json");
        assert_eq!(resolve_locales_dir(&config, path), PathBuf::from("/srv/locales"));
    }

    #[test]
    fn missing_config_file_is_default() {
        let path = std::env::temp_dir()
            .join(format!("quip-config-test-{}", uuid::Uuid::new_v4()))
            .join("config.json");
        let (config, used) = load_config(Some(path.clone())).unwrap();
        assert_eq!(used, path);
        assert_eq!(config.localization.default_locale, "en");
    }
}
