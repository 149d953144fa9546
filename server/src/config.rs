use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TelegramMode {
    Webhook,
    Polling,
}

impl FromStr for TelegramMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "webhook" => Ok(TelegramMode::Webhook),
            "polling" => Ok(TelegramMode::Polling),
            other => Err(anyhow::anyhow!("unknown TELEGRAM_MODE: {other}")),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Config {
    pub database_url: String,
    pub bind_addr: String,

    pub emt_base_url: String,
    pub emt_access_token: String,
    pub emt_timeout_seconds: u64,

    pub default_refresh_seconds: i64,
    pub default_swap_seconds: i64,
    pub default_layout: String,
    pub default_theme: String,
    pub default_board_header_text: String,

    pub admin_secret: String,

    pub telegram_bot_token: Option<String>,
    pub telegram_webhook_secret: Option<String>,
    pub telegram_allowed_update_types: Vec<String>,
    pub telegram_max_image_mb: u64,
    pub telegram_uploads_dir: PathBuf,
    pub telegram_mode: TelegramMode,
    pub telegram_api_base_url: String,

    pub openweather_api_key: String,
    pub openweather_base_url: String,
    pub openweather_units: String,
    pub weather_timeout_seconds: u64,
    pub weather_refresh_seconds: u64,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary key lookup. Empty values
    /// count as unset.
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let required = |key: &str| get(key).ok_or_else(|| anyhow::anyhow!("{key} not set"));
        let or_default = |key: &str, default: &str| get(key).unwrap_or_else(|| default.to_string());

        Ok(Config {
            database_url: or_default("DATABASE_URL", "sqlite:./signage.db?mode=rwc"),
            bind_addr: or_default("BIND_ADDR", "0.0.0.0:8080"),
            emt_base_url: or_default("EMT_BASE_URL", "https://openapi.emtmadrid.es"),
            emt_access_token: required("EMT_ACCESS_TOKEN")?,
            emt_timeout_seconds: parse_or(&get, "EMT_TIMEOUT_SECONDS", 10)?,
            default_refresh_seconds: parse_or(&get, "DEFAULT_REFRESH_SECONDS", 60)?,
            default_swap_seconds: parse_or(&get, "DEFAULT_SWAP_SECONDS", 30)?,
            default_layout: or_default("DEFAULT_LAYOUT", "horizontal"),
            default_theme: or_default("DEFAULT_THEME", "purple"),
            default_board_header_text: or_default(
                "DEFAULT_BOARD_HEADER_TEXT",
                "Bus arriving at nearby stops",
            ),
            admin_secret: or_default("ADMIN_SECRET", "change-me"),
            telegram_bot_token: get("TELEGRAM_BOT_TOKEN"),
            telegram_webhook_secret: get("TELEGRAM_WEBHOOK_SECRET"),
            telegram_allowed_update_types: or_default(
                "TELEGRAM_ALLOWED_UPDATE_TYPES",
                "message,edited_message",
            )
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect(),
            telegram_max_image_mb: parse_or(&get, "TELEGRAM_MAX_IMAGE_MB", 5)?,
            telegram_uploads_dir: PathBuf::from(or_default("TELEGRAM_UPLOADS_DIR", "./uploads")),
            telegram_mode: parse_or(&get, "TELEGRAM_MODE", TelegramMode::Webhook)?,
            telegram_api_base_url: or_default("TELEGRAM_API_BASE_URL", "https://api.telegram.org"),
            openweather_api_key: required("OPENWEATHER_API_KEY")?,
            openweather_base_url: or_default("OPENWEATHER_BASE_URL", "https://api.openweathermap.org"),
            openweather_units: or_default("OPENWEATHER_UNITS", "metric"),
            weather_timeout_seconds: parse_or(&get, "WEATHER_TIMEOUT_SECONDS", 10)?,
            weather_refresh_seconds: parse_or(&get, "WEATHER_REFRESH_SECONDS", 600)?,
        })
    }

    pub fn weather_refresh_interval(&self) -> Duration {
        Duration::from_secs(self.weather_refresh_seconds)
    }

    pub fn telegram_max_image_bytes(&self) -> usize {
        (self.telegram_max_image_mb as usize).saturating_mul(1024 * 1024)
    }
}

fn parse_or<T, G>(get: &G, key: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    G: Fn(&str) -> Option<String>,
{
    match get(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e| anyhow::anyhow!("invalid {key} value {raw:?}: {e}")),
        None => Ok(default),
    }
}

#[cfg(test)]
pub(crate) fn test_config() -> Config {
    let vars = [
        ("EMT_ACCESS_TOKEN", "emt-token"),
        ("OPENWEATHER_API_KEY", "ow-key"),
        ("ADMIN_SECRET", "s3cret"),
        ("TELEGRAM_WEBHOOK_SECRET", "hook"),
    ];
    Config::from_lookup(|key| {
        vars.iter()
            .find(|(k, _)| *k == key)
            .map(|(_, v)| v.to_string())
    })
    .expect("test config")
}
