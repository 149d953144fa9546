pub mod cache;
pub mod display;
pub mod openweather;
pub mod types;

use async_trait::async_trait;
use thiserror::Error;
use types::CurrentWeatherResponse;

use crate::database::TenantConfig;
use crate::error::ConfigurationError;
use crate::utils::validate_coordinates;

pub use cache::WeatherService;
pub use types::DisplayWeather;

/// Any failure talking to the weather provider: transport, HTTP status,
/// body decoding or schema mismatch.
#[derive(Error, Debug, Clone)]
#[error("weather upstream unavailable: {reason}")]
pub struct UpstreamUnavailable {
    pub reason: String,
}

impl UpstreamUnavailable {
    pub fn new(reason: impl Into<String>) -> Self {
        Self { reason: reason.into() }
    }
}

impl From<reqwest::Error> for UpstreamUnavailable {
    fn from(err: reqwest::Error) -> Self {
        Self::new(err.to_string())
    }
}

impl From<serde_json::Error> for UpstreamUnavailable {
    fn from(err: serde_json::Error) -> Self {
        Self::new(format!("invalid weather response: {err}"))
    }
}

#[async_trait]
pub trait WeatherUpstream: Send + Sync {
    async fn fetch(
        &self,
        lat: f64,
        lon: f64,
        lang: &str,
    ) -> Result<CurrentWeatherResponse, UpstreamUnavailable>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct WeatherLocation {
    pub lat: f64,
    pub lon: f64,
    pub lang: String,
}

impl WeatherLocation {
    /// Exact match on coordinates and language. Floats compare by bit pattern.
    pub fn matches(&self, other: &WeatherLocation) -> bool {
        self.lat.to_bits() == other.lat.to_bits()
            && self.lon.to_bits() == other.lon.to_bits()
            && self.lang == other.lang
    }
}

/// Weather settings of a tenant after validation.
#[derive(Debug, Clone, PartialEq)]
pub enum WeatherConfig {
    Disabled,
    Enabled(WeatherLocation),
}

impl WeatherConfig {
    pub fn from_tenant_config(config: &TenantConfig) -> Result<Self, ConfigurationError> {
        if !config.show_weather {
            return Ok(WeatherConfig::Disabled);
        }

        let (lat, lon) = match (config.weather_lat, config.weather_lon) {
            (Some(lat), Some(lon)) => (lat, lon),
            _ => return Err(ConfigurationError::MissingCoordinates),
        };
        let lang = config.weather_lang.trim();
        if lang.is_empty() {
            return Err(ConfigurationError::MissingLanguage);
        }
        validate_coordinates(lat, lon).map_err(ConfigurationError::InvalidCoordinates)?;

        Ok(WeatherConfig::Enabled(WeatherLocation {
            lat,
            lon,
            lang: lang.to_string(),
        }))
    }
}
