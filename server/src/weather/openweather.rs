use super::types::CurrentWeatherResponse;
use super::{UpstreamUnavailable, WeatherUpstream};
use crate::config::Config;
use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use std::time::Duration;

const CURRENT_WEATHER_PATH: &str = "/data/2.5/weather";

pub struct OpenWeatherClient {
    client: Client,
    base_url: String,
    api_key: String,
    units: String,
}

impl OpenWeatherClient {
    pub fn new(config: &Config) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .user_agent("SignageServer/1.0")
            .timeout(Duration::from_secs(config.weather_timeout_seconds))
            .build()?;

        Ok(Self {
            client,
            base_url: config.openweather_base_url.trim_end_matches('/').to_string(),
            api_key: config.openweather_api_key.clone(),
            units: config.openweather_units.clone(),
        })
    }

    pub async fn get_current_weather(
        &self,
        lat: f64,
        lon: f64,
        lang: &str,
    ) -> Result<CurrentWeatherResponse, UpstreamUnavailable> {
        let url = format!("{}{}", self.base_url, CURRENT_WEATHER_PATH);

        let response = self
            .client
            .get(&url)
            .query(&[
                ("appid", self.api_key.as_str()),
                ("units", self.units.as_str()),
                ("lang", lang),
                ("lat", &lat.to_string()),
                ("lon", &lon.to_string()),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(UpstreamUnavailable::new(format!("HTTP {}: {}", status, error_text)));
        }

        let json: Value = response.json().await?;
        let current: CurrentWeatherResponse = serde_json::from_value(json)?;
        Ok(current)
    }
}

#[async_trait]
impl WeatherUpstream for OpenWeatherClient {
    async fn fetch(
        &self,
        lat: f64,
        lon: f64,
        lang: &str,
    ) -> Result<CurrentWeatherResponse, UpstreamUnavailable> {
        self.get_current_weather(lat, lon, lang).await.map_err(|e| {
            tracing::warn!(lat, lon, lang, error = %e, "OpenWeather request failed");
            e
        })
    }
}
