use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use utoipa::ToSchema;

/// Weather widget payload sent to the display client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DisplayWeather {
    pub temp_c: f64,
    pub feels_like_c: f64,
    pub humidity_pct: u32,
    pub wind_mps: Option<f64>,
    pub description: String,
    pub icon_code: String,
    pub is_night: bool,
    /// Observation time reported by the provider.
    pub updated_at: DateTime<Utc>,
    /// Set when the provider failed and the last good reading is served.
    pub stale: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CurrentWeatherResponse {
    pub coord: WeatherCoord,
    pub weather: Vec<WeatherCondition>,
    pub main: WeatherMain,
    pub wind: Option<WeatherWind>,
    pub clouds: Option<HashMap<String, f64>>,
    pub dt: i64,
    pub timezone: i32,
    pub name: Option<String>,
    pub cod: i32,
    pub sys: Option<WeatherSys>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeatherCoord {
    pub lon: f64,
    pub lat: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeatherCondition {
    pub id: i32,
    pub main: String,
    pub description: String,
    pub icon: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeatherMain {
    pub temp: f64,
    pub feels_like: f64,
    pub temp_min: f64,
    pub temp_max: f64,
    pub humidity: u32,
    pub pressure: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeatherWind {
    pub speed: f64,
    pub deg: Option<i32>,
    pub gust: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeatherSys {
    pub sunrise: Option<i64>,
    pub sunset: Option<i64>,
}
