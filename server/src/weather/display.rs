use super::types::{CurrentWeatherResponse, DisplayWeather};

/// OpenWeather icon codes end in `n` for night variants (`01n`, `10n`, ...).
const NIGHT_ICON_SUFFIX: char = 'n';

// Convert OpenWeather data to the display format
impl From<&CurrentWeatherResponse> for DisplayWeather {
    fn from(response: &CurrentWeatherResponse) -> Self {
        let (description, icon_code) = response
            .weather
            .first()
            .map(|w| (w.description.clone(), w.icon.clone()))
            .unwrap_or_default();

        let is_night = icon_code.ends_with(NIGHT_ICON_SUFFIX) || outside_daylight(response);

        Self {
            temp_c: response.main.temp,
            feels_like_c: response.main.feels_like,
            humidity_pct: response.main.humidity,
            wind_mps: response.wind.as_ref().map(|w| w.speed),
            description,
            icon_code,
            is_night,
            updated_at: chrono::DateTime::from_timestamp(response.dt, 0).unwrap_or_default(),
            stale: false,
        }
    }
}

fn outside_daylight(response: &CurrentWeatherResponse) -> bool {
    match response.sys.as_ref().map(|s| (s.sunrise, s.sunset)) {
        Some((Some(sunrise), Some(sunset))) => !(sunrise..=sunset).contains(&response.dt),
        _ => false,
    }
}
