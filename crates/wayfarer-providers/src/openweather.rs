//! OpenWeatherMap current-weather client.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

use wayfarer_chat::{ProviderError, WeatherProvider};
use wayfarer_core::types::WeatherReport;

use crate::http::send_json;

const PROVIDER: &str = "weather";

/// `GET {base}/data/2.5/weather` in metric units.
pub struct OpenWeatherClient {
    base_url: String,
    api_key: String,
    http: Client,
}

impl OpenWeatherClient {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>, http: Client) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            http,
        }
    }
}

#[async_trait]
impl WeatherProvider for OpenWeatherClient {
    async fn current_weather(&self, city: &str) -> Result<WeatherReport, ProviderError> {
        debug!(city, "Fetching current weather");
        let request = self
            .http
            .get(format!("{}/data/2.5/weather", self.base_url))
            .query(&[("q", city), ("appid", self.api_key.as_str()), ("units", "metric")]);
        let response: OwmResponse = send_json(PROVIDER, request).await?;
        parse_weather(city, response)
    }
}

#[derive(Debug, Default, Deserialize)]
struct OwmResponse {
    main: Option<OwmMain>,
    #[serde(default)]
    weather: Vec<OwmCondition>,
    wind: Option<OwmWind>,
    sys: Option<OwmSys>,
}

#[derive(Debug, Deserialize)]
struct OwmMain {
    temp: Option<f64>,
    feels_like: Option<f64>,
    humidity: Option<u8>,
}

#[derive(Debug, Deserialize)]
struct OwmCondition {
    #[serde(default)]
    description: String,
}

#[derive(Debug, Deserialize)]
struct OwmWind {
    speed: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct OwmSys {
    country: Option<String>,
}

fn parse_weather(city: &str, response: OwmResponse) -> Result<WeatherReport, ProviderError> {
    let main = response.main.ok_or_else(|| invalid("missing `main` block"))?;
    let temperature_c = main.temp.ok_or_else(|| invalid("missing `main.temp`"))?;
    let conditions = response
        .weather
        .into_iter()
        .next()
        .map(|w| w.description)
        .unwrap_or_default();
    let wind_mps = response.wind.and_then(|w| w.speed);
    let country = response.sys.and_then(|s| s.country).filter(|c| !c.is_empty());

    let place = match &country {
        Some(country) => format!("{city}, {country}"),
        None => city.to_string(),
    };
    let mut parts = vec![match main.feels_like {
        Some(feels) => format!(
            "Current temperature in {place}: {temperature_c:.1}°C (feels like {feels:.1}°C)."
        ),
        None => format!("Current temperature in {place}: {temperature_c:.1}°C."),
    }];
    if !conditions.is_empty() {
        parts.push(format!("Conditions: {conditions}."));
    }
    if let Some(humidity) = main.humidity {
        parts.push(format!("Humidity: {humidity}%."));
    }
    if let Some(speed) = wind_mps {
        parts.push(format!("Wind: {speed} m/s."));
    }

    Ok(WeatherReport {
        summary: parts.join(" "),
        temperature_c,
        feels_like_c: main.feels_like,
        conditions,
        humidity: main.humidity,
        wind_mps,
    })
}

fn invalid(message: &str) -> ProviderError {
    ProviderError::InvalidResponse {
        provider: PROVIDER.to_string(),
        message: message.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn parse(value: serde_json::Value) -> Result<WeatherReport, ProviderError> {
        parse_weather("Paris", serde_json::from_value(value).unwrap())
    }

    #[test]
    fn test_parse_full_response() {
        let report = parse(json!({
            "weather": [{"id": 500, "main": "Rain", "description": "light rain"}],
            "main": {"temp": 17.84, "feels_like": 17.2, "humidity": 72},
            "wind": {"speed": 4.1},
            "sys": {"country": "FR"},
            "name": "Paris"
        }))
        .unwrap();

        assert_eq!(report.temperature_c, 17.84);
        assert_eq!(report.conditions, "light rain");
        assert_eq!(report.humidity, Some(72));
        assert_eq!(report.wind_mps, Some(4.1));
        assert_eq!(
            report.summary,
            "Current temperature in Paris, FR: 17.8°C (feels like 17.2°C). \
             Conditions: light rain. Humidity: 72%. Wind: 4.1 m/s."
        );
    }

    #[test]
    fn test_parse_minimal_response() {
        let report = parse(json!({"main": {"temp": 30.0}})).unwrap();
        assert_eq!(report.summary, "Current temperature in Paris: 30.0°C.");
        assert_eq!(report.conditions, "");
        assert_eq!(report.feels_like_c, None);
    }

    #[test]
    fn test_missing_temperature_is_invalid() {
        let err = parse(json!({"main": {"humidity": 10}})).unwrap_err();
        assert!(matches!(err, ProviderError::InvalidResponse { .. }));

        let err = parse(json!({"cod": "404", "message": "city not found"})).unwrap_err();
        assert_eq!(err.provider(), "weather");
    }
}
