//! Weather lookup tool backed by OpenWeatherMap.
//!
//! Requires an API key; a missing or obviously malformed key is a
//! configuration error surfaced to the user as-is, never retried.

use crate::{MinervaError, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

/// Configuration for the weather tool.
#[derive(Debug, Clone)]
pub struct WeatherConfig {
    /// Current-weather API endpoint
    pub api_endpoint: String,
    /// API key, usually from OPENWEATHERMAP_API_KEY
    pub api_key: Option<String>,
    /// Timeout for API requests in milliseconds
    pub timeout_ms: u64,
    /// User agent string
    pub user_agent: String,
}

impl Default for WeatherConfig {
    fn default() -> Self {
        Self {
            api_endpoint: "https://api.openweathermap.org/data/2.5/weather".to_string(),
            api_key: std::env::var("OPENWEATHERMAP_API_KEY")
                .ok()
                .filter(|s| !s.is_empty()),
            timeout_ms: 10_000,
            user_agent: "minerva-agent/0.1".to_string(),
        }
    }
}

/// Shortest credential the API could plausibly accept.
const MIN_API_KEY_LEN: usize = 8;

/// A structured current-weather reading.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WeatherReading {
    /// Resolved location name as reported by the service
    pub name: String,
    /// Condition description, e.g. "overcast clouds"
    pub description: String,
    pub temperature_celsius: f64,
    pub humidity: i64,
    /// Pressure in hPa
    pub pressure: i64,
}

#[derive(Debug, Deserialize)]
struct OwmResponse {
    name: String,
    weather: Vec<OwmCondition>,
    main: OwmMain,
}

#[derive(Debug, Deserialize)]
struct OwmCondition {
    description: String,
}

#[derive(Debug, Deserialize)]
struct OwmMain {
    temp: f64,
    humidity: i64,
    pressure: i64,
}

/// Weather tool calling the OpenWeatherMap current-weather API by
/// location name.
pub struct WeatherTool {
    config: WeatherConfig,
    http_client: reqwest::Client,
}

impl Default for WeatherTool {
    fn default() -> Self {
        Self::new()
    }
}

impl WeatherTool {
    /// Create a new weather tool with default configuration
    pub fn new() -> Self {
        Self::with_config(WeatherConfig::default())
    }

    /// Create a new weather tool with custom configuration
    pub fn with_config(config: WeatherConfig) -> Self {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .user_agent(&config.user_agent)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            config,
            http_client,
        }
    }

    fn api_key(&self) -> Result<&str> {
        match self.config.api_key.as_deref() {
            Some(key) if key.len() >= MIN_API_KEY_LEN => Ok(key),
            Some(_) => Err(MinervaError::ToolConfig(
                "The configured OPENWEATHERMAP_API_KEY looks invalid (too short).".to_string(),
            )),
            None => Err(MinervaError::ToolConfig(
                "Please set OPENWEATHERMAP_API_KEY to use the weather tool.".to_string(),
            )),
        }
    }

    fn request(&self, location: &str, key: &str) -> reqwest::RequestBuilder {
        self.http_client
            .get(&self.config.api_endpoint)
            .query(&[("q", location), ("appid", key), ("units", "metric")])
    }

    /// Fetch the current weather for a location name.
    pub async fn current(&self, location: &str) -> Result<WeatherReading> {
        let key = self.api_key()?;

        debug!(target: "weather_tool", location = %location, "Fetching weather");

        let resp = self
            .request(location, key)
            .send()
            .await
            .map_err(|e| MinervaError::Tool(format!("Weather request failed: {e}")))?;

        if resp.status() == reqwest::StatusCode::UNAUTHORIZED {
            return Err(MinervaError::ToolConfig(
                "The weather service rejected the configured API key.".to_string(),
            ));
        }
        if !resp.status().is_success() {
            return Err(MinervaError::Tool(format!(
                "Weather API error: {}",
                resp.status()
            )));
        }

        let data: OwmResponse = resp
            .json()
            .await
            .map_err(|e| MinervaError::Tool(format!("Failed to parse weather response: {e}")))?;

        let description = data
            .weather
            .first()
            .map(|c| c.description.clone())
            .unwrap_or_else(|| "unknown".to_string());

        Ok(WeatherReading {
            name: data.name,
            description,
            temperature_celsius: data.main.temp,
            humidity: data.main.humidity,
            pressure: data.main.pressure,
        })
    }
}
