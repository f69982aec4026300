use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;
use tracing::warn;

use crate::{
    error::CollectError,
    fetch::FetchRequest,
    model::{LocationKey, WeatherSnapshot},
};

use super::{ProviderId, ProviderSource};

/// Current weather from OpenWeather, addressed by `"<capital>,<cc>"`.
#[derive(Debug, Clone)]
pub struct WeatherCollector {
    source: ProviderSource,
}

impl WeatherCollector {
    pub fn new(source: ProviderSource) -> Self {
        Self { source }
    }

    pub async fn read(&self, location: &LocationKey) -> Result<WeatherSnapshot, CollectError> {
        self.source.resolve(Some(location), &self.request(location), parse_weather).await
    }

    /// Warms the cache for every distinct location. Nothing is returned:
    /// failures are logged and a later `read` fetches again anyway.
    pub async fn collect<'a>(&self, locations: impl IntoIterator<Item = &'a LocationKey>) {
        let outcome = self
            .source
            .refresh_each(locations, |loc| self.request(loc), |_, v| parse_weather(v))
            .await;

        if let Err(failures) = outcome {
            for (location, err) in failures.0 {
                warn!(%location, "Weather refresh failed: {err}");
            }
        }
    }

    pub fn cache_path(&self, location: &LocationKey) -> Option<PathBuf> {
        self.source.cache_path(Some(location))
    }

    fn request(&self, location: &LocationKey) -> FetchRequest {
        let endpoint = self.source.endpoint();
        FetchRequest::get(endpoint.url("weather"))
            .query("q", format!("{},{}", location.capital(), location.country_code()))
            .query("appid", endpoint.api_key.as_str())
            .query("units", "metric")
    }
}

#[derive(Debug, Deserialize)]
struct OwMain {
    temp: f64,
    pressure: i64,
    humidity: i64,
}

#[derive(Debug, Deserialize)]
struct OwWeather {
    description: String,
}

#[derive(Debug, Deserialize)]
struct OwWind {
    speed: f64,
}

#[derive(Debug, Deserialize)]
struct OwCurrentResponse {
    dt: i64,
    timezone: i32,
    visibility: f64,
    main: OwMain,
    weather: Vec<OwWeather>,
    wind: OwWind,
}

fn parse_weather(payload: &Value) -> Result<WeatherSnapshot, CollectError> {
    let parsed = OwCurrentResponse::deserialize(payload).map_err(|e| {
        CollectError::invalid(ProviderId::Weather, format!("unexpected weather payload: {e}"))
    })?;

    let observed_at = DateTime::<Utc>::from_timestamp(parsed.dt, 0).ok_or_else(|| {
        CollectError::invalid(ProviderId::Weather, format!("timestamp {} out of range", parsed.dt))
    })?;

    let description = parsed
        .weather
        .first()
        .map(|w| w.description.clone())
        .unwrap_or_else(|| "Unknown".to_string());

    Ok(WeatherSnapshot {
        temperature: parsed.main.temp,
        pressure: parsed.main.pressure,
        humidity: parsed.main.humidity,
        wind_speed: parsed.wind.speed,
        description,
        visibility: parsed.visibility,
        utc_offset: parsed.timezone,
        observed_at,
    })
}
