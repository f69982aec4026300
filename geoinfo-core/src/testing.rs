//! Test doubles and payload fixtures shared by the unit tests.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::{Value, json};

use crate::{
    error::FetchError,
    fetch::{FetchRequest, Fetcher},
};

type Script = dyn Fn(&FetchRequest) -> Result<Value, FetchError> + Send + Sync;

/// A [`Fetcher`] answering from a closure and recording every request.
pub struct ScriptedFetcher {
    script: Box<Script>,
    calls: CallLog,
}

impl std::fmt::Debug for ScriptedFetcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScriptedFetcher").field("calls", &self.calls.count()).finish()
    }
}

#[derive(Debug, Clone, Default)]
pub struct CallLog(Arc<Mutex<Vec<FetchRequest>>>);

impl CallLog {
    pub fn count(&self) -> usize {
        self.0.lock().unwrap().len()
    }

    pub fn requests(&self) -> Vec<FetchRequest> {
        self.0.lock().unwrap().clone()
    }
}

impl ScriptedFetcher {
    pub fn new(
        script: impl Fn(&FetchRequest) -> Result<Value, FetchError> + Send + Sync + 'static,
    ) -> Self {
        Self { script: Box::new(script), calls: CallLog::default() }
    }

    pub fn failing() -> Self {
        Self::new(|_| Err(FetchError::Transport("connection refused".into())))
    }

    pub fn calls(&self) -> CallLog {
        self.calls.clone()
    }
}

#[async_trait]
impl Fetcher for ScriptedFetcher {
    async fn fetch_json(&self, request: &FetchRequest) -> Result<Value, FetchError> {
        self.calls.0.lock().unwrap().push(request.clone());
        (self.script)(request)
    }
}

pub fn aland_country() -> Value {
    json!([{
        "name": "Åland Islands",
        "capital": "Mariehamn",
        "alpha2code": "AX",
        "alt_spellings": ["AX", "Aaland", "Aland", "Ahvenanmaa"],
        "currencies": [{"code": "EUR", "name": "Euro", "symbol": "€"}],
        "flag": "http://assets.promptapi.com/flags/AX.svg",
        "languages": [{"name": "Swedish", "native_name": "svenska", "iso639_1": "sv"}],
        "population": 28875,
        "subregion": "Northern Europe",
        "latitude": 60.0973,
        "longitude": 19.9348,
        "area": 1580.0,
        "timezones": ["UTC+02:00"]
    }])
}

pub fn russia_country() -> Value {
    json!([{
        "name": "Russian Federation",
        "capital": "Moscow",
        "alpha2code": "RU",
        "alt_spellings": ["RU", "Rossiya"],
        "currencies": [{"code": "RUB"}],
        "flag": "http://assets.promptapi.com/flags/RU.svg",
        "languages": [{"name": "Russian", "native_name": "Русский"}],
        "population": 146599183,
        "subregion": "Eastern Europe",
        "latitude": 55.7558,
        "longitude": 37.6173,
        "area": 17124442.0,
        "timezones": ["UTC+03:00", "UTC+04:00"]
    }])
}

pub fn openweather_current() -> Value {
    json!({
        "weather": [{"id": 802, "main": "Clouds", "description": "scattered clouds"}],
        "main": {"temp": 13.92, "feels_like": 12.8, "pressure": 1023, "humidity": 54},
        "visibility": 10000,
        "wind": {"speed": 4.63, "deg": 220},
        "dt": 1680179014,
        "timezone": 10800,
        "name": "Moscow"
    })
}

pub fn exchange_rates(base: &str, codes: usize) -> Value {
    let mut rates = serde_json::Map::new();
    rates.insert("EUR".into(), json!(0.016503));
    for i in 0..codes.saturating_sub(1) {
        let code = format!("X{}{}", (b'A' + (i / 26) as u8) as char, (b'A' + (i % 26) as u8) as char);
        rates.insert(code, json!(0.01 * (i + 1) as f64));
    }
    json!({
        "success": true,
        "timestamp": 1663150000,
        "base": base,
        "date": "2022-09-14",
        "rates": rates
    })
}

pub fn top_headlines(count: usize) -> Value {
    let articles: Vec<Value> = (0..count)
        .map(|i| {
            json!({
                "source": {"id": null, "name": format!("Source {i}")},
                "author": if i % 2 == 0 { Value::Null } else { json!(format!("Author {i}")) },
                "title": format!("Headline {i}"),
                "description": format!("Description {i}"),
                "url": format!("https://news.test/{i}"),
                "publishedAt": "2023-03-30T12:42:34Z"
            })
        })
        .collect();
    json!({"status": "ok", "totalResults": count, "articles": articles})
}
