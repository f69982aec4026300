use std::path::PathBuf;

use serde::Deserialize;
use serde_json::Value;

use crate::{
    error::{CollectError, CollectFailures},
    fetch::FetchRequest,
    model::{CountryRecord, CurrencyInfo, LanguageInfo, LocationKey},
};

use super::{ProviderId, ProviderSource};

/// Country facts, addressed by the location's country code.
#[derive(Debug, Clone)]
pub struct CountryCollector {
    source: ProviderSource,
}

impl CountryCollector {
    pub fn new(source: ProviderSource) -> Self {
        Self { source }
    }

    pub async fn read(&self, location: &LocationKey) -> Result<CountryRecord, CollectError> {
        self.source
            .resolve(Some(location), &self.request(location), |v| parse_country(location, v))
            .await
    }

    /// Refetches and stores the facts for every distinct location.
    pub async fn collect<'a>(
        &self,
        locations: impl IntoIterator<Item = &'a LocationKey>,
    ) -> Result<(), CollectFailures> {
        self.source.refresh_each(locations, |loc| self.request(loc), parse_country).await
    }

    /// The stored record for a location, if any.
    pub async fn cached(&self, location: &LocationKey) -> Result<Option<CountryRecord>, CollectError> {
        self.source.peek(Some(location), |v| parse_country(location, v)).await
    }

    pub fn cache_path(&self, location: &LocationKey) -> Option<PathBuf> {
        self.source.cache_path(Some(location))
    }

    fn request(&self, location: &LocationKey) -> FetchRequest {
        let endpoint = self.source.endpoint();
        FetchRequest::get(endpoint.url(&format!("country/code/{}", location.country_code())))
            .header("apikey", endpoint.api_key.as_str())
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawCountries {
    Many(Vec<RawCountry>),
    One(RawCountry),
}

#[derive(Debug, Deserialize)]
struct RawCountry {
    name: String,
    capital: String,
    alpha2code: String,
    #[serde(default)]
    alt_spellings: Vec<String>,
    #[serde(default)]
    currencies: Vec<RawCurrency>,
    #[serde(default)]
    flag: String,
    #[serde(default)]
    languages: Vec<RawLanguage>,
    population: u64,
    #[serde(default)]
    subregion: String,
    latitude: f64,
    longitude: f64,
    area: Option<f64>,
    #[serde(default)]
    timezones: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct RawCurrency {
    code: String,
}

#[derive(Debug, Deserialize)]
struct RawLanguage {
    name: String,
    native_name: String,
}

fn parse_country(location: &LocationKey, payload: &Value) -> Result<CountryRecord, CollectError> {
    let invalid = |reason: String| CollectError::invalid(ProviderId::Country, reason);

    let countries = match RawCountries::deserialize(payload) {
        Ok(RawCountries::Many(list)) => list,
        Ok(RawCountries::One(country)) => vec![country],
        Err(e) => return Err(invalid(format!("unexpected country payload: {e}"))),
    };

    let raw = countries
        .into_iter()
        .find(|c| c.alpha2code.eq_ignore_ascii_case(location.country_code()))
        .ok_or_else(|| invalid(format!("no country with code {}", location.country_code())))?;

    Ok(CountryRecord {
        name: raw.name,
        capital: raw.capital,
        alpha2code: raw.alpha2code.to_ascii_uppercase(),
        capital_latitude: raw.latitude,
        capital_longitude: raw.longitude,
        capital_area: raw.area,
        population: raw.population,
        subregion: raw.subregion,
        timezones: raw.timezones,
        languages: raw
            .languages
            .into_iter()
            .map(|l| LanguageInfo { name: l.name, native_name: l.native_name })
            .collect(),
        currencies: raw.currencies.into_iter().map(|c| CurrencyInfo { code: c.code }).collect(),
        flag: raw.flag,
        alt_spellings: raw.alt_spellings,
    })
}
