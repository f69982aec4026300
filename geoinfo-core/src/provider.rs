use crate::{
    Config,
    cache::{CacheKey, CachedPayload, SourceCache},
    error::{CollectError, CollectFailures},
    fetch::{FetchRequest, Fetcher},
    model::LocationKey,
    provider::{
        country::CountryCollector, currency::CurrencyCollector, news::NewsCollector,
        weather::WeatherCollector,
    },
};
use chrono::Utc;
use futures::future::join_all;
use serde_json::Value;
use std::{collections::HashSet, convert::TryFrom, fmt::Debug, path::PathBuf, sync::Arc, time::Duration};
use tracing::{debug, info, warn};

pub mod country;
pub mod currency;
pub mod news;
pub mod weather;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ProviderId {
    Country,
    Weather,
    Currency,
    News,
}

impl ProviderId {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderId::Country => "country",
            ProviderId::Weather => "weather",
            ProviderId::Currency => "currency",
            ProviderId::News => "news",
        }
    }

    pub const fn all() -> &'static [ProviderId] {
        &[ProviderId::Country, ProviderId::Weather, ProviderId::Currency, ProviderId::News]
    }

    /// Whether entries are addressed by location. Currency rates are shared by
    /// every location.
    pub fn is_per_location(&self) -> bool {
        !matches!(self, ProviderId::Currency)
    }

    pub fn default_base_url(&self) -> &'static str {
        match self {
            ProviderId::Country => "https://api.apilayer.com/geo",
            ProviderId::Weather => "https://api.openweathermap.org/data/2.5",
            ProviderId::Currency => "https://api.apilayer.com/exchangerates_data",
            ProviderId::News => "https://newsapi.org/v2",
        }
    }

    /// How long a cached payload is served without refetching.
    pub fn default_ttl(&self) -> Duration {
        match self {
            ProviderId::Country => Duration::from_secs(7 * 24 * 60 * 60),
            ProviderId::Weather => Duration::ZERO,
            ProviderId::Currency => Duration::from_secs(24 * 60 * 60),
            ProviderId::News => Duration::from_secs(60 * 60),
        }
    }
}

impl std::fmt::Display for ProviderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<&str> for ProviderId {
    type Error = anyhow::Error;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        let lower = value.to_lowercase();

        match lower.as_str() {
            "country" => Ok(ProviderId::Country),
            "weather" => Ok(ProviderId::Weather),
            "currency" => Ok(ProviderId::Currency),
            "news" => Ok(ProviderId::News),
            _ => Err(anyhow::anyhow!(
                "Unknown provider '{value}'. Supported providers: country, weather, currency, news."
            )),
        }
    }
}

/// Where a provider lives and how to authenticate against it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub base_url: String,
    pub api_key: String,
}

impl Endpoint {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self { base_url: base_url.into(), api_key: api_key.into() }
    }

    pub(crate) fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), path.trim_start_matches('/'))
    }
}

/// Fetch-then-cache plumbing shared by every collector.
///
/// Resolution order for reads: a cached payload younger than `ttl`, then a
/// fresh fetch (written through to the cache), then any older cached payload.
#[derive(Debug, Clone)]
pub struct ProviderSource {
    id: ProviderId,
    endpoint: Endpoint,
    fetcher: Arc<dyn Fetcher>,
    cache: Arc<dyn SourceCache>,
    ttl: Duration,
}

impl ProviderSource {
    pub fn new(
        id: ProviderId,
        endpoint: Endpoint,
        fetcher: Arc<dyn Fetcher>,
        cache: Arc<dyn SourceCache>,
    ) -> Self {
        Self { id, endpoint, fetcher, cache, ttl: id.default_ttl() }
    }

    pub fn from_config(
        id: ProviderId,
        config: &Config,
        fetcher: Arc<dyn Fetcher>,
        cache: Arc<dyn SourceCache>,
    ) -> anyhow::Result<Self> {
        let endpoint = Endpoint::new(config.base_url(id), config.require_api_key(id)?);
        Ok(Self::new(id, endpoint, fetcher, cache).with_ttl(config.cache_ttl(id)))
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn id(&self) -> ProviderId {
        self.id
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    pub fn cache_path(&self, location: Option<&LocationKey>) -> Option<PathBuf> {
        self.cache.path_of(&self.key(location))
    }

    fn key(&self, location: Option<&LocationKey>) -> CacheKey {
        CacheKey { provider: self.id, location: location.cloned() }
    }

    pub(crate) async fn resolve<T>(
        &self,
        location: Option<&LocationKey>,
        request: &FetchRequest,
        parse: impl Fn(&Value) -> Result<T, CollectError>,
    ) -> Result<T, CollectError> {
        let key = self.key(location);
        let cached = self.cached_entry(&key).await;

        if let Some(entry) = cached.as_ref().filter(|e| e.is_fresh(self.ttl, Utc::now())) {
            match parse(&entry.payload) {
                Ok(record) => {
                    debug!(provider = %self.id, "Serving fresh cache entry");
                    return Ok(record);
                }
                Err(e) => warn!(provider = %self.id, "Ignoring unusable cache entry: {e}"),
            }
        }

        let fetch_err = match self.fetch(request, &parse).await {
            Ok((payload, record)) => {
                if let Err(e) = self.cache.put(&key, &payload).await {
                    warn!(provider = %self.id, "Failed to write cache entry: {e}");
                }
                return Ok(record);
            }
            Err(e) => e,
        };

        match cached.map(|entry| parse(&entry.payload)) {
            Some(Ok(record)) => {
                warn!(provider = %self.id, "{fetch_err}; falling back to cached payload");
                Ok(record)
            }
            _ => Err(fetch_err),
        }
    }

    /// Fetches, validates and stores a payload, ignoring any cached entry.
    pub(crate) async fn refresh<T>(
        &self,
        location: Option<&LocationKey>,
        request: &FetchRequest,
        parse: impl Fn(&Value) -> Result<T, CollectError>,
    ) -> Result<T, CollectError> {
        let (payload, record) = self.fetch(request, &parse).await?;
        self.cache
            .put(&self.key(location), &payload)
            .await
            .map_err(|e| CollectError::from_cache(self.id, e))?;
        Ok(record)
    }

    /// Refreshes every distinct location concurrently.
    pub(crate) async fn refresh_each<'a, T>(
        &self,
        locations: impl IntoIterator<Item = &'a LocationKey>,
        request: impl Fn(&LocationKey) -> FetchRequest,
        parse: impl Fn(&LocationKey, &Value) -> Result<T, CollectError>,
    ) -> Result<(), CollectFailures> {
        let distinct: HashSet<&LocationKey> = locations.into_iter().collect();
        let (request, parse) = (&request, &parse);

        let results = join_all(distinct.into_iter().map(|location| async move {
            let outcome =
                self.refresh(Some(location), &request(location), |v| parse(location, v)).await;
            (location, outcome)
        }))
        .await;

        let total = results.len();
        let failures: Vec<_> = results
            .into_iter()
            .filter_map(|(location, outcome)| outcome.err().map(|e| (location.clone(), e)))
            .collect();

        info!(provider = %self.id, "Refreshed {} of {total} location(s)", total - failures.len());
        if failures.is_empty() { Ok(()) } else { Err(CollectFailures(failures)) }
    }

    /// Parses whatever is cached, without touching the network.
    pub(crate) async fn peek<T>(
        &self,
        location: Option<&LocationKey>,
        parse: impl Fn(&Value) -> Result<T, CollectError>,
    ) -> Result<Option<T>, CollectError> {
        match self.cache.get(&self.key(location)).await {
            Ok(Some(entry)) => parse(&entry.payload).map(Some),
            Ok(None) => Ok(None),
            Err(e) => Err(CollectError::from_cache(self.id, e)),
        }
    }

    async fn cached_entry(&self, key: &CacheKey) -> Option<CachedPayload> {
        match self.cache.get(key).await {
            Ok(entry) => entry,
            Err(e) => {
                warn!(provider = %self.id, "Cache read failed: {e}");
                None
            }
        }
    }

    async fn fetch<T>(
        &self,
        request: &FetchRequest,
        parse: impl Fn(&Value) -> Result<T, CollectError>,
    ) -> Result<(Value, T), CollectError> {
        let payload = self
            .fetcher
            .fetch_json(request)
            .await
            .map_err(|e| CollectError::from_fetch(self.id, e))?;
        let record = parse(&payload)?;
        Ok((payload, record))
    }
}

/// One collector per provider, built from the same fetcher and cache.
#[derive(Debug, Clone)]
pub struct Collectors {
    pub country: CountryCollector,
    pub weather: WeatherCollector,
    pub currency: CurrencyCollector,
    pub news: NewsCollector,
}

impl Collectors {
    /// Construct all collectors from config. Every provider needs an API key.
    pub fn from_config(
        config: &Config,
        fetcher: Arc<dyn Fetcher>,
        cache: Arc<dyn SourceCache>,
    ) -> anyhow::Result<Self> {
        let source = |id| ProviderSource::from_config(id, config, fetcher.clone(), cache.clone());

        Ok(Self {
            country: CountryCollector::new(source(ProviderId::Country)?),
            weather: WeatherCollector::new(source(ProviderId::Weather)?),
            currency: CurrencyCollector::new(source(ProviderId::Currency)?, config.base_currency()),
            news: NewsCollector::new(source(ProviderId::News)?),
        })
    }
}
