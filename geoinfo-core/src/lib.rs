//! Core library for the `geoinfo` CLI.
//!
//! This crate defines:
//! - Shared domain models (location keys, country facts, weather, rates, news)
//! - A swappable local cache of raw provider payloads
//! - One collector per external provider, with cache fallback
//! - The aggregator merging all providers into one record per location
//! - Configuration & credentials handling
//!
//! It is used by `geoinfo-cli`, but can also be reused by other binaries or services.

pub mod aggregator;
pub mod cache;
pub mod config;
pub mod error;
pub mod fetch;
pub mod model;
pub mod provider;

#[cfg(test)]
pub(crate) mod testing;

pub use aggregator::{AggregateBatch, Aggregator};
pub use cache::{CacheKey, FileCache, MemoryCache, SourceCache, cache_path};
pub use config::{Config, ProviderConfig};
pub use error::{AggregateError, CollectError, CollectFailures, LocationFailure};
pub use fetch::{FetchRequest, Fetcher, HttpFetcher};
pub use model::{
    CountryRecord, CurrencyRateTable, LocationAggregate, LocationKey, NewsArticle, WeatherSnapshot,
};
pub use provider::{Collectors, ProviderId};
