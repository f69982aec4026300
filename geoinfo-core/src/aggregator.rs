//! Fan-out over every collector for a batch of locations, and the merge of
//! their results into one [`LocationAggregate`] per location.
//!
//! All requests of a batch run concurrently on the calling task. The currency
//! table is read once and shared. A provider failure only affects the location
//! it belongs to: missing country facts or weather make that location a
//! [`LocationFailure`], missing news or rates just leave those parts empty.

use std::collections::{HashMap, HashSet};

use futures::future::join_all;
use tracing::{info, warn};

use crate::{
    error::{AggregateError, CollectError, LocationFailure},
    model::{CountryRecord, CurrencyRateTable, LocationAggregate, LocationKey, NewsArticle, WeatherSnapshot},
    provider::Collectors,
};

/// Outcome of one batch. Every distinct requested location is in exactly one map.
#[derive(Debug, Clone, Default)]
pub struct AggregateBatch {
    pub completed: HashMap<LocationKey, LocationAggregate>,
    pub failed: HashMap<LocationKey, LocationFailure>,
}

impl AggregateBatch {
    pub fn is_empty(&self) -> bool {
        self.completed.is_empty() && self.failed.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct Aggregator {
    collectors: Collectors,
    news_count: usize,
}

impl Aggregator {
    pub fn new(collectors: Collectors, news_count: usize) -> Self {
        Self { collectors, news_count: news_count.max(1) }
    }

    pub fn collectors(&self) -> &Collectors {
        &self.collectors
    }

    /// Collects and merges data for every distinct location.
    ///
    /// Fails only when the batch is non-empty and no location could be
    /// assembled.
    #[tracing::instrument(level = "debug", skip_all)]
    pub async fn aggregate(
        &self,
        locations: impl IntoIterator<Item = LocationKey>,
    ) -> Result<AggregateBatch, AggregateError> {
        let distinct: HashSet<LocationKey> = locations.into_iter().collect();
        if distinct.is_empty() {
            return Ok(AggregateBatch::default());
        }

        let Collectors { country, weather, currency, news } = &self.collectors;
        let per_location = join_all(distinct.iter().map(|location| async move {
            let (facts, reading, headlines) = futures::join!(
                country.read(location),
                weather.read(location),
                news.read(location, self.news_count),
            );
            (location, facts, reading, headlines)
        }));

        let (rates, results) = futures::join!(currency.read(), per_location);

        let rates = match rates {
            Ok(table) => Some(table),
            Err(e) => {
                warn!("Currency rates unavailable for this batch: {e}");
                None
            }
        };

        let mut batch = AggregateBatch::default();
        for (location, country, weather, news) in results {
            match merge(location, country, weather, news, rates.as_ref()) {
                Ok(aggregate) => {
                    batch.completed.insert(location.clone(), aggregate);
                }
                Err(failure) => {
                    warn!("{failure}");
                    batch.failed.insert(location.clone(), failure);
                }
            }
        }

        info!(completed = batch.completed.len(), failed = batch.failed.len(), "Batch aggregated");

        if batch.completed.is_empty() {
            return Err(AggregateError::AllLocationsFailed {
                failures: batch.failed.into_values().collect(),
            });
        }
        Ok(batch)
    }
}

fn merge(
    location: &LocationKey,
    country: Result<CountryRecord, CollectError>,
    weather: Result<WeatherSnapshot, CollectError>,
    news: Result<Vec<NewsArticle>, CollectError>,
    rates: Option<&CurrencyRateTable>,
) -> Result<LocationAggregate, LocationFailure> {
    let news = match news {
        Ok(articles) => Some(articles),
        Err(e) => {
            warn!(%location, "News unavailable: {e}");
            None
        }
    };

    match (country, weather) {
        (Ok(country), Ok(weather)) => {
            let currency_rates =
                rates.map(|table| table.select(country.currency_codes())).unwrap_or_default();
            Ok(LocationAggregate { location: country, weather, currency_rates, news })
        }
        (country, weather) => Err(LocationFailure {
            location: location.clone(),
            errors: [country.err(), weather.err()].into_iter().flatten().collect(),
        }),
    }
}
