use std::{collections::BTreeMap, path::PathBuf};

use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::Value;

use crate::{error::CollectError, fetch::FetchRequest, model::CurrencyRateTable};

use super::{ProviderId, ProviderSource};

/// The process-wide exchange rate table, quoted against one base currency.
#[derive(Debug, Clone)]
pub struct CurrencyCollector {
    source: ProviderSource,
    base: String,
}

impl CurrencyCollector {
    pub fn new(source: ProviderSource, base: impl Into<String>) -> Self {
        Self { source, base: base.into().to_ascii_uppercase() }
    }

    pub fn base(&self) -> &str {
        &self.base
    }

    pub async fn read(&self) -> Result<CurrencyRateTable, CollectError> {
        self.source.resolve(None, &self.request(), |v| parse_rates(&self.base, v)).await
    }

    /// Refetches the rate table and replaces the stored copy.
    pub async fn collect(&self) -> Result<(), CollectError> {
        self.source.refresh(None, &self.request(), |v| parse_rates(&self.base, v)).await.map(drop)
    }

    pub async fn cached(&self) -> Result<Option<CurrencyRateTable>, CollectError> {
        self.source.peek(None, |v| parse_rates(&self.base, v)).await
    }

    pub fn cache_path(&self) -> Option<PathBuf> {
        self.source.cache_path(None)
    }

    fn request(&self) -> FetchRequest {
        let endpoint = self.source.endpoint();
        FetchRequest::get(endpoint.url("latest"))
            .query("base", self.base.as_str())
            .header("apikey", endpoint.api_key.as_str())
    }
}

#[derive(Debug, Deserialize)]
struct RawRates {
    #[serde(default = "default_success")]
    success: bool,
    #[serde(default)]
    error: Option<Value>,
    base: Option<String>,
    date: Option<NaiveDate>,
    rates: Option<BTreeMap<String, f64>>,
}

fn default_success() -> bool {
    true
}

fn parse_rates(expected_base: &str, payload: &Value) -> Result<CurrencyRateTable, CollectError> {
    let invalid = |reason: String| CollectError::invalid(ProviderId::Currency, reason);

    let raw = RawRates::deserialize(payload)
        .map_err(|e| invalid(format!("unexpected rates payload: {e}")))?;

    if !raw.success {
        let detail = raw.error.map(|e| e.to_string()).unwrap_or_else(|| "no details".to_string());
        return Err(invalid(format!("source reported failure: {detail}")));
    }

    let base = raw.base.ok_or_else(|| invalid("missing field `base`".to_string()))?;
    let date = raw.date.ok_or_else(|| invalid("missing field `date`".to_string()))?;
    let rates = raw.rates.ok_or_else(|| invalid("missing field `rates`".to_string()))?;

    if !base.eq_ignore_ascii_case(expected_base) {
        return Err(invalid(format!("rates are quoted in {base}, expected {expected_base}")));
    }

    Ok(CurrencyRateTable { base, date, rates })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        cache::FileCache,
        provider::Endpoint,
        testing::{ScriptedFetcher, exchange_rates},
    };
    use serde_json::json;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn collector(fetcher: ScriptedFetcher, dir: &TempDir) -> CurrencyCollector {
        CurrencyCollector::new(
            ProviderSource::new(
                ProviderId::Currency,
                Endpoint::new("http://rates.test", "KEY"),
                Arc::new(fetcher),
                Arc::new(FileCache::new(dir.path())),
            ),
            "rub",
        )
    }

    #[tokio::test]
    async fn read_exposes_every_code_of_the_source() {
        let dir = TempDir::new().unwrap();
        let fetcher = ScriptedFetcher::new(|_| Ok(exchange_rates("RUB", 170)));
        let calls = fetcher.calls();

        let rates = collector(fetcher, &dir).read().await.unwrap();

        assert_eq!(rates.base.to_lowercase(), "rub");
        assert_eq!(rates.rates.len(), 170);
        assert_eq!(rates.date, NaiveDate::from_ymd_opt(2022, 9, 14).unwrap());
        assert_eq!(calls.requests()[0].query_value("base"), Some("RUB"));
    }

    #[tokio::test]
    async fn collect_persists_what_read_returns() {
        let dir = TempDir::new().unwrap();
        let collector = collector(ScriptedFetcher::new(|_| Ok(exchange_rates("RUB", 170))), &dir);

        collector.collect().await.unwrap();

        let path = collector.cache_path().expect("file cache has a path");
        assert_eq!(path, dir.path().join("currency.json"));
        let on_disk: Value = serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();

        let read = collector.read().await.unwrap();
        assert_eq!(on_disk["base"], json!(read.base));
        assert_eq!(on_disk["rates"].as_object().unwrap().len(), read.rates.len());
    }

    #[tokio::test]
    async fn read_serves_the_collected_table_without_refetching() {
        let dir = TempDir::new().unwrap();
        let fetcher = ScriptedFetcher::new(|_| Ok(exchange_rates("RUB", 3)));
        let calls = fetcher.calls();
        let collector = collector(fetcher, &dir);

        collector.collect().await.unwrap();
        collector.read().await.unwrap();

        assert_eq!(calls.count(), 1);
        assert_eq!(collector.cached().await.unwrap().unwrap().rates.len(), 3);
    }

    #[tokio::test]
    async fn wrong_base_is_invalid_payload() {
        let dir = TempDir::new().unwrap();
        let collector = collector(ScriptedFetcher::new(|_| Ok(exchange_rates("USD", 3))), &dir);

        let err = collector.read().await.unwrap_err();
        assert!(matches!(err, CollectError::InvalidPayload { .. }));
        assert!(err.to_string().contains("expected RUB"));
    }

    #[tokio::test]
    async fn reported_failures_are_invalid_payloads() {
        let dir = TempDir::new().unwrap();
        let collector = collector(
            ScriptedFetcher::new(|_| {
                Ok(json!({"success": false, "error": {"code": 101, "info": "invalid key"}}))
            }),
            &dir,
        );

        let err = collector.collect().await.unwrap_err();
        assert!(err.to_string().contains("invalid key"));
        assert!(!dir.path().join("currency.json").exists());
    }
}
