use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use crate::{
    error::{CollectError, CollectFailures},
    fetch::FetchRequest,
    model::{LocationKey, NewsArticle},
};

use super::{ProviderId, ProviderSource};

/// Top headlines for the location's country.
///
/// The whole headline page is cached; `count` is applied when reading, so
/// callers asking for different counts share one cache entry.
#[derive(Debug, Clone)]
pub struct NewsCollector {
    source: ProviderSource,
}

impl NewsCollector {
    pub fn new(source: ProviderSource) -> Self {
        Self { source }
    }

    /// Up to `count` articles (at least one) in the order the source returned them.
    pub async fn read(
        &self,
        location: &LocationKey,
        count: usize,
    ) -> Result<Vec<NewsArticle>, CollectError> {
        let mut articles = self.source.resolve(Some(location), &self.request(location), parse_news).await?;
        articles.truncate(count.max(1));
        Ok(articles)
    }

    pub async fn collect<'a>(
        &self,
        locations: impl IntoIterator<Item = &'a LocationKey>,
    ) -> Result<(), CollectFailures> {
        self.source.refresh_each(locations, |loc| self.request(loc), |_, v| parse_news(v)).await
    }

    /// Every stored article for a location, if any.
    pub async fn cached(&self, location: &LocationKey) -> Result<Option<Vec<NewsArticle>>, CollectError> {
        self.source.peek(Some(location), parse_news).await
    }

    pub fn cache_path(&self, location: &LocationKey) -> Option<PathBuf> {
        self.source.cache_path(Some(location))
    }

    fn request(&self, location: &LocationKey) -> FetchRequest {
        let endpoint = self.source.endpoint();
        FetchRequest::get(endpoint.url("top-headlines"))
            .query("country", location.country_code().to_ascii_lowercase())
            .query("apiKey", endpoint.api_key.as_str())
    }
}

#[derive(Debug, Deserialize)]
struct RawHeadlines {
    status: String,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    articles: Option<Vec<RawArticle>>,
}

#[derive(Debug, Deserialize)]
struct RawSource {
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawArticle {
    source: Option<RawSource>,
    author: Option<String>,
    title: Option<String>,
    description: Option<String>,
    url: Option<String>,
    /// Kept as text so one malformed date only drops its own article.
    published_at: Option<String>,
}

impl RawArticle {
    fn into_article(self) -> Option<NewsArticle> {
        let published_at = DateTime::parse_from_rfc3339(self.published_at.as_deref()?).ok()?;
        Some(NewsArticle::new(
            self.title?,
            self.author,
            self.description.unwrap_or_default(),
            self.source?.name?,
            self.url?,
            published_at.with_timezone(&Utc),
        ))
    }
}

fn parse_news(payload: &Value) -> Result<Vec<NewsArticle>, CollectError> {
    let invalid = |reason: String| CollectError::invalid(ProviderId::News, reason);

    let raw = RawHeadlines::deserialize(payload)
        .map_err(|e| invalid(format!("unexpected headlines payload: {e}")))?;

    if raw.status != "ok" {
        let message = raw.message.unwrap_or_else(|| raw.status.clone());
        return Err(invalid(format!("source reported failure: {message}")));
    }

    let raw_articles = raw.articles.ok_or_else(|| invalid("missing field `articles`".to_string()))?;
    let total = raw_articles.len();
    let articles: Vec<NewsArticle> =
        raw_articles.into_iter().filter_map(RawArticle::into_article).collect();

    if articles.len() < total {
        debug!("Skipped {} incomplete article(s)", total - articles.len());
    }
    Ok(articles)
}
