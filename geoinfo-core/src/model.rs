use std::{
    collections::{BTreeMap, BTreeSet},
    fmt,
    str::FromStr,
};

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::LocationKeyError;

/// Identifies a place to collect data for.
///
/// The country code is normalized to upper case, so `("Moscow", "ru")` and
/// `("Moscow", "RU")` are the same key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "RawLocationKey")]
pub struct LocationKey {
    capital: String,
    country_code: String,
}

#[derive(Deserialize)]
struct RawLocationKey {
    capital: String,
    country_code: String,
}

impl TryFrom<RawLocationKey> for LocationKey {
    type Error = LocationKeyError;

    fn try_from(raw: RawLocationKey) -> Result<Self, Self::Error> {
        Self::new(raw.capital, raw.country_code)
    }
}

impl LocationKey {
    pub fn new(
        capital: impl Into<String>,
        country_code: impl AsRef<str>,
    ) -> Result<Self, LocationKeyError> {
        let capital = capital.into().trim().to_string();
        if capital.is_empty() {
            return Err(LocationKeyError::EmptyCapital);
        }

        let code = country_code.as_ref().trim();
        if code.len() != 2 || !code.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(LocationKeyError::CountryCode(code.to_string()));
        }

        Ok(Self { capital, country_code: code.to_ascii_uppercase() })
    }

    pub fn capital(&self) -> &str {
        &self.capital
    }

    pub fn country_code(&self) -> &str {
        &self.country_code
    }
}

impl fmt::Display for LocationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}, {}", self.capital, self.country_code)
    }
}

/// Parses `"<capital>,<country code>"`, e.g. `"Mariehamn,AX"`.
impl FromStr for LocationKey {
    type Err = LocationKeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (capital, code) =
            s.rsplit_once(',').ok_or_else(|| LocationKeyError::Format(s.to_string()))?;
        Self::new(capital, code)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CurrencyInfo {
    pub code: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LanguageInfo {
    pub name: String,
    pub native_name: String,
}

/// Static facts about the country a location belongs to.
///
/// Languages and currencies are sets: two records listing them in a different
/// order are equal. Timezones and alternate spellings keep the source order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CountryRecord {
    pub name: String,
    pub capital: String,
    pub alpha2code: String,
    pub capital_latitude: f64,
    pub capital_longitude: f64,
    pub capital_area: Option<f64>,
    pub population: u64,
    pub subregion: String,
    pub timezones: Vec<String>,
    pub languages: BTreeSet<LanguageInfo>,
    pub currencies: BTreeSet<CurrencyInfo>,
    pub flag: String,
    pub alt_spellings: Vec<String>,
}

impl CountryRecord {
    pub fn currency_codes(&self) -> impl Iterator<Item = &str> {
        self.currencies.iter().map(|c| c.code.as_str())
    }
}

/// A point-in-time weather reading.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherSnapshot {
    /// Degrees Celsius.
    pub temperature: f64,
    /// hPa.
    pub pressure: i64,
    /// Percent.
    pub humidity: i64,
    /// m/s.
    pub wind_speed: f64,
    pub description: String,
    /// Meters.
    pub visibility: f64,
    /// Shift from UTC in seconds.
    pub utc_offset: i32,
    pub observed_at: DateTime<Utc>,
}

/// Exchange rates against a single base currency; one per process.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurrencyRateTable {
    pub base: String,
    pub date: NaiveDate,
    pub rates: BTreeMap<String, f64>,
}

impl CurrencyRateTable {
    /// Rates for the given codes; codes missing from the table are skipped.
    pub fn select<'a>(&self, codes: impl IntoIterator<Item = &'a str>) -> BTreeMap<String, f64> {
        codes
            .into_iter()
            .filter_map(|code| self.rates.get(code).map(|rate| (code.to_string(), *rate)))
            .collect()
    }
}

pub const UNKNOWN_AUTHOR: &str = "unknown";

/// A news headline. `author` is never empty: a missing or blank author becomes
/// [`UNKNOWN_AUTHOR`] when the article is built or deserialized.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewsArticle {
    title: String,
    #[serde(default = "unknown_author", deserialize_with = "author_or_unknown")]
    author: String,
    description: String,
    source: String,
    url: String,
    published_at: DateTime<Utc>,
}

fn normalize_author(author: Option<String>) -> String {
    match author {
        Some(a) if !a.trim().is_empty() => a,
        _ => UNKNOWN_AUTHOR.to_string(),
    }
}

fn unknown_author() -> String {
    UNKNOWN_AUTHOR.to_string()
}

fn author_or_unknown<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<String>::deserialize(deserializer).map(normalize_author)
}

impl NewsArticle {
    pub fn new(
        title: impl Into<String>,
        author: Option<String>,
        description: impl Into<String>,
        source: impl Into<String>,
        url: impl Into<String>,
        published_at: DateTime<Utc>,
    ) -> Self {
        Self {
            title: title.into(),
            author: normalize_author(author),
            description: description.into(),
            source: source.into(),
            url: url.into(),
            published_at,
        }
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn author(&self) -> &str {
        &self.author
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn published_at(&self) -> DateTime<Utc> {
        self.published_at
    }
}

/// Everything known about one location, ready for rendering.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationAggregate {
    pub location: CountryRecord,
    pub weather: WeatherSnapshot,
    pub currency_rates: BTreeMap<String, f64>,
    pub news: Option<Vec<NewsArticle>>,
}
