//! Table output for one [`LocationAggregate`].

use std::{collections::BTreeSet, fmt};

use chrono::{DateTime, Utc};
use geoinfo_core::{LocationAggregate, model::LanguageInfo};
use prettytable::{Table, format, row};
use rust_decimal::{Decimal, RoundingStrategy};

const DATE_FORMAT: &str = "%d.%m.%Y %H:%M";

const TITLE_WIDTH: usize = 25;
const URL_WIDTH: usize = 25;
const DESCRIPTION_WIDTH: usize = 45;

pub struct Renderer<'a> {
    info: &'a LocationAggregate,
}

/// The three tables for one location, printable with `{}`.
pub struct Rendered {
    location: Table,
    weather: Table,
    news: Option<Table>,
}

impl fmt::Display for Rendered {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.location)?;
        writeln!(f, "Погода:")?;
        write!(f, "{}", self.weather)?;
        if let Some(news) = &self.news {
            writeln!(f, "Новости")?;
            write!(f, "{news}")?;
        }
        Ok(())
    }
}

impl<'a> Renderer<'a> {
    pub fn new(info: &'a LocationAggregate) -> Self {
        Self { info }
    }

    pub fn render(&self) -> Rendered {
        Rendered {
            location: self.location_table(),
            weather: self.weather_table(),
            news: self.news_table(),
        }
    }

    fn location_table(&self) -> Table {
        let country = &self.info.location;

        let mut table = Table::new();
        table.set_titles(row![
            "Страна",
            "Столица",
            "Широта",
            "Долгота",
            "Регион",
            "Население страны",
            "Языки",
            "Площадь",
            "Часовой пояс",
            "Курсы валют",
        ]);
        table.add_row(row![
            country.name,
            country.capital,
            country.capital_latitude,
            country.capital_longitude,
            country.subregion,
            format!("{} чел.", format_population(country.population)),
            format_languages(&country.languages),
            format_area(country.capital_area),
            country.timezones.first().map(String::as_str).unwrap_or("-"),
            format_currency_rates(self.info.currency_rates.iter()),
        ]);
        table
    }

    fn weather_table(&self) -> Table {
        let weather = &self.info.weather;

        let mut table = Table::new();
        table.set_titles(row![
            "Температура",
            "Описание",
            "Видимость",
            "Скорость ветра",
            "Время получения данных",
        ]);
        table.add_row(row![
            format!("{} °C", weather.temperature),
            weather.description,
            format!("{} м.", weather.visibility),
            format!("{} м/с.", weather.wind_speed),
            format_date(weather.observed_at),
        ]);
        table
    }

    fn news_table(&self) -> Option<Table> {
        let articles = self.info.news.as_ref()?;

        let mut table = Table::new();
        table.set_format(*format::consts::FORMAT_BOX_CHARS);
        table.set_titles(row![
            "Источник",
            "Название",
            "Автор",
            "Ссылка",
            "Описание",
            "Дата публикации",
        ]);
        for article in articles {
            table.add_row(row![
                article.source(),
                wrap(article.title(), TITLE_WIDTH),
                article.author(),
                wrap(article.url(), URL_WIDTH),
                wrap(article.description(), DESCRIPTION_WIDTH),
                format_date(article.published_at()),
            ]);
        }
        Some(table)
    }
}

/// `28875` becomes `28.875`.
pub fn format_population(population: u64) -> String {
    let digits = population.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push('.');
        }
        out.push(c);
    }
    out
}

/// `Name (native name)` pairs joined by `, `, in the set's alphabetical order
/// rather than the order the source listed them.
pub fn format_languages(languages: &BTreeSet<LanguageInfo>) -> String {
    languages
        .iter()
        .map(|l| format!("{} ({})", l.name, l.native_name))
        .collect::<Vec<_>>()
        .join(", ")
}

pub fn format_area(area: Option<f64>) -> String {
    match area {
        Some(area) => format!("{area} кв. км."),
        None => "-".to_string(),
    }
}

/// Rate rounded half-up to two decimals, e.g. `EUR = 0.02 руб.`.
pub fn format_rate(code: &str, rate: f64) -> String {
    let rounded = Decimal::from_f64_retain(rate)
        .map(|d| d.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero))
        .map(|d| format!("{d:.2}"))
        .unwrap_or_else(|| rate.to_string());
    format!("{code} = {rounded} руб.")
}

pub fn format_currency_rates<'a>(rates: impl Iterator<Item = (&'a String, &'a f64)>) -> String {
    rates.map(|(code, rate)| format_rate(code, *rate)).collect::<Vec<_>>().join(", ")
}

pub fn format_date(at: DateTime<Utc>) -> String {
    at.format(DATE_FORMAT).to_string()
}

/// Hard-wraps text into lines of at most `width` characters.
pub fn wrap(text: &str, width: usize) -> String {
    let chars: Vec<char> = text.chars().collect();
    chars.chunks(width.max(1)).map(|chunk| chunk.iter().collect::<String>()).collect::<Vec<_>>().join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use geoinfo_core::{
        CountryRecord, NewsArticle, WeatherSnapshot,
        model::CurrencyInfo,
    };

    fn aland() -> LocationAggregate {
        LocationAggregate {
            location: CountryRecord {
                name: "Åland Islands".into(),
                capital: "Mariehamn".into(),
                alpha2code: "AX".into(),
                capital_latitude: 60.0973,
                capital_longitude: 19.9348,
                capital_area: Some(1580.0),
                population: 28875,
                subregion: "Northern Europe".into(),
                timezones: vec!["UTC+02:00".into()],
                languages: [LanguageInfo { name: "Swedish".into(), native_name: "svenska".into() }]
                    .into_iter()
                    .collect(),
                currencies: [CurrencyInfo { code: "EUR".into() }].into_iter().collect(),
                flag: "http://assets.promptapi.com/flags/AX.svg".into(),
                alt_spellings: vec!["AX".into(), "Aaland".into()],
            },
            weather: WeatherSnapshot {
                temperature: 13.92,
                pressure: 1023,
                humidity: 54,
                wind_speed: 4.63,
                description: "scattered clouds".into(),
                visibility: 10000.0,
                utc_offset: 3600,
                observed_at: Utc.with_ymd_and_hms(2023, 3, 30, 12, 23, 34).unwrap(),
            },
            currency_rates: [("EUR".to_string(), 0.016503)].into_iter().collect(),
            news: Some(vec![NewsArticle::new(
                "Maia Sandu: Republica Moldova este ținta unor atacuri hibride",
                None,
                "Preşedinta Maia Sandu a avertizat",
                "Adevarul.ro",
                "https://adevarul.ro/stiri-externe/republica-moldova/2254533.html",
                Utc.with_ymd_and_hms(2023, 3, 30, 12, 42, 34).unwrap(),
            )]),
        }
    }

    #[test]
    fn population_uses_dot_grouping() {
        assert_eq!(format_population(28875), "28.875");
        assert_eq!(format_population(146599183), "146.599.183");
        assert_eq!(format_population(999), "999");
        assert_eq!(format_population(0), "0");
    }

    #[test]
    fn rates_round_half_up_to_two_places() {
        assert_eq!(format_rate("EUR", 0.016503), "EUR = 0.02 руб.");
        assert_eq!(format_rate("USD", 0.125), "USD = 0.13 руб.");
        assert_eq!(format_rate("RUB", 1.0), "RUB = 1.00 руб.");
    }

    #[test]
    fn languages_print_in_alphabetical_order() {
        let languages: BTreeSet<LanguageInfo> = [
            LanguageInfo { name: "Swedish".into(), native_name: "svenska".into() },
            LanguageInfo { name: "Finnish".into(), native_name: "suomi".into() },
        ]
        .into_iter()
        .collect();

        assert_eq!(format_languages(&languages), "Finnish (suomi), Swedish (svenska)");
    }

    #[test]
    fn dates_use_day_first_format() {
        let at = Utc.with_ymd_and_hms(2023, 3, 30, 12, 42, 34).unwrap();
        assert_eq!(format_date(at), "30.03.2023 12:42");
    }

    #[test]
    fn wrap_splits_on_character_count() {
        assert_eq!(wrap("abcdef", 4), "abcd\nef");
        assert_eq!(wrap("жжжж", 2), "жж\nжж");
        assert_eq!(wrap("", 3), "");
    }

    #[test]
    fn rendered_tables_contain_formatted_fields() {
        let aggregate = aland();
        let output = Renderer::new(&aggregate).render().to_string();

        assert!(output.contains("Åland Islands"));
        assert!(output.contains("28.875 чел."));
        assert!(output.contains("Swedish (svenska)"));
        assert!(output.contains("1580 кв. км."));
        assert!(output.contains("UTC+02:00"));
        assert!(output.contains("EUR = 0.02 руб."));
        assert!(output.contains("13.92 °C"));
        assert!(output.contains("10000 м."));
        assert!(output.contains("30.03.2023 12:23"));
        assert!(output.contains("Новости"));
        assert!(output.contains("unknown"));
        assert!(output.contains("30.03.2023 12:42"));
    }

    #[test]
    fn news_table_is_omitted_without_news() {
        let mut aggregate = aland();
        aggregate.news = None;

        let output = Renderer::new(&aggregate).render().to_string();
        assert!(!output.contains("Новости"));
        assert!(output.contains("Погода:"));
    }
}
