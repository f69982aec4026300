use std::sync::Arc;

use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use geoinfo_core::{
    AggregateError, Aggregator, Collectors, Config, FileCache, HttpFetcher, LocationKey,
    ProviderId, cache_path,
};
use inquire::{Password, PasswordDisplayMode};
use tracing::warn;

use crate::render::Renderer;

/// Top-level CLI struct.
#[derive(Debug, Parser)]
#[command(name = "geoinfo", version, about = "Country facts, weather, rates and news per location")]
pub struct Cli {
    /// Log debug output to stderr.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Configure credentials for a specific provider.
    Configure {
        /// Provider short name: "country", "weather", "currency" or "news".
        provider: String,
    },

    /// Collect and print everything known about one or more locations.
    Show {
        /// Locations as "<capital>,<country code>", e.g. "Mariehamn,AX".
        #[arg(required = true)]
        locations: Vec<LocationKey>,

        /// Headlines per location; defaults to the configured count.
        #[arg(long)]
        news: Option<usize>,
    },

    /// Refresh every provider cache for the given locations.
    Collect {
        #[arg(required = true)]
        locations: Vec<LocationKey>,
    },

    /// Print where a provider's cache file lives.
    CachePath {
        provider: String,

        /// Required for every provider except currency.
        location: Option<LocationKey>,
    },
}

impl Cli {
    pub async fn run(self) -> anyhow::Result<()> {
        match self.command {
            Command::Configure { provider } => configure(&provider),
            Command::Show { locations, news } => show(locations, news).await,
            Command::Collect { locations } => collect(&locations).await,
            Command::CachePath { provider, location } => print_cache_path(&provider, location.as_ref()),
        }
    }
}

fn configure(provider: &str) -> anyhow::Result<()> {
    let id = ProviderId::try_from(provider)?;
    let mut config = Config::load()?;

    let api_key = Password::new(&format!("API key for '{id}':"))
        .with_display_mode(PasswordDisplayMode::Masked)
        .without_confirmation()
        .prompt()
        .context("Failed to read API key")?;

    config.upsert_provider_api_key(id, api_key.trim().to_string());
    config.save()?;

    println!("Saved API key for '{id}' to {}", Config::config_file_path()?.display());
    Ok(())
}

fn collectors(config: &Config) -> anyhow::Result<Collectors> {
    let cache = Arc::new(FileCache::new(config.cache_dir()?));
    let fetcher = Arc::new(HttpFetcher::with_timeout(config.request_timeout())?);
    Collectors::from_config(config, fetcher, cache)
}

async fn show(locations: Vec<LocationKey>, news: Option<usize>) -> anyhow::Result<()> {
    let config = Config::load()?;
    let aggregator = Aggregator::new(collectors(&config)?, news.unwrap_or(config.news_count()));

    let batch = match aggregator.aggregate(locations.iter().cloned()).await {
        Ok(batch) => batch,
        Err(AggregateError::AllLocationsFailed { failures }) => {
            for failure in &failures {
                eprintln!("{failure}");
            }
            bail!("Could not collect data for any of the requested locations");
        }
    };

    // Print in the order the user asked for.
    let mut printed = Vec::new();
    for location in &locations {
        if printed.contains(&location) {
            continue;
        }
        printed.push(location);

        if let Some(aggregate) = batch.completed.get(location) {
            println!("{}", Renderer::new(aggregate).render());
        } else if let Some(failure) = batch.failed.get(location) {
            eprintln!("{failure}");
        }
    }

    Ok(())
}

async fn collect(locations: &[LocationKey]) -> anyhow::Result<()> {
    let config = Config::load()?;
    let collectors = collectors(&config)?;

    let (country, (), currency, news) = tokio::join!(
        collectors.country.collect(locations),
        collectors.weather.collect(locations),
        collectors.currency.collect(),
        collectors.news.collect(locations),
    );

    let mut failed = false;
    if let Err(e) = country {
        warn!("{e}");
        failed = true;
    }
    if let Err(e) = currency {
        warn!("{e}");
        failed = true;
    }
    if let Err(e) = news {
        warn!("{e}");
        failed = true;
    }

    if failed {
        bail!("Some caches could not be refreshed; run with --verbose for details");
    }
    println!("Caches refreshed in {}", config.cache_dir()?.display());
    Ok(())
}

fn print_cache_path(provider: &str, location: Option<&LocationKey>) -> anyhow::Result<()> {
    let id = ProviderId::try_from(provider)?;
    let location = match (id.is_per_location(), location) {
        (true, None) => bail!("Provider '{id}' caches per location; pass \"<capital>,<cc>\""),
        (true, loc) => loc,
        (false, _) => None,
    };

    let config = Config::load()?;
    println!("{}", cache_path(&config.cache_dir()?, id, location).display());
    Ok(())
}
