//! Error types shared by the collectors, the cache and the aggregator.

use std::path::PathBuf;

use thiserror::Error;

use crate::{model::LocationKey, provider::ProviderId};

/// Failure of a single (provider, location) collection unit.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CollectError {
    /// The fetch failed and there was nothing usable in the cache.
    #[error("{provider} source unavailable: {reason}")]
    SourceUnavailable { provider: ProviderId, reason: String },

    /// The source answered, but the payload did not have the expected shape.
    #[error("{provider} returned an invalid payload: {reason}")]
    InvalidPayload { provider: ProviderId, reason: String },

    #[error("{provider} cache error: {reason}")]
    Cache { provider: ProviderId, reason: String },
}

impl CollectError {
    pub fn unavailable(provider: ProviderId, reason: impl Into<String>) -> Self {
        Self::SourceUnavailable { provider, reason: reason.into() }
    }

    pub fn invalid(provider: ProviderId, reason: impl Into<String>) -> Self {
        Self::InvalidPayload { provider, reason: reason.into() }
    }

    pub fn provider(&self) -> ProviderId {
        match self {
            Self::SourceUnavailable { provider, .. }
            | Self::InvalidPayload { provider, .. }
            | Self::Cache { provider, .. } => *provider,
        }
    }

    pub(crate) fn from_fetch(provider: ProviderId, err: FetchError) -> Self {
        match err {
            FetchError::Decode(reason) => Self::invalid(provider, reason),
            other => Self::unavailable(provider, other.to_string()),
        }
    }

    pub(crate) fn from_cache(provider: ProviderId, err: CacheError) -> Self {
        Self::Cache { provider, reason: err.to_string() }
    }
}

/// Errors produced by a [`crate::fetch::Fetcher`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    #[error("request failed: {0}")]
    Transport(String),

    #[error("request failed with status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("response is not valid JSON: {0}")]
    Decode(String),
}

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed cache entry: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LocationKeyError {
    #[error("country code '{0}' must be exactly two ASCII letters")]
    CountryCode(String),

    #[error("capital name must not be empty")]
    EmptyCapital,

    #[error("expected '<capital>,<country code>', got '{0}'")]
    Format(String),
}

/// Locations a per-location `collect` could not refresh. Every other location
/// in the batch was refreshed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("failed to refresh {} location(s): {}", .0.len(), describe(.0))]
pub struct CollectFailures(pub Vec<(LocationKey, CollectError)>);

fn describe(failures: &[(LocationKey, CollectError)]) -> String {
    failures.iter().map(|(loc, err)| format!("[{loc}] {err}")).collect::<Vec<_>>().join("; ")
}

/// A location whose aggregate could not be assembled because a required
/// constituent (country facts or weather) is missing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocationFailure {
    pub location: LocationKey,
    pub errors: Vec<CollectError>,
}

impl std::fmt::Display for LocationFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: ", self.location)?;
        for (i, err) in self.errors.iter().enumerate() {
            if i > 0 {
                f.write_str("; ")?;
            }
            write!(f, "{err}")?;
        }
        Ok(())
    }
}

#[derive(Debug, Error)]
pub enum AggregateError {
    #[error("collection failed for every requested location ({} total)", .failures.len())]
    AllLocationsFailed { failures: Vec<LocationFailure> },
}
