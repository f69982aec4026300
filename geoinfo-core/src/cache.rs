//! Local persistence of the last payload fetched from each provider.
//!
//! Entries hold the raw provider payload, so a cached document is parsed by
//! exactly the same code as a fresh response. Two implementations exist:
//! [`FileCache`] (one JSON file per entry) and [`MemoryCache`].

use std::{
    collections::HashMap,
    fmt::Debug,
    io,
    path::{Path, PathBuf},
    sync::{
        Mutex,
        atomic::{AtomicU64, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use tracing::debug;

use crate::{error::CacheError, model::LocationKey, provider::ProviderId};

/// Address of one cache entry. Process-wide providers (currency) use no location.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub provider: ProviderId,
    pub location: Option<LocationKey>,
}

impl CacheKey {
    pub fn global(provider: ProviderId) -> Self {
        Self { provider, location: None }
    }

    pub fn located(provider: ProviderId, location: &LocationKey) -> Self {
        Self { provider, location: Some(location.clone()) }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CachedPayload {
    pub payload: Value,
    pub stored_at: DateTime<Utc>,
}

impl CachedPayload {
    /// A zero TTL means entries are never fresh.
    pub fn is_fresh(&self, ttl: Duration, now: DateTime<Utc>) -> bool {
        if ttl.is_zero() {
            return false;
        }
        match chrono::Duration::from_std(ttl) {
            Ok(ttl) => now.signed_duration_since(self.stored_at) < ttl,
            Err(_) => true,
        }
    }
}

#[async_trait]
pub trait SourceCache: Send + Sync + Debug {
    async fn get(&self, key: &CacheKey) -> Result<Option<CachedPayload>, CacheError>;

    /// Replaces any previous entry for `key`.
    async fn put(&self, key: &CacheKey, payload: &Value) -> Result<(), CacheError>;

    /// Where the entry lives on disk, for caches that have a disk.
    fn path_of(&self, _key: &CacheKey) -> Option<PathBuf> {
        None
    }
}

/// Deterministic on-disk location of a cache entry.
///
/// `root/currency.json` for process-wide providers and
/// `root/<provider>/<cc>_<capital slug>.json` for per-location ones. Distinct
/// locations always map to distinct files.
pub fn cache_path(root: &Path, provider: ProviderId, location: Option<&LocationKey>) -> PathBuf {
    match location {
        None => root.join(format!("{}.json", provider.as_str())),
        Some(loc) => root.join(provider.as_str()).join(format!(
            "{}_{}.json",
            loc.country_code().to_ascii_lowercase(),
            slug(loc.capital())
        )),
    }
}

/// Reversible file-name encoding of a capital, safe on case-insensitive file
/// systems: `a-z` and `0-9` are kept, an upper-case ASCII letter becomes `+`
/// and its lower case, a space becomes `-`, and any other character becomes
/// its code point in hex between underscores.
fn slug(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            'a'..='z' | '0'..='9' => out.push(c),
            'A'..='Z' => {
                out.push('+');
                out.push(c.to_ascii_lowercase());
            }
            ' ' => out.push('-'),
            other => out.push_str(&format!("_{:x}_", u32::from(other))),
        }
    }
    out
}

static TMP_COUNTER: AtomicU64 = AtomicU64::new(0);

#[derive(Debug, Clone)]
pub struct FileCache {
    root: PathBuf,
}

impl FileCache {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path_for(&self, key: &CacheKey) -> PathBuf {
        cache_path(&self.root, key.provider, key.location.as_ref())
    }
}

fn io_err(path: &Path) -> impl FnOnce(io::Error) -> CacheError + '_ {
    move |source| CacheError::Io { path: path.to_path_buf(), source }
}

#[async_trait]
impl SourceCache for FileCache {
    #[tracing::instrument(name = "query_cache", level = "debug", skip(self), fields(provider = %key.provider))]
    async fn get(&self, key: &CacheKey) -> Result<Option<CachedPayload>, CacheError> {
        let path = self.path_for(key);

        let contents = match tokio::fs::read(&path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!("Cache file not found");
                return Ok(None);
            }
            Err(e) => return Err(io_err(&path)(e)),
        };

        let stored_at = tokio::fs::metadata(&path)
            .await
            .and_then(|meta| meta.modified())
            .map_err(io_err(&path))?;

        let payload = serde_json::from_slice(&contents)?;
        Ok(Some(CachedPayload { payload, stored_at: stored_at.into() }))
    }

    /// Writes to a temporary sibling and renames it over the target, so readers
    /// see either the old document or the new one.
    #[tracing::instrument(name = "put_cache", level = "debug", skip(self, payload), fields(provider = %key.provider))]
    async fn put(&self, key: &CacheKey, payload: &Value) -> Result<(), CacheError> {
        let path = self.path_for(key);
        let dir = path.parent().unwrap_or(&self.root).to_path_buf();
        tokio::fs::create_dir_all(&dir).await.map_err(io_err(&dir))?;

        let bytes = serde_json::to_vec_pretty(payload)?;
        let file_name = path.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default();
        let tmp = dir.join(format!(
            ".{file_name}.{}.{}.tmp",
            std::process::id(),
            TMP_COUNTER.fetch_add(1, Ordering::Relaxed)
        ));

        tokio::fs::write(&tmp, bytes).await.map_err(io_err(&tmp))?;
        if let Err(e) = tokio::fs::rename(&tmp, &path).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(io_err(&path)(e));
        }

        debug!("Cache entry written to {}", path.display());
        Ok(())
    }

    fn path_of(&self, key: &CacheKey) -> Option<PathBuf> {
        Some(self.path_for(key))
    }
}

#[derive(Debug, Default)]
pub struct MemoryCache {
    entries: Mutex<HashMap<CacheKey, CachedPayload>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds an entry with an explicit timestamp.
    pub fn insert(&self, key: CacheKey, payload: Value, stored_at: DateTime<Utc>) {
        self.lock().insert(key, CachedPayload { payload, stored_at });
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<CacheKey, CachedPayload>> {
        // A poisoned map is still a valid map.
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl SourceCache for MemoryCache {
    async fn get(&self, key: &CacheKey) -> Result<Option<CachedPayload>, CacheError> {
        Ok(self.lock().get(key).cloned())
    }

    async fn put(&self, key: &CacheKey, payload: &Value) -> Result<(), CacheError> {
        self.insert(key.clone(), payload.clone(), Utc::now());
        Ok(())
    }
}
