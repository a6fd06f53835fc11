//! File-backed result cache
//!
//! A result is stored as `{dir}/{name}.csv`. Presence of that file is the
//! only freshness signal: there is no expiry, checksum or invalidation, and
//! deleting the file is how an entry is dropped.

use super::delimited::{CsvReader, write_table};
use crate::error::{ExtractError, Result};
use crate::request::SourceKind;
use crate::source::{Extraction, SourceStrategy};
use crate::table::Table;
use async_trait::async_trait;
use std::collections::HashMap;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;

/// The `(name, dir)` pair identifying a cached result
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct CacheKey {
    name: String,
    dir: PathBuf,
}

impl CacheKey {
    pub fn new(name: impl Into<String>, dir: impl AsRef<Path>) -> Self {
        Self {
            name: name.into(),
            dir: dir.as_ref().to_path_buf(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// `{dir}/{name}.csv`
    pub fn location(&self) -> PathBuf {
        self.dir.join(format!("{}.csv", self.name))
    }
}

/// Reuses persisted tables instead of recomputing them
///
/// The cache owns serialization: on a miss it runs the producer, writes the
/// result and returns it; on a hit it reads the file back. Computations for
/// the same key are serialized, and files are written to a temporary name and
/// renamed into place, so a reader never observes a partial file.
///
/// # Example
/// ```no_run
/// use tabextract::storage::{CacheKey, CsvCache};
/// use tabextract::Table;
///
/// # async fn example() -> tabextract::Result<()> {
/// let cache = CsvCache::new();
/// let key = CacheKey::new("desk_limits", "/tmp");
/// let table = cache
///     .get_or_insert_with(&key, || async { Ok(Table::empty()) })
///     .await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Default)]
pub struct CsvCache {
    locks: Mutex<HashMap<PathBuf, Arc<Mutex<()>>>>,
}

impl CsvCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, key: &CacheKey) -> bool {
        key.location().is_file()
    }

    /// Return the cached table for `key`, or run `produce` and persist its result
    ///
    /// A fresh result is returned as read back from the file just written, so
    /// a miss and every later hit yield the same table. Degraded extractions
    /// are returned but not persisted, so a soft failure is retried on the
    /// next call.
    ///
    /// # Errors
    /// Errors from `produce`, or [`ExtractError::Cache`] if the cache file
    /// cannot be read or written.
    pub async fn get_or_compute<F, Fut>(&self, key: &CacheKey, produce: F) -> Result<Extraction>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Extraction>>,
    {
        let location = key.location();
        let lock = self.lock_for(&location).await;
        let result = {
            let _guard = lock.lock().await;
            load_or_produce(key, &location, produce).await
        };
        drop(lock);
        self.release(&location).await;
        result
    }

    /// [`get_or_compute`](Self::get_or_compute) for producers of plain tables
    pub async fn get_or_insert_with<F, Fut>(&self, key: &CacheKey, produce: F) -> Result<Table>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Table>>,
    {
        let extraction = self
            .get_or_compute(key, || async move { produce().await.map(Extraction::complete) })
            .await?;
        Ok(extraction.table)
    }

    async fn lock_for(&self, location: &Path) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().await;
        locks.entry(location.to_path_buf()).or_default().clone()
    }

    /// Forget the lock for `location` once no caller holds it
    async fn release(&self, location: &Path) {
        let mut locks = self.locks.lock().await;
        if locks
            .get(location)
            .is_some_and(|lock| Arc::strong_count(lock) == 1)
        {
            locks.remove(location);
        }
    }
}

async fn load_or_produce<F, Fut>(key: &CacheKey, location: &Path, produce: F) -> Result<Extraction>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<Extraction>>,
{
    if location.is_file() {
        log::info!("Reading data from cache: location {}", location.display());
        return read(location).map(Extraction::complete);
    }

    log::info!("Writing data to cache: location {}", location.display());
    let extraction = produce().await?;
    if let Some(cause) = &extraction.degraded {
        log::warn!(
            "Not caching degraded result for {}: {}",
            location.display(),
            cause
        );
        return Ok(extraction);
    }
    persist(key, &extraction.table)?;
    read(location).map(Extraction::complete)
}

fn read(location: &Path) -> Result<Table> {
    CsvReader::new(location)
        .read()
        .map_err(|e| cache_error(location, e))
}

fn cache_error(
    path: &Path,
    source: impl Into<crate::error::BoxError>,
) -> ExtractError {
    ExtractError::Cache {
        path: path.to_path_buf(),
        source: source.into(),
    }
}

fn persist(key: &CacheKey, table: &Table) -> Result<()> {
    let location = key.location();
    std::fs::create_dir_all(key.dir()).map_err(|e| cache_error(&location, e))?;

    let mut staged =
        tempfile::NamedTempFile::new_in(key.dir()).map_err(|e| cache_error(&location, e))?;
    write_table(csv::Writer::from_writer(staged.as_file_mut()), table)
        .map_err(|e| cache_error(&location, e))?;
    staged
        .persist(&location)
        .map_err(|e| cache_error(&location, e))?;

    log::debug!("Cached {} row(s) at {}", table.len(), location.display());
    Ok(())
}

/// Wraps a strategy so its results go through a [`CsvCache`]
pub struct CachedSource<S> {
    inner: S,
    cache: Arc<CsvCache>,
    key: CacheKey,
}

impl<S: SourceStrategy> CachedSource<S> {
    pub fn new(inner: S, cache: Arc<CsvCache>, key: CacheKey) -> Self {
        Self { inner, cache, key }
    }

    pub fn key(&self) -> &CacheKey {
        &self.key
    }
}

#[async_trait]
impl<S: SourceStrategy> SourceStrategy for CachedSource<S> {
    fn kind(&self) -> SourceKind {
        self.inner.kind()
    }

    async fn extract_data(&self) -> Result<Extraction> {
        self.cache
            .get_or_compute(&self.key, || self.inner.extract_data())
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::FileStrategy;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    fn limits() -> Table {
        Table::new(
            vec!["desk".to_string(), "limit".to_string()],
            vec![
                vec![json!("rates"), json!(5000000)],
                vec![json!("fx"), json!(1250000.75)],
            ],
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_miss_then_hit() {
        let temp_dir = TempDir::new().unwrap();
        let cache = CsvCache::new();
        let key = CacheKey::new("x", temp_dir.path());
        let calls = &AtomicUsize::new(0);

        assert!(!cache.contains(&key));
        let first = cache
            .get_or_insert_with(&key, || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(limits())
            })
            .await
            .unwrap();
        assert!(cache.contains(&key));
        assert!(temp_dir.path().join("x.csv").is_file());

        let second = cache
            .get_or_insert_with(&key, || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(Table::empty())
            })
            .await
            .unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_miss_returns_what_a_hit_will_read() {
        let temp_dir = TempDir::new().unwrap();
        let cache = CsvCache::new();
        let key = CacheKey::new("accounts", temp_dir.path());
        let produce = || async {
            Table::from_json(&json!([
                {"account": "007", "note": "", "flag": "true", "tags": ["a", "b"]}
            ]))
            .map_err(ExtractError::from)
        };

        let first = cache.get_or_insert_with(&key, produce).await.unwrap();
        let second = cache.get_or_insert_with(&key, produce).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(first.columns(), ["account", "note", "flag", "tags"]);
    }

    #[tokio::test]
    async fn test_locks_are_dropped_after_use() {
        let temp_dir = TempDir::new().unwrap();
        let cache = CsvCache::new();

        for name in ["a", "b", "c"] {
            cache
                .get_or_insert_with(&CacheKey::new(name, temp_dir.path()), || async {
                    Ok(limits())
                })
                .await
                .unwrap();
        }

        assert!(cache.locks.lock().await.is_empty());
    }

    #[tokio::test]
    async fn test_existing_file_short_circuits() {
        let temp_dir = TempDir::new().unwrap();
        std::fs::write(temp_dir.path().join("limits.csv"), "id,desk\n0,rates\n").unwrap();
        let cache = CsvCache::new();
        let calls = &AtomicUsize::new(0);

        let table = cache
            .get_or_insert_with(&CacheKey::new("limits", temp_dir.path()), || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(Table::empty())
            })
            .await
            .unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(table.column("desk").unwrap(), [&json!("rates")]);
    }

    #[tokio::test]
    async fn test_producer_error_is_not_cached() {
        let temp_dir = TempDir::new().unwrap();
        let cache = CsvCache::new();
        let key = CacheKey::new("broken", temp_dir.path());

        let result = cache
            .get_or_insert_with(&key, || async {
                Err(ExtractError::EmptyPayload {
                    endpoint: "http://api.test".to_string(),
                })
            })
            .await;

        assert!(result.is_err());
        assert!(!cache.contains(&key));
    }

    #[tokio::test]
    async fn test_creates_missing_directory() {
        let temp_dir = TempDir::new().unwrap();
        let cache = CsvCache::new();
        let key = CacheKey::new("nested", temp_dir.path().join("a").join("b"));

        cache
            .get_or_insert_with(&key, || async { Ok(limits()) })
            .await
            .unwrap();

        assert!(key.location().is_file());
    }

    #[tokio::test]
    async fn test_degraded_extraction_is_not_persisted() {
        let temp_dir = TempDir::new().unwrap();
        let cache = Arc::new(CsvCache::new());
        let key = CacheKey::new("positions", temp_dir.path());
        let missing = temp_dir.path().join("missing.csv");

        let source = CachedSource::new(
            FileStrategy::new("DESK", "2022-04-02", &missing),
            cache.clone(),
            key.clone(),
        );
        let extraction = source.extract_data().await.unwrap();

        assert!(extraction.is_degraded());
        assert!(!cache.contains(&key));
    }

    #[tokio::test]
    async fn test_cached_source_reuses_file_result() {
        let temp_dir = TempDir::new().unwrap();
        let input = temp_dir.path().join("input.csv");
        std::fs::write(&input, "id,desk\n1,rates\n").unwrap();
        let cache = Arc::new(CsvCache::new());
        let key = CacheKey::new("positions", temp_dir.path().join("cache"));

        let source = CachedSource::new(
            FileStrategy::new("DESK", "2022-04-02", &input),
            cache.clone(),
            key.clone(),
        );
        let first = source.extract_data().await.unwrap();

        std::fs::remove_file(&input).unwrap();
        let second = source.extract_data().await.unwrap();

        assert!(!second.is_degraded());
        assert_eq!(first.table, second.table);
        assert_eq!(source.kind(), SourceKind::File);
    }

    #[tokio::test]
    async fn test_corrupt_cache_file_is_hard_error() {
        let temp_dir = TempDir::new().unwrap();
        std::fs::write(temp_dir.path().join("bad.csv"), "id,a\n1,2,3\n").unwrap();
        let cache = CsvCache::new();

        let err = cache
            .get_or_insert_with(&CacheKey::new("bad", temp_dir.path()), || async {
                Ok(Table::empty())
            })
            .await
            .unwrap_err();

        assert!(matches!(err, ExtractError::Cache { .. }));
        assert!(err.is_hard());
    }
}
