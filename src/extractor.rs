//! The public entry point: request in, table out

use crate::config::ExtractorConfig;
use crate::error::{ExtractError, Result};
use crate::request::{ExtractionRequest, SourceKind, SourceParams};
use crate::source::{Extraction, SourceRegistry, SourceStrategy};
use crate::storage::{CacheKey, CachedSource, CsvCache};
use crate::table::Table;
use std::str::FromStr;
use std::sync::Arc;

/// What to do with a request whose source has no registered extractor
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum UnknownSourcePolicy {
    /// Log a warning and return an empty table
    #[default]
    Empty,
    /// Fail with [`ExtractError::UnsupportedSource`]
    Reject,
}

impl FromStr for UnknownSourcePolicy {
    type Err = String;
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "empty" => Ok(Self::Empty),
            "reject" => Ok(Self::Reject),
            other => Err(format!("expected 'empty' or 'reject', got '{}'", other)),
        }
    }
}

impl std::fmt::Display for UnknownSourcePolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Empty => write!(f, "empty"),
            Self::Reject => write!(f, "reject"),
        }
    }
}

/// Resolves the strategy for a request and runs it
///
/// Hard failures are returned unchanged. Soft failures never surface as
/// errors: [`run`](Self::run) returns an empty table for them, while
/// [`run_detailed`](Self::run_detailed) also reports the absorbed cause.
///
/// # Example
/// ```no_run
/// use tabextract::{DataExtractor, ExtractionRequest, SourceKind};
/// use tabextract::source::SourceRegistry;
///
/// # async fn example() -> tabextract::Result<()> {
/// let extractor = DataExtractor::new(SourceRegistry::new().with_files());
/// let request = ExtractionRequest::new(SourceKind::File, "GLOBAL_TRADING_DESK", "2022-04-02")
///     .with_param("path", "positions.csv");
/// let table = extractor.run(request).await?;
/// println!("{} rows", table.len());
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct DataExtractor {
    registry: SourceRegistry,
    cache: Arc<CsvCache>,
    unknown_source: UnknownSourcePolicy,
}

impl DataExtractor {
    pub fn new(registry: SourceRegistry) -> Self {
        Self {
            registry,
            cache: Arc::new(CsvCache::new()),
            unknown_source: UnknownSourcePolicy::default(),
        }
    }

    /// API and file extraction configured from `config`
    ///
    /// Warehouse and relational sources need host connectors; add them with
    /// [`ExtractorConfig::registry`] and [`DataExtractor::new`] instead.
    pub fn from_config(config: &ExtractorConfig) -> eyre::Result<Self> {
        Ok(Self::new(config.registry()?).with_unknown_source_policy(config.unknown_source))
    }

    pub fn with_unknown_source_policy(mut self, policy: UnknownSourcePolicy) -> Self {
        self.unknown_source = policy;
        self
    }

    /// Share a cache (and its per-key locking) with other extractors
    pub fn with_cache(mut self, cache: Arc<CsvCache>) -> Self {
        self.cache = cache;
        self
    }

    pub fn registry(&self) -> &SourceRegistry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut SourceRegistry {
        &mut self.registry
    }

    /// Run `request` and return its table
    ///
    /// # Errors
    /// Hard failures only; see [`ExtractError::is_hard`].
    pub async fn run(&self, request: ExtractionRequest) -> Result<Table> {
        self.run_detailed(request).await.map(Extraction::into_table)
    }

    /// Run `request`, keeping any absorbed soft failure alongside the table
    pub async fn run_detailed(&self, request: ExtractionRequest) -> Result<Extraction> {
        match self.strategy_for(&request)? {
            Some(strategy) => self.execute(&request, strategy).await,
            None => self.unsupported(request.kind().tag()),
        }
    }

    /// Run `request` through the result cache under `key`
    pub async fn run_cached(&self, request: ExtractionRequest, key: CacheKey) -> Result<Extraction> {
        match self.strategy_for(&request)? {
            Some(strategy) => {
                let cached = CachedSource::new(strategy, self.cache.clone(), key);
                self.execute(&request, Box::new(cached)).await
            }
            None => self.unsupported(request.kind().tag()),
        }
    }

    /// Run from a source tag (`AWS`, `DB`, `API`, `CSV`) and loose arguments
    pub async fn run_tagged(
        &self,
        source: &str,
        entity: &str,
        date: &str,
        dsn: Option<&str>,
        params: SourceParams,
    ) -> Result<Table> {
        let kind = match source.parse::<SourceKind>() {
            Ok(kind) => kind,
            Err(_) => return self.unsupported(source).map(Extraction::into_table),
        };
        let mut request = ExtractionRequest::new(kind, entity, date).with_params(params);
        if let Some(dsn) = dsn {
            request = request.with_dsn(dsn);
        }
        self.run(request).await
    }

    fn strategy_for(&self, request: &ExtractionRequest) -> Result<Option<Box<dyn SourceStrategy>>> {
        self.registry.create(request).transpose()
    }

    async fn execute(
        &self,
        request: &ExtractionRequest,
        strategy: Box<dyn SourceStrategy>,
    ) -> Result<Extraction> {
        let extraction = strategy.extract_data().await?;
        match &extraction.degraded {
            Some(cause) => log::warn!(
                "{} extraction for {} on {} degraded: {}",
                request.kind(),
                request.entity(),
                request.date(),
                cause
            ),
            None => log::info!(
                "Extracted {} row(s) x {} column(s) for {} on {}",
                extraction.table.len(),
                extraction.table.width(),
                request.entity(),
                request.date()
            ),
        }
        Ok(extraction)
    }

    fn unsupported(&self, tag: &str) -> Result<Extraction> {
        let err = ExtractError::UnsupportedSource(tag.to_string());
        match self.unknown_source {
            UnknownSourcePolicy::Reject => {
                log::error!("No extractor available for source {}", tag);
                Err(err)
            }
            UnknownSourcePolicy::Empty => {
                log::warn!("No extractor available for source {}, returning an empty table", tag);
                Ok(Extraction::degraded(err))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::testing::{FakeEngines, FakeWarehouse, sample_table};
    use serde_json::json;
    use tempfile::TempDir;

    fn extractor() -> DataExtractor {
        DataExtractor::new(
            SourceRegistry::new()
                .with_warehouse(Arc::new(FakeWarehouse::returning(sample_table())), None)
                .with_relational(Arc::new(FakeEngines::new("reporting", sample_table())))
                .with_files(),
        )
    }

    #[tokio::test]
    async fn test_warehouse_and_db_share_schema() {
        let extractor = extractor();
        let warehouse = ExtractionRequest::new(SourceKind::Warehouse, "DESK", "2022-04-02")
            .with_param("sql", "select * from trades");
        let db = ExtractionRequest::new(SourceKind::RelationalDb, "DESK", "2022-04-02")
            .with_dsn("reporting")
            .with_param("sql", "select * from trades");

        let from_warehouse = extractor.run(warehouse).await.unwrap();
        let from_db = extractor.run(db).await.unwrap();

        assert_eq!(from_warehouse.columns(), ["trade_id", "desk", "notional"]);
        assert_eq!(from_warehouse, from_db);
    }

    #[tokio::test]
    async fn test_hard_failure_propagates() {
        let extractor = DataExtractor::new(
            SourceRegistry::new().with_warehouse(Arc::new(FakeWarehouse::unreachable()), None),
        );
        let request = ExtractionRequest::new(SourceKind::Warehouse, "DESK", "2022-04-02")
            .with_param("sql", "select 1");

        let err = extractor.run(request).await.unwrap_err();
        assert!(err.is_hard());
    }

    #[tokio::test]
    async fn test_soft_failure_is_empty_table() {
        let temp_dir = TempDir::new().unwrap();
        let request = ExtractionRequest::new(SourceKind::File, "DESK", "2022-04-02")
            .with_param("path", temp_dir.path().join("missing.csv").to_string_lossy());

        let extractor = extractor();
        let table = extractor.run(request.clone()).await.unwrap();
        assert!(table.is_empty());

        let detailed = extractor.run_detailed(request).await.unwrap();
        assert!(detailed.degraded.unwrap().is_soft());
    }

    #[tokio::test]
    async fn test_unregistered_source_policy() {
        let request = ExtractionRequest::new(SourceKind::Api, "DESK", "2022-04-02")
            .with_param("url", "http://api.test");

        let lenient = extractor();
        assert!(lenient.run(request.clone()).await.unwrap().is_empty());

        let strict = extractor().with_unknown_source_policy(UnknownSourcePolicy::Reject);
        assert!(matches!(
            strict.run(request).await,
            Err(ExtractError::UnsupportedSource(tag)) if tag == "API"
        ));
    }

    #[tokio::test]
    async fn test_run_tagged() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("positions.csv");
        std::fs::write(&path, "id,qty\n1,10\n").unwrap();
        let params: SourceParams = [("path", path.to_string_lossy().to_string())]
            .into_iter()
            .collect();

        let extractor = extractor();
        let table = extractor
            .run_tagged("CSV", "DESK", "2022-04-02", None, params)
            .await
            .unwrap();
        assert_eq!(table.column("qty").unwrap(), [&json!(10)]);

        let unknown = extractor
            .run_tagged("FTP", "DESK", "2022-04-02", None, SourceParams::new())
            .await
            .unwrap();
        assert!(unknown.is_empty());
    }

    #[tokio::test]
    async fn test_run_is_idempotent() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("positions.csv");
        std::fs::write(&path, "id,desk,qty\n0,rates,1.5\n1,fx,3\n").unwrap();
        let request = ExtractionRequest::new(SourceKind::File, "DESK", "2022-04-02")
            .with_param("path", path.to_string_lossy());

        let extractor = extractor();
        let first = extractor.run(request.clone()).await.unwrap();
        let second = extractor.run(request).await.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_run_cached_skips_second_query() {
        let temp_dir = TempDir::new().unwrap();
        let warehouse = Arc::new(FakeWarehouse::returning(sample_table()));
        let extractor = DataExtractor::new(SourceRegistry::new().with_warehouse(warehouse.clone(), None));
        let request = ExtractionRequest::new(SourceKind::Warehouse, "DESK", "2022-04-02")
            .with_param("sql", "select * from trades");
        let key = CacheKey::new("trades", temp_dir.path());

        let first = extractor.run_cached(request.clone(), key.clone()).await.unwrap();
        let second = extractor.run_cached(request, key).await.unwrap();

        assert_eq!(warehouse.queries().len(), 1);
        assert_eq!(first.table, second.table);
    }

    #[test]
    fn test_policy_from_str() {
        assert_eq!("Reject".parse::<UnknownSourcePolicy>(), Ok(UnknownSourcePolicy::Reject));
        assert_eq!("empty".parse::<UnknownSourcePolicy>(), Ok(UnknownSourcePolicy::Empty));
        assert!("ignore".parse::<UnknownSourcePolicy>().is_err());
    }
}
