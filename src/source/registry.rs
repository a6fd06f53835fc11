//! Dispatch table from source kind to strategy constructor

use super::{
    ApiStrategy, EngineProvider, FileStrategy, RelationalStrategy, SourceStrategy,
    WarehouseConnector, WarehouseStrategy,
};
use crate::client::RetryingFetcher;
use crate::error::Result;
use crate::request::{ExtractionRequest, SourceKind};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

/// Builds the strategy for one request
pub type StrategyConstructor =
    Box<dyn Fn(&ExtractionRequest) -> Result<Box<dyn SourceStrategy>> + Send + Sync>;

/// Maps each [`SourceKind`] to the constructor of its strategy
///
/// Constructors capture their collaborators at registration; the strategy
/// itself is only built when [`create`](SourceRegistry::create) is called.
///
/// # Example
/// ```no_run
/// use tabextract::client::RetryingFetcher;
/// use tabextract::source::SourceRegistry;
/// use tabextract::SourceKind;
///
/// # fn example() -> eyre::Result<()> {
/// let registry = SourceRegistry::new()
///     .with_api(RetryingFetcher::try_new()?)
///     .with_files();
/// assert!(registry.supports(SourceKind::Api));
/// assert!(!registry.supports(SourceKind::Warehouse));
/// # Ok(())
/// # }
/// ```
#[derive(Default)]
pub struct SourceRegistry {
    constructors: HashMap<SourceKind, StrategyConstructor>,
}

impl SourceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) the constructor for `kind`
    ///
    /// Returns the constructor previously registered for that kind.
    pub fn register<F>(&mut self, kind: SourceKind, constructor: F) -> Option<StrategyConstructor>
    where
        F: Fn(&ExtractionRequest) -> Result<Box<dyn SourceStrategy>> + Send + Sync + 'static,
    {
        log::debug!("Registering {} extractor", kind);
        self.constructors.insert(kind, Box::new(constructor))
    }

    pub fn with_warehouse(
        mut self,
        connector: Arc<dyn WarehouseConnector>,
        connect_timeout: Option<Duration>,
    ) -> Self {
        self.register(SourceKind::Warehouse, move |request| {
            let strategy =
                WarehouseStrategy::from_request(request, connector.clone(), connect_timeout)?;
            Ok(Box::new(strategy))
        });
        self
    }

    pub fn with_relational(mut self, provider: Arc<dyn EngineProvider>) -> Self {
        self.register(SourceKind::RelationalDb, move |request| {
            Ok(Box::new(RelationalStrategy::from_request(request, provider.as_ref())?))
        });
        self
    }

    pub fn with_api(mut self, fetcher: RetryingFetcher) -> Self {
        self.register(SourceKind::Api, move |request| {
            Ok(Box::new(ApiStrategy::from_request(request, fetcher.clone())?))
        });
        self
    }

    pub fn with_files(mut self) -> Self {
        self.register(SourceKind::File, |request| {
            Ok(Box::new(FileStrategy::from_request(request)?))
        });
        self
    }

    pub fn supports(&self, kind: SourceKind) -> bool {
        self.constructors.contains_key(&kind)
    }

    /// Registered kinds in tag order
    pub fn kinds(&self) -> Vec<SourceKind> {
        let mut kinds: Vec<_> = self.constructors.keys().copied().collect();
        kinds.sort();
        kinds
    }

    /// Build the strategy for `request`, or `None` if its kind has no constructor
    pub fn create(&self, request: &ExtractionRequest) -> Option<Result<Box<dyn SourceStrategy>>> {
        self.constructors
            .get(&request.kind())
            .map(|construct| construct(request))
    }
}

impl std::fmt::Debug for SourceRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SourceRegistry")
            .field("kinds", &self.kinds())
            .finish()
    }
}
