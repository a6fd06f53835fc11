//! Source strategies
//!
//! One [`SourceStrategy`] per source kind, built on demand by the
//! [`SourceRegistry`] dispatch table:
//! - [`WarehouseStrategy`]: query over a scoped warehouse connection
//! - [`RelationalStrategy`]: query against a prepared engine handle
//! - [`ApiStrategy`]: JSON `data` field fetched with retries
//! - [`FileStrategy`]: delimited file with its first column as row index
//!
//! Warehouse and relational failures are hard errors. API reshaping and file
//! read failures are soft: they are logged and reported as a degraded
//! [`Extraction`] holding an empty table.

mod api;
mod connection;
mod file;
mod registry;
mod relational;
mod warehouse;

#[cfg(test)]
pub(crate) mod testing;

pub use api::ApiStrategy;
pub use connection::{EngineProvider, QueryEngine, WarehouseConnection, WarehouseConnector};
pub use file::FileStrategy;
pub use registry::{SourceRegistry, StrategyConstructor};
pub use relational::RelationalStrategy;
pub use warehouse::WarehouseStrategy;

use crate::error::{ExtractError, Result};
use crate::request::SourceKind;
use crate::table::Table;
use async_trait::async_trait;

/// Outcome of a successful extraction call
///
/// `degraded` carries the soft failure that was absorbed, if any; the table
/// is then empty. Callers that only look at `table` get the historical
/// "empty on soft failure" behavior.
#[derive(Debug)]
pub struct Extraction {
    pub table: Table,
    pub degraded: Option<ExtractError>,
}

impl Extraction {
    pub fn complete(table: Table) -> Self {
        Self {
            table,
            degraded: None,
        }
    }

    pub fn degraded(cause: ExtractError) -> Self {
        Self {
            table: Table::empty(),
            degraded: Some(cause),
        }
    }

    pub fn is_degraded(&self) -> bool {
        self.degraded.is_some()
    }

    pub fn into_table(self) -> Table {
        self.table
    }
}

impl From<Table> for Extraction {
    fn from(table: Table) -> Self {
        Self::complete(table)
    }
}

/// A source-specific extraction, bound to one request
///
/// # Example
/// ```no_run
/// use tabextract::source::{Extraction, SourceStrategy};
/// use tabextract::{Result, SourceKind, Table};
/// use async_trait::async_trait;
///
/// struct Fixed(Table);
///
/// #[async_trait]
/// impl SourceStrategy for Fixed {
///     fn kind(&self) -> SourceKind {
///         SourceKind::File
///     }
///
///     async fn extract_data(&self) -> Result<Extraction> {
///         Ok(Extraction::complete(self.0.clone()))
///     }
/// }
/// ```
#[async_trait]
pub trait SourceStrategy: Send + Sync {
    fn kind(&self) -> SourceKind;

    /// Pull the data and shape it into a table
    ///
    /// # Errors
    /// Only hard failures are returned as errors; soft failures come back as
    /// [`Extraction::degraded`].
    async fn extract_data(&self) -> Result<Extraction>;
}

#[async_trait]
impl<S: SourceStrategy + ?Sized> SourceStrategy for Box<S> {
    fn kind(&self) -> SourceKind {
        (**self).kind()
    }

    async fn extract_data(&self) -> Result<Extraction> {
        (**self).extract_data().await
    }
}

/// Entity and date an extraction is run for, used in log lines
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct Subject {
    pub entity: String,
    pub date: String,
}

impl Subject {
    pub fn of(request: &crate::request::ExtractionRequest) -> Self {
        Self {
            entity: request.entity().to_string(),
            date: request.date().to_string(),
        }
    }

    pub fn announce(&self, kind: SourceKind) {
        log::info!(
            "Extracting data through {} for {} on {}",
            kind,
            self.entity,
            self.date
        );
    }

    pub fn hard_failure(&self, kind: SourceKind, err: ExtractError) -> ExtractError {
        log::error!(
            "Having trouble extracting {} data through {}",
            self.entity,
            kind
        );
        err
    }
}
