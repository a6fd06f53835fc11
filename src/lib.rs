//! Tabular Extract
//!
//! One call shape for pulling tables out of a warehouse, a relational
//! database, a REST API or a flat file.

pub mod client;
pub mod config;
pub mod error;
pub mod extractor;
pub mod request;
pub mod source;
pub mod storage;
pub mod table;

// Re-exports for convenience
pub use client::{Auth, AuthType, RetryPolicy, RetryingFetcher};
pub use config::ExtractorConfig;
pub use error::{ExtractError, Result};
pub use extractor::{DataExtractor, UnknownSourcePolicy};
pub use request::{ExtractionRequest, SourceKind, SourceParams};
pub use source::{Extraction, SourceRegistry, SourceStrategy};
pub use storage::{CacheKey, CachedSource, CsvCache, CsvReader, CsvWriter};
pub use table::{ShapeError, Table};
