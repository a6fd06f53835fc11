//! Classified extraction errors
//!
//! Every failure is either *hard* (propagated to the caller of
//! [`DataExtractor::run`](crate::DataExtractor::run)) or *soft* (absorbed by
//! the strategy and reported as a degraded, empty extraction).

use crate::client::FetchError;
use crate::request::SourceKind;
use crate::table::ShapeError;
use std::path::PathBuf;
use std::time::Duration;

/// Boxed error produced by host-provided collaborators (connectors, engines)
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Result alias used across the crate
pub type Result<T, E = ExtractError> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum ExtractError {
    /// Warehouse or relational query failure
    #[error("Having trouble extracting {entity} data through {kind}: {source}")]
    Source {
        kind: SourceKind,
        entity: String,
        #[source]
        source: BoxError,
    },

    #[error("Timed out after {timeout:?} acquiring a {kind} connection")]
    ConnectTimeout { kind: SourceKind, timeout: Duration },

    /// The endpoint answered but carried no payload
    #[error("No data found at {endpoint}")]
    EmptyPayload { endpoint: String },

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error("Cannot reshape payload into a table: {0}")]
    Reshape(#[from] ShapeError),

    #[error("Failed to read {}: {source}", path.display())]
    FileRead {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("Cache file {} unusable: {source}", path.display())]
    Cache {
        path: PathBuf,
        #[source]
        source: BoxError,
    },

    #[error("Missing '{param}' parameter for {kind} extraction")]
    MissingParam { kind: SourceKind, param: &'static str },

    #[error("Unsupported source: {0}")]
    UnsupportedSource(String),
}

impl ExtractError {
    /// Soft failures degrade into an empty table instead of propagating
    pub fn is_soft(&self) -> bool {
        matches!(self, Self::Reshape(_) | Self::FileRead { .. })
    }

    pub fn is_hard(&self) -> bool {
        !self.is_soft()
    }
}
