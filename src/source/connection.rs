//! Database collaborators supplied by the host application
//!
//! Connection-string assembly, driver authentication and pooling live behind
//! these traits; the strategies only acquire, query and release.

use crate::error::BoxError;
use crate::table::Table;
use async_trait::async_trait;
use std::sync::Arc;

/// Opens scoped warehouse connections
#[async_trait]
pub trait WarehouseConnector: Send + Sync {
    async fn connect(&self) -> Result<Box<dyn WarehouseConnection>, BoxError>;
}

/// A live warehouse connection
///
/// [`close`](WarehouseConnection::close) is called exactly once on every exit
/// path, including after a failed query.
#[async_trait]
pub trait WarehouseConnection: Send {
    async fn query(&mut self, sql: &str) -> Result<Table, BoxError>;

    async fn close(self: Box<Self>) -> Result<(), BoxError>;
}

/// Resolves a DSN into a ready-to-query engine
pub trait EngineProvider: Send + Sync {
    fn engine(&self, dsn: &str) -> Result<Arc<dyn QueryEngine>, BoxError>;
}

#[async_trait]
pub trait QueryEngine: Send + Sync {
    async fn query(&self, sql: &str) -> Result<Table, BoxError>;
}
