use super::{Extraction, SourceStrategy, Subject, WarehouseConnection, WarehouseConnector};
use crate::error::{BoxError, ExtractError, Result};
use crate::request::{ExtractionRequest, SourceKind};
use crate::table::Table;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

/// Runs a query over a connection acquired for this extraction only
pub struct WarehouseStrategy {
    subject: Subject,
    sql: String,
    connector: Arc<dyn WarehouseConnector>,
    connect_timeout: Option<Duration>,
}

impl WarehouseStrategy {
    pub fn new(
        entity: impl Into<String>,
        date: impl Into<String>,
        sql: impl Into<String>,
        connector: Arc<dyn WarehouseConnector>,
    ) -> Self {
        Self {
            subject: Subject {
                entity: entity.into(),
                date: date.into(),
            },
            sql: sql.into(),
            connector,
            connect_timeout: None,
        }
    }

    /// Requires the `sql` parameter
    pub fn from_request(
        request: &ExtractionRequest,
        connector: Arc<dyn WarehouseConnector>,
        connect_timeout: Option<Duration>,
    ) -> Result<Self> {
        Ok(Self {
            subject: Subject::of(request),
            sql: request.require("sql")?.to_string(),
            connector,
            connect_timeout,
        })
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }

    fn source_error(&self, source: BoxError) -> ExtractError {
        ExtractError::Source {
            kind: SourceKind::Warehouse,
            entity: self.subject.entity.clone(),
            source,
        }
    }

    async fn acquire(&self) -> Result<Box<dyn WarehouseConnection>> {
        let connecting = self.connector.connect();
        let connection = match self.connect_timeout {
            Some(timeout) => tokio::time::timeout(timeout, connecting)
                .await
                .map_err(|_| ExtractError::ConnectTimeout {
                    kind: SourceKind::Warehouse,
                    timeout,
                })?,
            None => connecting.await,
        };
        connection.map_err(|e| self.source_error(e))
    }

    /// Acquire, query, release. Release always runs; a release failure is
    /// returned unless the query already failed, in which case the query
    /// error wins and the release failure is logged.
    async fn query_scoped(&self) -> Result<Table> {
        let mut connection = self.acquire().await?;
        let queried = connection.query(&self.sql).await;
        let released = connection.close().await;

        match (queried, released) {
            (Ok(table), Ok(())) => Ok(table),
            (Ok(_), Err(release)) => Err(self.source_error(release)),
            (Err(query), Ok(())) => Err(self.source_error(query)),
            (Err(query), Err(release)) => {
                log::warn!("Failed to release warehouse connection: {}", release);
                Err(self.source_error(query))
            }
        }
    }
}

#[async_trait]
impl SourceStrategy for WarehouseStrategy {
    fn kind(&self) -> SourceKind {
        SourceKind::Warehouse
    }

    async fn extract_data(&self) -> Result<Extraction> {
        self.subject.announce(self.kind());
        match self.query_scoped().await {
            Ok(table) => {
                log::debug!("Warehouse returned {} row(s)", table.len());
                Ok(Extraction::complete(table))
            }
            Err(err) => Err(self.subject.hard_failure(self.kind(), err)),
        }
    }
}
