use super::{EngineProvider, Extraction, QueryEngine, SourceStrategy, Subject};
use crate::error::{ExtractError, Result};
use crate::request::{ExtractionRequest, SourceKind};
use async_trait::async_trait;
use std::sync::Arc;

/// Runs a query against an engine that was prepared when the strategy was built
pub struct RelationalStrategy {
    subject: Subject,
    sql: String,
    engine: Arc<dyn QueryEngine>,
}

impl RelationalStrategy {
    pub fn new(
        entity: impl Into<String>,
        date: impl Into<String>,
        sql: impl Into<String>,
        engine: Arc<dyn QueryEngine>,
    ) -> Self {
        Self {
            subject: Subject {
                entity: entity.into(),
                date: date.into(),
            },
            sql: sql.into(),
            engine,
        }
    }

    /// Requires the request DSN and the `sql` parameter; resolves the engine
    /// through `provider` right away
    pub fn from_request(request: &ExtractionRequest, provider: &dyn EngineProvider) -> Result<Self> {
        let subject = Subject::of(request);
        let (sql, engine) = resolve(request, provider)
            .map_err(|err| subject.hard_failure(SourceKind::RelationalDb, err))?;
        Ok(Self {
            subject,
            sql: sql.to_string(),
            engine,
        })
    }
}

fn resolve<'r>(
    request: &'r ExtractionRequest,
    provider: &dyn EngineProvider,
) -> Result<(&'r str, Arc<dyn QueryEngine>)> {
    let kind = SourceKind::RelationalDb;
    let sql = request.require("sql")?;
    let dsn = request
        .dsn()
        .ok_or(ExtractError::MissingParam { kind, param: "dsn" })?;
    let engine = provider.engine(dsn).map_err(|source| ExtractError::Source {
        kind,
        entity: request.entity().to_string(),
        source,
    })?;
    Ok((sql, engine))
}

#[async_trait]
impl SourceStrategy for RelationalStrategy {
    fn kind(&self) -> SourceKind {
        SourceKind::RelationalDb
    }

    async fn extract_data(&self) -> Result<Extraction> {
        self.subject.announce(self.kind());
        match self.engine.query(&self.sql).await {
            Ok(table) => Ok(Extraction::complete(table)),
            Err(source) => {
                let err = ExtractError::Source {
                    kind: self.kind(),
                    entity: self.subject.entity.clone(),
                    source,
                };
                Err(self.subject.hard_failure(self.kind(), err))
            }
        }
    }
}
