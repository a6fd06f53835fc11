use super::{Extraction, SourceStrategy, Subject};
use crate::client::RetryingFetcher;
use crate::error::{ExtractError, Result};
use crate::request::{ExtractionRequest, SourceKind};
use crate::table::{ShapeError, Table};
use async_trait::async_trait;
use serde_json::Value;

/// Fetches a JSON payload and reshapes its `data` field into a table
pub struct ApiStrategy {
    subject: Subject,
    url: String,
    fetcher: RetryingFetcher,
}

impl ApiStrategy {
    pub fn new(
        entity: impl Into<String>,
        date: impl Into<String>,
        url: impl Into<String>,
        fetcher: RetryingFetcher,
    ) -> Self {
        Self {
            subject: Subject {
                entity: entity.into(),
                date: date.into(),
            },
            url: url.into(),
            fetcher,
        }
    }

    /// Requires the `url` parameter
    pub fn from_request(request: &ExtractionRequest, fetcher: RetryingFetcher) -> Result<Self> {
        Ok(Self {
            subject: Subject::of(request),
            url: request.require("url")?.to_string(),
            fetcher,
        })
    }
}

/// `null`, `false`, `0`, `""`, `[]` and `{}` carry no data
fn is_blank(payload: &Value) -> bool {
    match payload {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::Number(n) => n.as_f64() == Some(0.0),
        Value::String(s) => s.is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Object(map) => map.is_empty(),
    }
}

fn reshape(payload: &Value) -> std::result::Result<Table, ShapeError> {
    let data = payload.get("data").ok_or(ShapeError::MissingField("data"))?;
    Table::from_json(data)
}

#[async_trait]
impl SourceStrategy for ApiStrategy {
    fn kind(&self) -> SourceKind {
        SourceKind::Api
    }

    async fn extract_data(&self) -> Result<Extraction> {
        self.subject.announce(self.kind());

        let payload = match self.fetcher.fetch(&self.url).await {
            Ok(Some(payload)) if !is_blank(&payload) => payload,
            Ok(_) => {
                let err = ExtractError::EmptyPayload {
                    endpoint: self.url.clone(),
                };
                return Err(self.subject.hard_failure(self.kind(), err));
            }
            Err(err) => return Err(self.subject.hard_failure(self.kind(), err.into())),
        };

        match reshape(&payload) {
            Ok(table) => Ok(Extraction::complete(table)),
            Err(err) => {
                log::warn!("Having trouble getting data from API calls: {}", err);
                log::warn!("Empty table returned");
                Ok(Extraction::degraded(err.into()))
            }
        }
    }
}
