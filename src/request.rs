//! Extraction requests and source kinds

use crate::error::{ExtractError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::str::FromStr;

/// The four supported source kinds
///
/// Tags follow the historical names: `AWS` for the warehouse, `DB` for a
/// relational database, `API` for a REST endpoint and `CSV` for flat files.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum SourceKind {
    #[serde(rename = "AWS", alias = "aws")]
    Warehouse,
    #[serde(rename = "DB", alias = "db")]
    RelationalDb,
    #[serde(rename = "API", alias = "api")]
    Api,
    #[serde(rename = "CSV", alias = "csv")]
    File,
}

impl SourceKind {
    pub const ALL: [SourceKind; 4] = [Self::Warehouse, Self::RelationalDb, Self::Api, Self::File];

    pub fn tag(&self) -> &'static str {
        match self {
            Self::Warehouse => "AWS",
            Self::RelationalDb => "DB",
            Self::Api => "API",
            Self::File => "CSV",
        }
    }
}

impl std::fmt::Display for SourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.tag())
    }
}

impl FromStr for SourceKind {
    type Err = ExtractError;
    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_uppercase().as_str() {
            "AWS" | "WAREHOUSE" => Ok(Self::Warehouse),
            "DB" => Ok(Self::RelationalDb),
            "API" => Ok(Self::Api),
            "CSV" | "FILE" => Ok(Self::File),
            _ => Err(ExtractError::UnsupportedSource(s.to_string())),
        }
    }
}

/// Source-specific string parameters (`sql`, `url`, `path`, ...)
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SourceParams(BTreeMap<String, String>);

impl SourceParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    /// Look up a parameter the given source cannot run without
    pub fn require(&self, kind: SourceKind, key: &'static str) -> Result<&str> {
        self.get(key)
            .ok_or(ExtractError::MissingParam { kind, param: key })
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for SourceParams {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

/// Everything needed to run one extraction
///
/// A request is immutable once built; the builder methods consume `self`.
///
/// # Example
/// ```
/// use tabextract::{ExtractionRequest, SourceKind};
///
/// let request = ExtractionRequest::new(SourceKind::File, "GLOBAL_TRADING_DESK", "2022-04-02")
///     .with_param("path", "positions.csv");
/// assert_eq!(request.params().get("path"), Some("positions.csv"));
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractionRequest {
    #[serde(rename = "source")]
    kind: SourceKind,
    entity: String,
    date: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    dsn: Option<String>,
    #[serde(default)]
    params: SourceParams,
}

impl ExtractionRequest {
    pub fn new(kind: SourceKind, entity: impl Into<String>, date: impl Into<String>) -> Self {
        Self {
            kind,
            entity: entity.into(),
            date: date.into(),
            dsn: None,
            params: SourceParams::new(),
        }
    }

    pub fn with_dsn(mut self, dsn: impl Into<String>) -> Self {
        self.dsn = Some(dsn.into());
        self
    }

    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.0.insert(key.into(), value.into());
        self
    }

    pub fn with_params(mut self, params: SourceParams) -> Self {
        self.params.0.extend(params.0);
        self
    }

    pub fn kind(&self) -> SourceKind {
        self.kind
    }

    pub fn entity(&self) -> &str {
        &self.entity
    }

    pub fn date(&self) -> &str {
        &self.date
    }

    pub fn dsn(&self) -> Option<&str> {
        self.dsn.as_deref()
    }

    pub fn params(&self) -> &SourceParams {
        &self.params
    }

    /// Look up a required parameter for this request's source kind
    pub fn require(&self, key: &'static str) -> Result<&str> {
        self.params.require(self.kind, key)
    }
}
