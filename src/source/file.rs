use super::{Extraction, SourceStrategy, Subject};
use crate::error::{ExtractError, Result};
use crate::request::{ExtractionRequest, SourceKind};
use crate::storage::CsvReader;
use async_trait::async_trait;
use std::path::{Path, PathBuf};

/// Reads a delimited file whose first column is the row index
pub struct FileStrategy {
    subject: Subject,
    path: PathBuf,
    delimiter: u8,
}

impl FileStrategy {
    pub fn new(entity: impl Into<String>, date: impl Into<String>, path: impl AsRef<Path>) -> Self {
        Self {
            subject: Subject {
                entity: entity.into(),
                date: date.into(),
            },
            path: path.as_ref().to_path_buf(),
            delimiter: b',',
        }
    }

    /// Requires the `path` parameter; an optional single-byte `delimiter`
    /// overrides the comma
    pub fn from_request(request: &ExtractionRequest) -> Result<Self> {
        let mut strategy = Self {
            subject: Subject::of(request),
            path: PathBuf::from(request.require("path")?),
            delimiter: b',',
        };
        if let Some(delimiter) = request.params().get("delimiter") {
            match delimiter.as_bytes() {
                [byte] => strategy.delimiter = *byte,
                _ if delimiter == "\\t" => strategy.delimiter = b'\t',
                _ => log::warn!(
                    "Ignoring delimiter '{}', expected a single character",
                    delimiter
                ),
            }
        }
        Ok(strategy)
    }

    pub fn with_delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = delimiter;
        self
    }
}

#[async_trait]
impl SourceStrategy for FileStrategy {
    fn kind(&self) -> SourceKind {
        SourceKind::File
    }

    async fn extract_data(&self) -> Result<Extraction> {
        self.subject.announce(self.kind());
        let reader = CsvReader::new(&self.path).with_delimiter(self.delimiter);
        match reader.read() {
            Ok(table) => Ok(Extraction::complete(table)),
            Err(source) => {
                log::warn!("Having trouble getting data from CSV: {}", source);
                log::warn!("Empty table returned");
                Ok(Extraction::degraded(ExtractError::FileRead {
                    path: self.path.clone(),
                    source,
                }))
            }
        }
    }
}
