//! File system storage operations
//!
//! This module handles all file I/O for tables:
//! - Delimited (CSV) table reading/writing with a row index column
//! - The file-backed result cache and its strategy decorator

mod cache;
mod delimited;

pub use cache::{CacheKey, CachedSource, CsvCache};
pub use delimited::{CsvReader, CsvWriter, read_table, write_table};
