//! Delimited text files holding an indexed table
//!
//! Layout: a header row `index_name,col1,col2,...` followed by one line per
//! row whose first field is the row label. Cells are typed on read: empty
//! fields become `null`, then integers, floats and `true`/`false` are
//! recognized, anything else stays a string.

use crate::table::Table;
use serde_json::{Number, Value};
use std::io;
use std::path::{Path, PathBuf};

/// Read a [`Table`] from a delimited file
pub struct CsvReader {
    path: PathBuf,
    delimiter: u8,
}

impl CsvReader {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            delimiter: b',',
        }
    }

    pub fn with_delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = delimiter;
        self
    }

    /// Read the file, treating the first column as the row index
    ///
    /// # Errors
    /// Fails if the file cannot be opened, has no header, or has rows whose
    /// width differs from the header.
    pub fn read(&self) -> Result<Table, csv::Error> {
        let reader = csv::ReaderBuilder::new()
            .delimiter(self.delimiter)
            .from_path(&self.path)?;
        read_table(reader)
    }
}

/// Read an indexed table from any reader
pub fn read_table<R: io::Read>(mut reader: csv::Reader<R>) -> Result<Table, csv::Error> {
    let headers = reader.headers()?.clone();
    let mut names = headers.iter();
    let index_name = match names.next() {
        Some(name) => Some(name).filter(|n| !n.is_empty()).map(str::to_string),
        None => {
            return Err(
                io::Error::new(io::ErrorKind::InvalidData, "No columns to parse from file").into(),
            );
        }
    };
    let columns: Vec<String> = names.map(str::to_string).collect();

    let mut index = Vec::new();
    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        let mut cells = record.iter().map(parse_cell);
        index.push(cells.next().unwrap_or(Value::Null));
        rows.push(cells.collect());
    }

    Ok(Table::from_parts(index_name, index, columns, rows))
}

/// Write a [`Table`] as a delimited file
pub struct CsvWriter {
    path: PathBuf,
}

impl CsvWriter {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// Write the table, creating or truncating the file
    pub fn write(&self, table: &Table) -> Result<(), csv::Error> {
        write_table(csv::Writer::from_path(&self.path)?, table)
    }
}

/// Write an indexed table to any writer, flushing at the end
pub fn write_table<W: io::Write>(
    mut writer: csv::Writer<W>,
    table: &Table,
) -> Result<(), csv::Error> {
    let header = std::iter::once(table.index_name().unwrap_or(""))
        .chain(table.columns().iter().map(String::as_str));
    writer.write_record(header)?;

    for (label, row) in table.index().iter().zip(table.rows()) {
        let fields = std::iter::once(label).chain(row).map(format_cell);
        writer.write_record(fields)?;
    }
    writer.flush()?;
    Ok(())
}

fn format_cell(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        nested => nested.to_string(),
    }
}

fn parse_cell(field: &str) -> Value {
    if field.is_empty() {
        return Value::Null;
    }
    if let Ok(i) = field.parse::<i64>() {
        return Value::from(i);
    }
    if let Ok(u) = field.parse::<u64>() {
        return Value::from(u);
    }
    if let Some(n) = field.parse::<f64>().ok().and_then(Number::from_f64) {
        return Value::Number(n);
    }
    match field.to_ascii_lowercase().as_str() {
        "true" => Value::Bool(true),
        "false" => Value::Bool(false),
        _ => Value::String(field.to_string()),
    }
}
