//! In-memory tabular dataset shared by every source

use serde::Serialize;
use serde_json::{Map, Value};

/// Reasons a value cannot be shaped into a [`Table`]
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ShapeError {
    #[error("a {0} cannot be shaped into a table")]
    Scalar(&'static str),

    #[error("rows mix records, arrays and scalars")]
    MixedRows,

    #[error("column '{column}' has {found} values, expected {expected}")]
    ColumnLength {
        column: String,
        expected: usize,
        found: usize,
    },

    #[error("row {row} has {found} cells, expected {expected}")]
    RowWidth {
        row: usize,
        expected: usize,
        found: usize,
    },

    #[error("index has {found} labels, expected {expected}")]
    IndexLength { expected: usize, found: usize },

    #[error("payload has no '{0}' field")]
    MissingField(&'static str),
}

/// A 2D table of named columns with a row index
///
/// Cells are JSON values so API payloads, query results and CSV files share
/// one representation. Tables built without an explicit index get a `0..n`
/// range index.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Table {
    index_name: Option<String>,
    index: Vec<Value>,
    columns: Vec<String>,
    rows: Vec<Vec<Value>>,
}

impl Table {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build a table from column names and row-major cells
    ///
    /// # Errors
    /// Returns [`ShapeError::RowWidth`] if a row does not match the column count
    pub fn new(columns: Vec<String>, rows: Vec<Vec<Value>>) -> Result<Self, ShapeError> {
        if let Some((row, cells)) = rows
            .iter()
            .enumerate()
            .find(|(_, cells)| cells.len() != columns.len())
        {
            return Err(ShapeError::RowWidth {
                row,
                expected: columns.len(),
                found: cells.len(),
            });
        }
        Ok(Self {
            index_name: None,
            index: range_index(rows.len()),
            columns,
            rows,
        })
    }

    /// Assemble a table whose rows are already known to match `columns`
    pub(crate) fn from_parts(
        index_name: Option<String>,
        index: Vec<Value>,
        columns: Vec<String>,
        rows: Vec<Vec<Value>>,
    ) -> Self {
        debug_assert_eq!(index.len(), rows.len());
        debug_assert!(rows.iter().all(|r| r.len() == columns.len()));
        Self {
            index_name,
            index,
            columns,
            rows,
        }
    }

    /// Replace the range index with explicit row labels
    pub fn with_index(
        mut self,
        name: Option<String>,
        index: Vec<Value>,
    ) -> Result<Self, ShapeError> {
        if index.len() != self.rows.len() {
            return Err(ShapeError::IndexLength {
                expected: self.rows.len(),
                found: index.len(),
            });
        }
        self.index_name = name;
        self.index = index;
        Ok(self)
    }

    /// Reshape a JSON payload into a table
    ///
    /// Accepted shapes:
    /// - `null`: empty table
    /// - array of objects: one row per record, columns in first-seen key order,
    ///   missing keys become `null`
    /// - array of arrays: columns `0..n`, short rows padded with `null`
    /// - array of scalars: a single column `0`
    /// - object of arrays: one column per key; scalar members are broadcast
    /// - object of objects: one column per key, rows labelled by the union of
    ///   inner keys in first-seen order, missing cells become `null`
    pub fn from_json(value: &Value) -> Result<Self, ShapeError> {
        match value {
            Value::Null => Ok(Self::empty()),
            Value::Array(items) => Self::from_json_rows(items),
            Value::Object(map) => Self::from_json_columns(map),
            Value::Bool(_) => Err(ShapeError::Scalar("boolean")),
            Value::Number(_) => Err(ShapeError::Scalar("number")),
            Value::String(_) => Err(ShapeError::Scalar("string")),
        }
    }

    fn from_json_rows(items: &[Value]) -> Result<Self, ShapeError> {
        match items.first() {
            None => Ok(Self::empty()),
            Some(Value::Object(_)) => {
                let mut columns: Vec<String> = Vec::new();
                let mut records = Vec::with_capacity(items.len());
                for item in items {
                    let record = item.as_object().ok_or(ShapeError::MixedRows)?;
                    for key in record.keys() {
                        if !columns.iter().any(|c| c == key) {
                            columns.push(key.clone());
                        }
                    }
                    records.push(record);
                }
                let rows = records
                    .into_iter()
                    .map(|record| {
                        columns
                            .iter()
                            .map(|c| record.get(c).cloned().unwrap_or(Value::Null))
                            .collect()
                    })
                    .collect();
                Self::new(columns, rows)
            }
            Some(Value::Array(_)) => {
                let arrays = items
                    .iter()
                    .map(|item| item.as_array().ok_or(ShapeError::MixedRows))
                    .collect::<Result<Vec<_>, _>>()?;
                let width = arrays.iter().map(|a| a.len()).max().unwrap_or(0);
                let rows = arrays
                    .into_iter()
                    .map(|cells| {
                        let mut row = cells.clone();
                        row.resize(width, Value::Null);
                        row
                    })
                    .collect();
                Self::new(positional_columns(width), rows)
            }
            Some(_) => {
                if items.iter().any(|i| i.is_object() || i.is_array()) {
                    return Err(ShapeError::MixedRows);
                }
                let rows = items.iter().map(|i| vec![i.clone()]).collect();
                Self::new(positional_columns(1), rows)
            }
        }
    }

    fn from_json_columns(map: &Map<String, Value>) -> Result<Self, ShapeError> {
        if map.is_empty() {
            return Ok(Self::empty());
        }
        if map.values().any(Value::is_object) {
            return Self::from_json_nested(map);
        }
        let height = map
            .values()
            .find_map(|v| v.as_array().map(Vec::len))
            .ok_or(ShapeError::Scalar("object of scalars"))?;

        let mut columns = Vec::with_capacity(map.len());
        let mut data = Vec::with_capacity(map.len());
        for (name, value) in map {
            let cells = match value {
                Value::Array(cells) if cells.len() == height => cells.clone(),
                Value::Array(cells) => {
                    return Err(ShapeError::ColumnLength {
                        column: name.clone(),
                        expected: height,
                        found: cells.len(),
                    });
                }
                scalar => vec![scalar.clone(); height],
            };
            columns.push(name.clone());
            data.push(cells);
        }

        let rows = (0..height)
            .map(|r| data.iter().map(|column| column[r].clone()).collect())
            .collect();
        Self::new(columns, rows)
    }

    /// Object of objects: outer keys are columns, inner keys label the rows
    fn from_json_nested(map: &Map<String, Value>) -> Result<Self, ShapeError> {
        let mut labels: Vec<&String> = Vec::new();
        for inner in map.values().filter_map(Value::as_object) {
            for key in inner.keys() {
                if !labels.contains(&key) {
                    labels.push(key);
                }
            }
        }

        let mut columns = Vec::with_capacity(map.len());
        let mut data = Vec::with_capacity(map.len());
        for (name, value) in map {
            let cells: Vec<Value> = match value {
                Value::Object(inner) => labels
                    .iter()
                    .map(|label| inner.get(*label).cloned().unwrap_or(Value::Null))
                    .collect(),
                Value::Array(_) => return Err(ShapeError::MixedRows),
                scalar => vec![scalar.clone(); labels.len()],
            };
            columns.push(name.clone());
            data.push(cells);
        }

        let rows = (0..labels.len())
            .map(|r| data.iter().map(|column| column[r].clone()).collect())
            .collect();
        let index = labels.into_iter().map(|l| Value::String(l.clone())).collect();
        Self::new(columns, rows)?.with_index(None, index)
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<Value>] {
        &self.rows
    }

    pub fn row(&self, position: usize) -> Option<&[Value]> {
        self.rows.get(position).map(Vec::as_slice)
    }

    pub fn index(&self) -> &[Value] {
        &self.index
    }

    pub fn index_name(&self) -> Option<&str> {
        self.index_name.as_deref()
    }

    /// All cells of a named column, top to bottom
    pub fn column(&self, name: &str) -> Option<Vec<&Value>> {
        let position = self.columns.iter().position(|c| c == name)?;
        Some(self.rows.iter().map(|row| &row[position]).collect())
    }

    /// Number of rows
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Number of columns
    pub fn width(&self) -> usize {
        self.columns.len()
    }

    /// True when the table has no rows or no columns
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty() || self.columns.is_empty()
    }
}

fn range_index(len: usize) -> Vec<Value> {
    (0..len as u64).map(Value::from).collect()
}

fn positional_columns(width: usize) -> Vec<String> {
    (0..width).map(|i| i.to_string()).collect()
}
