use std::collections::HashSet;
use std::fmt;

use polars::prelude::*;
use rayon::prelude::*;
use serde::ser::{Serialize, SerializeMap, Serializer};
use tracing::{debug, trace};

use crate::domain::LoadError;

/// Filter semantics of a column, taken from the dtype the source declared.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnKind {
    Text,
    Numeric,
    Other,
}

#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Null,
    Str(String),
    Int(i64),
    /// Unsigned values above `i64::MAX`.
    UInt(u64),
    Float(f64),
    Bool(bool),
    Other(String),
}

impl CellValue {
    /// Canonical string form used for matching. Null has none.
    pub fn to_canonical_string(&self) -> Option<String> {
        match self {
            CellValue::Null => None,
            CellValue::Str(s) | CellValue::Other(s) => Some(s.clone()),
            CellValue::Int(i) => Some(i.to_string()),
            CellValue::UInt(u) => Some(u.to_string()),
            CellValue::Float(f) => Some(canonical_float(*f)),
            CellValue::Bool(b) => Some(b.to_string()),
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            CellValue::Int(i) => Some(*i as f64),
            CellValue::UInt(u) => Some(*u as f64),
            CellValue::Float(f) => Some(*f),
            _ => None,
        }
    }
}

fn canonical_float(f: f64) -> String {
    if f.is_nan() {
        "nan".to_string()
    } else if f.is_infinite() {
        if f > 0.0 { "inf" } else { "-inf" }.to_string()
    } else if f.fract() == 0.0 && f.abs() < 1e16 {
        format!("{f:.1}")
    } else {
        f.to_string()
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.to_canonical_string() {
            Some(s) => f.write_str(&s),
            None => f.write_str("∅"),
        }
    }
}

impl Serialize for CellValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            CellValue::Null => serializer.serialize_none(),
            CellValue::Str(s) | CellValue::Other(s) => serializer.serialize_str(s),
            CellValue::Int(i) => serializer.serialize_i64(*i),
            CellValue::UInt(u) => serializer.serialize_u64(*u),
            // JSON has no NaN or infinity
            CellValue::Float(f) if !f.is_finite() => serializer.serialize_none(),
            CellValue::Float(f) => serializer.serialize_f64(*f),
            CellValue::Bool(b) => serializer.serialize_bool(*b),
        }
    }
}

#[derive(Debug)]
pub struct Column {
    name: String,
    kind: ColumnKind,
    data: Vec<CellValue>,
}

impl Column {
    pub fn new(name: impl Into<String>, kind: ColumnKind, data: Vec<CellValue>) -> Self {
        Self {
            name: name.into(),
            kind,
            data,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> ColumnKind {
        self.kind
    }

    pub fn data(&self) -> &[CellValue] {
        &self.data
    }

    pub fn as_string(&self) -> String {
        format!("\"{}\", {:?}, # rows {}", self.name, self.kind, self.data.len())
    }
}

/// A full row keyed by column name, in column order.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub index: usize,
    pub values: Vec<(String, CellValue)>,
}

impl Record {
    pub fn get(&self, column: &str) -> Option<&CellValue> {
        self.values
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, v)| v)
    }
}

impl Serialize for Record {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.values.len()))?;
        for (name, value) in &self.values {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

/// Immutable table of equally long, uniquely named columns. Rows are identified by position.
#[derive(Debug)]
pub struct Table {
    columns: Vec<Column>,
    nrows: usize,
}

impl Table {
    pub fn new(columns: Vec<Column>) -> Result<Self, LoadError> {
        let nrows = columns.first().map(|c| c.data.len()).unwrap_or(0);
        let mut seen = HashSet::new();
        for column in columns.iter() {
            if !seen.insert(column.name.as_str()) {
                return Err(LoadError::InvalidTable(format!(
                    "duplicate column name '{}'",
                    column.name
                )));
            }
            if column.data.len() != nrows {
                return Err(LoadError::InvalidTable(format!(
                    "column '{}' has {} rows, expected {}",
                    column.name,
                    column.data.len(),
                    nrows
                )));
            }
        }
        Ok(Self { columns, nrows })
    }

    /// Convert a polars frame. Each column is converted on its own rayon worker.
    pub fn from_dataframe(df: &DataFrame) -> Result<Self, LoadError> {
        let columns: Result<Vec<Column>, PolarsError> = df
            .get_column_names()
            .par_iter()
            .map(|name| Self::load_column(df, name))
            .collect();
        let columns = columns?;
        for c in columns.iter() {
            debug!("Column: {}", c.as_string());
        }
        Self::new(columns)
    }

    pub fn columns(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn column_kind(&self, name: &str) -> Option<ColumnKind> {
        self.column(name).map(|c| c.kind)
    }

    pub fn row_count(&self) -> usize {
        self.nrows
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub(crate) fn iter_columns(&self) -> impl Iterator<Item = &Column> {
        self.columns.iter()
    }

    pub fn record(&self, row: usize) -> Option<Record> {
        if row >= self.nrows {
            return None;
        }
        Some(Record {
            index: row,
            values: self
                .columns
                .iter()
                .map(|c| (c.name.clone(), c.data[row].clone()))
                .collect(),
        })
    }

    fn is_numeric_type(dtype: &DataType) -> bool {
        matches!(
            dtype,
            DataType::Int8
                | DataType::Int16
                | DataType::Int32
                | DataType::Int64
                | DataType::UInt8
                | DataType::UInt16
                | DataType::UInt32
                | DataType::UInt64
                | DataType::Float32
                | DataType::Float64
        )
    }

    fn is_float_type(dtype: &DataType) -> bool {
        matches!(dtype, DataType::Float32 | DataType::Float64)
    }

    fn load_column(df: &DataFrame, col_name: &str) -> Result<Column, PolarsError> {
        let col = df.column(col_name)?;
        let dtype = col.dtype().clone();
        trace!("Converting column \"{col_name}\" with dtype {dtype:?}");

        let (kind, data): (ColumnKind, Vec<CellValue>) = if Self::is_float_type(&dtype) {
            let values = col.cast(&DataType::Float64)?;
            let data = values
                .f64()?
                .into_iter()
                .map(|v| v.map_or(CellValue::Null, CellValue::Float))
                .collect();
            (ColumnKind::Numeric, data)
        } else if dtype == DataType::UInt64 {
            let data = col
                .u64()?
                .into_iter()
                .map(|v| {
                    v.map_or(CellValue::Null, |u| {
                        i64::try_from(u).map_or(CellValue::UInt(u), CellValue::Int)
                    })
                })
                .collect();
            (ColumnKind::Numeric, data)
        } else if Self::is_numeric_type(&dtype) {
            let values = col.cast(&DataType::Int64)?;
            let data = values
                .i64()?
                .into_iter()
                .map(|v| v.map_or(CellValue::Null, CellValue::Int))
                .collect();
            (ColumnKind::Numeric, data)
        } else if dtype == DataType::String {
            let data = col
                .str()?
                .into_iter()
                .map(|v| v.map_or(CellValue::Null, |s| CellValue::Str(s.to_string())))
                .collect();
            (ColumnKind::Text, data)
        } else if dtype == DataType::Boolean {
            let data = col
                .bool()?
                .into_iter()
                .map(|v| v.map_or(CellValue::Null, CellValue::Bool))
                .collect();
            (ColumnKind::Other, data)
        } else {
            let values = col.cast(&DataType::String)?;
            let data = values
                .str()?
                .into_iter()
                .map(|v| v.map_or(CellValue::Null, |s| CellValue::Other(s.to_string())))
                .collect();
            (ColumnKind::Other, data)
        };

        Ok(Column::new(col_name, kind, data))
    }
}
