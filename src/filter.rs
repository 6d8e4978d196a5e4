use tracing::trace;

use crate::domain::FilterError;
use crate::table::{CellValue, Column, ColumnKind, Table};

/// One flag per table row, `true` where the row passed the predicate.
#[derive(Debug, Clone, PartialEq)]
pub struct RowMask(Vec<bool>);

impl RowMask {
    pub fn count(&self) -> usize {
        self.0.iter().filter(|&&m| m).count()
    }

    /// Row indices that passed, in table order.
    pub fn selected(&self) -> Vec<usize> {
        self.0
            .iter()
            .enumerate()
            .filter_map(|(idx, &m)| m.then_some(idx))
            .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Number {
    Int(i64),
    UInt(u64),
    Float(f64),
}

impl Number {
    fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        if let Ok(i) = raw.parse::<i64>() {
            return Some(Number::Int(i));
        }
        if let Ok(u) = raw.parse::<u64>() {
            return Some(Number::UInt(u));
        }
        raw.parse::<f64>().ok().map(Number::Float)
    }

    fn matches(&self, cell: &CellValue) -> bool {
        match (self, cell) {
            (Number::Int(n), CellValue::Int(c)) => n == c,
            (Number::Int(n), CellValue::Float(c)) => *n as f64 == *c,
            (Number::UInt(n), CellValue::UInt(c)) => n == c,
            (Number::UInt(n), CellValue::Float(c)) => *n as f64 == *c,
            (Number::Float(n), c) => c.as_f64().is_some_and(|c| c == *n),
            _ => false,
        }
    }
}

/// Evaluate `column` against `raw_value` for every row of the table.
///
/// Text and other columns match case-insensitively on a substring of the stringified
/// cell. Numeric columns compare by value when `raw_value` parses as a number and fall
/// back to the substring match otherwise. Null cells never match.
pub fn evaluate(table: &Table, column: &str, raw_value: &str) -> Result<RowMask, FilterError> {
    let col = table
        .column(column)
        .ok_or_else(|| FilterError::UnknownColumn(column.to_string()))?;

    let mask = match col.kind() {
        ColumnKind::Numeric => match Number::parse(raw_value) {
            Some(number) => {
                trace!("Numeric filter on \"{column}\" for {number:?}");
                numeric_mask(col, number)
            }
            None => {
                trace!("\"{raw_value}\" is not a number, substring filter on \"{column}\"");
                substring_mask(col, raw_value)
            }
        },
        ColumnKind::Text | ColumnKind::Other => substring_mask(col, raw_value),
    };
    Ok(mask)
}

fn numeric_mask(column: &Column, number: Number) -> RowMask {
    RowMask(column.data().iter().map(|c| number.matches(c)).collect())
}

fn substring_mask(column: &Column, term: &str) -> RowMask {
    let needle = term.to_lowercase();
    RowMask(
        column
            .data()
            .iter()
            .map(|c| {
                c.to_canonical_string()
                    .is_some_and(|s| s.to_lowercase().contains(&needle))
            })
            .collect(),
    )
}
