use tracing::trace;

use crate::domain::SearchError;
use crate::table::{Record, Table};

/// Full, unformatted records whose stringified `field` equals `value` exactly.
pub fn search(table: &Table, field: &str, value: &str) -> Result<Vec<Record>, SearchError> {
    if field.is_empty() {
        return Err(SearchError::MissingParameter("field"));
    }
    if value.is_empty() {
        return Err(SearchError::MissingParameter("value"));
    }
    let column = table
        .column(field)
        .ok_or_else(|| SearchError::UnknownField {
            field: field.to_string(),
            available_fields: table.columns(),
        })?;

    let matches: Vec<usize> = column
        .data()
        .iter()
        .enumerate()
        .filter(|(_, cell)| cell.to_canonical_string().is_some_and(|s| s == value))
        .map(|(idx, _)| idx)
        .collect();
    trace!("Search {field} == \"{value}\" found {} rows", matches.len());

    matches
        .into_iter()
        .map(|row| {
            table
                .record(row)
                .ok_or_else(|| SearchError::Failure(format!("row {row} out of range")))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::{CellValue, Column, ColumnKind};

    fn table() -> Table {
        Table::new(vec![
            Column::new(
                "id",
                ColumnKind::Numeric,
                vec![CellValue::Int(4), CellValue::Int(42), CellValue::Int(420)],
            ),
            Column::new(
                "text",
                ColumnKind::Text,
                vec![
                    CellValue::Str("Hello".into()),
                    CellValue::Null,
                    CellValue::Str("hello".into()),
                ],
            ),
            Column::new(
                "flag",
                ColumnKind::Other,
                vec![CellValue::Bool(true), CellValue::Bool(false), CellValue::Null],
            ),
        ])
        .unwrap()
    }

    #[test]
    fn exact_on_integers() {
        let results = search(&table(), "id", "42").unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].index, 1);
        assert_eq!(results[0].get("id"), Some(&CellValue::Int(42)));
        // the whole record comes back, raw
        assert_eq!(results[0].get("text"), Some(&CellValue::Null));
    }

    #[test]
    fn substring_never_matches() {
        let results = search(&table(), "id", "2").unwrap();
        assert!(results.is_empty());
    }

    #[test]
    fn case_sensitive() {
        let results = search(&table(), "text", "hello").unwrap();
        assert_eq!(results.iter().map(|r| r.index).collect::<Vec<_>>(), vec![2]);
    }

    #[test]
    fn booleans_use_canonical_form() {
        let results = search(&table(), "flag", "false").unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].index, 1);
    }

    #[test]
    fn raw_escapes_are_matched_not_markers() {
        let table = Table::new(vec![Column::new(
            "text",
            ColumnKind::Text,
            vec![CellValue::Str("a\\nb".into()), CellValue::Str("a<br>b".into())],
        )])
        .unwrap();
        let results = search(&table, "text", "a\\nb").unwrap();
        assert_eq!(results.iter().map(|r| r.index).collect::<Vec<_>>(), vec![0]);
        assert_eq!(results[0].get("text"), Some(&CellValue::Str("a\\nb".into())));
        let results = search(&table, "text", "a<br>b").unwrap();
        assert_eq!(results.iter().map(|r| r.index).collect::<Vec<_>>(), vec![1]);

        let plain = Table::new(vec![Column::new(
            "text",
            ColumnKind::Text,
            vec![CellValue::Str("a\\nb".into())],
        )])
        .unwrap();
        assert!(search(&plain, "text", "a<br>b").unwrap().is_empty());
        assert!(search(&plain, "text", "a\nb").unwrap().is_empty());
    }

    #[test]
    fn unknown_field_lists_columns() {
        match search(&table(), "nope", "1") {
            Err(e @ SearchError::UnknownField { .. }) => {
                assert_eq!(
                    e.available_fields().unwrap(),
                    &["id".to_string(), "text".to_string(), "flag".to_string()]
                );
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn empty_parameters() {
        assert!(matches!(
            search(&table(), "", "1"),
            Err(SearchError::MissingParameter("field"))
        ));
        assert!(matches!(
            search(&table(), "id", ""),
            Err(SearchError::MissingParameter("value"))
        ));
    }
}
