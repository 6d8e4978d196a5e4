use derive_setters::Setters;
use serde::Serialize;
use serde::ser::{SerializeMap, Serializer};
use tracing::{trace, warn};

use crate::domain::{DEFAULT_PAGE_SIZE, PAGE_SIZES};
use crate::filter;
use crate::format::{DisplayValue, Markup, format_cell};
use crate::table::Table;

/// Request-side parameters of a view. Never mutates the table.
#[derive(Debug, Clone, PartialEq, Setters)]
pub struct ViewParams {
    /// Requested page, 1-based. Clamped against the filtered row count.
    pub page: i64,
    /// Rows per page. Values outside [`PAGE_SIZES`] fall back to the default.
    pub page_size: usize,
    #[setters(into)]
    pub hidden_columns: Vec<String>,
    #[setters(into)]
    pub filter_column: String,
    #[setters(into)]
    pub filter_value: String,
    pub markup: Markup,
}

impl Default for ViewParams {
    fn default() -> Self {
        Self {
            page: 1,
            page_size: DEFAULT_PAGE_SIZE,
            hidden_columns: Vec::new(),
            filter_column: String::new(),
            filter_value: String::new(),
            markup: Markup::Html,
        }
    }
}

impl ViewParams {
    pub fn has_filter(&self) -> bool {
        !self.filter_column.is_empty() && !self.filter_value.is_empty()
    }
}

pub fn normalize_page_size(page_size: usize) -> usize {
    if PAGE_SIZES.contains(&page_size) {
        page_size
    } else {
        DEFAULT_PAGE_SIZE
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ViewRow {
    /// Position of the row in the loaded table.
    pub index: usize,
    pub cells: Vec<(String, DisplayValue)>,
}

impl Serialize for ViewRow {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.cells.len() + 1))?;
        map.serialize_entry("_index", &self.index)?;
        for (name, value) in &self.cells {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

/// One page of the table, ready for display.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ViewResult {
    pub rows: Vec<ViewRow>,
    pub total_rows: usize,
    pub original_total_rows: usize,
    pub total_pages: usize,
    pub page: usize,
    pub page_size: usize,
    pub start_row: usize,
    pub end_row: usize,
    pub columns: Vec<String>,
    pub all_columns: Vec<String>,
    pub hidden_columns: Vec<String>,
    pub filter_column: String,
    pub filter_value: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

pub fn total_pages(total_rows: usize, page_size: usize) -> usize {
    if total_rows == 0 {
        1
    } else {
        total_rows.div_ceil(page_size)
    }
}

fn clamp_page(page: i64, total_pages: usize) -> usize {
    if page < 1 {
        1
    } else {
        std::cmp::min(page as u64, total_pages as u64) as usize
    }
}

/// Filter, paginate, hide and format, in that order.
pub fn project(table: &Table, params: &ViewParams) -> ViewResult {
    let page_size = normalize_page_size(params.page_size);

    let mut warning = None;
    let rows: Vec<usize> = if params.has_filter() {
        match filter::evaluate(table, &params.filter_column, &params.filter_value) {
            Ok(mask) => mask.selected(),
            Err(e) => {
                warn!("{e}");
                warning = Some(e.to_string());
                (0..table.row_count()).collect()
            }
        }
    } else {
        (0..table.row_count()).collect()
    };

    let total_rows = rows.len();
    let total_pages = total_pages(total_rows, page_size);
    let page = clamp_page(params.page, total_pages);

    let rbegin = std::cmp::min((page - 1) * page_size, total_rows);
    let rend = std::cmp::min(rbegin + page_size, total_rows);

    let visible: Vec<_> = table
        .iter_columns()
        .filter(|c| !params.hidden_columns.iter().any(|h| h == c.name()))
        .collect();

    let page_rows = rows[rbegin..rend]
        .iter()
        .map(|&ridx| ViewRow {
            index: ridx,
            cells: visible
                .iter()
                .map(|c| {
                    (
                        c.name().to_string(),
                        format_cell(&c.data()[ridx], params.markup),
                    )
                })
                .collect(),
        })
        .collect();

    trace!(
        "View: page {page}/{total_pages}, size {page_size}, rows {rbegin}..{rend} of {total_rows}"
    );

    ViewResult {
        rows: page_rows,
        total_rows,
        original_total_rows: table.row_count(),
        total_pages,
        page,
        page_size,
        start_row: (page - 1) * page_size + 1,
        end_row: std::cmp::min(page * page_size, total_rows),
        columns: visible.iter().map(|c| c.name().to_string()).collect(),
        all_columns: table.columns(),
        hidden_columns: params.hidden_columns.clone(),
        filter_column: params.filter_column.clone(),
        filter_value: params.filter_value.clone(),
        warning,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::{CellValue, Column, ColumnKind};

    /// 25 rows, `label` is "pos" for the first 10 and "neg" after.
    fn labels() -> Table {
        let label = (0..25)
            .map(|i| CellValue::Str(if i < 10 { "pos" } else { "neg" }.into()))
            .collect();
        let id = (0..25).map(CellValue::Int).collect();
        Table::new(vec![
            Column::new("id", ColumnKind::Numeric, id),
            Column::new("label", ColumnKind::Text, label),
        ])
        .unwrap()
    }

    #[test]
    fn first_page_unfiltered() {
        let view = project(&labels(), &ViewParams::default());
        assert_eq!(view.rows.len(), 10);
        assert_eq!(view.total_rows, 25);
        assert_eq!(view.total_pages, 3);
        assert_eq!((view.start_row, view.end_row), (1, 10));
    }

    #[test]
    fn last_page_is_partial() {
        let view = project(&labels(), &ViewParams::default().page(3));
        assert_eq!(view.rows.len(), 5);
        assert_eq!((view.start_row, view.end_row), (21, 25));
        assert_eq!(view.rows[0].index, 20);
    }

    #[test]
    fn filter_clamps_page() {
        let params = ViewParams::default()
            .page(5)
            .filter_column("label")
            .filter_value("pos");
        let view = project(&labels(), &params);
        assert_eq!(view.total_rows, 10);
        assert_eq!(view.total_pages, 1);
        assert_eq!(view.page, 1);
        assert_eq!(view.original_total_rows, 25);
        assert!(view.warning.is_none());
    }

    #[test]
    fn page_below_one_clamps_to_first() {
        let view = project(&labels(), &ViewParams::default().page(-3));
        assert_eq!(view.page, 1);
        assert_eq!(view.rows[0].index, 0);
    }

    #[test]
    fn hidden_columns_are_display_only() {
        let params = ViewParams::default().hidden_columns(vec!["label".to_string(), "nope".to_string()]);
        let view = project(&labels(), &params);
        assert!(view.rows.iter().all(|r| r.cells.iter().all(|(n, _)| n != "label")));
        assert_eq!(view.columns, vec!["id"]);
        assert_eq!(view.all_columns, vec!["id", "label"]);
        assert_eq!(view.total_rows, 25);
        assert_eq!(view.total_pages, 3);
    }

    #[test]
    fn empty_result_has_one_page() {
        let params = ViewParams::default()
            .page(2)
            .filter_column("label")
            .filter_value("neutral");
        let view = project(&labels(), &params);
        assert_eq!(view.total_rows, 0);
        assert_eq!(view.total_pages, 1);
        assert_eq!(view.page, 1);
        assert!(view.rows.is_empty());
        assert_eq!((view.start_row, view.end_row), (1, 0));
    }

    #[test]
    fn unknown_filter_column_degrades() {
        let params = ViewParams::default()
            .filter_column("missing")
            .filter_value("x");
        let view = project(&labels(), &params);
        assert_eq!(view.total_rows, 25);
        assert!(view.warning.is_some());
    }

    #[test]
    fn invalid_page_size_falls_back() {
        let view = project(&labels(), &ViewParams::default().page_size(7));
        assert_eq!(view.page_size, 10);
        let view = project(&labels(), &ViewParams::default().page_size(20));
        assert_eq!(view.rows.len(), 20);
        assert_eq!(view.total_pages, 2);
    }

    #[test]
    fn cells_are_formatted_after_filtering() {
        let table = Table::new(vec![Column::new(
            "text",
            ColumnKind::Text,
            vec![
                CellValue::Str("line\\nbreak".into()),
                CellValue::Str("plain".into()),
            ],
        )])
        .unwrap();
        let params = ViewParams::default()
            .filter_column("text")
            .filter_value("\\n");
        let view = project(&table, &params);
        assert_eq!(view.total_rows, 1);
        assert_eq!(
            view.rows[0].cells[0].1,
            CellValue::Str("line<br>break".into())
        );
    }

    #[test]
    fn view_cells_carry_no_entities() {
        let table = Table::new(vec![Column::new(
            "t",
            ColumnKind::Text,
            vec![CellValue::Str("Tom & \"Jerry\" <3".into())],
        )])
        .unwrap();
        let view = project(&table, &ViewParams::default());
        let json = serde_json::to_value(&view.rows).unwrap();
        assert_eq!(json[0]["t"], "Tom & \"Jerry\" <3");
    }

    #[test]
    fn rows_serialize_as_objects() {
        let view = project(&labels(), &ViewParams::default().page_size(10));
        let json = serde_json::to_value(&view).unwrap();
        assert_eq!(json["rows"][0]["_index"], 0);
        assert_eq!(json["rows"][0]["label"], "pos");
        assert_eq!(json["total_pages"], 3);
        assert!(json.get("warning").is_none());
    }
}
