//! Output adapters: HTML table markup and JSON documents.
//!
//! Cells are expected to be formatted with [`Markup::Html`](crate::format::Markup)
//! already. The HTML adapter escapes them on the way out, keeping only the `<br>` and
//! `&nbsp;` markers the formatter inserted.

use std::fmt::Write;

use serde::Serialize;
use serde_json::json;

use crate::domain::{DVError, SearchError};
use crate::table::CellValue;
use crate::view::ViewResult;

const TABLE_CLASSES: &str = "table table-striped table-bordered";
const TABLE_ID: &str = "dataset-table";
const NULL_REPR: &str = "NaN";

pub fn html_table(view: &ViewResult) -> String {
    let mut out = String::new();
    // writing into a String cannot fail
    let _ = write_html_table(&mut out, view);
    out
}

fn write_html_table(out: &mut String, view: &ViewResult) -> std::fmt::Result {
    writeln!(out, "<table class=\"{TABLE_CLASSES}\" id=\"{TABLE_ID}\">")?;
    writeln!(out, "  <thead>")?;
    writeln!(out, "    <tr>")?;
    writeln!(out, "      <th></th>")?;
    for name in &view.columns {
        writeln!(out, "      <th>{}</th>", escape_html(name, false))?;
    }
    writeln!(out, "    </tr>")?;
    writeln!(out, "  </thead>")?;
    writeln!(out, "  <tbody>")?;
    for row in &view.rows {
        writeln!(out, "    <tr>")?;
        writeln!(out, "      <th>{}</th>", row.index)?;
        for (_, value) in &row.cells {
            writeln!(out, "      <td>{}</td>", html_cell(value))?;
        }
        writeln!(out, "    </tr>")?;
    }
    writeln!(out, "  </tbody>")?;
    write!(out, "</table>")
}

fn html_cell(value: &CellValue) -> String {
    match value {
        CellValue::Null => NULL_REPR.to_string(),
        CellValue::Str(s) => escape_html(s, true),
        CellValue::Other(s) => escape_html(s, false),
        other => other.to_string(),
    }
}

const MARKERS: [&str; 2] = ["<br>", "&nbsp;"];

/// Entity-escape `&<>"`. With `keep_markers` the line break and tab markers pass through.
fn escape_html(text: &str, keep_markers: bool) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(c) = rest.chars().next() {
        if keep_markers
            && let Some(marker) = MARKERS.iter().find(|m| rest.starts_with(*m))
        {
            out.push_str(marker);
            rest = &rest[marker.len()..];
            continue;
        }
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            c => out.push(c),
        }
        rest = &rest[c.len_utf8()..];
    }
    out
}

pub fn to_json<T: Serialize>(value: &T) -> Result<String, DVError> {
    Ok(serde_json::to_string_pretty(value)?)
}

/// `{success: false, error, available_fields?}`
pub fn search_error_json(error: &SearchError) -> serde_json::Value {
    let mut body = json!({
        "success": false,
        "error": error.to_string(),
    });
    if let Some(fields) = error.available_fields() {
        body["available_fields"] = json!(fields);
    }
    body
}
