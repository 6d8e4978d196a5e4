//! Display formatting of cell contents.
//!
//! Escape sequences (`\n`, `\t`, both as literal backslash sequences and as the actual
//! control characters) are rewritten into markers of the chosen [`Markup`]. The
//! rewrite happens in a single left-to-right pass over the raw text so a marker
//! produced by one rule is never touched by another. Formatting is display only:
//! filtering and search always see the raw cell.

use serde::Serialize;

use crate::table::CellValue;

pub type DisplayValue = CellValue;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Markup {
    /// `<br>` and non-breaking spaces. Other characters are left alone.
    #[default]
    Html,
    /// Plain text for the terminal browser.
    Terminal,
}

impl Markup {
    fn line_break(&self) -> &'static str {
        match self {
            Markup::Html => "<br>",
            Markup::Terminal => " ↵ ",
        }
    }

    fn tab(&self) -> &'static str {
        match self {
            Markup::Html => "&nbsp;&nbsp;&nbsp;&nbsp;",
            Markup::Terminal => "    ",
        }
    }
}

pub fn format_cell(value: &CellValue, markup: Markup) -> DisplayValue {
    match value {
        CellValue::Str(s) => CellValue::Str(format_text(s, markup)),
        other => other.clone(),
    }
}

pub fn format_text(raw: &str, markup: Markup) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '\\' if chars.peek() == Some(&'n') => {
                chars.next();
                out.push_str(markup.line_break());
            }
            '\\' if chars.peek() == Some(&'t') => {
                chars.next();
                out.push_str(markup.tab());
            }
            '\n' => out.push_str(markup.line_break()),
            '\t' => out.push_str(markup.tab()),
            c => out.push(c),
        }
    }
    out
}
