use arboard::Clipboard;
use ratatui::crossterm::event::KeyEvent;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, trace, warn};

use crate::domain::{CMDMode, DVError, HELP_TEXT, Message, PAGE_SIZES, ViewerConfig};
use crate::format::Markup;
use crate::inputter::{InputResult, Inputter};
use crate::loader::DatasetSource;
use crate::session::{DatasetView, LoadedDataset, SearchRequest, Session};
use crate::view::ViewParams;

#[derive(Debug, PartialEq)]
pub enum Status {
    READY,
    QUITTING,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Modus {
    TABLE,
    POPUP,
    CMDINPUT,
}

#[derive(Clone, Debug, Default)]
pub struct Popup {
    pub title: String,
    pub message: String,
}

/// Everything the UI needs to draw one frame.
#[derive(Clone, Debug)]
pub struct UIData {
    pub name: String,
    pub columns: Vec<String>,
    pub index: Vec<String>,
    pub rows: Vec<Vec<String>>,
    pub selected_row: usize,
    pub selected_column: usize,
    pub summary: String,
    pub popup: Option<Popup>,
    pub cmd_mode: Option<CMDMode>,
    pub cmdinput: InputResult,
    pub status_message: String,
    pub max_column_width: usize,
}

impl UIData {
    pub fn empty() -> Self {
        UIData {
            name: String::new(),
            columns: Vec::new(),
            index: Vec::new(),
            rows: Vec::new(),
            selected_row: 0,
            selected_column: 0,
            summary: String::new(),
            popup: None,
            cmd_mode: None,
            cmdinput: InputResult::default(),
            status_message: String::new(),
            max_column_width: 0,
        }
    }

    pub fn has_table(&self) -> bool {
        !self.name.is_empty()
    }
}

/// State of the interactive browser. All data access goes through the shared [`Session`].
pub struct Browser {
    session: Arc<Session>,
    config: ViewerConfig,
    pub status: Status,
    modus: Modus,
    previous_modus: Modus,
    params: ViewParams,
    page: Option<DatasetView>,
    /// The snapshot `page` was computed from.
    dataset: Option<Arc<LoadedDataset>>,
    cursor_row: usize,
    cursor_column: usize,
    popup: Option<Popup>,
    input: Inputter,
    cmd_mode: Option<CMDMode>,
    last_input: InputResult,
    status_message: String,
    clipboard: Option<Clipboard>,
    uidata: UIData,
}

impl Browser {
    pub fn new(session: Arc<Session>, config: &ViewerConfig) -> Self {
        let mut browser = Self {
            session,
            config: config.clone(),
            status: Status::READY,
            modus: Modus::TABLE,
            previous_modus: Modus::TABLE,
            params: ViewParams::default().markup(Markup::Terminal),
            page: None,
            dataset: None,
            cursor_row: 0,
            cursor_column: 0,
            popup: None,
            input: Inputter::default(),
            cmd_mode: None,
            last_input: InputResult::default(),
            status_message: "Press ? for help".to_string(),
            clipboard: None,
            uidata: UIData::empty(),
        };
        browser.refresh();
        browser
    }

    pub fn get_uidata(&self) -> &UIData {
        &self.uidata
    }

    pub fn params(&self) -> &ViewParams {
        &self.params
    }

    pub fn page(&self) -> Option<&DatasetView> {
        self.page.as_ref()
    }

    pub fn status_message(&self) -> &str {
        &self.status_message
    }

    pub fn raw_keyevents(&self) -> bool {
        self.modus == Modus::CMDINPUT
    }

    pub fn quit(&mut self) {
        self.status = Status::QUITTING;
    }

    pub fn update(&mut self, message: Option<Message>) -> Result<(), DVError> {
        if let Some(msg) = message {
            trace!("Update: Modus {:?}, Message {:?}", self.modus, msg);
            match self.modus {
                Modus::TABLE => match msg {
                    Message::Quit => self.quit(),
                    Message::MoveDown => self.move_down(),
                    Message::MoveUp => self.move_up(),
                    Message::MoveLeft => self.move_column(-1),
                    Message::MoveRight => self.move_column(1),
                    Message::NextPage => self.goto_page(self.current_page() + 1),
                    Message::PreviousPage => self.goto_page(self.current_page() - 1),
                    Message::FirstPage => self.goto_page(1),
                    Message::LastPage => self.goto_page(self.total_pages()),
                    Message::CyclePageSize => self.cycle_page_size(),
                    Message::HideColumn => self.hide_current_column(),
                    Message::ShowAllColumns => self.show_all_columns(),
                    Message::Filter => self.enter_cmd_mode(CMDMode::Filter),
                    Message::ClearFilter => self.set_filter(""),
                    Message::Search => self.enter_cmd_mode(CMDMode::Search),
                    Message::Open => self.enter_cmd_mode(CMDMode::Open),
                    Message::ClearDataset => self.clear_dataset(),
                    Message::CopyRow => self.copy_row(),
                    Message::Help => self.show_popup("Help", HELP_TEXT),
                    _ => (),
                },
                Modus::POPUP => match msg {
                    Message::Quit => self.quit(),
                    Message::Exit | Message::Help => self.exit_popup(),
                    _ => (),
                },
                Modus::CMDINPUT => {
                    if let Message::RawKey(key) = msg {
                        self.raw_input(key)
                    }
                }
            }
        }
        self.update_uidata();
        Ok(())
    }

    /// Load a dataset into the session and show its first page.
    pub fn open(&mut self, source: &DatasetSource) {
        match self.session.load(source) {
            Ok(summary) => {
                self.params = ViewParams::default()
                    .markup(Markup::Terminal)
                    .page_size(self.params.page_size);
                self.cursor_row = 0;
                self.cursor_column = 0;
                self.refresh();
                self.set_status_message(format!(
                    "Loaded {}: {} rows, {} columns",
                    summary.dataset_name, summary.row_count, summary.column_count
                ));
            }
            Err(e) => {
                error!("Loading {source} failed: {e}");
                self.set_status_message(format!("Error loading dataset: {e}"));
            }
        }
    }

    /// Recompute the current page from the session.
    fn refresh(&mut self) {
        let start_time = Instant::now();
        (self.dataset, self.page) = match self.session.view_with_snapshot(&self.params) {
            Ok((dataset, page)) => (Some(dataset), Some(page)),
            Err(DVError::NoDataset) => (None, None),
            Err(e) => {
                error!("View failed: {e}");
                (None, None)
            }
        };
        if let Some(page) = &self.page {
            // keep the clamped page so relative navigation starts from what is shown
            self.params.page = page.view.page as i64;
            self.cursor_row = self.cursor_row.min(page.view.rows.len().saturating_sub(1));
            self.cursor_column = self
                .cursor_column
                .min(page.view.columns.len().saturating_sub(1));
            if let Some(warning) = page.view.warning.clone() {
                self.set_status_message(warning);
            }
        } else {
            self.cursor_row = 0;
            self.cursor_column = 0;
        }
        trace!("Refreshed view in {}ms", start_time.elapsed().as_millis());
        self.update_uidata();
    }

    fn update_uidata(&mut self) {
        let cmdinput = self.last_input.clone();
        let Some(page) = &self.page else {
            self.uidata = UIData {
                popup: self.popup.clone(),
                cmd_mode: self.cmd_mode,
                cmdinput,
                status_message: self.status_message.clone(),
                ..UIData::empty()
            };
            return;
        };
        let view = &page.view;

        let mut summary = format!(
            "rows {}-{} of {}",
            view.start_row, view.end_row, view.total_rows
        );
        if view.total_rows != view.original_total_rows {
            summary.push_str(&format!(" (filtered from {})", view.original_total_rows));
        }
        summary.push_str(&format!(
            " | page {}/{} | {} per page",
            view.page, view.total_pages, view.page_size
        ));
        if self.params.has_filter() {
            summary.push_str(&format!(
                " | filter {} ~ \"{}\"",
                self.params.filter_column, self.params.filter_value
            ));
        }
        if !self.params.hidden_columns.is_empty() {
            summary.push_str(&format!(" | {} hidden", self.params.hidden_columns.len()));
        }

        self.uidata = UIData {
            name: page.dataset_name.clone(),
            columns: view.columns.clone(),
            index: view.rows.iter().map(|r| (r.index + 1).to_string()).collect(),
            rows: view
                .rows
                .iter()
                .map(|r| r.cells.iter().map(|(_, v)| v.to_string()).collect())
                .collect(),
            selected_row: self.cursor_row,
            selected_column: self.cursor_column,
            summary,
            popup: self.popup.clone(),
            cmd_mode: self.cmd_mode,
            cmdinput,
            status_message: self.status_message.clone(),
            max_column_width: self.config.max_column_width,
        };
    }

    fn set_status_message(&mut self, message: impl Into<String>) {
        self.status_message = message.into();
        self.uidata.status_message = self.status_message.clone();
    }

    fn current_page(&self) -> i64 {
        self.page.as_ref().map(|p| p.view.page as i64).unwrap_or(1)
    }

    fn total_pages(&self) -> i64 {
        self.page.as_ref().map(|p| p.view.total_pages as i64).unwrap_or(1)
    }

    fn current_column_name(&self) -> Option<String> {
        self.page
            .as_ref()
            .and_then(|p| p.view.columns.get(self.cursor_column).cloned())
    }

    // -------------------- Control handling functions ---------------------- //

    fn goto_page(&mut self, page: i64) {
        if self.page.is_none() {
            return;
        }
        let page = page.clamp(1, self.total_pages());
        if page != self.current_page() {
            self.params.page = page;
            self.cursor_row = 0;
            self.refresh();
        }
    }

    fn move_down(&mut self) {
        let Some(page) = &self.page else { return };
        if self.cursor_row + 1 < page.view.rows.len() {
            self.cursor_row += 1;
        } else if page.view.page < page.view.total_pages {
            self.goto_page(self.current_page() + 1);
        }
    }

    fn move_up(&mut self) {
        if self.cursor_row > 0 {
            self.cursor_row -= 1;
        } else if self.current_page() > 1 {
            let previous = self.current_page() - 1;
            self.goto_page(previous);
            if let Some(page) = &self.page {
                self.cursor_row = page.view.rows.len().saturating_sub(1);
            }
        }
    }

    fn move_column(&mut self, step: i64) {
        let Some(page) = &self.page else { return };
        let ncolumns = page.view.columns.len();
        if ncolumns == 0 {
            return;
        }
        self.cursor_column = (self.cursor_column as i64 + step).clamp(0, ncolumns as i64 - 1) as usize;
    }

    fn cycle_page_size(&mut self) {
        let Some(page) = &self.page else { return };
        let first_row = page.view.start_row.max(1);
        let idx = PAGE_SIZES
            .iter()
            .position(|&s| s == page.view.page_size)
            .unwrap_or(0);
        let page_size = PAGE_SIZES[(idx + 1) % PAGE_SIZES.len()];
        // stay on the page that contains the first row currently shown
        self.params.page_size = page_size;
        self.params.page = ((first_row - 1) / page_size + 1) as i64;
        self.cursor_row = 0;
        self.refresh();
        self.set_status_message(format!("{page_size} rows per page"));
    }

    fn hide_current_column(&mut self) {
        let Some(page) = &self.page else { return };
        if page.view.columns.len() <= 1 {
            self.set_status_message("Cannot hide the last visible column");
            return;
        }
        if let Some(name) = self.current_column_name() {
            self.params.hidden_columns.push(name.clone());
            self.refresh();
            self.set_status_message(format!("Hid column \"{name}\", X shows all"));
        }
    }

    fn show_all_columns(&mut self) {
        self.params.hidden_columns.clear();
        self.refresh();
    }

    fn set_filter(&mut self, value: &str) {
        if self.page.is_none() {
            return;
        }
        if value.is_empty() {
            self.params.filter_column.clear();
            self.params.filter_value.clear();
            self.set_status_message("Filter removed");
        } else if let Some(column) = self.current_column_name() {
            self.params.filter_column = column;
            self.params.filter_value = value.to_string();
        }
        self.params.page = 1;
        self.cursor_row = 0;
        self.refresh();
        if let Some(page) = &self.page
            && self.params.has_filter()
            && page.view.warning.is_none()
        {
            let matches = page.view.total_rows;
            self.set_status_message(format!("Filter matched {matches} rows"));
        }
    }

    fn search(&mut self, value: &str) {
        let Some(field) = self.current_column_name() else {
            return;
        };
        let request = SearchRequest {
            field: field.clone(),
            value: value.to_string(),
            dataset: None,
        };
        let start_time = Instant::now();
        match self.session.search(&request) {
            Ok(response) => {
                trace!(
                    "Search found {} rows in {}ms",
                    response.count,
                    start_time.elapsed().as_millis()
                );
                let mut message = format!("{} rows where {} == \"{}\"\n\n", response.count, field, value);
                for record in response.results.iter() {
                    let json = serde_json::to_string(record).unwrap_or_default();
                    message.push_str(&format!("{:>6}  {}\n", record.index + 1, json));
                }
                self.show_popup("Search", &message);
                self.set_status_message(format!("Found {} results", response.count));
            }
            Err(e) => {
                warn!("Search failed: {e}");
                self.set_status_message(format!("Search failed: {e}"));
            }
        }
    }

    fn clear_dataset(&mut self) {
        self.session.clear();
        self.params = ViewParams::default()
            .markup(Markup::Terminal)
            .page_size(self.params.page_size);
        self.refresh();
        self.set_status_message("Dataset cleared");
    }

    fn wrap_cell_content(c: &str) -> String {
        let needs_escaping = c.chars().any(|c| c == '"');
        let needs_wrapping = c
            .chars()
            .any(|c| c == ' ' || c == '\t' || c == ',' || c == '\n');
        let mut out = String::from(c);

        if needs_escaping {
            out = out.replace('"', "\"\"");
        }
        if needs_wrapping || needs_escaping {
            out = format!("\"{out}\"");
        }
        out
    }

    /// The selected row as a CSV line of raw values.
    pub fn selected_row_csv(&self) -> Option<String> {
        let page = self.page.as_ref()?;
        let row = page.view.rows.get(self.cursor_row)?;
        let record = self.dataset.as_ref()?.table.record(row.index)?;
        Some(
            record
                .values
                .iter()
                .map(|(_, v)| {
                    v.to_canonical_string()
                        .map(|s| Self::wrap_cell_content(&s))
                        .unwrap_or_default()
                })
                .collect::<Vec<String>>()
                .join(","),
        )
    }

    fn copy_row(&mut self) {
        let Some(row_content) = self.selected_row_csv() else {
            return;
        };
        if self.clipboard.is_none() {
            match Clipboard::new() {
                Ok(clipboard) => self.clipboard = Some(clipboard),
                Err(e) => {
                    warn!("No clipboard available: {e:?}");
                    self.set_status_message("No clipboard available");
                    return;
                }
            }
        }
        if let Some(clipboard) = self.clipboard.as_mut() {
            match clipboard.set_text(row_content) {
                Ok(_) => self.set_status_message("Copied row to clipboard"),
                Err(e) => {
                    trace!("Error copying to clipboard: {:?}", e);
                    self.set_status_message("Copying to clipboard failed");
                }
            }
        }
    }

    fn show_popup(&mut self, title: &str, message: &str) {
        if self.modus != Modus::POPUP {
            self.previous_modus = self.modus;
        }
        self.modus = Modus::POPUP;
        self.popup = Some(Popup {
            title: title.to_string(),
            message: message.to_string(),
        });
    }

    fn exit_popup(&mut self) {
        trace!("Close popup ...");
        self.modus = self.previous_modus;
        self.previous_modus = Modus::POPUP;
        self.popup = None;
    }

    fn enter_cmd_mode(&mut self, mode: CMDMode) {
        if mode != CMDMode::Open && self.page.is_none() {
            self.set_status_message("No dataset loaded, press o to open one");
            return;
        }
        trace!("Entering command mode {mode:?} ...");
        self.previous_modus = self.modus;
        self.modus = Modus::CMDINPUT;
        self.cmd_mode = Some(mode);
        self.input.clear();
        if mode == CMDMode::Filter
            && self.current_column_name().as_deref() == Some(self.params.filter_column.as_str())
        {
            let value = self.params.filter_value.clone();
            self.input.set(&value);
        }
        self.last_input = self.input.get();
    }

    fn raw_input(&mut self, key: KeyEvent) {
        self.last_input = self.input.read(key);
        if self.last_input.finished {
            self.handle_cmd_input();
        }
    }

    fn handle_cmd_input(&mut self) {
        trace!("Handle cmd input {}", self.last_input.input);
        self.modus = self.previous_modus;
        self.previous_modus = Modus::CMDINPUT;

        let cmd_input = self.last_input.input.clone();
        let mode = self.cmd_mode.take();
        self.last_input = InputResult::default();
        if self.input.get().canceled {
            return;
        }
        match mode {
            Some(CMDMode::Filter) => self.set_filter(&cmd_input),
            Some(CMDMode::Search) => self.search(&cmd_input),
            Some(CMDMode::Open) => {
                let source = DatasetSource::parse(&cmd_input);
                info!("Opening {source}");
                self.open(&source);
            }
            None => info!("Cmd mode is none!"),
        }
    }
}
