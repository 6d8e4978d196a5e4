use std::io::Error;
use std::path::PathBuf;
use std::time::Duration;

use derive_setters::Setters;
use polars::error::PolarsError;
use ratatui::crossterm::event::KeyEvent;
use thiserror::Error;

/// Page sizes a view can be requested with. Anything else falls back to the first entry.
pub const PAGE_SIZES: [usize; 3] = [10, 20, 50];
pub const DEFAULT_PAGE_SIZE: usize = PAGE_SIZES[0];
pub const DEFAULT_SPLIT: &str = "train";

pub const HELP_TEXT: &str = "\
 Navigation
   j / Down        next row            k / Up        previous row
   h / Left        previous column     l / Right     next column
   n / PageDown    next page           p / PageUp    previous page
   g / Home        first page          G / End       last page
   s               cycle page size (10, 20, 50)

 Columns
   x               hide current column
   X               show all columns

 Filter & search
   f               filter current column (substring, numeric equality)
   F               remove filter
   /               exact search in current column

 Dataset
   o               open dataset: path[:subset][@split]
   c               clear loaded dataset
   y               copy selected row as CSV

   ?               this help           Esc           close popup
   q               quit";

/// Failures of the dataset acquisition step. The session is never modified when one of these is returned.
#[derive(Error, Debug)]
pub enum LoadError {
    #[error("no dataset path given")]
    EmptyPath,

    #[error("dataset not found: {0}")]
    NotFound(String),

    #[error("permission denied: {0}")]
    PermissionDenied(String),

    #[error("split '{split}' not found for dataset '{dataset}'")]
    SplitNotFound { dataset: String, split: String },

    #[error("unsupported file type: {}", .0.display())]
    UnknownFileType(PathBuf),

    #[error("loading timed out after {0:?}")]
    TimedOut(Duration),

    #[error("invalid table: {0}")]
    InvalidTable(String),

    #[error("{0}")]
    Failed(String),

    #[error("polars: {0}")]
    Polars(#[from] PolarsError),

    #[error("io: {0}")]
    Io(#[from] Error),
}

/// Raised by the filter engine. Views recover from it by showing the unfiltered table.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FilterError {
    #[error("unknown column '{0}', filter not applied")]
    UnknownColumn(String),
}

#[derive(Error, Debug)]
pub enum SearchError {
    #[error("missing parameter: {0}")]
    MissingParameter(&'static str),

    #[error("field '{field}' not found")]
    UnknownField {
        field: String,
        available_fields: Vec<String>,
    },

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("no dataset loaded")]
    NoDataset,

    #[error("failed to load dataset: {0}")]
    Load(#[from] LoadError),

    #[error("search failed: {0}")]
    Failure(String),
}

impl SearchError {
    pub fn available_fields(&self) -> Option<&[String]> {
        match self {
            SearchError::UnknownField {
                available_fields, ..
            } => Some(available_fields),
            _ => None,
        }
    }
}

#[derive(Error, Debug)]
pub enum DVError {
    #[error("io: {0}")]
    IoError(#[from] Error),

    #[error("polars: {0}")]
    PolarsError(#[from] PolarsError),

    #[error("json: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error(transparent)]
    Load(#[from] LoadError),

    #[error(transparent)]
    Search(#[from] SearchError),

    #[error("no dataset loaded, load a dataset first")]
    NoDataset,
}

/// Settings shared by the command line and the interactive browser.
#[derive(Debug, Clone, Setters)]
pub struct ViewerConfig {
    pub data_root: PathBuf,
    pub load_timeout: Option<Duration>,
    pub event_poll_time: u64,
    pub max_column_width: usize,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            data_root: PathBuf::from("."),
            load_timeout: None,
            event_poll_time: 100,
            max_column_width: 40,
        }
    }
}

/// What the browser asks for on its command line.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CMDMode {
    Filter,
    Search,
    Open,
}

impl CMDMode {
    pub fn prompt(&self) -> &'static str {
        match self {
            CMDMode::Filter => "filter: ",
            CMDMode::Search => "search: ",
            CMDMode::Open => "open: ",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    Quit,
    MoveUp,
    MoveDown,
    MoveLeft,
    MoveRight,
    NextPage,
    PreviousPage,
    FirstPage,
    LastPage,
    CyclePageSize,
    HideColumn,
    ShowAllColumns,
    Filter,
    ClearFilter,
    Search,
    Open,
    ClearDataset,
    CopyRow,
    Help,
    Exit,
    RawKey(KeyEvent),
}
