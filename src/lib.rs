//! Page through, filter and search tabular datasets.
//!
//! A [`Session`] holds the one dataset currently loaded. Views over it are computed by
//! [`view::project`]: filter, paginate, hide columns and format cells, in that order.
//! Exact-match lookups go through [`search::search`], which returns raw records.

pub mod controller;
pub mod domain;
pub mod filter;
pub mod format;
pub mod inputter;
pub mod loader;
pub mod model;
pub mod render;
pub mod search;
pub mod session;
pub mod table;
pub mod ui;
pub mod view;

pub use domain::{DVError, FilterError, LoadError, SearchError, ViewerConfig};
pub use loader::{DatasetLoader, DatasetSource, FileDatasetLoader};
pub use session::{DatasetView, LoadSummary, SearchRequest, SearchResponse, Session};
pub use table::{CellValue, Column, ColumnKind, Record, Table};
pub use view::{ViewParams, ViewResult};
