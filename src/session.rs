use std::sync::mpsc;
use std::sync::{Arc, PoisonError, RwLock};
use std::thread;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};
use tracing_error::SpanTrace;

use crate::domain::{DVError, LoadError, SearchError};
use crate::loader::{DatasetLoader, DatasetSource};
use crate::search;
use crate::table::{Record, Table};
use crate::view::{self, ViewParams, ViewResult};

/// A table together with the name it is displayed under.
pub struct LoadedDataset {
    pub name: String,
    pub table: Table,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LoadSummary {
    pub dataset_name: String,
    pub row_count: usize,
    pub column_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DatasetView {
    pub dataset_name: String,
    #[serde(flatten)]
    pub view: ViewResult,
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub struct SearchRequest {
    pub field: String,
    pub value: String,
    /// Searched instead of the session dataset when given. The session is left alone.
    #[serde(default)]
    pub dataset: Option<DatasetSource>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchResponse {
    pub success: bool,
    pub dataset: String,
    pub field: String,
    pub value: String,
    pub count: usize,
    pub results: Vec<Record>,
}

/// Holds at most one loaded dataset, shared by every request.
///
/// Readers take a snapshot of the current dataset and work on it without holding the
/// lock, so a load or clear never tears a view that is being computed.
pub struct Session {
    loader: Arc<dyn DatasetLoader>,
    current: RwLock<Option<Arc<LoadedDataset>>>,
    load_timeout: Option<Duration>,
}

impl Session {
    pub fn new(loader: Arc<dyn DatasetLoader>) -> Self {
        Self {
            loader,
            current: RwLock::new(None),
            load_timeout: None,
        }
    }

    pub fn with_load_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.load_timeout = timeout;
        self
    }

    pub fn current(&self) -> Option<Arc<LoadedDataset>> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn dataset_name(&self) -> Option<String> {
        self.current().map(|d| d.name.clone())
    }

    pub fn is_loaded(&self) -> bool {
        self.current().is_some()
    }

    /// Load `source` and make it the current dataset. On failure the previous dataset stays.
    pub fn load(&self, source: &DatasetSource) -> Result<LoadSummary, LoadError> {
        self.load_with_timeout(source, self.load_timeout)
    }

    /// Like [`Session::load`], with a timeout for this call only. `None` waits for the loader.
    #[instrument(skip_all, fields(dataset = %source, timeout = ?timeout))]
    pub fn load_with_timeout(
        &self,
        source: &DatasetSource,
        timeout: Option<Duration>,
    ) -> Result<LoadSummary, LoadError> {
        let table = self.fetch(source, timeout).inspect_err(|e| {
            warn!("Keeping previous dataset, load failed: {e}");
            debug!("{}", SpanTrace::capture());
        })?;
        let dataset = Arc::new(LoadedDataset {
            name: source.display_name(),
            table,
        });
        let summary = LoadSummary {
            dataset_name: dataset.name.clone(),
            row_count: dataset.table.row_count(),
            column_count: dataset.table.column_count(),
        };
        *self.current.write().unwrap_or_else(PoisonError::into_inner) = Some(dataset);
        info!(
            "Loaded {}: {} rows, {} columns",
            summary.dataset_name, summary.row_count, summary.column_count
        );
        Ok(summary)
    }

    pub fn clear(&self) {
        *self.current.write().unwrap_or_else(PoisonError::into_inner) = None;
        info!("Dataset cleared");
    }

    pub fn view(&self, params: &ViewParams) -> Result<DatasetView, DVError> {
        self.view_with_snapshot(params).map(|(_, view)| view)
    }

    /// The view together with the dataset snapshot it was computed from.
    #[instrument(skip_all, fields(page = params.page, page_size = params.page_size))]
    pub fn view_with_snapshot(
        &self,
        params: &ViewParams,
    ) -> Result<(Arc<LoadedDataset>, DatasetView), DVError> {
        let dataset = self.current().ok_or(DVError::NoDataset)?;
        let view = DatasetView {
            dataset_name: dataset.name.clone(),
            view: view::project(&dataset.table, params),
        };
        Ok((dataset, view))
    }

    #[instrument(skip_all, fields(field = %request.field, value = %request.value))]
    pub fn search(&self, request: &SearchRequest) -> Result<SearchResponse, SearchError> {
        let dataset = match &request.dataset {
            Some(source) => {
                if source.path.trim().is_empty() {
                    return Err(SearchError::InvalidRequest(
                        "dataset path must not be empty".to_string(),
                    ));
                }
                Arc::new(LoadedDataset {
                    name: source.display_name(),
                    table: self.fetch(source, self.load_timeout)?,
                })
            }
            None => self.current().ok_or(SearchError::NoDataset)?,
        };

        let results = search::search(&dataset.table, &request.field, &request.value)?;
        Ok(SearchResponse {
            success: true,
            dataset: dataset.name.clone(),
            field: request.field.clone(),
            value: request.value.clone(),
            count: results.len(),
            results,
        })
    }

    /// Run the loader, on a worker thread when a timeout is given.
    ///
    /// Loaders cannot be interrupted. A worker that misses the deadline keeps running
    /// until its loader returns, and its table is then dropped unseen.
    fn fetch(&self, source: &DatasetSource, timeout: Option<Duration>) -> Result<Table, LoadError> {
        let Some(timeout) = timeout else {
            return self.loader.load(source);
        };

        let (tx, rx) = mpsc::channel();
        let loader = Arc::clone(&self.loader);
        let worker_source = source.clone();
        thread::spawn(move || {
            // the receiver is gone if we timed out; nothing left to report to
            let _ = tx.send(loader.load(&worker_source));
        });

        match rx.recv_timeout(timeout) {
            Ok(result) => result,
            Err(mpsc::RecvTimeoutError::Timeout) => {
                warn!("Loading {source} timed out after {timeout:?}");
                Err(LoadError::TimedOut(timeout))
            }
            Err(mpsc::RecvTimeoutError::Disconnected) => {
                Err(LoadError::Failed("loader stopped without a result".to_string()))
            }
        }
    }
}
