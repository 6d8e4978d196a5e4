use std::fmt;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Instant;

use polars::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

use crate::domain::{DEFAULT_SPLIT, LoadError};
use crate::table::Table;

#[derive(Debug)]
enum FileType {
    CSV,
    PARQUET,
    ARROW,
}

/// Split files are looked up with these extensions, in this order.
const SPLIT_EXTENSIONS: [&str; 6] = ["parquet", "pq", "csv", "arrow", "ipc", "feather"];

/// Names a dataset the way a hub does: a path, an optional subset and a split.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetSource {
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subset: Option<String>,
    #[serde(default = "default_split")]
    pub split: String,
}

fn default_split() -> String {
    DEFAULT_SPLIT.to_string()
}

impl DatasetSource {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            subset: None,
            split: default_split(),
        }
    }

    pub fn with_subset(mut self, subset: impl Into<String>) -> Self {
        let subset = subset.into();
        self.subset = (!subset.trim().is_empty()).then(|| subset.trim().to_string());
        self
    }

    pub fn with_split(mut self, split: impl Into<String>) -> Self {
        let split = split.into();
        if !split.trim().is_empty() {
            self.split = split.trim().to_string();
        }
        self
    }

    /// Parse `path[:subset][@split]` as typed into the browser prompt.
    pub fn parse(spec: &str) -> Self {
        let (rest, split) = match spec.rsplit_once('@') {
            Some((rest, split)) => (rest, Some(split)),
            None => (spec, None),
        };
        let (path, subset) = match rest.split_once(':') {
            Some((path, subset)) => (path, Some(subset)),
            None => (rest, None),
        };
        let mut source = DatasetSource::new(path.trim());
        if let Some(subset) = subset {
            source = source.with_subset(subset);
        }
        if let Some(split) = split {
            source = source.with_split(split);
        }
        source
    }

    /// `path[/subset] (split)`
    pub fn display_name(&self) -> String {
        match &self.subset {
            Some(subset) => format!("{}/{} ({})", self.path, subset, self.split),
            None => format!("{} ({})", self.path, self.split),
        }
    }
}

impl fmt::Display for DatasetSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.display_name())
    }
}

/// Turns a dataset source into a table, or fails without side effects.
pub trait DatasetLoader: Send + Sync {
    fn load(&self, source: &DatasetSource) -> Result<Table, LoadError>;
}

/// Reads datasets from a directory tree: either a single data file, or
/// `<root>/<path>[/<subset>]/<split>.<ext>`.
#[derive(Debug, Clone)]
pub struct FileDatasetLoader {
    root: PathBuf,
}

impl FileDatasetLoader {
    pub fn new(root: impl AsRef<Path>) -> Self {
        let root = root.as_ref().to_string_lossy();
        let expanded = shellexpand::full(&root)
            .map(|s| s.into_owned())
            .unwrap_or_else(|_| root.into_owned());
        Self {
            root: PathBuf::from(expanded),
        }
    }

    fn expand(path: &str) -> PathBuf {
        PathBuf::from(
            shellexpand::full(path)
                .map(|s| s.into_owned())
                .unwrap_or_else(|_| path.to_string()),
        )
    }

    /// Find the file backing `source`.
    pub fn resolve(&self, source: &DatasetSource) -> Result<PathBuf, LoadError> {
        let path = source.path.trim();
        if path.is_empty() {
            return Err(LoadError::EmptyPath);
        }
        let base = self.root.join(Self::expand(path));
        let metadata = fs::metadata(&base).map_err(|e| Self::io_error(e, &base))?;
        if metadata.is_file() {
            return Ok(base);
        }

        let mut dir = base;
        if let Some(subset) = &source.subset {
            dir.push(subset);
            if !dir.is_dir() {
                return Err(LoadError::NotFound(dir.display().to_string()));
            }
        }
        SPLIT_EXTENSIONS
            .iter()
            .map(|ext| dir.join(format!("{}.{}", source.split, ext)))
            .find(|candidate| candidate.is_file())
            .ok_or_else(|| LoadError::SplitNotFound {
                dataset: source.path.clone(),
                split: source.split.clone(),
            })
    }

    fn io_error(e: std::io::Error, path: &Path) -> LoadError {
        match e.kind() {
            ErrorKind::NotFound => LoadError::NotFound(path.display().to_string()),
            ErrorKind::PermissionDenied => LoadError::PermissionDenied(path.display().to_string()),
            _ => LoadError::Io(e),
        }
    }

    fn detect_file_type(path: &Path) -> Result<FileType, LoadError> {
        match path
            .extension()
            .and_then(|s| s.to_str())
            .map(|s| s.to_uppercase())
            .as_deref()
        {
            Some("CSV") => Ok(FileType::CSV),
            Some("PARQUET") | Some("PQ") => Ok(FileType::PARQUET),
            Some("ARROW") | Some("IPC") | Some("FEATHER") => Ok(FileType::ARROW),
            _ => Err(LoadError::UnknownFileType(path.to_path_buf())),
        }
    }

    fn load_csv(path: &Path) -> Result<LazyFrame, PolarsError> {
        LazyCsvReader::new(PlPath::Local(path.into()))
            .with_has_header(true)
            .finish()
    }

    fn load_parquet(path: &Path) -> Result<LazyFrame, PolarsError> {
        LazyFrame::scan_parquet(PlPath::Local(path.into()), ScanArgsParquet::default())
    }

    fn load_arrow(path: &Path) -> Result<LazyFrame, PolarsError> {
        LazyFrame::scan_ipc(
            PlPath::Local(path.into()),
            polars::io::ipc::IpcScanOptions,
            UnifiedScanArgs::default(),
        )
    }
}

impl DatasetLoader for FileDatasetLoader {
    #[instrument(skip_all, fields(dataset = %source))]
    fn load(&self, source: &DatasetSource) -> Result<Table, LoadError> {
        let path = self.resolve(source)?;
        let file_type = Self::detect_file_type(&path)?;
        debug!("Reading {} as {:?}", path.display(), file_type);

        let start_time = Instant::now();
        let frame = match file_type {
            FileType::CSV => Self::load_csv(&path)?,
            FileType::PARQUET => Self::load_parquet(&path)?,
            FileType::ARROW => Self::load_arrow(&path)?,
        };
        let df = frame.collect()?;
        let table = Table::from_dataframe(&df)?;

        let data_loading_duration = start_time.elapsed().as_millis();
        info!(
            "Loaded {} rows x {} columns in {data_loading_duration}ms",
            table.row_count(),
            table.column_count()
        );
        Ok(table)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write(path: &Path, content: &str) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        let mut f = fs::File::create(path).unwrap();
        f.write_all(content.as_bytes()).unwrap();
    }

    #[test]
    fn parses_prompt_spec() {
        assert_eq!(DatasetSource::parse("imdb"), DatasetSource::new("imdb"));
        let source = DatasetSource::parse("glue:cola@validation");
        assert_eq!(source.path, "glue");
        assert_eq!(source.subset.as_deref(), Some("cola"));
        assert_eq!(source.split, "validation");
        assert_eq!(DatasetSource::parse("glue:@test").subset, None);
    }

    #[test]
    fn display_name() {
        assert_eq!(DatasetSource::new("imdb").display_name(), "imdb (train)");
        let source = DatasetSource::new("glue").with_subset("cola").with_split("test");
        assert_eq!(source.display_name(), "glue/cola (test)");
    }

    #[test]
    fn resolves_split_layout() {
        let dir = tempfile::tempdir().unwrap();
        write(&dir.path().join("glue/cola/train.csv"), "a\n1\n");
        let loader = FileDatasetLoader::new(dir.path());

        let source = DatasetSource::new("glue").with_subset("cola");
        assert_eq!(
            loader.resolve(&source).unwrap(),
            dir.path().join("glue/cola/train.csv")
        );

        let missing = source.clone().with_split("test");
        assert!(matches!(
            loader.resolve(&missing),
            Err(LoadError::SplitNotFound { .. })
        ));
        let wrong_subset = DatasetSource::new("glue").with_subset("sst2");
        assert!(matches!(loader.resolve(&wrong_subset), Err(LoadError::NotFound(_))));
        assert!(matches!(
            loader.resolve(&DatasetSource::new("nope")),
            Err(LoadError::NotFound(_))
        ));
        assert!(matches!(
            loader.resolve(&DatasetSource::new("  ")),
            Err(LoadError::EmptyPath)
        ));
    }

    #[test]
    fn loads_csv_file() {
        let dir = tempfile::tempdir().unwrap();
        write(
            &dir.path().join("reviews.csv"),
            "id,score,label\n1,3.5,pos\n2,1.0,neg\n3,,pos\n",
        );
        let loader = FileDatasetLoader::new(dir.path());
        let table = loader.load(&DatasetSource::new("reviews.csv")).unwrap();
        assert_eq!(table.row_count(), 3);
        assert_eq!(table.columns(), vec!["id", "score", "label"]);
        assert_eq!(table.column_kind("score"), Some(crate::table::ColumnKind::Numeric));
        assert_eq!(table.column_kind("label"), Some(crate::table::ColumnKind::Text));
    }

    #[test]
    fn unknown_extension() {
        let dir = tempfile::tempdir().unwrap();
        write(&dir.path().join("notes.txt"), "hello");
        let loader = FileDatasetLoader::new(dir.path());
        assert!(matches!(
            loader.load(&DatasetSource::new("notes.txt")),
            Err(LoadError::UnknownFileType(_))
        ));
    }
}
