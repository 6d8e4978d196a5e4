use std::fs::File;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::{Args, Parser, Subcommand, ValueEnum};
use ratatui::DefaultTerminal;
use tracing::{error, info};
use tracing_error::ErrorLayer;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use dsview::controller::Controller;
use dsview::domain::{DEFAULT_PAGE_SIZE, DEFAULT_SPLIT, DVError, ViewerConfig};
use dsview::model::{Browser, Status};
use dsview::render;
use dsview::ui::TableUI;
use dsview::{DatasetSource, FileDatasetLoader, SearchRequest, Session, ViewParams};

#[derive(Parser, Debug)]
#[command(name = "dsview", version, about)]
struct Cli {
    /// Directory dataset paths are resolved against
    #[arg(long, global = true, default_value = ".")]
    root: PathBuf,

    /// Give up loading a dataset after this many seconds
    #[arg(long, global = true)]
    timeout: Option<u64>,

    /// Where the browser writes its log
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Args, Debug, Clone)]
struct DatasetArgs {
    /// A data file, or a directory holding one file per split
    path: String,

    /// Subset (configuration) directory inside the dataset
    #[arg(long)]
    subset: Option<String>,

    #[arg(long, default_value = DEFAULT_SPLIT)]
    split: String,
}

impl DatasetArgs {
    fn source(&self) -> DatasetSource {
        let mut source = DatasetSource::new(self.path.trim()).with_split(&self.split);
        if let Some(subset) = &self.subset {
            source = source.with_subset(subset);
        }
        source
    }
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq)]
enum OutputFormat {
    Html,
    Json,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Browse a dataset interactively
    Browse {
        path: Option<String>,

        #[arg(long)]
        subset: Option<String>,

        #[arg(long, default_value = DEFAULT_SPLIT)]
        split: String,
    },
    /// Print one page of a dataset
    View {
        #[command(flatten)]
        dataset: DatasetArgs,

        #[arg(long, default_value_t = 1, allow_negative_numbers = true)]
        page: i64,

        /// One of 10, 20, 50
        #[arg(long, default_value_t = DEFAULT_PAGE_SIZE)]
        page_size: usize,

        /// Column to leave out, may be repeated
        #[arg(long = "hide")]
        hidden_columns: Vec<String>,

        #[arg(long, default_value = "")]
        filter_column: String,

        #[arg(long, default_value = "")]
        filter_value: String,

        #[arg(long, value_enum, default_value_t = OutputFormat::Html)]
        format: OutputFormat,
    },
    /// Find records whose field equals a value exactly
    Search {
        #[command(flatten)]
        dataset: DatasetArgs,

        #[arg(long)]
        field: String,

        #[arg(long)]
        value: String,
    },
    /// Load a dataset and print its shape
    Info {
        #[command(flatten)]
        dataset: DatasetArgs,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli) {
        Err(e) => {
            error!("{e}");
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
        Ok(code) => code,
    }
}

fn init_logging(log_file: Option<&Path>, default_level: &str) -> Result<(), DVError> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let registry = tracing_subscriber::registry()
        .with(filter)
        .with(ErrorLayer::default());
    match log_file {
        Some(path) => {
            let file = File::create(path)?;
            registry
                .with(fmt::layer().with_writer(Arc::new(file)).with_ansi(false))
                .init();
        }
        None => registry.with(fmt::layer().with_writer(std::io::stderr)).init(),
    }
    Ok(())
}

fn run(cli: Cli) -> Result<ExitCode, DVError> {
    let config = ViewerConfig::default()
        .data_root(cli.root.clone())
        .load_timeout(cli.timeout.map(Duration::from_secs));

    // The browser owns the terminal, so it logs to a file
    if matches!(cli.command, Command::Browse { .. }) {
        let log_file = cli
            .log_file
            .clone()
            .unwrap_or_else(|| std::env::temp_dir().join("dsview.log"));
        init_logging(Some(&log_file), "info")?;
    } else {
        init_logging(cli.log_file.as_deref(), "warn")?;
    }

    let loader = Arc::new(FileDatasetLoader::new(&config.data_root));
    let session = Arc::new(Session::new(loader).with_load_timeout(config.load_timeout));

    match cli.command {
        Command::Browse {
            path,
            subset,
            split,
        } => {
            let source = path.map(|p| {
                let source = DatasetSource::new(p).with_split(split);
                match subset {
                    Some(subset) => source.with_subset(subset),
                    None => source,
                }
            });
            browse(&config, session, source)?;
        }
        Command::View {
            dataset,
            page,
            page_size,
            hidden_columns,
            filter_column,
            filter_value,
            format,
        } => {
            session.load(&dataset.source())?;
            let params = ViewParams::default()
                .page(page)
                .page_size(page_size)
                .hidden_columns(hidden_columns)
                .filter_column(filter_column)
                .filter_value(filter_value);
            let page = session.view(&params)?;
            if let Some(warning) = &page.view.warning {
                eprintln!("Warning: {warning}");
            }
            match format {
                OutputFormat::Html => println!("{}", render::html_table(&page.view)),
                OutputFormat::Json => println!("{}", render::to_json(&page)?),
            }
        }
        Command::Search {
            dataset,
            field,
            value,
        } => {
            let request = SearchRequest {
                field,
                value,
                dataset: Some(dataset.source()),
            };
            match session.search(&request) {
                Ok(response) => println!("{}", render::to_json(&response)?),
                Err(e) => {
                    error!("Search failed: {e}");
                    println!("{}", render::to_json(&render::search_error_json(&e))?);
                    return Ok(ExitCode::FAILURE);
                }
            }
        }
        Command::Info { dataset } => {
            let summary = session.load(&dataset.source())?;
            println!("{}", render::to_json(&summary)?);
        }
    }
    Ok(ExitCode::SUCCESS)
}

fn browse(
    config: &ViewerConfig,
    session: Arc<Session>,
    source: Option<DatasetSource>,
) -> Result<(), DVError> {
    info!("Starting dsview browser");
    let mut browser = Browser::new(session, config);
    if let Some(source) = source {
        browser.open(&source);
    }

    let mut terminal = ratatui::init();
    let result = run_browser(&mut terminal, &mut browser, config);
    ratatui::restore();
    result
}

fn run_browser(
    terminal: &mut DefaultTerminal,
    browser: &mut Browser,
    config: &ViewerConfig,
) -> Result<(), DVError> {
    let mut ui = TableUI::new();
    let controller = Controller::new(config);

    while browser.status != Status::QUITTING {
        // Render the current view
        terminal.draw(|f| ui.draw(browser, f))?;

        // Handle events and map to a Message
        if let Some(message) = controller.handle_event(browser)? {
            browser.update(Some(message))?;
        };
    }
    Ok(())
}
