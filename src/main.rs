use std::fs::File;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::rc::Rc;
use std::sync::Mutex;

use clap::Parser;
use serde_json::Value;
use tracing::{error, info};
use tracing_error::ErrorLayer;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use colctl::controller::Controller;
use colctl::domain::{CCError, TableConfig};
use colctl::loader;
use colctl::model::{Layout, Model, Status};
use colctl::ui::TableUI;
use colctl::{ContentRegistry, Grid, GridOptions};

#[derive(Parser, Debug)]
#[command(name = "colctl")]
#[command(about = "Browse a table with per-column search controls", long_about = None)]
struct Args {
    /// CSV, Parquet or Arrow file to show
    data: String,

    /// JSON file declaring the column controls
    #[arg(short, long)]
    layout: Option<String>,

    /// State file, restored on start and written on quit
    #[arg(short, long)]
    state: Option<String>,

    /// Leave filtering to a server and only build request documents
    #[arg(long)]
    server_side: bool,

    /// Event poll interval in milliseconds
    #[arg(long, default_value_t = 100)]
    poll_ms: u64,

    /// Log file
    #[arg(long, default_value = "colctl.log")]
    log: String,
}

fn main() -> ExitCode {
    let args = Args::parse();
    match run(args) {
        Err(e) => {
            ratatui::restore();
            error!("Exiting with {e}");
            eprintln!("Error: {:?}", e);
            ExitCode::FAILURE
        }
        Ok(_) => {
            ratatui::restore();
            ExitCode::SUCCESS
        }
    }
}

fn expand(path: &str) -> Result<PathBuf, CCError> {
    shellexpand::full(path)
        .map(|p| PathBuf::from(p.into_owned()))
        .map_err(|e| CCError::LoadingFailed(e.to_string()))
}

fn init_tracing(path: &Path) -> Result<(), CCError> {
    let file = File::create(path)?;
    let fmt_layer = fmt::layer()
        .with_writer(Mutex::new(file))
        .with_target(true)
        .with_ansi(false);
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .with(ErrorLayer::default())
        .init();
    Ok(())
}

fn load_state(path: &Path) -> Result<Option<Value>, CCError> {
    if !path.exists() {
        return Ok(None);
    }
    let text = std::fs::read_to_string(path)?;
    info!("Restoring state from {}", path.display());
    Ok(Some(serde_json::from_str(&text)?))
}

fn run(args: Args) -> Result<(), CCError> {
    init_tracing(&expand(&args.log)?)?;
    info!("Starting colctl!");

    let data_path = expand(&args.data)?;
    let layout = match args.layout.as_deref() {
        Some(path) => Layout::load(&expand(path)?)?,
        None => Layout::default(),
    };
    let state_path = args.state.as_deref().map(expand).transpose()?;
    let state = match state_path.as_ref() {
        Some(path) => load_state(path)?,
        None => None,
    };

    let columns = loader::load_data_file(data_path.clone())?;
    let mut options = GridOptions::default().server_side(args.server_side);
    if let Some(state) = state {
        options = options.state(state);
    }
    let grid = Rc::new(Grid::new(columns, options));

    let name = data_path
        .file_name()
        .and_then(|s| s.to_str())
        .unwrap_or("???")
        .to_string();
    let mut model = Model::init(
        &name,
        grid,
        Rc::new(ContentRegistry::builtin()),
        &layout,
        state_path,
    )?;

    let cfg = TableConfig {
        event_poll_time: args.poll_ms,
    };
    let mut ui = TableUI::new();
    let controller = Controller::new(&cfg);

    let mut terminal = ratatui::init();

    while model.status != Status::QUITTING {
        // Render the current view
        terminal.draw(|f| ui.draw(&model, f))?;

        // Handle events and map to a Message
        let message = controller.handle_event(&model)?;
        model.update(message)?;
    }

    Ok(())
}
