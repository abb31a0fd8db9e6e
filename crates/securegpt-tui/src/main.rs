use std::fs::OpenOptions;
use std::path::PathBuf;
use std::sync::Mutex;
use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;
use securegpt_core::Config;

mod app;
mod handler;
mod highlight;
mod tui;
mod ui;

use app::App;
use tui::{EventHandler, Tui};

#[derive(Parser)]
#[command(name = "securegpt", version)]
#[command(about = "Terminal chat client for a local Ollama model, tuned for security questions")]
struct Cli {
    /// Ollama endpoint
    #[arg(long)]
    endpoint: Option<String>,
    /// Model to query
    #[arg(short, long)]
    model: Option<String>,
    /// Show model output without the identity filter
    #[arg(long)]
    no_filter: bool,
    /// Directory for chat history and logs
    #[arg(long)]
    data_dir: Option<PathBuf>,
    /// Write these options to the config file before starting
    #[arg(long)]
    save: bool,
}

impl Cli {
    /// Fold the flags into `config`; returns whether to save the result
    fn apply(self, config: &mut Config) -> bool {
        if let Some(endpoint) = self.endpoint {
            config.endpoint = Some(endpoint);
        }
        if let Some(model) = self.model {
            config.model = Some(model);
        }
        if self.no_filter {
            config.filter_responses = Some(false);
        }
        if let Some(dir) = self.data_dir {
            config.data_dir = Some(dir);
        }
        self.save
    }
}

/// Log to a file; stderr belongs to the terminal UI
fn init_logging(config: &Config) -> Result<()> {
    let dir = config.data_dir()?;
    std::fs::create_dir_all(&dir)?;
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(dir.join("securegpt.log"))?;

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .init();
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let loaded = Config::load();
    let mut config = match &loaded {
        Ok(config) => config.clone(),
        Err(_) => Config::new(),
    };
    let save = cli.apply(&mut config);

    init_logging(&config)?;
    if let Err(e) = loaded {
        tracing::warn!(error = %e, "could not read config, using defaults");
    }
    if save {
        let path = config.save()?;
        tracing::info!(path = %path.display(), "saved config");
    }
    tracing::info!(endpoint = config.endpoint(), model = config.model(), "starting SecureGPT");

    let mut app = App::new(&config)?;

    tui::install_panic_hook();
    let mut terminal = tui::init()?;
    let mut events = EventHandler::new();

    let result = run(&mut terminal, &mut app, &mut events).await;

    tui::restore()?;
    result
}

async fn run(terminal: &mut Tui, app: &mut App, events: &mut EventHandler) -> Result<()> {
    while !app.should_quit {
        terminal.draw(|frame| ui::render(app, frame))?;

        match events.next().await {
            Some(event) => handler::handle_event(app, event).await,
            None => break,
        }
    }
    Ok(())
}
