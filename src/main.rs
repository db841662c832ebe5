use anyhow::Result;
use clap::Parser;

mod app;
mod chat;
mod client;
mod config;
mod handler;
mod tui;
mod ui;

use app::App;
use config::Config;

#[derive(Parser)]
#[command(name = "shopchat")]
#[command(about = "Terminal chat client for an AI shopping assistant")]
struct Cli {
    /// Base URL of the assistant backend
    #[arg(long)]
    url: Option<String>,

    /// User identifier sent with each message
    #[arg(long)]
    user: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging()?;

    let mut config = Config::load().unwrap_or_default();
    if cli.url.is_some() {
        config.base_url = cli.url;
    }
    if cli.user.is_some() {
        config.user_id = cli.user;
    }
    tracing::info!(url = config.base_url(), user = config.user_id(), "starting shopchat");

    let mut app = App::new(&config);

    tui::install_panic_hook();
    let mut terminal = tui::init()?;
    let mut events = tui::EventHandler::new();

    while !app.should_quit {
        terminal.draw(|frame| ui::render(&mut app, frame))?;
        if let Some(event) = events.next().await {
            handler::handle_event(&mut app, event).await?;
        }
    }

    tui::restore()?;
    Ok(())
}

/// Route tracing output to a log file; the terminal belongs to the TUI.
fn init_logging() -> Result<()> {
    use tracing_subscriber::EnvFilter;

    let log_dir = dirs::data_local_dir()
        .ok_or_else(|| anyhow::anyhow!("Could not determine data directory"))?
        .join("shopchat");
    std::fs::create_dir_all(&log_dir)?;
    let log_file = std::fs::File::create(log_dir.join("shopchat.log"))?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::sync::Mutex::new(log_file))
        .with_ansi(false)
        .init();

    Ok(())
}
