//! vramwatch - remote GPU monitoring dashboard
//!
//! Polls `nvidia-smi` on a remote host over ssh and charts memory and
//! utilization history in the terminal.

use std::io;
use std::sync::Arc;

use color_eyre::eyre::bail;
use color_eyre::Result;
use tracing::warn;
use tracing_subscriber::EnvFilter;

use vramwatch::app::App;
use vramwatch::config::AppConfig;
use vramwatch::engine::Monitor;
use vramwatch::event::EventHandler;
use vramwatch::source::{SampleSource, SshSource};

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    // Logs go to stderr and are off unless RUST_LOG asks for them, so
    // they do not scribble over the alternate screen.
    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("off")))
        .init();

    let mut config = AppConfig::load();
    let cli_target = match std::env::args().nth(1) {
        Some(arg) => match arg.split_once('@') {
            Some((user, host)) => Some((user.to_string(), host.to_string())),
            None => bail!("expected user@host, got `{arg}`"),
        },
        None => None,
    };

    let source: Arc<dyn SampleSource> = Arc::new(SshSource::new());
    let monitor = Monitor::spawn(source, config.target());

    if let Some((user, host)) = cli_target {
        config.user = user;
        config.host = host;
        if let Err(err) = config.save() {
            warn!(error = %err, "could not persist target");
        }
        monitor.set_target(config.target());
    }

    setup_terminal()?;
    let mut terminal =
        ratatui::Terminal::new(ratatui::backend::CrosstermBackend::new(io::stdout()))?;
    let mut events = EventHandler::new();
    let mut app = App::new(monitor, config);

    let result = app.run(&mut terminal, &mut events).await;

    restore_terminal()?;
    result
}

fn setup_terminal() -> Result<()> {
    crossterm::terminal::enable_raw_mode()?;
    crossterm::execute!(io::stdout(), crossterm::terminal::EnterAlternateScreen)?;
    Ok(())
}

fn restore_terminal() -> Result<()> {
    crossterm::execute!(io::stdout(), crossterm::terminal::LeaveAlternateScreen)?;
    crossterm::terminal::disable_raw_mode()?;
    Ok(())
}
