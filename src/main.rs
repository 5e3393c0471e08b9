use std::error::Error;
use std::fs::OpenOptions;
use std::path::Path;
use std::sync::Mutex;
use tracing_subscriber::EnvFilter;

use retro_deck::app;
use retro_deck::config::LauncherConfig;

fn main() -> Result<(), Box<dyn Error>> {
    let config = LauncherConfig::load()?;

    // the terminal belongs to the UI, so diagnostics only go to a file
    if let Some(path) = &config.log_file {
        init_tracing(path)?;
    }
    tracing::info!(engine = %config.engine_binary, "retro deck starting");

    app::run(config)
}

fn init_tracing(path: &Path) -> Result<(), Box<dyn Error>> {
    let file = OpenOptions::new().create(true).append(true).open(path)?;
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .init();
    Ok(())
}
