mod app;
mod cli;

use anyhow::{Context, Result};
use app::App;
use clap::Parser;
use cli::Args;
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.log_level.as_deref())?;
    let config = args.load_config()?;
    App::new(config, &args)?.run()
}

/// `--log-level` wins over `RUST_LOG`; `info` otherwise.
fn init_logging(level: Option<&str>) -> Result<()> {
    let filter = match level {
        Some(level) => EnvFilter::try_new(level).context("invalid --log-level")?,
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init()
        .map_err(anyhow::Error::msg)
}
