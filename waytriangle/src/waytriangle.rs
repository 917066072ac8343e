use clap::Parser;
use eyre::{Result, WrapErr};
use libwaytriangle::Session;

mod cli;
mod config;

use config::Config;

fn main() -> Result<()> {
    let cli = cli::Cli::parse();

    let config_path = cli
        .config
        .as_deref()
        .map(config::expand_path)
        .or_else(Config::default_path);
    let config = config_path
        .as_ref()
        .and_then(Config::load)
        .unwrap_or_default();

    #[cfg(feature = "logger")]
    {
        let level = cli
            .log_level
            .unwrap_or_else(|| config.log.clone().unwrap_or_default().get_level());
        tracing_subscriber::fmt()
            .with_max_level(level)
            .with_writer(std::io::stderr)
            .init();
    }

    if let Some(path) = &config_path {
        tracing::debug!("config path: {}", path.display());
    }

    let session_config = config.session_config(&cli);
    tracing::debug!("{session_config:#?}");

    let (mut session, mut event_queue) =
        Session::connect(session_config).wrap_err("failed to open the OpenGL window")?;

    tracing::info!("Window open, press <ESC> to quit.");
    let result = session.run(&mut event_queue);
    session.deinit();

    result.wrap_err("event loop failed")
}
