//! CLI entry point for gallica-dl.

use anyhow::Result;
use clap::Parser;
use tracing::debug;

mod app_config;
mod cli;
mod commands;
mod progress;
mod settings;

use app_config::{LoadedConfig, load_config_at, load_default_file_config};
use cli::{Args, Command};
use settings::Settings;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments first (before tracing, so --help works without logs)
    let args = Args::parse();

    // Priority: RUST_LOG env var > quiet flag > verbose flag > default (info)
    let default_level = if args.quiet {
        "error"
    } else {
        match args.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    debug!(?args, "CLI arguments parsed");

    let loaded = load_config(&args)?;
    if let Some(path) = loaded.path.as_deref().filter(|_| loaded.loaded_from_file) {
        debug!(path = %path.display(), "config file loaded");
    }
    let mut settings = Settings::resolve(loaded.config.as_ref(), args.base_url.as_deref());

    match &args.command {
        Command::Pdf(pdf) => {
            settings.apply_pdf_args(pdf);
            commands::run_pdf_command(&settings, pdf, args.quiet).await
        }
        Command::Pages { ark } => commands::run_pages_command(&settings, ark).await,
        Command::Ark { ark, json } => commands::run_ark_command(ark, *json),
        Command::Meta(meta) => commands::run_meta_command(&settings, meta).await,
        Command::Config => {
            commands::run_config_show_command(&loaded, &settings);
            Ok(())
        }
    }
}

fn load_config(args: &Args) -> Result<LoadedConfig> {
    if args.no_config {
        return Ok(LoadedConfig {
            path: None,
            config: None,
            loaded_from_file: false,
        });
    }
    match &args.config {
        Some(path) => load_config_at(path),
        None => load_default_file_config(),
    }
}
