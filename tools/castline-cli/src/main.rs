//! Castline CLI: capability check and scripted stream switching.
//!
//! Usage:
//!   castline check              Show the effective config and host capabilities
//!   castline simulate [OPTIONS] Run a switching script on the synthetic platform

use std::path::PathBuf;

use clap::{Parser, Subcommand};

mod commands;
mod config;

#[derive(Parser)]
#[command(
    name = "castline",
    about = "Live local-stream switching for real-time sessions",
    version,
    author
)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Config file (defaults to ~/.config/castline/config.json)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the effective configuration and platform capabilities
    Check,

    /// Run a scripted sequence of switches and print every event
    Simulate {
        /// Publish mode for the first acquisition: camera|screen|screen+camera
        #[arg(long)]
        publish_mode: Option<String>,

        /// Audio mode: microphone|system|system+microphone
        #[arg(long)]
        audio_mode: Option<String>,

        /// Pause between steps, in milliseconds
        #[arg(long, default_value = "250")]
        step_ms: u64,

        /// Refuse the first display capture prompt
        #[arg(long)]
        deny_display: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let path = cli
        .config
        .clone()
        .unwrap_or_else(castline_common::config::config_file_path);
    let mut config: config::CliConfig = castline_common::config::load_json_or_default(&path);
    if cli.verbose {
        config.logging.level = "debug".to_string();
    }
    castline_common::logging::init_logging(&config.logging);

    match cli.command {
        Commands::Check => commands::check::run(&config, &path).await,
        Commands::Simulate {
            publish_mode,
            audio_mode,
            step_ms,
            deny_display,
        } => {
            commands::simulate::run(
                config.stream,
                commands::simulate::Options {
                    publish_mode,
                    audio_mode,
                    step_ms,
                    deny_display,
                },
            )
            .await
        }
    }
}
