//! Captionist CLI - caption images, extract hashtags, rephrase captions.
//!
//! Captionist describes an image in one sentence, turns the caption into
//! ranked hashtags, and on request rewrites the caption in a chosen tone.
//!
//! # Usage
//!
//! ```bash
//! # Caption the configured sample image
//! captionist caption
//!
//! # Caption some photos and add a funny rewrite
//! captionist caption beach.jpg dog.png --tone funny -f jsonl -o results.jsonl
//!
//! # Rewrite an existing caption
//! captionist rephrase --tone formal "a dog running on the beach"
//!
//! # Fetch the default ONNX models
//! captionist models download
//!
//! # Interactive session (no subcommand, on a terminal)
//! captionist
//! ```

use std::io::IsTerminal;
use std::path::PathBuf;

use clap::{Parser, Subcommand};

mod cli;
mod logging;

/// Captionist - caption images, extract hashtags, rephrase captions in a tone.
#[derive(Parser, Debug)]
#[command(name = "captionist")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Enable verbose (debug) logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Output logs in JSON format
    #[arg(long, global = true)]
    json_logs: bool,

    /// Config file (defaults to the platform config directory)
    #[arg(long, global = true, env = "CAPTIONIST_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

/// Available commands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Caption images and extract hashtags, optionally rephrasing in a tone
    Caption(cli::caption::CaptionArgs),

    /// Rewrite a caption in one of the configured tones
    Rephrase(cli::rephrase::RephraseArgs),

    /// List the configured tones
    Tones,

    /// Manage ONNX models (download, list, path)
    Models(cli::models::ModelsArgs),

    /// View and manage configuration
    Config(cli::config::ConfigArgs),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Credentials may live in a .env file next to the working directory.
    let dotenv = dotenvy::dotenv();

    let cli = Cli::parse();

    // Config errors are reported by the commands that need a config; logging
    // falls back to defaults so `config init` works on a fresh machine.
    let loaded = captionist_core::Config::load_or_default_path(cli.config.as_deref());
    match &loaded {
        Ok(config) => logging::init_from_config(config, cli.verbose, cli.json_logs),
        Err(_) => logging::init("info", cli.verbose, cli.json_logs),
    }

    tracing::debug!("Captionist v{}", captionist_core::VERSION);
    if let Ok(path) = dotenv {
        tracing::debug!("Loaded environment from {:?}", path);
    }

    let config_path = cli.config.clone();
    match cli.command {
        Some(Commands::Caption(args)) => cli::caption::execute(args, loaded?).await,
        Some(Commands::Rephrase(args)) => cli::rephrase::execute(args, loaded?).await,
        Some(Commands::Tones) => cli::rephrase::list_tones(&loaded?),
        Some(Commands::Models(args)) => cli::models::execute(args, loaded?).await,
        Some(Commands::Config(args)) => cli::config::execute(args, config_path, loaded),
        None if std::io::stdin().is_terminal() && std::io::stderr().is_terminal() => {
            cli::interactive::run(loaded?).await
        }
        None => {
            anyhow::bail!("No command given. Run `captionist --help` for usage.")
        }
    }
}
